use serde::{Deserialize, Serialize};

use super::node::Bounds;

/// A declarative click instruction.
///
/// Rules are created by manual entry, by the recording helper
/// ([`Rule::recorded`]) or by subscription import
/// ([`parse_subscription`](crate::parse_subscription)). The engine treats a
/// rule as data: matching state (throttle history, sequence progress) lives in
/// the [`TriggerTracker`](crate::TriggerTracker), keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Store-assigned identifier; `0` until persisted.
    #[serde(default)]
    pub id: i64,
    /// Owning package, or `"*"` for a global (wildcard) rule.
    pub package_name: String,
    pub app_name: String,
    /// Primary selector in the DSL. Tried before any legacy field.
    #[serde(default)]
    pub selector: Option<String>,
    /// Legacy fallback: raw target text, substring-matched case-insensitively.
    #[serde(default)]
    pub target_text: Option<String>,
    /// Legacy fallback: fully-qualified view id, matched exactly.
    #[serde(default)]
    pub target_view_id: Option<String>,
    /// Legacy fallback: recorded bounds as `"left,top,right,bottom"`.
    #[serde(default)]
    pub bounds_in_screen: Option<String>,
    /// Comma-separated allow-list of activity ids; `None`/empty means any.
    #[serde(default)]
    pub activity_ids: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub is_subscription: bool,
    #[serde(default)]
    pub subscription_name: Option<String>,
    #[serde(default)]
    pub subscription_url: Option<String>,
    /// If this selector matches anywhere in the tree, the rule is suppressed.
    #[serde(default)]
    pub exclude_selector: Option<String>,
    /// Step key identifying this rule as one stage of a combo.
    #[serde(default)]
    pub step_key: Option<i64>,
    /// Comma-separated step keys that must already be satisfied.
    #[serde(default)]
    pub pre_keys: Option<String>,
    /// Sequence bucket shared by the steps of one combo.
    #[serde(default)]
    pub group_key: Option<i64>,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// A minimal enabled rule; remaining fields default to `None`/unset.
    #[must_use]
    pub fn new(id: i64, package_name: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            id,
            package_name: package_name.into(),
            app_name: app_name.into(),
            selector: None,
            target_text: None,
            target_view_id: None,
            bounds_in_screen: None,
            activity_ids: None,
            group_name: None,
            description: None,
            enabled: true,
            is_subscription: false,
            subscription_name: None,
            subscription_url: None,
            exclude_selector: None,
            step_key: None,
            pre_keys: None,
            group_key: None,
        }
    }

    /// Synthesize a rule from facts captured off a live node during recording.
    ///
    /// The generated selector prefers the view id, then the text (truncated to
    /// its first five characters when longer than ten, since long text tends
    /// to be dynamic), and finally the raw bounds. The legacy fields are
    /// populated alongside so the fallback chain stays usable if the selector
    /// stops matching.
    #[must_use]
    pub fn recorded(
        package_name: impl Into<String>,
        app_name: impl Into<String>,
        view_id: Option<String>,
        text: Option<String>,
        bounds: Bounds,
        activity_id: Option<String>,
    ) -> Self {
        let bounds_csv = format!(
            "{},{},{},{}",
            bounds.left, bounds.top, bounds.right, bounds.bottom
        );

        let mut selector = String::new();
        if let Some(vid) = view_id.as_deref().filter(|v| !v.is_empty()) {
            let short = vid.rsplit('/').next().unwrap_or(vid);
            selector.push_str(&format!("[vid=\"{short}\"]"));
        }
        if let Some(t) = text.as_deref().filter(|t| !t.is_empty()) {
            let safe: String = if t.chars().count() > 10 {
                t.chars().take(5).collect()
            } else {
                t.to_owned()
            };
            selector.push_str(&format!("[text=\"{safe}\"]"));
        }
        if selector.is_empty() {
            selector.push_str(&format!("[bounds=\"{bounds_csv}\"]"));
        }

        Self {
            selector: Some(selector),
            target_text: text,
            target_view_id: view_id,
            bounds_in_screen: Some(bounds_csv),
            activity_ids: activity_id,
            ..Self::new(0, package_name, app_name)
        }
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.package_name == "*"
    }

    /// Whether the rule applies in the given activity.
    ///
    /// A rule without an activity scope applies everywhere. A scoped rule
    /// never applies when the current activity is unknown (empty).
    #[must_use]
    pub fn activity_allowed(&self, current: &str) -> bool {
        let Some(scope) = self.activity_ids.as_deref().filter(|s| !s.trim().is_empty()) else {
            return true;
        };
        if current.is_empty() {
            return false;
        }
        scope.split(',').any(|id| id.trim() == current)
    }

    /// Parsed predecessor step keys; malformed entries are ignored.
    #[must_use]
    pub fn required_pre_keys(&self) -> Vec<i64> {
        self.pre_keys
            .as_deref()
            .map(|s| {
                s.split(',')
                    .filter_map(|k| k.trim().parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}
