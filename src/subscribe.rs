//! Subscription import: a lenient JSON5-ish document format compiled into a
//! flat rule list.
//!
//! Documents arrive from arbitrary community sources, so the pipeline is
//! deliberately forgiving. A normalizer rewrites the JSON5 conveniences
//! (comments, single quotes, bare keys, trailing commas) into strict JSON,
//! then the extraction walks the [`serde_json::Value`] tree treating every
//! field as optional. Only a document that fails to parse at the top level,
//! or one that yields no rules at all, is reported as an error; per-group
//! oddities are logged and skipped.

use serde_json::Value;
use tracing::warn;

use crate::types::Rule;

const DEFAULT_SUBSCRIPTION_NAME: &str = "Imported Subscription";

/// Import failure, surfaced to the caller driving the refresh.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("subscription document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("subscription document contains no rules")]
    Empty,
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Failure reported by a [`Fetch`] implementation.
#[derive(Debug, thiserror::Error)]
#[error("fetch failed: {0}")]
pub struct FetchError(pub String);

/// Capability for retrieving subscription text from a URL. The transport is
/// the host application's concern.
pub trait Fetch {
    /// # Errors
    ///
    /// Returns [`FetchError`] when the document cannot be retrieved.
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetch a subscription document and compile it, stamping every rule with the
/// source URL.
///
/// # Errors
///
/// Returns [`SubscriptionError`] on fetch failure, malformed JSON, or an
/// empty extraction.
pub fn import_subscription<F: Fetch>(
    fetcher: &F,
    url: &str,
) -> Result<Vec<Rule>, SubscriptionError> {
    let text = fetcher.fetch(url)?;
    parse_subscription(&text, Some(url))
}

/// Compile subscription text into rules.
///
/// The top level is either a bare array of app objects or an object with
/// optional `name`, `globalGroups`, and `apps`. Global groups produce
/// wildcard rules under package `"*"`.
///
/// # Errors
///
/// Returns [`SubscriptionError::Parse`] when the normalized document is not
/// JSON, and [`SubscriptionError::Empty`] when extraction yields no rules.
pub fn parse_subscription(
    text: &str,
    source_url: Option<&str>,
) -> Result<Vec<Rule>, SubscriptionError> {
    let normalized = normalize_json5(text);
    let root: Value = serde_json::from_str(&normalized)?;

    // A bare app array is shorthand for {"apps": [...]}.
    let (name, global_groups, apps) = match &root {
        Value::Array(apps) => (None, None, Some(apps.as_slice())),
        Value::Object(obj) => (
            obj.get("name").and_then(Value::as_str),
            obj.get("globalGroups").and_then(Value::as_array).map(Vec::as_slice),
            obj.get("apps").and_then(Value::as_array).map(Vec::as_slice),
        ),
        _ => (None, None, None),
    };
    let sub_name = name
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_SUBSCRIPTION_NAME);

    let mut rules = Vec::new();

    for group in global_groups.unwrap_or_default() {
        extract_group(group, "*", "Global Configuration", true, sub_name, source_url, &mut rules);
    }

    for app in apps.unwrap_or_default() {
        let Some(app) = app.as_object() else {
            warn!("skipping non-object app entry");
            continue;
        };
        let Some(package) = app
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty() && *id != "null")
        else {
            warn!("skipping app entry without a package id");
            continue;
        };
        let app_name = app
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .unwrap_or(package);
        for group in app.get("groups").and_then(Value::as_array).into_iter().flatten() {
            extract_group(group, package, app_name, false, sub_name, source_url, &mut rules);
        }
    }

    if rules.is_empty() {
        return Err(SubscriptionError::Empty);
    }
    Ok(rules)
}

fn extract_group(
    group: &Value,
    package: &str,
    app_name: &str,
    is_global: bool,
    sub_name: &str,
    source_url: Option<&str>,
    out: &mut Vec<Rule>,
) {
    let Some(group) = group.as_object() else {
        warn!(package, "skipping non-object group entry");
        return;
    };
    let group_name = group
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .unwrap_or("Default Group");
    let group_desc = group
        .get("desc")
        .and_then(Value::as_str)
        .unwrap_or(group_name);
    let group_key = stable_group_key(sub_name, package, group_name);

    let display_group = if is_global {
        format!("[Global] {group_name}")
    } else {
        group_name.to_owned()
    };

    let mut push = |selector: &str,
                    exclude: Option<&str>,
                    activity_ids: Option<String>,
                    step_key: Option<i64>,
                    pre_keys: Option<String>| {
        if selector.is_empty() {
            return;
        }
        let mut rule = Rule::new(0, package, app_name);
        rule.selector = Some(selector.to_owned());
        rule.exclude_selector = exclude
            .filter(|e| !e.trim().is_empty())
            .map(str::to_owned);
        rule.activity_ids = activity_ids;
        rule.group_name = Some(display_group.clone());
        rule.description = Some(group_desc.to_owned());
        rule.is_subscription = true;
        rule.subscription_name = Some(sub_name.to_owned());
        rule.subscription_url = source_url.map(str::to_owned);
        rule.step_key = step_key;
        rule.pre_keys = pre_keys;
        rule.group_key = Some(group_key);
        out.push(rule);
    };

    // `rules` may be a lone string, a lone object, or an array mixing both.
    match group.get("rules") {
        Some(Value::String(selector)) => push(selector, None, None, None, None),
        Some(Value::Object(_)) => {
            extract_rule_object(group.get("rules").and_then(Value::as_object), &mut push);
        }
        Some(Value::Array(entries)) => {
            for entry in entries {
                match entry {
                    Value::String(selector) => push(selector, None, None, None, None),
                    Value::Object(_) => extract_rule_object(entry.as_object(), &mut push),
                    other => {
                        warn!(package, group = group_name, ?other, "skipping rule entry");
                    }
                }
            }
        }
        _ => warn!(package, group = group_name, "group has no rules field"),
    }
}

fn extract_rule_object<F>(obj: Option<&serde_json::Map<String, Value>>, push: &mut F)
where
    F: FnMut(&str, Option<&str>, Option<String>, Option<i64>, Option<String>),
{
    let Some(obj) = obj else { return };
    let matches = string_or_array(obj.get("matches"));
    let exclude = obj.get("excludeMatches").and_then(Value::as_str);
    let activity_ids = join_csv(string_or_array(obj.get("activityIds")));
    let step_key = obj.get("key").and_then(Value::as_i64);
    let pre_keys = join_csv(string_or_array(obj.get("preKeys")));
    for selector in &matches {
        push(
            selector,
            exclude,
            activity_ids.clone(),
            step_key,
            pre_keys.clone(),
        );
    }
}

/// Fields like `matches` and `preKeys` accept either a string or an array of
/// strings; numbers inside arrays are stringified (preKeys are numeric in the
/// wild).
fn string_or_array(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn join_csv(items: Vec<String>) -> Option<String> {
    if items.is_empty() {
        None
    } else {
        Some(items.join(","))
    }
}

/// Deterministic sequence group key, stable across re-imports of the same
/// subscription/package/group triple. FNV-1a over the joined identity.
#[must_use]
pub fn stable_group_key(sub_name: &str, package: &str, group_name: &str) -> i64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = FNV_OFFSET;
    for byte in format!("{sub_name}:{package}:{group_name}").bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as i64
}

/// Rewrite JSON5 conveniences into strict JSON.
///
/// Character-by-character state machine tracking quote and comment context,
/// so markers inside string literals are never misread. Handles `//` and
/// `/* */` comments, single-quoted strings (embedded `"` escaped), bare
/// object keys, and trailing commas before `}` or `]`.
#[must_use]
pub fn normalize_json5(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut in_single = false;
    let mut in_double = false;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if (in_single || in_double) && c == '\\' {
            out.push(c);
            if let Some(n) = next {
                out.push(n);
            }
            i += 2;
            continue;
        }

        if !in_single && !in_double {
            if c == '/' && next == Some('/') {
                i += 2;
                while i < chars.len() && chars[i] != '\n' && chars[i] != '\r' {
                    i += 1;
                }
                continue;
            }
            if c == '/' && next == Some('*') {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
                continue;
            }
        }

        if c == '"' && !in_single {
            in_double = !in_double;
            out.push(c);
            i += 1;
            continue;
        }

        if c == '\'' && !in_double {
            in_single = !in_single;
            out.push('"');
            i += 1;
            continue;
        }

        if in_single && c == '"' {
            out.push_str("\\\"");
            i += 1;
            continue;
        }

        out.push(c);
        i += 1;
    }

    let quoted = quote_bare_keys(&out);
    strip_trailing_commas(&quoted)
}

/// Quote identifiers appearing in key position (`ident:` after `{` or `,`).
fn quote_bare_keys(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut in_string = false;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\\' {
                out.push(c);
                if let Some(&n) = chars.get(i + 1) {
                    out.push(n);
                }
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            out.push(c);
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }

        if c == '{' || c == ',' {
            out.push(c);
            i += 1;
            // Look ahead past whitespace for `ident :` and quote the ident.
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let start = j;
            while j < chars.len()
                && (chars[j].is_ascii_alphanumeric() || chars[j] == '_' || chars[j] == '$')
            {
                j += 1;
            }
            let mut k = j;
            while k < chars.len() && chars[k].is_whitespace() {
                k += 1;
            }
            if j > start && chars.get(k) == Some(&':') {
                for &ws in &chars[i..start] {
                    out.push(ws);
                }
                out.push('"');
                for &ident in &chars[start..j] {
                    out.push(ident);
                }
                out.push('"');
                i = j;
            }
            continue;
        }

        out.push(c);
        i += 1;
    }
    out
}

/// Drop commas that directly precede a closing brace or bracket.
fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut in_string = false;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\\' {
                out.push(c);
                if let Some(&n) = chars.get(i + 1) {
                    out.push(n);
                }
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            out.push(c);
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }
        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if matches!(chars.get(j), Some('}') | Some(']')) {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}
