//! The rule engine: per-event filtering, candidate ordering, the trigger
//! protocol, and the click action.
//!
//! The engine is constructed with its collaborators (clock, config source)
//! and owns all mutable matching state behind locks, so one instance can be
//! shared across the event-delivery thread and the matching worker. Rule-set
//! and whitelist updates swap whole indexes; a matching pass works on a
//! snapshot and never observes a partial update.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::SelectorCache;
use crate::matcher;
use crate::parse::SelectorError;
use crate::throttle::TriggerTracker;
use crate::types::{Bounds, Clock, ConfigSource, Rule, Selector, TreeProvider, UiNode};

/// Compiled selectors cached per engine, primary and exclusion separately.
const SELECTOR_CACHE_CAPACITY: usize = 500;
/// How far up the ancestor chain the click action searches for a clickable
/// container before falling back to a synthetic tap.
const CLICK_ANCESTOR_LIMIT: usize = 10;
/// Per-edge pixel tolerance for the legacy bounds fallback.
const BOUNDS_TOLERANCE: i32 = 30;

#[derive(Debug, Default)]
struct RuleIndex {
    by_package: HashMap<String, Vec<Rule>>,
    global: Vec<Rule>,
}

impl RuleIndex {
    fn build(rules: Vec<Rule>) -> Self {
        let mut index = Self::default();
        for rule in rules.into_iter().filter(|r| r.enabled) {
            if rule.is_wildcard() {
                index.global.push(rule);
            } else {
                index
                    .by_package
                    .entry(rule.package_name.clone())
                    .or_default()
                    .push(rule);
            }
        }
        index
    }

    /// Package-scoped rules first, then global rules.
    fn candidates(&self, package: &str) -> Vec<Rule> {
        let mut out = self.by_package.get(package).cloned().unwrap_or_default();
        out.extend(self.global.iter().cloned());
        out
    }
}

/// Selector-matching engine with the surrounding trigger protocol.
///
/// At most one rule fires per matching pass; which one is governed by
/// candidate order (package-scoped before global), activity scope, per-rule
/// throttling, combo sequencing, exclusion selectors, and the per-element
/// cooldown.
#[derive(Debug)]
pub struct RuleEngine<C: Clock, S: ConfigSource> {
    rules: RwLock<RuleIndex>,
    enabled_packages: RwLock<HashSet<String>>,
    selectors: SelectorCache,
    exclusions: SelectorCache,
    tracker: Mutex<TriggerTracker>,
    last_scan: Mutex<HashMap<String, u64>>,
    clock: C,
    config: S,
}

impl<C: Clock, S: ConfigSource> RuleEngine<C, S> {
    #[must_use]
    pub fn new(clock: C, config: S) -> Self {
        Self {
            rules: RwLock::new(RuleIndex::default()),
            enabled_packages: RwLock::new(HashSet::new()),
            selectors: SelectorCache::new(SELECTOR_CACHE_CAPACITY),
            exclusions: SelectorCache::new(SELECTOR_CACHE_CAPACITY),
            tracker: Mutex::new(TriggerTracker::new()),
            last_scan: Mutex::new(HashMap::new()),
            clock,
            config,
        }
    }

    /// Atomically replace the active rule set. Disabled rules are dropped
    /// here so the matching pass never has to re-check the flag.
    pub fn replace_rules(&self, rules: Vec<Rule>) {
        let index = RuleIndex::build(rules);
        *self.rules.write() = index;
    }

    /// Atomically replace the set of user-enabled packages.
    pub fn replace_enabled_packages(&self, packages: HashSet<String>) {
        *self.enabled_packages.write() = packages;
    }

    /// Compile (or fetch the cached form of) selector text.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] when the text does not compile.
    pub fn compile_selector(&self, text: &str) -> Result<Arc<Selector>, SelectorError> {
        self.selectors.get_or_compile(text)
    }

    /// The inline event filter, cheap enough for the event-delivery path.
    ///
    /// Returns true when a full matching pass should be dispatched for this
    /// package: the engine is globally enabled, the package is whitelisted,
    /// and the per-package debounce window has elapsed. Passing the check
    /// stamps the debounce clock, so callers must follow through with a pass.
    pub fn should_scan(&self, package: &str) -> bool {
        let cfg = self.config.load();
        if !cfg.enabled {
            return false;
        }
        if !self.enabled_packages.read().contains(package) {
            return false;
        }
        let now = self.clock.now_ms();
        let mut last = self.last_scan.lock();
        if let Some(&t) = last.get(package) {
            if now.saturating_sub(t) < cfg.debounce_ms {
                return false;
            }
        }
        last.insert(package.to_owned(), now);
        true
    }

    /// Run one matching pass for the given (package, activity) context.
    ///
    /// Pulls the live root from `tree`, evaluates candidate rules in priority
    /// order, clicks the first resolvable target, records trigger state, and
    /// returns the fired rule's id. `None` means nothing fired, which is the
    /// common case, not an error. Pass an empty `activity` when the current
    /// activity is unknown.
    pub fn match_and_trigger<P: TreeProvider>(
        &self,
        package: &str,
        activity: &str,
        tree: &P,
    ) -> Option<i64> {
        let cfg = self.config.load();
        if !cfg.enabled {
            return None;
        }
        let root = tree.active_root()?;

        self.tracker
            .lock()
            .reset_if_context_changed(package, activity);

        let candidates = self.rules.read().candidates(package);
        for rule in &candidates {
            if !rule.activity_allowed(activity) {
                continue;
            }

            let now = self.clock.now_ms();
            if !self.tracker.lock().can_trigger_rule(
                rule.id,
                now,
                cfg.cooldown_ms,
                cfg.max_triggers,
            ) {
                continue;
            }

            // Predecessor check is vacuous without a sequence group.
            let pre_keys = rule.required_pre_keys();
            if !pre_keys.is_empty() {
                if let Some(group_key) = rule.group_key {
                    if !self.tracker.lock().sequence_satisfied(group_key, &pre_keys) {
                        continue;
                    }
                }
            }

            if self.is_excluded(rule, &root) {
                debug!(rule = rule.id, "rule suppressed by exclusion selector");
                continue;
            }

            let Some(target) = self.resolve_target(rule, &root) else {
                continue;
            };

            let fingerprint = node_fingerprint(&target);
            let now = self.clock.now_ms();
            if !self.tracker.lock().can_trigger_element(
                rule.id,
                &fingerprint,
                now,
                cfg.element_cooldown_ms,
            ) {
                continue;
            }

            if !self.perform_click(tree, &target) {
                // Treated as not-matched this cycle; no state is recorded and
                // evaluation continues with the next candidate.
                debug!(rule = rule.id, "click action failed");
                continue;
            }

            let now = self.clock.now_ms();
            let mut tracker = self.tracker.lock();
            tracker.record_rule_trigger(rule.id, now);
            tracker.record_element_trigger(rule.id, &fingerprint, now);
            if let (Some(step_key), Some(group_key)) = (rule.step_key, rule.group_key) {
                tracker.record_step(group_key, step_key);
            }
            drop(tracker);

            debug!(
                rule = rule.id,
                package,
                group = rule.group_name.as_deref().unwrap_or("default"),
                "rule fired"
            );
            return Some(rule.id);
        }
        None
    }

    /// True when the rule's exclusion selector matches anywhere in the tree.
    /// A broken exclusion selector is logged and treated as no exclusion.
    fn is_excluded<N: UiNode>(&self, rule: &Rule, root: &N) -> bool {
        let Some(text) = rule.exclude_selector.as_deref().filter(|s| !s.is_empty()) else {
            return false;
        };
        match self.exclusions.get_or_compile(text) {
            Ok(selector) => matcher::find(&selector, root).is_some(),
            Err(err) => {
                warn!(rule = rule.id, selector = text, %err, "exclusion selector rejected");
                false
            }
        }
    }

    /// Resolve the rule's target node: primary selector first, then the
    /// legacy fallbacks in strict order (view id, text, bounds).
    fn resolve_target<N: UiNode>(&self, rule: &Rule, root: &N) -> Option<N> {
        if let Some(text) = rule.selector.as_deref().filter(|s| !s.is_empty()) {
            match self.selectors.get_or_compile(text) {
                Ok(selector) => {
                    if let Some(node) = matcher::find(&selector, root) {
                        return Some(node);
                    }
                }
                Err(err) => {
                    warn!(rule = rule.id, selector = text, %err, "selector rejected");
                }
            }
        }

        if let Some(view_id) = rule.target_view_id.as_deref().filter(|s| !s.is_empty()) {
            if let Some(node) = matcher::find_by_view_id(root, view_id) {
                return Some(node);
            }
        }

        if let Some(text) = rule.target_text.as_deref().filter(|s| !s.is_empty()) {
            if let Some(node) = matcher::find_by_text(root, text) {
                return Some(node);
            }
        }

        if let Some(csv) = rule.bounds_in_screen.as_deref().filter(|s| !s.is_empty()) {
            if let Some(bounds) = Bounds::parse_csv(csv) {
                if bounds.width() > 0 && bounds.height() > 0 {
                    if let Some(node) = matcher::find_by_bounds(root, bounds, BOUNDS_TOLERANCE) {
                        return Some(node);
                    }
                }
            }
        }

        None
    }

    /// Click the target: the nearest clickable ancestor (the target itself
    /// included, up to [`CLICK_ANCESTOR_LIMIT`] levels) via its click action,
    /// else a synthetic tap at the target's center.
    fn perform_click<P: TreeProvider>(&self, tree: &P, node: &P::Node) -> bool {
        let mut current = Some(node.clone());
        let mut depth = 0;
        while let Some(candidate) = current {
            if depth >= CLICK_ANCESTOR_LIMIT {
                break;
            }
            if candidate.clickable() && candidate.click() {
                return true;
            }
            current = candidate.parent();
            depth += 1;
        }

        let bounds = node.bounds();
        tree.dispatch_tap(bounds.center_x(), bounds.center_y())
    }
}

/// Derived identity of a matched element, used for the per-element cooldown:
/// view id, text (or description), class name, and bounds, with placeholders
/// for missing parts.
#[must_use]
pub fn node_fingerprint<N: UiNode>(node: &N) -> String {
    let vid = node.view_id().unwrap_or_else(|| "no_vid".to_owned());
    let text = node
        .text()
        .or_else(|| node.description())
        .unwrap_or_else(|| "no_text".to_owned());
    let class = node.class_name().unwrap_or_else(|| "no_class".to_owned());
    format!("{vid}_{text}_{class}_{}", node.bounds())
}
