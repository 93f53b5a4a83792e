//! Trigger throttling and multi-stage sequence tracking.
//!
//! A pure state machine: callers pass timestamps in, so the tracker has no
//! clock of its own and tests can drive it deterministically. The engine owns
//! one tracker behind a mutex.

use std::collections::{HashMap, HashSet};

/// Once the element map grows past this many entries, recording prunes stale
/// ones. Bounded-memory housekeeping, not part of the cooldown contract.
const ELEMENT_HISTORY_SOFT_CAP: usize = 1000;
const ELEMENT_HISTORY_MAX_AGE_MS: u64 = 10_000;

/// Bounded-memory state for recent triggers and combo progress.
#[derive(Debug, Default)]
pub struct TriggerTracker {
    /// Per rule id: sliding list of recent trigger timestamps.
    rule_history: HashMap<i64, Vec<u64>>,
    /// Per (rule id, element fingerprint): last trigger timestamp.
    element_history: HashMap<(i64, String), u64>,
    /// Per sequence group key: satisfied step keys.
    satisfied_steps: HashMap<i64, HashSet<i64>>,
    /// Last observed (package, activity); sequence state resets on change.
    last_context: Option<(String, String)>,
}

impl TriggerTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prune this rule's history to the cooldown window, then report whether
    /// another trigger is allowed.
    pub fn can_trigger_rule(
        &mut self,
        rule_id: i64,
        now: u64,
        cooldown_ms: u64,
        max_triggers: usize,
    ) -> bool {
        let history = self.rule_history.entry(rule_id).or_default();
        history.retain(|&t| now.saturating_sub(t) <= cooldown_ms);
        history.len() < max_triggers
    }

    pub fn record_rule_trigger(&mut self, rule_id: i64, now: u64) {
        self.rule_history.entry(rule_id).or_default().push(now);
    }

    /// Whether the same visual element may be clicked again for this rule.
    #[must_use]
    pub fn can_trigger_element(
        &mut self,
        rule_id: i64,
        fingerprint: &str,
        now: u64,
        element_cooldown_ms: u64,
    ) -> bool {
        match self.element_history.get(&(rule_id, fingerprint.to_owned())) {
            Some(&last) => now.saturating_sub(last) > element_cooldown_ms,
            None => true,
        }
    }

    pub fn record_element_trigger(&mut self, rule_id: i64, fingerprint: &str, now: u64) {
        self.element_history
            .insert((rule_id, fingerprint.to_owned()), now);
        if self.element_history.len() > ELEMENT_HISTORY_SOFT_CAP {
            self.element_history
                .retain(|_, &mut t| now.saturating_sub(t) <= ELEMENT_HISTORY_MAX_AGE_MS);
        }
    }

    /// Clear all satisfied-step sets when the observed (package, activity)
    /// pair changes. Must run before any per-rule sequence check in a pass.
    pub fn reset_if_context_changed(&mut self, package: &str, activity: &str) {
        let changed = self
            .last_context
            .as_ref()
            .is_none_or(|(p, a)| p != package || a != activity);
        if changed {
            self.satisfied_steps.clear();
            self.last_context = Some((package.to_owned(), activity.to_owned()));
        }
    }

    /// Whether every required predecessor step of a group is satisfied.
    #[must_use]
    pub fn sequence_satisfied(&self, group_key: i64, pre_keys: &[i64]) -> bool {
        let Some(satisfied) = self.satisfied_steps.get(&group_key) else {
            return pre_keys.is_empty();
        };
        pre_keys.iter().all(|k| satisfied.contains(k))
    }

    pub fn record_step(&mut self, group_key: i64, step_key: i64) {
        self.satisfied_steps
            .entry(group_key)
            .or_default()
            .insert(step_key);
    }

    #[cfg(test)]
    fn element_entries(&self) -> usize {
        self.element_history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_throttle_sliding_window() {
        let mut tracker = TriggerTracker::new();
        // maxTriggers=2, cooldown=5000: two triggers pass, the third is held.
        assert!(tracker.can_trigger_rule(1, 0, 5000, 2));
        tracker.record_rule_trigger(1, 0);
        assert!(tracker.can_trigger_rule(1, 1000, 5000, 2));
        tracker.record_rule_trigger(1, 1000);
        assert!(!tracker.can_trigger_rule(1, 2000, 5000, 2));
        // First trigger ages out of the window at t=5001.
        assert!(tracker.can_trigger_rule(1, 5001, 5000, 2));
    }

    #[test]
    fn rule_throttle_isolated_per_rule() {
        let mut tracker = TriggerTracker::new();
        tracker.record_rule_trigger(1, 0);
        tracker.record_rule_trigger(1, 0);
        assert!(!tracker.can_trigger_rule(1, 100, 5000, 2));
        assert!(tracker.can_trigger_rule(2, 100, 5000, 2));
    }

    #[test]
    fn element_cooldown() {
        let mut tracker = TriggerTracker::new();
        assert!(tracker.can_trigger_element(1, "fp", 0, 5000));
        tracker.record_element_trigger(1, "fp", 0);
        assert!(!tracker.can_trigger_element(1, "fp", 5000, 5000));
        assert!(tracker.can_trigger_element(1, "fp", 5001, 5000));
        // A different rule or fingerprint is unaffected.
        assert!(tracker.can_trigger_element(2, "fp", 100, 5000));
        assert!(tracker.can_trigger_element(1, "other", 100, 5000));
    }

    #[test]
    fn element_history_pruned_past_soft_cap() {
        let mut tracker = TriggerTracker::new();
        for i in 0..=ELEMENT_HISTORY_SOFT_CAP as i64 {
            tracker.record_element_trigger(i, "fp", 0);
        }
        assert!(tracker.element_entries() > ELEMENT_HISTORY_SOFT_CAP);
        // The next record at t > max age prunes everything stale.
        tracker.record_element_trigger(-1, "fp", ELEMENT_HISTORY_MAX_AGE_MS + 1);
        assert_eq!(tracker.element_entries(), 1);
    }

    #[test]
    fn sequence_satisfied_vacuous_without_pre_keys() {
        let tracker = TriggerTracker::new();
        assert!(tracker.sequence_satisfied(7, &[]));
        assert!(!tracker.sequence_satisfied(7, &[1]));
    }

    #[test]
    fn sequence_steps_accumulate_per_group() {
        let mut tracker = TriggerTracker::new();
        tracker.reset_if_context_changed("com.x", "Main");
        tracker.record_step(7, 1);
        assert!(tracker.sequence_satisfied(7, &[1]));
        assert!(!tracker.sequence_satisfied(7, &[1, 2]));
        // Another group does not see this step.
        assert!(!tracker.sequence_satisfied(8, &[1]));
        tracker.record_step(7, 2);
        assert!(tracker.sequence_satisfied(7, &[1, 2]));
    }

    #[test]
    fn context_change_rearms_sequences() {
        let mut tracker = TriggerTracker::new();
        tracker.reset_if_context_changed("com.x", "Main");
        tracker.record_step(7, 1);
        assert!(tracker.sequence_satisfied(7, &[1]));

        // Same context: state survives.
        tracker.reset_if_context_changed("com.x", "Main");
        assert!(tracker.sequence_satisfied(7, &[1]));

        // Activity change clears every group.
        tracker.reset_if_context_changed("com.x", "Detail");
        assert!(!tracker.sequence_satisfied(7, &[1]));

        tracker.record_step(7, 1);
        // Package change clears as well.
        tracker.reset_if_context_changed("com.y", "Detail");
        assert!(!tracker.sequence_satisfied(7, &[1]));
    }
}
