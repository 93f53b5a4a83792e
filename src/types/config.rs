use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Tunable trigger-protocol parameters.
///
/// The engine re-reads these through a [`ConfigSource`] on every event and
/// every matching pass, so an embedder can change them at runtime without
/// rebuilding the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Global master switch. When false no new matching pass starts.
    pub enabled: bool,
    /// Sliding window for per-rule throttling, in milliseconds.
    pub cooldown_ms: u64,
    /// Maximum triggers allowed per rule within one cooldown window.
    pub max_triggers: usize,
    /// Minimum gap between two triggers on the same element fingerprint.
    pub element_cooldown_ms: u64,
    /// Minimum gap between two full tree scans for the same package.
    pub debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_ms: 5000,
            max_triggers: 2,
            element_cooldown_ms: 5000,
            debounce_ms: 400,
        }
    }
}

/// Live configuration access. `load` must reflect the current values on every
/// call; the engine never caches the result across passes.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> EngineConfig;
}

/// A fixed configuration, convenient for tests and simple embedders.
impl ConfigSource for EngineConfig {
    fn load(&self) -> EngineConfig {
        self.clone()
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for Arc<T> {
    fn load(&self) -> EngineConfig {
        (**self).load()
    }
}

/// Monotonic millisecond timestamp source.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// [`Clock`] backed by [`Instant`], anchored at construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.cooldown_ms, 5000);
        assert_eq!(cfg.max_triggers, 2);
        assert_eq!(cfg.element_cooldown_ms, 5000);
        assert_eq!(cfg.debounce_ms, 400);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
