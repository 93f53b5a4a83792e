//! Rule-driven auto-click engine for accessibility UI trees.
//!
//! A selector DSL is compiled into unit chains ([`compile`]), evaluated
//! against a live tree ([`find`]), and orchestrated by a [`RuleEngine`] that
//! layers throttling, multi-stage sequences, exclusion selectors, and the
//! click action on top. Subscription documents in a lenient JSON5-ish format
//! compile into rule lists ([`parse_subscription`]).
//!
//! The crate talks to the host platform only through the [`TreeProvider`] and
//! [`UiNode`] traits, so the whole pipeline is testable against synthetic
//! trees.

mod cache;
mod engine;
mod error;
mod matcher;
mod parse;
mod subscribe;
mod throttle;
mod types;

pub use cache::SelectorCache;
pub use engine::{node_fingerprint, RuleEngine};
pub use error::AutotapError;
pub use matcher::{find, find_by_bounds, find_by_text, find_by_view_id};
pub use parse::{compile, SelectorError};
pub use subscribe::{
    import_subscription, normalize_json5, parse_subscription, stable_group_key, Fetch, FetchError,
    SubscriptionError,
};
pub use throttle::TriggerTracker;
pub use types::{
    property_value, Bounds, Clock, Condition, ConditionTree, ConfigSource, EngineConfig,
    PropertyOp, Relationship, Rule, Selector, SystemClock, TreeProvider, UiNode, Unit,
};
