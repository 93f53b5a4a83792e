mod condition;
mod config;
mod node;
mod rule;
mod selector;

pub use condition::{property_value, Condition, ConditionTree, PropertyOp};
pub use config::{Clock, ConfigSource, EngineConfig, SystemClock};
pub use node::{Bounds, TreeProvider, UiNode};
pub use rule::Rule;
pub use selector::{Relationship, Selector, Unit};
