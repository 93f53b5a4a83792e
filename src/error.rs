use thiserror::Error;

use crate::parse::SelectorError;
use crate::subscribe::SubscriptionError;

/// Unified error type covering selector compilation and subscription import.
///
/// Matching itself never fails; absence of a match is expressed as `None`
/// throughout the crate.
#[derive(Debug, Error)]
pub enum AutotapError {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}
