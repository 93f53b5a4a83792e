use thiserror::Error;

/// Errors produced when compiling selector text.
#[derive(Debug, Error)]
pub enum SelectorError {
    /// The text was empty or did not yield a parseable unit chain.
    ///
    /// Callers skip the selector use that produced this; it must never abort
    /// a whole matching pass.
    #[error("malformed selector: {0}")]
    Malformed(String),
}
