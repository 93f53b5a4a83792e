mod error;
mod grammar;

pub use error::SelectorError;

use crate::types::Selector;

/// Compile selector text into an immutable [`Selector`] chain.
///
/// Compilation is pure: identical input always yields a structurally
/// equivalent chain, which is what makes caching by raw string safe.
///
/// # Errors
///
/// Returns [`SelectorError::Malformed`] if the text is empty or does not
/// parse into a unit chain.
pub fn compile(input: &str) -> Result<Selector, SelectorError> {
    use winnow::Parser;
    if input.trim().is_empty() {
        return Err(SelectorError::Malformed("selector is empty".to_owned()));
    }
    grammar::selector
        .parse(input)
        .map_err(|e| SelectorError::Malformed(e.to_string()))
}
