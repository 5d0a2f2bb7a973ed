//! The kinds of failure which abort a selection case.
use thiserror::Error;

/// An error which is fatal to the case in which it occurs.
///
/// These are raised through [`anyhow`], so that context can be attached as they propagate. Use
/// [`selection_error`] to recover the kind from an [`anyhow::Error`].
#[derive(Debug, Error, PartialEq, Clone)]
pub enum SelectionError {
    /// An invalid, conflicting or missing parameter
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Hazard data missing or unparsable for the requested keys
    #[error("Input data error: {0}")]
    InputData(String),
    /// Not enough recordings to complete a selection
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

/// Find the [`SelectionError`] responsible for `err`, if there is one.
pub fn selection_error(err: &anyhow::Error) -> Option<&SelectionError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<SelectionError>())
}
