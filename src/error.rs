//! Error types
//!
//! Every fallible operation in the crate returns [`Result`]. The variants
//! follow the three failure classes of the forward engine (shape, range and
//! configuration problems) plus the errors of the collaborators that touch
//! text and files.
//!
//! Nothing is retried internally; errors surface to the immediate caller.

use thiserror::Error;

/// Result type for all puck operations
pub type Result<T> = std::result::Result<T, PuckError>;

/// Errors that can occur while building, running or persisting a model
#[derive(Error, Debug)]
pub enum PuckError {
    /// Array rank or dimensions disagree with the declared model shape
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Token id, sequence length or batch index outside its valid range
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Inconsistent hyperparameters detected at construction time
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A character that the tokenizer vocabulary does not contain
    #[error("Unknown character {0:?} (not in vocabulary)")]
    UnknownCharacter(char),

    /// Malformed or incompatible checkpoint file
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PuckError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        PuckError::ShapeMismatch(msg.into())
    }

    pub(crate) fn range(msg: impl Into<String>) -> Self {
        PuckError::OutOfRange(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        PuckError::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        let err = PuckError::shape("expected [2, 3], got [3, 2]");
        assert_eq!(
            err.to_string(),
            "Shape mismatch: expected [2, 3], got [3, 2]"
        );

        let err = PuckError::UnknownCharacter('*');
        assert!(err.to_string().contains("'*'"));
    }

    #[test]
    fn test_io_error_converts() {
        fn open_missing() -> Result<()> {
            std::fs::File::open("/definitely/not/a/real/path")?;
            Ok(())
        }
        assert!(matches!(open_missing(), Err(PuckError::Io(_))));
    }
}
