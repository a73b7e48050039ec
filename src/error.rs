//! Error types for the Halberd library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`HalberdError`] enum. Every error is local and synchronous: nothing in the
//! core retries on the caller's behalf.
//!
//! # Examples
//!
//! ```
//! use halberd::error::{HalberdError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(HalberdError::invalid_argument("top_k must be at least 1"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Halberd operations.
#[derive(Error, Debug)]
pub enum HalberdError {
    /// A vector's length disagrees with the collection dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A live record with this id already exists.
    #[error("Duplicate id: {0}")]
    DuplicateId(u64),

    /// No live record with this id.
    #[error("Not found: {0}")]
    NotFound(u64),

    /// Invalid argument or configuration value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Zero vector where the metric cannot handle one (cosine).
    #[error("Degenerate vector: {0}")]
    DegenerateVector(String),

    /// The index was built before the latest insert/delete and the caller
    /// asked for stale reads to be rejected.
    #[error(
        "Stale index: built at generation {built_generation}, collection is at generation {current_generation}"
    )]
    StaleIndex {
        built_generation: u64,
        current_generation: u64,
    },

    /// Operation cancelled
    #[error("Operation cancelled: {0}")]
    OperationCancelled(String),

    /// Failure reported by an embedding collaborator.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Failure reported by an answer-generation collaborator.
    #[error("Generation error: {0}")]
    Generation(String),

    /// I/O errors (config and document files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with HalberdError.
pub type Result<T> = std::result::Result<T, HalberdError>;

impl HalberdError {
    /// Create a new dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        HalberdError::DimensionMismatch { expected, actual }
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        HalberdError::InvalidArgument(msg.into())
    }

    /// Create a new degenerate vector error.
    pub fn degenerate<S: Into<String>>(msg: S) -> Self {
        HalberdError::DegenerateVector(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        HalberdError::OperationCancelled(msg.into())
    }

    /// Create a new embedding error.
    pub fn embedding<S: Into<String>>(msg: S) -> Self {
        HalberdError::Embedding(msg.into())
    }

    /// Create a new generation error.
    pub fn generation<S: Into<String>>(msg: S) -> Self {
        HalberdError::Generation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = HalberdError::dimension_mismatch(4, 3);
        assert_eq!(error.to_string(), "Dimension mismatch: expected 4, got 3");

        let error = HalberdError::DuplicateId(7);
        assert_eq!(error.to_string(), "Duplicate id: 7");

        let error = HalberdError::invalid_argument("top_k must be at least 1");
        assert_eq!(
            error.to_string(),
            "Invalid argument: top_k must be at least 1"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let halberd_error = HalberdError::from(io_error);

        match halberd_error {
            HalberdError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_stale_index_message_names_generations() {
        let error = HalberdError::StaleIndex {
            built_generation: 3,
            current_generation: 5,
        };
        let message = error.to_string();
        assert!(message.contains("generation 3"));
        assert!(message.contains("generation 5"));
    }
}
