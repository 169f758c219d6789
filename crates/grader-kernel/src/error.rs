//! Error types for the grader
//!
//! Case-level faults are grading outcomes and never appear here; see
//! [`crate::FailureKind`]. These errors stop a run.

use std::path::PathBuf;

/// Errors loading or saving a test store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error reading or writing a store file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store file is not valid JSON for the expected shape
    #[error("invalid store {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A test or case breaks a store invariant
    #[error("malformed test '{test}': {message}")]
    Malformed { test: String, message: String },
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create JSON error for path
    pub fn json_error(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Create malformed-test error
    pub fn malformed(test: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            test: test.into(),
            message: message.into(),
        }
    }
}

/// Fatal grader errors
#[derive(Debug, thiserror::Error)]
pub enum GraderError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The grader itself could not carry on (bad store shape at run time,
    /// failed environment imports)
    #[error("orchestration error: {0}")]
    Orchestration(String),

    #[error("Test {0} does not exist")]
    UnknownTest(String),

    #[error("locked store has no hash key")]
    MissingHashKey,

    #[error("digest error: {0}")]
    Digest(String),
}

impl GraderError {
    /// Create orchestration error
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration(message.into())
    }
}

/// Result alias for grader operations
pub type GraderResult<T> = Result<T, GraderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_test_message_names_the_test() {
        let err = GraderError::UnknownTest("q9".into());
        assert_eq!(err.to_string(), "Test q9 does not exist");
    }

    #[test]
    fn store_errors_convert() {
        let err: GraderError = StoreError::malformed("q1", "2 steps but 1 outputs").into();
        assert!(matches!(err, GraderError::Store(StoreError::Malformed { .. })));
        assert_eq!(err.to_string(), "malformed test 'q1': 2 steps but 1 outputs");
    }
}
