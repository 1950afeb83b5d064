//! Structured error types with stable codes
//!
//! One enum for the whole crate. Backend failures stay internal to the engine
//! (they trigger the fallback switch, never the caller); `NotFound` is the one
//! error deliberately surfaced from feedback and lookup paths.

use std::fmt;

/// Crate error types with proper categorization
#[derive(Debug)]
pub enum MemoryError {
    /// A record id referenced by the caller does not exist in the active
    /// backend. Propagated: feedback on an unknown id is a caller bug.
    NotFound(String),

    /// The similarity index failed or cannot be reached. Handled inside the
    /// engine by the permanent fallback switch; callers never see it.
    BackendUnavailable { backend: String, reason: String },

    /// Caller-supplied input was rejected before touching any backend.
    InvalidInput { field: String, reason: String },

    /// The text-generation backend failed or returned an unusable response.
    Llm(String),

    /// Encoding or decoding records failed.
    Serialization(String),

    /// Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl MemoryError {
    /// Machine-readable code for logs and client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::Llm(_) => "LLM_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Detailed human-readable message
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(id) => format!("Record not found: {id}"),
            Self::BackendUnavailable { backend, reason } => {
                format!("Backend '{backend}' unavailable: {reason}")
            }
            Self::InvalidInput { field, reason } => {
                format!("Invalid input for field '{field}': {reason}")
            }
            Self::Llm(msg) => format!("Generation backend error: {msg}"),
            Self::Serialization(msg) => format!("Serialization error: {msg}"),
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }

    /// True for the one error variant the engine must propagate unchanged.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for MemoryError {}

impl From<anyhow::Error> for MemoryError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Type alias for Results using MemoryError
pub type Result<T> = std::result::Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(MemoryError::NotFound("abc".to_string()).code(), "NOT_FOUND");
        assert_eq!(
            MemoryError::BackendUnavailable {
                backend: "vector-http".to_string(),
                reason: "connection refused".to_string(),
            }
            .code(),
            "BACKEND_UNAVAILABLE"
        );
        assert_eq!(MemoryError::Llm("timeout".to_string()).code(), "LLM_ERROR");
    }

    #[test]
    fn test_message_contains_context() {
        let err = MemoryError::NotFound("1234".to_string());
        assert!(err.message().contains("1234"));

        let err = MemoryError::InvalidInput {
            field: "message".to_string(),
            reason: "empty".to_string(),
        };
        assert!(err.message().contains("message"));
        assert!(err.message().contains("empty"));
    }

    #[test]
    fn test_not_found_predicate() {
        assert!(MemoryError::NotFound("x".to_string()).is_not_found());
        assert!(!MemoryError::Llm("x".to_string()).is_not_found());
    }

    #[test]
    fn test_from_anyhow() {
        let err: MemoryError = anyhow::anyhow!("boom").into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(err.to_string().contains("boom"));
    }
}
