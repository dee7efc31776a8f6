//! Error taxonomy for the search engine.
//!
//! Every fallible entry point returns `Result<T>`. The variant a function
//! returns corresponds to one of the error codes an embedding application
//! would switch on: `Fatal` for irrecoverable index corruption, `System` for
//! OS/I/O failures, `Invalid` for bad arguments (including query syntax
//! errors), `Exists`/`Missing` for duplicate/absent entities, and `Limit`
//! for size or depth limits.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NxsError>;

#[derive(Error, Debug, Clone)]
pub enum NxsError {
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("system error: {0}")]
    System(String),

    #[error("invalid argument: {0}")]
    Invalid(String),

    #[error("syntax error at {line}:{column}: {message} (near \"{snippet}\")")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
        snippet: String,
    },

    #[error("already exists: {0}")]
    Exists(String),

    #[error("missing: {0}")]
    Missing(String),

    #[error("limit exceeded: {0}")]
    Limit(String),
}

impl NxsError {
    /// The short code an embedding application would switch on, mirroring
    /// the `(code, message)` pair returned by `get_error`.
    pub fn code(&self) -> &'static str {
        match self {
            NxsError::Fatal(_) => "FATAL",
            NxsError::System(_) => "SYSTEM",
            NxsError::Invalid(_) => "INVALID",
            NxsError::Syntax { .. } => "INVALID",
            NxsError::Exists(_) => "EXISTS",
            NxsError::Missing(_) => "MISSING",
            NxsError::Limit(_) => "LIMIT",
        }
    }
}

impl From<std::io::Error> for NxsError {
    fn from(err: std::io::Error) -> Self {
        NxsError::System(err.to_string())
    }
}

impl From<bincode::Error> for NxsError {
    fn from(err: bincode::Error) -> Self {
        NxsError::Fatal(format!("serialization: {err}"))
    }
}

impl From<serde_json::Error> for NxsError {
    fn from(err: serde_json::Error) -> Self {
        NxsError::Invalid(format!("json: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_maps_syntax_errors_to_invalid() {
        let err = NxsError::Syntax {
            line: 1,
            column: 3,
            message: "unexpected end of input".into(),
            snippet: "a AND".into(),
        };
        assert_eq!(err.code(), "INVALID");
        assert!(err.to_string().contains("1:3"));
    }
}
