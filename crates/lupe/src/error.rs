//! Error types for lupe.
//!
//! All fallible operations return [`Result`] with [`LupeError`]. System errors
//! (`Io`) bubble up unchanged; application errors are wrapped with context.
//! Nothing in the core is fatal to the process: resolution failures surface as
//! an `Unsupported` outcome, extraction failures degrade into error-shaped
//! metadata records, and cache failures are downgraded to logged warnings by
//! the callers that can tolerate them.

use thiserror::Error;

/// Result type alias using `LupeError`.
pub type Result<T> = std::result::Result<T, LupeError>;

/// Main error type for all lupe operations.
#[derive(Debug, Error)]
pub enum LupeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing error: {message}")]
    Parsing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Inspector error in '{inspector}': {message}")]
    Inspector { message: String, inspector: String },

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Task '{0}' was cancelled before it produced a result")]
    TaskCancelled(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for LupeError {
    fn from(err: serde_json::Error) -> Self {
        LupeError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl LupeError {
    /// Create a Parsing error.
    pub fn parsing<S: Into<String>>(message: S) -> Self {
        Self::Parsing {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Parsing error with source.
    pub fn parsing_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parsing {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a Validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Cache error.
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Serialization error.
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
            source: None,
        }
    }

    /// Create an Inspector error attributed to a named inspector.
    pub fn inspector<S: Into<String>, N: Into<String>>(inspector: N, message: S) -> Self {
        Self::Inspector {
            message: message.into(),
            inspector: inspector.into(),
        }
    }
}
