//! Error types shared across the render service crates.

/// Top-level error type for render service operations.
#[derive(Debug, thiserror::Error)]
pub enum NevisError {
    /// Caller supplied malformed or missing input.
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// The external engine ran and reported failure.
    ///
    /// `diagnostics` holds the engine's captured error stream. It is meant
    /// for logs only and is deliberately left out of the `Display` output.
    #[error("Processing error: {message}")]
    Processing {
        message: String,
        diagnostics: String,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias using NevisError.
pub type NevisResult<T> = Result<T, NevisError>;

/// Coarse classification used at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Processing,
    Internal,
}

impl NevisError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest {
            message: msg.into(),
        }
    }

    pub fn processing(msg: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self::Processing {
            message: msg.into(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Classify this error for the caller-facing response.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::Processing { .. } => ErrorKind::Processing,
            Self::Internal { .. } | Self::Config { .. } | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Engine diagnostics attached to a processing failure, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Processing { diagnostics, .. } => Some(diagnostics.as_str()),
            _ => None,
        }
    }
}
