//! Error types for emitter operations.

use thiserror::Error;

/// Boxed error returned by a failing handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while registering or dispatching listeners.
#[derive(Error, Debug)]
pub enum EmitterError {
    /// A listener was attached without a handler.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A pattern key failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A handler failed during dispatch; remaining listeners were skipped.
    #[error(transparent)]
    Handler(#[from] BoxError),
}

/// Result type alias for emitter operations.
pub type Result<T> = std::result::Result<T, EmitterError>;
