//! Error types shared by every gateway crate.

use thiserror::Error;

/// Fatal errors that warrant process exit, per the error-handling design.
///
/// Every other kind of failure (connection loss, read failure, rule
/// rejection) is swallowed at its origin and surfaced as part of the
/// normal data path (a sentinel snapshot value, a feedback record, a
/// structured API response) rather than as an `Err`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fatal: {0}")]
    Fatal(String),
}

/// Result type alias for gateway-core.
pub type Result<T> = std::result::Result<T, CoreError>;
