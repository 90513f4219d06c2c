//! Error types for gateway-rules.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("rule set document invalid: {0}")]
    DocumentInvalid(String),
}

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("no matching mapping rule set for impact {0:?}")]
    NoMatchingRuleSet(String),

    #[error("failed to persist mapped request: {0}")]
    PersistFailed(#[from] gateway_storage::StorageError),

    #[error("rule set document invalid: {0}")]
    DocumentInvalid(String),
}

#[derive(Error, Debug)]
pub enum AcceptanceError {
    #[error("acceptance document invalid: {0}")]
    DocumentInvalid(String),
}
