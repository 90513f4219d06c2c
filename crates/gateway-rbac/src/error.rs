//! Error types for gateway-rbac.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RbacError {
    #[error("cannot delete the last remaining admin: {0}")]
    LastAdmin(String),

    #[error("policy file error: {0}")]
    PolicyFile(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, RbacError>;
