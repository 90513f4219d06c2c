//! Error types for gateway-storage.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("username or password cannot be empty")]
    EmptyCredential,

    #[error("password policy violation: {0}")]
    PasswordPolicy(String),

    #[error("username already exists")]
    UsernameExists,

    #[error("username does not exist")]
    UsernameNotFound,

    #[error("old password incorrect")]
    OldPasswordIncorrect,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
