//! Error types for gateway-snapshot.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("decode error: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
