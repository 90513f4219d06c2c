//! Error types for gateway-drivers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),
}

pub type Result<T> = std::result::Result<T, DriverError>;
