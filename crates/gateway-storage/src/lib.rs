//! Credential store (C4) and mapped-request store (C10): the two
//! single-file SQLite-backed stores of the VoR gateway, sharing one
//! thread-bound connection pool implementation.

pub mod credentials;
pub mod error;
pub mod mapped_requests;
pub mod pool;

pub use credentials::{CredentialRecord, CredentialStore, UserDetails};
pub use error::{Result, StorageError};
pub use mapped_requests::{AffectedEndpoint, ChangeType, MappedRequest, MappedRequestStore};
pub use pool::ThreadBoundPool;
