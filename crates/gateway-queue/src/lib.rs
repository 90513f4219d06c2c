//! Request queue (C6): priority-ordered inter-partition hand-off.

pub mod bridge;
pub mod error;
pub mod queue;

pub use bridge::{serve, submit};
pub use error::{QueueError, Result};
pub use queue::{run_consumer, RequestQueue};
