//! RBAC-with-resource-roles engine (C5).

pub mod engine;
pub mod error;

pub use engine::{Action, Object, ObjectClass, RbacEngine, Role, Subject, ADMIN_ROLE};
pub use error::{RbacError, Result};
