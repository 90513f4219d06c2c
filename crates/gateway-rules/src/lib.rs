//! Rule-based pipeline stages: request verifier (C7), request mapper
//! (C8), acceptance verifier (C9), and the supplemented issuer
//! registry.

pub mod acceptance;
pub mod error;
pub mod issuer_registry;
pub mod mapping;
pub mod predicate;
pub mod verify;

pub use acceptance::{verify_acceptance, verify_mapping_constraints, AcceptanceOutcome};
pub use error::{AcceptanceError, MappingError, VerifyError};
pub use issuer_registry::{Issuer, IssuerRegistry};
pub use mapping::{MappingRule, MappingRuleSets, RequestMapper};
pub use predicate::Predicate;
pub use verify::{RequestVerifier, Rule, RuleId, RuleSet};
