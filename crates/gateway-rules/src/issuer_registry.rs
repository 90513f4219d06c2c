//! Issuer registry (supplemented feature): time-bounded issuer
//! validity, grounded on
//! `original_source/intermediate-vor-partition/issuer_registry/issuer_registry.py`.
//!
//! The original never actually calls `validate_issuer` from the live
//! request path (see the commented-out call in
//! `request_verification.py`), so this registry is optional: requests
//! flow through the pipeline whether or not one is configured.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Issuer {
    pub credentials: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub characteristics: Option<String>,
}

impl Issuer {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }
}

#[derive(Debug, Clone, Default)]
pub struct IssuerRegistry {
    issuers: HashMap<String, Issuer>,
}

impl IssuerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issuer(&mut self, issuer_id: impl Into<String>, issuer: Issuer) {
        self.issuers.insert(issuer_id.into(), issuer);
    }

    /// Existence, credential equality, and time-window validity, in
    /// that order, matching the original's `validate_issuer`.
    pub fn validate(&self, issuer_id: &str, credentials: &str, now: DateTime<Utc>) -> bool {
        let Some(issuer) = self.issuers.get(issuer_id) else {
            return false;
        };
        if issuer.credentials != credentials {
            return false;
        }
        issuer.is_valid_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn issuer(now: DateTime<Utc>) -> Issuer {
        Issuer {
            credentials: "cert-123".to_string(),
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            characteristics: None,
        }
    }

    #[test]
    fn unknown_issuer_fails() {
        let registry = IssuerRegistry::new();
        assert!(!registry.validate("plc-07", "cert-123", Utc::now()));
    }

    #[test]
    fn wrong_credentials_fail() {
        let mut registry = IssuerRegistry::new();
        registry.add_issuer("plc-07", issuer(Utc::now()));
        assert!(!registry.validate("plc-07", "wrong-cert", Utc::now()));
    }

    #[test]
    fn expired_issuer_fails() {
        let now = Utc::now();
        let mut registry = IssuerRegistry::new();
        registry.add_issuer("plc-07", issuer(now));
        assert!(!registry.validate("plc-07", "cert-123", now + Duration::days(2)));
    }

    #[test]
    fn valid_issuer_within_window_passes() {
        let now = Utc::now();
        let mut registry = IssuerRegistry::new();
        registry.add_issuer("plc-07", issuer(now));
        assert!(registry.validate("plc-07", "cert-123", now));
    }
}
