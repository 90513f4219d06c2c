//! The request type and its modification-expression parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Maximum admissible priority (inclusive), matching the data model's
/// `priority ∈ [0,31]`.
pub const MAX_PRIORITY: u8 = 31;

/// A parsed modification expression: either an absolute literal or a
/// `<number>%` relative expression.
///
/// Parsed once at construction rather than re-parsed at every pipeline
/// stage; the wire representation (free text, `%`-suffixed for
/// relative) is unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Modification {
    Absolute(String),
    Relative(String),
}

impl Modification {
    pub fn parse(raw: &str) -> Self {
        if raw.trim_end().ends_with('%') {
            Modification::Relative(raw.to_string())
        } else {
            Modification::Absolute(raw.to_string())
        }
    }

    /// The original free-text expression, unwrapped.
    pub fn as_str(&self) -> &str {
        match self {
            Modification::Absolute(s) => s,
            Modification::Relative(s) => s,
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, Modification::Relative(_))
    }
}

/// A change request admitted into the pipeline. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub request_id: Uuid,
    pub issuer_id: String,
    pub timestamp: DateTime<Utc>,
    pub descriptions: Vec<String>,
    pub impact: String,
    pub parameter: String,
    pub modification: Modification,
    pub priority: u8,
}

impl Request {
    /// Construct a new request, server-assigning its id and timestamp.
    /// Rejects priorities outside `[0, 31]`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        issuer_id: impl Into<String>,
        now: DateTime<Utc>,
        descriptions: Vec<String>,
        impact: impl Into<String>,
        parameter: impl Into<String>,
        modification: impl AsRef<str>,
        priority: u8,
    ) -> Result<Self> {
        if priority > MAX_PRIORITY {
            return Err(CoreError::ConfigInvalid(format!(
                "priority {priority} outside [0,{MAX_PRIORITY}]"
            )));
        }
        if descriptions.is_empty() {
            return Err(CoreError::ConfigInvalid(
                "request must carry at least one description".to_string(),
            ));
        }
        Ok(Self {
            request_id: Uuid::new_v4(),
            issuer_id: issuer_id.into(),
            timestamp: now,
            descriptions,
            impact: impact.into(),
            parameter: parameter.into(),
            modification: Modification::parse(modification.as_ref()),
            priority,
        })
    }
}

/// Ordering key used by the request queue and the mapped-request store:
/// `(priority, timestamp)` ascending, ties broken FIFO by the caller.
impl Request {
    pub fn ordering_key(&self) -> (u8, DateTime<Utc>) {
        (self.priority, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modification_classifies_relative_vs_absolute() {
        assert_eq!(Modification::parse("900"), Modification::Absolute("900".to_string()));
        assert_eq!(Modification::parse("5%"), Modification::Relative("5%".to_string()));
    }

    #[test]
    fn new_rejects_out_of_range_priority() {
        let result = Request::new(
            "john",
            Utc::now(),
            vec!["bump".to_string()],
            "impact",
            "MotorSpeed_SP",
            "900",
            32,
        );
        assert!(result.is_err());
    }
}
