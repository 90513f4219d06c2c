//! Request verifier (C7): rule-based plausibility check.
//!
//! Grounded on
//! `original_source/intermediate-vor-partition/request_verification/request_verification.py`.
//! The original's `eval(condition, {"request": request})` is replaced
//! by [`crate::predicate::Predicate`], compiled once when the rule set
//! is loaded.

use chrono::{DateTime, Utc};
use gateway_core::feedback::{FeedbackRecord, Stage};
use gateway_core::Request;
use serde::Deserialize;
use std::path::Path;

use crate::error::VerifyError;
use crate::predicate::Predicate;

pub type RuleId = String;

/// One verification rule: a compiled condition plus the id reported on
/// failure.
#[derive(Debug, Clone)]
pub struct Rule {
    pub rule_id: RuleId,
    pub description: String,
    condition: Predicate,
}

impl Rule {
    /// A rule passes when its condition evaluates to `true`.
    fn passes(&self, request: &Request) -> bool {
        self.condition.evaluate(request)
    }
}

#[derive(Debug, Deserialize)]
struct RuleXml {
    #[serde(rename = "@id")]
    id: String,
    description: String,
    condition: String,
}

#[derive(Debug, Deserialize)]
struct RuleSetXml {
    #[serde(rename = "rule", default)]
    rules: Vec<RuleXml>,
}

/// A loaded, compiled set of verification rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn from_xml_str(xml: &str) -> std::result::Result<Self, VerifyError> {
        let parsed: RuleSetXml =
            quick_xml::de::from_str(xml).map_err(|e| VerifyError::DocumentInvalid(e.to_string()))?;
        let rules = parsed
            .rules
            .into_iter()
            .map(|r| {
                let condition = Predicate::parse(&r.condition)
                    .map_err(|e| VerifyError::DocumentInvalid(e.to_string()))?;
                Ok(Rule {
                    rule_id: r.id,
                    description: r.description,
                    condition,
                })
            })
            .collect::<std::result::Result<Vec<_>, VerifyError>>()?;
        Ok(Self { rules })
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::result::Result<Self, VerifyError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| VerifyError::DocumentInvalid(e.to_string()))?;
        Self::from_xml_str(&contents)
    }

    /// Ids of every rule the request fails; empty means the request passes.
    pub fn validate(&self, request: &Request) -> Vec<RuleId> {
        self.rules
            .iter()
            .filter(|rule| !rule.passes(request))
            .map(|rule| rule.rule_id.clone())
            .collect()
    }
}

pub const RESULT_VERIFIED: &str = "Verified";
pub const RESULT_RULE_FAILURE: &str = "Rule-based verification failure";

/// Evaluates a request against a [`RuleSet`] and produces the
/// verification-stage [`FeedbackRecord`].
pub struct RequestVerifier {
    rule_set: RuleSet,
}

impl RequestVerifier {
    pub fn new(rule_set: RuleSet) -> Self {
        Self { rule_set }
    }

    /// `Some(request)` when verified, `None` when any rule failed —
    /// callers forward the request to mapping only in the `Some` case.
    pub fn process(&self, request: &Request, now: DateTime<Utc>) -> (Option<Request>, FeedbackRecord) {
        let failed_rules = self.rule_set.validate(request);

        if failed_rules.is_empty() {
            let record = FeedbackRecord::new(
                Stage::Verification,
                Some(request.request_id),
                Some(request.issuer_id.clone()),
                RESULT_VERIFIED,
                "The request is plausible and will be forwarded to the mapping step.",
                now,
            );
            (Some(request.clone()), record)
        } else {
            let record = FeedbackRecord::new(
                Stage::Verification,
                Some(request.request_id),
                Some(request.issuer_id.clone()),
                RESULT_RULE_FAILURE,
                format!(
                    "A specific rule has disapproved the request based on its contents. Failed rules: {failed_rules:?}"
                ),
                now,
            );
            (None, record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request(priority: u8, impact: &str) -> Request {
        Request::new("john", Utc::now(), vec!["bump".to_string()], impact, "MotorSpeed_SP", "900", priority).unwrap()
    }

    #[test]
    fn passing_request_is_verified() {
        let xml = r#"
            <RuleSet>
                <rule id="R1">
                    <description>priority must be low enough</description>
                    <condition>request.priority &lt;= 10</condition>
                </rule>
            </RuleSet>
        "#;
        let rule_set = RuleSet::from_xml_str(xml).unwrap();
        let verifier = RequestVerifier::new(rule_set);
        let (verified, feedback) = verifier.process(&sample_request(5, "Motor Speed Configuration"), Utc::now());
        assert!(verified.is_some());
        assert_eq!(feedback.result, RESULT_VERIFIED);
    }

    #[test]
    fn failing_rule_reports_its_id() {
        let xml = r#"
            <RuleSet>
                <rule id="R1">
                    <description>priority must be low enough</description>
                    <condition>request.priority &lt;= 1</condition>
                </rule>
            </RuleSet>
        "#;
        let rule_set = RuleSet::from_xml_str(xml).unwrap();
        let verifier = RequestVerifier::new(rule_set);
        let (verified, feedback) = verifier.process(&sample_request(5, "Motor Speed Configuration"), Utc::now());
        assert!(verified.is_none());
        assert_eq!(feedback.result, RESULT_RULE_FAILURE);
        assert!(feedback.info.contains("R1"));
    }

    #[test]
    fn empty_rule_set_always_passes() {
        let rule_set = RuleSet::from_xml_str("<RuleSet></RuleSet>").unwrap();
        let verifier = RequestVerifier::new(rule_set);
        let (verified, _) = verifier.process(&sample_request(30, "anything"), Utc::now());
        assert!(verified.is_some());
    }
}
