//! Request mapper (C8): translates a verified request into concrete
//! endpoint effects and persists it for the control-plane bridge to pull.
//!
//! Grounded on
//! `original_source/gateway-komponenten/intermediate-vor-partition/mapping_verification/mapping_verification.py`'s
//! `map_requests`.

use chrono::{DateTime, Utc};
use gateway_core::feedback::{FeedbackRecord, Stage};
use gateway_core::Request;
use gateway_storage::mapped_requests::{AffectedEndpoint, ChangeType, MappedRequest, MappedRequestStore};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::MappingError;

#[derive(Debug, Deserialize)]
struct MappingRuleXml {
    #[serde(rename = "@id")]
    #[allow(dead_code)]
    id: String,
    #[serde(rename = "TriggerCondition")]
    #[allow(dead_code)]
    trigger_condition: Option<String>,
    #[serde(rename = "ChangeDescription")]
    #[allow(dead_code)]
    change_description: Option<String>,
    #[serde(rename = "EndpointIdentifier")]
    endpoint_identifier: String,
    #[serde(rename = "UnitOfChange")]
    unit_of_change: String,
    #[serde(rename = "MappingVerificationConstraint")]
    mapping_verification_constraint: String,
}

#[derive(Debug, Deserialize)]
struct MappingRuleSetXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "Rule", default)]
    rules: Vec<MappingRuleXml>,
}

#[derive(Debug, Deserialize)]
struct MappingRuleSetsXml {
    #[serde(rename = "MappingRuleSet", default)]
    rule_sets: Vec<MappingRuleSetXml>,
}

/// One mapping rule: an endpoint identifier and the unit/constraint
/// the mapped value must satisfy later, at acceptance.
#[derive(Debug, Clone)]
pub struct MappingRule {
    pub endpoint_identifier: String,
    pub unit_of_change: String,
    pub mapping_verification_constraint: String,
}

/// Mapping rule sets keyed by impact name, matching the original's
/// `self.rulesets[ruleset.get('name')]`.
#[derive(Debug, Clone, Default)]
pub struct MappingRuleSets {
    by_impact: HashMap<String, Vec<MappingRule>>,
}

impl MappingRuleSets {
    pub fn from_xml_str(xml: &str) -> std::result::Result<Self, MappingError> {
        let parsed: MappingRuleSetsXml =
            quick_xml::de::from_str(xml).map_err(|e| MappingError::DocumentInvalid(e.to_string()))?;
        let mut by_impact = HashMap::new();
        for rule_set in parsed.rule_sets {
            let rules = rule_set
                .rules
                .into_iter()
                .map(|r| MappingRule {
                    endpoint_identifier: r.endpoint_identifier,
                    unit_of_change: r.unit_of_change,
                    mapping_verification_constraint: r.mapping_verification_constraint,
                })
                .collect();
            by_impact.insert(rule_set.name, rules);
        }
        Ok(Self { by_impact })
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::result::Result<Self, MappingError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MappingError::DocumentInvalid(e.to_string()))?;
        Self::from_xml_str(&contents)
    }

    fn for_impact(&self, impact: &str) -> Option<&[MappingRule]> {
        self.by_impact.get(impact).map(|v| v.as_slice())
    }
}

pub const RESULT_MAPPING_COMPLETED: &str = "Mapping completed";
pub const RESULT_NO_MATCHING_RULE_SET: &str = "Mapping failed: no matching mapping rule set for this request";
pub const RESULT_SAVE_FAILED: &str = "Failed to save";

/// Maps a verified request to its affected endpoints and persists the
/// result for the control-plane bridge.
pub struct RequestMapper {
    rule_sets: MappingRuleSets,
    store: MappedRequestStore,
}

impl RequestMapper {
    pub fn new(rule_sets: MappingRuleSets, store: MappedRequestStore) -> Self {
        Self { rule_sets, store }
    }

    pub fn map_request(&self, request: &Request, now: DateTime<Utc>) -> FeedbackRecord {
        let Some(rules) = self.rule_sets.for_impact(&request.impact) else {
            return FeedbackRecord::new(
                Stage::Mapping,
                Some(request.request_id),
                Some(request.issuer_id.clone()),
                RESULT_NO_MATCHING_RULE_SET,
                format!("No matching mapping rule set for impact {:?}", request.impact),
                now,
            );
        };

        let affected_endpoints: Vec<AffectedEndpoint> = rules
            .iter()
            .map(|rule| AffectedEndpoint {
                endpoint_id: format!("{}_{}", rule.endpoint_identifier, request.parameter),
                change_type: ChangeType::from_modification(&request.modification),
                unit: rule.unit_of_change.clone(),
                constraint: rule.mapping_verification_constraint.clone(),
            })
            .collect();

        let mapped = MappedRequest {
            request_id: request.request_id,
            generation_timestamp: request.timestamp,
            description: request.descriptions.join("; "),
            impact: request.impact.clone(),
            priority: request.priority,
            tags: None,
            affected_endpoints,
        };

        match self.store.insert_or_replace(&mapped) {
            Ok(()) => FeedbackRecord::new(
                Stage::Mapping,
                Some(request.request_id),
                Some(request.issuer_id.clone()),
                RESULT_MAPPING_COMPLETED,
                "The mapped request was saved and is ready for the control-plane bridge.",
                now,
            ),
            Err(e) => FeedbackRecord::new(
                Stage::Mapping,
                Some(request.request_id),
                Some(request.issuer_id.clone()),
                RESULT_SAVE_FAILED,
                e.to_string(),
                now,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPING_XML: &str = r#"
        <MappingRuleSets>
            <MappingRuleSet name="Motor Speed Configuration">
                <Rule id="M1">
                    <TriggerCondition>always</TriggerCondition>
                    <ChangeDescription>set motor speed</ChangeDescription>
                    <EndpointIdentifier>MotorSpeed_SP</EndpointIdentifier>
                    <UnitOfChange>rpm</UnitOfChange>
                    <MappingVerificationConstraint>== 900</MappingVerificationConstraint>
                </Rule>
            </MappingRuleSet>
        </MappingRuleSets>
    "#;

    fn store() -> (tempfile::TempDir, MappedRequestStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MappedRequestStore::open(dir.path().join("mapped.sqlite3"), 2).unwrap();
        (dir, store)
    }

    fn request(impact: &str) -> Request {
        Request::new("john", Utc::now(), vec!["bump motor speed".to_string()], impact, "MotorSpeed_SP", "900", 5)
            .unwrap()
    }

    #[test]
    fn known_impact_maps_and_persists() {
        let (_dir, store) = store();
        let rule_sets = MappingRuleSets::from_xml_str(MAPPING_XML).unwrap();
        let mapper = RequestMapper::new(rule_sets, store);

        let feedback = mapper.map_request(&request("Motor Speed Configuration"), Utc::now());
        assert_eq!(feedback.result, RESULT_MAPPING_COMPLETED);

        let pulled = mapper.store.pull_highest().unwrap().unwrap();
        assert_eq!(pulled.affected_endpoints.len(), 1);
        assert_eq!(pulled.affected_endpoints[0].endpoint_id, "MotorSpeed_SP_MotorSpeed_SP");
    }

    #[test]
    fn unknown_impact_fails_without_persisting() {
        let (_dir, store) = store();
        let rule_sets = MappingRuleSets::from_xml_str(MAPPING_XML).unwrap();
        let mapper = RequestMapper::new(rule_sets, store);

        let feedback = mapper.map_request(&request("Unmapped Impact"), Utc::now());
        assert_eq!(feedback.result, RESULT_NO_MATCHING_RULE_SET);
        assert!(mapper.store.pull_highest().unwrap().is_none());
    }

    #[test]
    fn relative_modification_recorded_as_relative() {
        let (_dir, store) = store();
        let rule_sets = MappingRuleSets::from_xml_str(MAPPING_XML).unwrap();
        let mapper = RequestMapper::new(rule_sets, store);
        let request = Request::new(
            "john",
            Utc::now(),
            vec!["bump".to_string()],
            "Motor Speed Configuration",
            "MotorSpeed_SP",
            "5%",
            5,
        )
        .unwrap();

        mapper.map_request(&request, Utc::now());
        let pulled = mapper.store.pull_highest().unwrap().unwrap();
        assert_eq!(pulled.affected_endpoints[0].change_type, ChangeType::Relative("5%".to_string()));
    }
}
