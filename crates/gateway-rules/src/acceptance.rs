//! Acceptance verifier (C9): the two control-plane-bridge sub-checks
//! performed once the bridge echoes back a filled acceptance ruleset.
//!
//! Grounded on
//! `original_source/gateway-komponenten/intermediate-vor-partition-cpc/main.py`'s
//! `acceptance_verification` (depth-first `current_value`/`required_value`
//! comparison) and `mapping_verification` (effective-value constraint
//! check). Both are pure functions over the bridge's XML response —
//! no transport here, see `gateway-vor` for the bridge client.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

use crate::error::AcceptanceError;
use gateway_storage::mapped_requests::{AffectedEndpoint, ChangeType};

/// Result of the depth-first acceptance walk.
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptanceOutcome {
    Accepted,
    Rejected { key: String, technical_system: Option<String> },
}

impl AcceptanceOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self, AcceptanceOutcome::Accepted)
    }
}

struct Frame {
    path: Vec<String>,
    current: Option<String>,
    required: Option<String>,
    technical_system: Option<String>,
}

/// Depth-first walk of the filled acceptance-ruleset XML: any element
/// with sibling `current_value`/`required_value` text children is
/// compared as strings. First mismatch aborts the walk.
pub fn verify_acceptance(xml: &str) -> Result<AcceptanceOutcome, AcceptanceError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Frame> = vec![Frame {
        path: Vec::new(),
        current: None,
        required: None,
        technical_system: None,
    }];
    let mut capturing: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "current_value" || name == "required_value" {
                    capturing = Some(name);
                } else {
                    let parent = stack.last().expect("root frame always present");
                    let mut path = parent.path.clone();
                    path.push(name.clone());
                    let technical_system = if name == "technical_system" {
                        e.attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"id")
                            .map(|a| String::from_utf8_lossy(a.value.as_ref()).into_owned())
                    } else {
                        parent.technical_system.clone()
                    };
                    stack.push(Frame { path, current: None, required: None, technical_system });
                }
            }
            // A self-closing element has no text children, so it can never
            // carry a current_value/required_value pair; nothing to compare.
            Ok(Event::Empty(_)) => {}
            Ok(Event::Text(t)) => {
                if let Some(tag) = &capturing {
                    let text = t.unescape().unwrap_or_default().trim().to_string();
                    let frame = stack.last_mut().expect("root frame always present");
                    if tag == "current_value" {
                        frame.current = Some(text);
                    } else {
                        frame.required = Some(text);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "current_value" || name == "required_value" {
                    capturing = None;
                } else {
                    let frame = stack.pop().expect("push/pop balanced by well-formed XML");
                    if let (Some(current), Some(required)) = (&frame.current, &frame.required) {
                        if current != required {
                            let key = frame.path.last().cloned().unwrap_or_default();
                            return Ok(AcceptanceOutcome::Rejected {
                                key,
                                technical_system: frame.technical_system,
                            });
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => return Err(AcceptanceError::DocumentInvalid(e.to_string())),
        }
        buf.clear();
    }

    Ok(AcceptanceOutcome::Accepted)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConstraintOp {
    Eq,
    Le,
    Ge,
    Lt,
    Gt,
}

/// Matches the original's `'==' in condition elif '<=' ... elif '>=' ...
/// elif '<' ... elif '>'` chain: checked in this literal order so `<=`
/// and `>=` are never mistaken for the single-character fallback.
fn parse_constraint(condition: &str) -> Result<(ConstraintOp, f64), AcceptanceError> {
    let try_split = |pattern: &str| condition.split(pattern).nth(1).map(str::trim);

    if let Some(rhs) = try_split("==") {
        return Ok((ConstraintOp::Eq, parse_num(rhs)?));
    }
    if let Some(rhs) = try_split("<=") {
        return Ok((ConstraintOp::Le, parse_num(rhs)?));
    }
    if let Some(rhs) = try_split(">=") {
        return Ok((ConstraintOp::Ge, parse_num(rhs)?));
    }
    if let Some(rhs) = try_split("<") {
        return Ok((ConstraintOp::Lt, parse_num(rhs)?));
    }
    if let Some(rhs) = try_split(">") {
        return Ok((ConstraintOp::Gt, parse_num(rhs)?));
    }
    Err(AcceptanceError::DocumentInvalid(format!("unrecognized constraint operator in {condition:?}")))
}

fn parse_num(raw: &str) -> Result<f64, AcceptanceError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| AcceptanceError::DocumentInvalid(format!("invalid numeric constraint value {raw:?}")))
}

fn satisfies(op: ConstraintOp, process_value: f64, check_value: f64) -> bool {
    match op {
        ConstraintOp::Eq => process_value == check_value,
        ConstraintOp::Le => process_value <= check_value,
        ConstraintOp::Ge => process_value >= check_value,
        ConstraintOp::Lt => process_value < check_value,
        ConstraintOp::Gt => process_value > check_value,
    }
}

/// Extract the live `<affected_endpoint><name/><value/></affected_endpoint>`
/// pairs the bridge echoed back.
fn parse_live_values(xml: &str) -> Result<HashMap<String, f64>, AcceptanceError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut values = HashMap::new();

    let mut current_name: Option<String> = None;
    let mut current_value: Option<f64> = None;
    let mut capturing: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "name" => capturing = Some("name"),
                    "value" => capturing = Some("value"),
                    "affected_endpoint" => {
                        current_name = None;
                        current_value = None;
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().unwrap_or_default().trim().to_string();
                match capturing {
                    Some("name") => current_name = Some(text),
                    Some("value") => current_value = parse_num(&text).ok(),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "affected_endpoint" {
                    if let (Some(n), Some(v)) = (current_name.take(), current_value.take()) {
                        values.insert(n, v);
                    }
                } else {
                    capturing = None;
                }
            }
            Ok(_) => {}
            Err(e) => return Err(AcceptanceError::DocumentInvalid(e.to_string())),
        }
        buf.clear();
    }
    Ok(values)
}

/// Second sub-check: only meaningful once acceptance has passed
/// (Property 8, acceptance monotonicity). Evaluates the effective
/// value of every affected endpoint against its mapping-verification
/// constraint; the first violation fails the whole set.
pub fn verify_mapping_constraints(
    affected_endpoints: &[AffectedEndpoint],
    filled_xml: &str,
) -> Result<bool, AcceptanceError> {
    let live_values = parse_live_values(filled_xml)?;

    for endpoint in affected_endpoints {
        let Some(&value) = live_values.get(&endpoint.endpoint_id) else {
            continue;
        };

        let process_value = match &endpoint.change_type {
            ChangeType::Relative(expr) => {
                let percent = parse_num(expr.trim_end_matches('%'))?;
                value * (1.0 + percent / 100.0)
            }
            ChangeType::Absolute(expr) => parse_num(expr)?,
        };

        let (op, check_value) = parse_constraint(&endpoint.constraint)?;
        if !satisfies(op, process_value, check_value) {
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_values_are_accepted() {
        let xml = r#"
            <AcceptanceRuleset>
                <technical_system id="TS-1">
                    <current_value>online</current_value>
                    <required_value>online</required_value>
                </technical_system>
            </AcceptanceRuleset>
        "#;
        assert_eq!(verify_acceptance(xml).unwrap(), AcceptanceOutcome::Accepted);
    }

    #[test]
    fn mismatch_reports_key_and_enclosing_technical_system() {
        let xml = r#"
            <AcceptanceRuleset>
                <technical_system id="TS-1">
                    <power_state>
                        <current_value>off</current_value>
                        <required_value>on</required_value>
                    </power_state>
                </technical_system>
            </AcceptanceRuleset>
        "#;
        let outcome = verify_acceptance(xml).unwrap();
        assert_eq!(
            outcome,
            AcceptanceOutcome::Rejected {
                key: "power_state".to_string(),
                technical_system: Some("TS-1".to_string()),
            }
        );
    }

    #[test]
    fn mismatch_outside_technical_system_has_no_enclosing_id() {
        let xml = r#"
            <AcceptanceRuleset>
                <gate>
                    <current_value>closed</current_value>
                    <required_value>open</required_value>
                </gate>
            </AcceptanceRuleset>
        "#;
        let outcome = verify_acceptance(xml).unwrap();
        assert_eq!(
            outcome,
            AcceptanceOutcome::Rejected { key: "gate".to_string(), technical_system: None }
        );
    }

    #[test]
    fn absolute_constraint_equality() {
        let endpoints = vec![AffectedEndpoint {
            endpoint_id: "MotorSpeed_SP".to_string(),
            change_type: ChangeType::Absolute("900".to_string()),
            unit: "rpm".to_string(),
            constraint: "== 900".to_string(),
        }];
        let xml = r#"
            <AcceptanceRuleset>
                <affected_endpoints>
                    <affected_endpoint><name>MotorSpeed_SP</name><value>0</value></affected_endpoint>
                </affected_endpoints>
            </AcceptanceRuleset>
        "#;
        assert!(verify_mapping_constraints(&endpoints, xml).unwrap());
    }

    #[test]
    fn relative_constraint_uses_live_value() {
        let endpoints = vec![AffectedEndpoint {
            endpoint_id: "MotorSpeed_SP".to_string(),
            change_type: ChangeType::Relative("10%".to_string()),
            unit: "rpm".to_string(),
            constraint: "<= 1100".to_string(),
        }];
        let xml = r#"
            <AcceptanceRuleset>
                <affected_endpoints>
                    <affected_endpoint><name>MotorSpeed_SP</name><value>1000</value></affected_endpoint>
                </affected_endpoints>
            </AcceptanceRuleset>
        "#;
        // 1000 * 1.10 = 1100, satisfies <= 1100
        assert!(verify_mapping_constraints(&endpoints, xml).unwrap());
    }

    #[test]
    fn violated_constraint_fails() {
        let endpoints = vec![AffectedEndpoint {
            endpoint_id: "MotorSpeed_SP".to_string(),
            change_type: ChangeType::Absolute("900".to_string()),
            unit: "rpm".to_string(),
            constraint: "== 901".to_string(),
        }];
        let xml = r#"
            <AcceptanceRuleset>
                <affected_endpoints>
                    <affected_endpoint><name>MotorSpeed_SP</name><value>0</value></affected_endpoint>
                </affected_endpoints>
            </AcceptanceRuleset>
        "#;
        assert!(!verify_mapping_constraints(&endpoints, xml).unwrap());
    }

    #[test]
    fn operator_order_checks_le_before_lt() {
        let (op, value) = parse_constraint("<= 5").unwrap();
        assert_eq!(op, ConstraintOp::Le);
        assert_eq!(value, 5.0);
    }
}
