//! Control-plane bridge client.
//!
//! Grounded on
//! `original_source/gateway-komponenten/intermediate-vor-partition-cpc/main.py`'s
//! `send_request`/`add_affected_endpoints_to_xml`: before pulling a mapped
//! request's acceptance/mapping checks can run, the acceptance-ruleset
//! template is extended with one `<affected_endpoint>` node per affected
//! endpoint and POSTed to the control plane; a 200 response's body is the
//! same document with every `current_value`/`affected_endpoint value` node
//! filled in by the live system. Everything on the far side of that POST —
//! the process actually reading field values and filling the document —
//! is the explicit Non-goal named in spec.md §1 ("the HTTP bridge used for
//! the control-plane hand-off"); only the client side lives here.

use async_trait::async_trait;
use gateway_storage::mapped_requests::AffectedEndpoint;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// Abstracts the control-plane round trip so the pull loop can be
/// exercised without a live HTTP endpoint, the same way
/// `gateway_drivers::StructuredNodeTransport` abstracts the field-bus
/// connection.
#[async_trait]
pub trait ControlPlaneBridge: Send + Sync {
    /// `Some(filled_xml)` on a 200 response, `None` on any non-200
    /// status or transport failure — the caller treats both as "reject,
    /// try again next pull cycle".
    async fn send(&self, xml: String) -> Option<String>;
}

pub struct HttpControlPlaneBridge {
    client: reqwest::Client,
    url: String,
}

impl HttpControlPlaneBridge {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl ControlPlaneBridge for HttpControlPlaneBridge {
    async fn send(&self, xml: String) -> Option<String> {
        let response = match self
            .client
            .post(&self.url)
            .header("Content-Type", "application/xml")
            .body(xml)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, url = %self.url, "control-plane bridge request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!(status = %response.status(), url = %self.url, "control-plane bridge rejected request");
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::error!(error = %e, "control-plane bridge response body unreadable");
                None
            }
        }
    }
}

/// Append one `<affected_endpoints>` block, mirroring the original's
/// `add_affected_endpoints_to_xml`: a fresh `<affected_endpoint>` per
/// entry, `<name>` set to the endpoint id, `<value>` initialized to `0`
/// for the control plane to fill in.
pub fn append_affected_endpoints(template_xml: &str, endpoints: &[AffectedEndpoint]) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(template_xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut depth: i32 = 0;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                depth += 1;
                writer.write_event(Event::Start(e.into_owned()))?;
            }
            Event::End(e) => {
                depth -= 1;
                if depth == 0 {
                    write_affected_endpoints(&mut writer, endpoints)?;
                }
                writer.write_event(Event::End(e.into_owned()))?;
            }
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned())
}

fn write_affected_endpoints(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    endpoints: &[AffectedEndpoint],
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new("affected_endpoints")))?;
    for endpoint in endpoints {
        writer.write_event(Event::Start(BytesStart::new("affected_endpoint")))?;

        writer.write_event(Event::Start(BytesStart::new("name")))?;
        writer.write_event(Event::Text(BytesText::new(&endpoint.endpoint_id)))?;
        writer.write_event(Event::End(BytesEnd::new("name")))?;

        writer.write_event(Event::Start(BytesStart::new("value")))?;
        writer.write_event(Event::Text(BytesText::new("0")))?;
        writer.write_event(Event::End(BytesEnd::new("value")))?;

        writer.write_event(Event::End(BytesEnd::new("affected_endpoint")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("affected_endpoints")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_storage::mapped_requests::ChangeType;

    #[test]
    fn endpoints_are_appended_before_the_root_closing_tag() {
        let template = "<AcceptanceRuleset><key_personnel_present><current_value></current_value><required_value>true</required_value></key_personnel_present></AcceptanceRuleset>";
        let endpoints = vec![AffectedEndpoint {
            endpoint_id: "VSD1_MotorSpeed_SP".to_string(),
            change_type: ChangeType::Absolute("900".to_string()),
            unit: "rpm".to_string(),
            constraint: "<= 1500".to_string(),
        }];

        let filled = append_affected_endpoints(template, &endpoints).unwrap();
        assert!(filled.contains("<affected_endpoints>"));
        assert!(filled.contains("<name>VSD1_MotorSpeed_SP</name>"));
        assert!(filled.ends_with("</AcceptanceRuleset>"));
    }

    struct RejectingBridge;

    #[async_trait]
    impl ControlPlaneBridge for RejectingBridge {
        async fn send(&self, _xml: String) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn a_bridge_double_never_performs_a_network_call() {
        let bridge = RejectingBridge;
        assert!(bridge.send("<x/>".to_string()).await.is_none());
    }
}
