//! Feedback bus (C11): every pipeline stage reports its outcome through
//! a [`FeedbackSink`], never by calling into the stage downstream of it —
//! breaking the upstream-to-downstream import cycle the original's
//! `feedback_system.py` left implicit.
//!
//! Grounded on
//! `original_source/gateway-komponenten/intermediate-vor-partition/feedback_system/feedback_system.py`.

use gateway_core::feedback::FeedbackRecord;
use parking_lot::Mutex;
use tracing::{info, warn};

/// Results that count as a successful outcome; everything else logs at
/// `warn` instead of `info`.
const SUCCESS_RESULTS: &[&str] = &["Verified", "Mapping completed", "Accepted"];

pub trait FeedbackSink: Send + Sync {
    fn submit(&self, record: FeedbackRecord);
}

/// Default sink: logs each record as a structured `tracing` event.
/// The dependency-free transport the original's bare `feedback_log`
/// list stood in for.
#[derive(Debug, Default)]
pub struct TracingSink;

impl FeedbackSink for TracingSink {
    fn submit(&self, record: FeedbackRecord) {
        if SUCCESS_RESULTS.contains(&record.result.as_str()) {
            info!(
                stage = ?record.stage,
                request_id = ?record.request_id,
                issuer_id = ?record.issuer_id,
                result = %record.result,
                info = %record.info,
                "feedback"
            );
        } else {
            warn!(
                stage = ?record.stage,
                request_id = ?record.request_id,
                issuer_id = ?record.issuer_id,
                result = %record.result,
                info = %record.info,
                "feedback"
            );
        }
    }
}

/// Append-only in-memory sink backing tests and any caller that wants
/// to inspect feedback after the fact.
#[derive(Debug, Default)]
pub struct VecSink {
    records: Mutex<Vec<FeedbackRecord>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl FeedbackSink for VecSink {
    fn submit(&self, record: FeedbackRecord) {
        self.records.lock().push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gateway_core::feedback::Stage;
    use uuid::Uuid;

    fn record(result: &str) -> FeedbackRecord {
        FeedbackRecord::new(Stage::Verification, Some(Uuid::new_v4()), Some("john".to_string()), result, "info", Utc::now())
    }

    #[test]
    fn vec_sink_accumulates_in_submission_order() {
        let sink = VecSink::new();
        sink.submit(record("Verified"));
        sink.submit(record("Rule-based verification failure"));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].result, "Verified");
        assert_eq!(records[1].result, "Rule-based verification failure");
    }

    #[test]
    fn tracing_sink_does_not_panic_on_any_result() {
        let sink = TracingSink;
        sink.submit(record("Verified"));
        sink.submit(record("Mapping failed: no matching mapping rule set for this request"));
    }
}
