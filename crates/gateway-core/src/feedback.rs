//! Feedback record shared by every pipeline stage and the feedback bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which stage produced a feedback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Authentication,
    Authorization,
    Verification,
    Mapping,
    Acceptance,
}

/// A structured outcome emitted at every stage of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub stage: Stage,
    pub request_id: Option<Uuid>,
    pub issuer_id: Option<String>,
    pub result: String,
    pub info: String,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(
        stage: Stage,
        request_id: Option<Uuid>,
        issuer_id: Option<String>,
        result: impl Into<String>,
        info: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            stage,
            request_id,
            issuer_id,
            result: result.into(),
            info: info.into(),
            timestamp,
        }
    }
}
