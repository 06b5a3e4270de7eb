//! Summary types reported by a digest run.
//!
//! Every completed run reports the same shape regardless of how far it
//! got; consumers never branch on which fields exist. Serialized keys
//! are camelCase for the HTTP surface.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

use crate::model::Cadence;

/// One due subscriber's schedule evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePreview {
    pub id: String,
    pub email: String,
    pub name: String,
    pub delivery_schedule: Cadence,
    pub last_sent: Option<DateTime<Utc>>,
    pub preferred_send_time: Option<NaiveTime>,
    pub topics_count: usize,
    pub is_due: bool,
    pub is_right_time: bool,
    pub should_send: bool,
    pub next_run_time: DateTime<Utc>,
    /// Effective send time: the subscriber's preference or the default.
    pub default_preferred_time: NaiveTime,
}

/// Outcome of one subscriber's send attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub subscriber_id: String,
    pub email: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What one digest run did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub total_subscribers: usize,
    pub due_subscribers: usize,
    pub successful: usize,
    pub failed: usize,
    /// Wall-clock duration of the run in milliseconds.
    pub execution_time: u64,
    pub aborted_early: bool,
    pub schedule_info: Vec<SchedulePreview>,
    /// Per-subscriber outcomes, truncated to a bounded preview.
    pub email_results: Vec<SendOutcome>,
}
