//! Status reports sent back to the coordinator.

use serde::{Deserialize, Serialize};

use super::ids::{CorrelationId, TaskId};
use super::task::SendTask;

/// `status` field of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLabel {
    Processing,
    Pending,
    Sent,
    Failed,
    Delivered,
    SentUnconfirmed,
}

impl StatusLabel {
    /// Reports with these labels make the batcher flush right away.
    pub fn triggers_flush(self) -> bool {
        matches!(self, StatusLabel::Delivered | StatusLabel::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusLabel::Processing => "processing",
            StatusLabel::Pending => "pending",
            StatusLabel::Sent => "sent",
            StatusLabel::Failed => "failed",
            StatusLabel::Delivered => "delivered",
            StatusLabel::SentUnconfirmed => "sent_unconfirmed",
        }
    }
}

/// Carrier-level transmission error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendErrorCode {
    GenericFailure,
    NoService,
    NullPdu,
    RadioOff,
    #[serde(rename = "UNKNOWN_ERROR")]
    Unknown,
}

impl SendErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            SendErrorCode::GenericFailure => "GENERIC_FAILURE",
            SendErrorCode::NoService => "NO_SERVICE",
            SendErrorCode::NullPdu => "NULL_PDU",
            SendErrorCode::RadioOff => "RADIO_OFF",
            SendErrorCode::Unknown => "UNKNOWN_ERROR",
        }
    }
}

/// One status transition of one task.
///
/// `correlation_id` は内部用で、wire には出しません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub queue_id: TaskId,
    #[serde(skip)]
    pub correlation_id: CorrelationId,
    pub phone: String,
    pub status: StatusLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_sent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<SendErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_time_seconds: Option<u64>,
}

impl StatusReport {
    pub fn new(task: &SendTask, status: StatusLabel) -> Self {
        Self {
            queue_id: task.task_id,
            correlation_id: task.correlation_id,
            phone: task.destination.clone(),
            status,
            sms_sent: None,
            error_code: None,
            sent_timestamp: None,
            delivered_timestamp: None,
            delivery_time_seconds: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.sms_sent = Some(body.into());
        self
    }

    pub fn with_error(mut self, code: SendErrorCode) -> Self {
        self.error_code = Some(code);
        self
    }

    pub fn with_sent_at(mut self, sent_ms: i64) -> Self {
        self.sent_timestamp = Some(sent_ms);
        self
    }

    /// Sets the delivery timestamp and the latency derived from `sent_timestamp`.
    pub fn with_delivered_at(mut self, delivered_ms: i64) -> Self {
        self.delivered_timestamp = Some(delivered_ms);
        self.delivery_time_seconds = self
            .sent_timestamp
            .map(|sent_ms| delivery_latency_secs(sent_ms, delivered_ms));
        self
    }
}

/// floor((delivered - sent) / 1000), never negative.
pub fn delivery_latency_secs(sent_ms: i64, delivered_ms: i64) -> u64 {
    let elapsed = delivered_ms.saturating_sub(sent_ms).max(0);
    (elapsed / 1000) as u64
}
