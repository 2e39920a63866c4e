//! Send tasks fetched from the coordinator.

use serde::Deserialize;

use super::errors::EndpointError;
use super::ids::{CorrelationId, TaskId};

/// Wire shape of a fetched task: `{phone, message, queue_id, shipment_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskPayload {
    pub phone: String,
    pub message: String,
    pub queue_id: TaskId,
    pub shipment_id: CorrelationId,
}

/// A task owned by the delivery state machine until it reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTask {
    pub task_id: TaskId,
    pub correlation_id: CorrelationId,
    pub destination: String,
    pub body: String,
    pub dispatched_at_ms: i64,
}

impl SendTask {
    /// Validate a payload and stamp it with the dispatch time.
    pub fn from_payload(payload: TaskPayload, now_ms: i64) -> Result<Self, EndpointError> {
        let destination = payload.phone.trim().to_string();
        if destination.is_empty() {
            return Err(EndpointError::Malformed(format!(
                "task {} has an empty destination",
                payload.queue_id
            )));
        }
        Ok(Self {
            task_id: payload.queue_id,
            correlation_id: payload.shipment_id,
            destination,
            body: payload.message,
            dispatched_at_ms: now_ms,
        })
    }
}
