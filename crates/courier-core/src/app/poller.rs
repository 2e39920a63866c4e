//! Poller: one task fetch per tick.
//!
//! どの失敗もこの tick で完結させ、再試行は次の tick に任せます（間隔は固定）。

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::activity::ActivityLog;
use super::delivery::DeliveryStateMachine;
use super::tracking::ShipmentTracker;
use crate::domain::{EndpointError, SendTask, TaskId};
use crate::ports::{Clock, FetchOutcome, RemoteEndpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A task was fetched and handed to the state machine.
    Dispatched(TaskId),
    /// Nothing pending.
    Idle,
    /// The coordinator rejected our API key.
    Unauthorized,
    /// Transport failure or malformed payload; the tick was discarded.
    Discarded,
}

pub struct Poller {
    endpoint: Arc<dyn RemoteEndpoint>,
    machine: Arc<DeliveryStateMachine>,
    tracker: Arc<ShipmentTracker>,
    activity: ActivityLog,
    clock: Arc<dyn Clock>,
}

impl Poller {
    pub fn new(
        endpoint: Arc<dyn RemoteEndpoint>,
        machine: Arc<DeliveryStateMachine>,
        tracker: Arc<ShipmentTracker>,
        activity: ActivityLog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            endpoint,
            machine,
            tracker,
            activity,
            clock,
        }
    }

    pub async fn tick(&self) -> PollOutcome {
        let payload = match self.endpoint.fetch_task().await {
            Ok(FetchOutcome::Task(payload)) => payload,
            Ok(FetchOutcome::Empty) => {
                debug!("no pending task");
                return PollOutcome::Idle;
            }
            Err(EndpointError::Unauthorized) => {
                warn!("coordinator rejected the API key; check configuration");
                self.activity.record("Authentication failed - check API key").await;
                return PollOutcome::Unauthorized;
            }
            Err(e) => {
                warn!(kind = ?e.kind(), error = %e, "task fetch failed; waiting for next tick");
                return PollOutcome::Discarded;
            }
        };

        let task = match SendTask::from_payload(payload, self.clock.now_millis()) {
            Ok(task) => task,
            Err(e) => {
                warn!(kind = ?e.kind(), error = %e, "discarding malformed task");
                return PollOutcome::Discarded;
            }
        };

        let task_id = task.task_id;
        info!(%task_id, correlation_id = %task.correlation_id, "task fetched");
        self.activity
            .record(format!("New SMS task: {task_id} to {}", task.destination))
            .await;
        self.tracker.track(&task).await;
        self.machine.accept(task).await;
        PollOutcome::Dispatched(task_id)
    }
}
