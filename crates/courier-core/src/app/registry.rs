//! Task registry: task id -> delivery record.
//!
//! Design:
//! - This is the single source of truth for in-flight delivery state.
//! - Entries are created on accept and removed on a terminal transition or eviction.
//! - Task ids are short-lived and may be reused by the coordinator, so a
//!   signal for an id that is no longer registered is simply dropped.

use std::collections::HashMap;

use crate::domain::{DeliveryState, SendErrorCode, SendTask, TaskId};

/// Delivery record of one in-flight task. All state transitions happen here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub task: SendTask,
    pub state: DeliveryState,
    pub submitted_at_ms: i64,
    pub sent_at_ms: Option<i64>,
    pub delivered_at_ms: Option<i64>,
    pub last_error: Option<SendErrorCode>,
}

impl DeliveryRecord {
    pub fn new(task: SendTask, now_ms: i64) -> Self {
        Self {
            task,
            state: DeliveryState::Received,
            submitted_at_ms: now_ms,
            sent_at_ms: None,
            delivered_at_ms: None,
            last_error: None,
        }
    }

    /// Move to `next` if legal. Returns whether the transition happened.
    fn advance(&mut self, next: DeliveryState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }

    pub fn mark_dispatch_pending(&mut self) -> bool {
        self.advance(DeliveryState::DispatchPending)
    }

    pub fn mark_dispatched(&mut self) -> bool {
        self.advance(DeliveryState::Dispatched)
    }

    pub fn mark_sent(&mut self, now_ms: i64) -> bool {
        let moved = self.advance(DeliveryState::Sent);
        if moved {
            self.sent_at_ms = Some(now_ms);
        }
        moved
    }

    pub fn mark_send_failed(&mut self, code: SendErrorCode) -> bool {
        let moved = self.advance(DeliveryState::SendFailed);
        if moved {
            self.last_error = Some(code);
        }
        moved
    }

    pub fn mark_delivered(&mut self, now_ms: i64) -> bool {
        let moved = self.advance(DeliveryState::Delivered);
        if moved {
            self.delivered_at_ms = Some(now_ms);
        }
        moved
    }

    pub fn mark_unconfirmed(&mut self) -> bool {
        self.advance(DeliveryState::DeliveryUnconfirmed)
    }
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    records: HashMap<TaskId, DeliveryRecord>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the one it replaced (id reuse while in flight).
    pub fn insert(&mut self, record: DeliveryRecord) -> Option<DeliveryRecord> {
        self.records.insert(record.task.task_id, record)
    }

    pub fn get(&self, task_id: TaskId) -> Option<&DeliveryRecord> {
        self.records.get(&task_id)
    }

    pub fn get_mut(&mut self, task_id: TaskId) -> Option<&mut DeliveryRecord> {
        self.records.get_mut(&task_id)
    }

    pub fn remove(&mut self, task_id: TaskId) -> Option<DeliveryRecord> {
        self.records.remove(&task_id)
    }

    /// Ids of records submitted at least `timeout_ms` before `now_ms`, oldest first.
    pub fn expired(&self, now_ms: i64, timeout_ms: i64) -> Vec<TaskId> {
        let mut expired: Vec<(i64, TaskId)> = self
            .records
            .values()
            .filter(|r| now_ms - r.submitted_at_ms >= timeout_ms)
            .map(|r| (r.submitted_at_ms, r.task.task_id))
            .collect();
        expired.sort();
        expired.into_iter().map(|(_, id)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
