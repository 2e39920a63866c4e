//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::app::{ActivityLog, ReportSink, StatsRecorder};
use crate::domain::{
    CorrelationId, EndpointError, ReplyRecord, SendError, SendTask, StatusReport, TaskId,
};
use crate::impls::MemoryStore;
use crate::ports::{FetchOutcome, FixedClock, MessageSender, RemoteEndpoint, SendRequest};

/// Endpoint that records every call and fails on demand.
#[derive(Default)]
pub(crate) struct RecordingEndpoint {
    fetches: Mutex<VecDeque<Result<FetchOutcome, EndpointError>>>,
    status_calls: Mutex<Vec<Vec<StatusReport>>>,
    reply_calls: Mutex<Vec<Vec<ReplyRecord>>>,
    failing_status: AtomicUsize,
    failing_replies: AtomicUsize,
    reply_gate: Mutex<Option<Arc<Notify>>>,
}

impl RecordingEndpoint {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_fetch(&self, result: Result<FetchOutcome, EndpointError>) {
        self.fetches.lock().unwrap().push_back(result);
    }

    pub(crate) fn fail_next_status(&self, n: usize) {
        self.failing_status.store(n, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_replies(&self, n: usize) {
        self.failing_replies.store(n, Ordering::SeqCst);
    }

    /// Every `submit_replies` call blocks until the returned notify fires.
    pub(crate) fn hold_replies(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.reply_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn status_calls(&self) -> Vec<Vec<StatusReport>> {
        self.status_calls.lock().unwrap().clone()
    }

    pub(crate) fn reply_calls(&self) -> Vec<Vec<ReplyRecord>> {
        self.reply_calls.lock().unwrap().clone()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RemoteEndpoint for RecordingEndpoint {
    async fn fetch_task(&self) -> Result<FetchOutcome, EndpointError> {
        self.fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(FetchOutcome::Empty))
    }

    async fn report_statuses(&self, reports: &[StatusReport]) -> Result<(), EndpointError> {
        self.status_calls.lock().unwrap().push(reports.to_vec());
        if Self::take_failure(&self.failing_status) {
            return Err(EndpointError::UnexpectedStatus(500));
        }
        Ok(())
    }

    async fn submit_replies(&self, replies: &[ReplyRecord]) -> Result<(), EndpointError> {
        self.reply_calls.lock().unwrap().push(replies.to_vec());
        let gate = self.reply_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if Self::take_failure(&self.failing_replies) {
            return Err(EndpointError::UnexpectedStatus(500));
        }
        Ok(())
    }
}

/// Report sink that keeps reports in emission order.
#[derive(Default)]
pub(crate) struct RecordingSink {
    reports: Mutex<Vec<StatusReport>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn reports(&self) -> Vec<StatusReport> {
        self.reports.lock().unwrap().clone()
    }

    pub(crate) fn reports_for(&self, task_id: TaskId) -> Vec<StatusReport> {
        self.reports()
            .into_iter()
            .filter(|r| r.queue_id == task_id)
            .collect()
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn emit(&self, report: StatusReport) {
        self.reports.lock().unwrap().push(report);
    }
}

/// Sender that records requests; optionally rejects them.
#[derive(Default)]
pub(crate) struct ScriptedSender {
    requests: Mutex<Vec<SendRequest>>,
    reject: bool,
}

impl ScriptedSender {
    pub(crate) fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Self::default()
        })
    }

    pub(crate) fn requests(&self) -> Vec<SendRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for ScriptedSender {
    async fn send(&self, request: SendRequest) -> Result<(), SendError> {
        self.requests.lock().unwrap().push(request);
        if self.reject {
            return Err(SendError::Unavailable("radio stack not ready".into()));
        }
        Ok(())
    }
}

pub(crate) fn clock(millis: i64) -> Arc<FixedClock> {
    Arc::new(FixedClock::from_millis(millis))
}

pub(crate) fn stats() -> StatsRecorder {
    StatsRecorder::open(Arc::new(MemoryStore::new()))
}

pub(crate) fn activity() -> ActivityLog {
    ActivityLog::open(Arc::new(MemoryStore::new()), clock(0), 100, true)
}

pub(crate) fn send_task(id: i64, destination: &str) -> SendTask {
    SendTask {
        task_id: TaskId::new(id),
        correlation_id: CorrelationId::new(100 + id),
        destination: destination.to_string(),
        body: "Hello".to_string(),
        dispatched_at_ms: 0,
    }
}
