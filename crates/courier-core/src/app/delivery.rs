//! Delivery state machine.
//!
//! 1 タスクを `received -> dispatch-pending -> dispatched -> {sent, send-failed}
//! -> {delivered, delivery-unconfirmed}` と進め、遷移ごとに StatusReport を出します。
//!
//! # 並行性
//! - registry は Mutex 1 つで守る。sender 呼び出しや report 送出の間はロックを持たない
//! - sender を呼ぶ前に `dispatched` へ進めておくので、送信結果が即座に返っても取りこぼさない
//! - 送信結果と配達結果は 1 本のチャネルで到着順に処理する

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use super::activity::ActivityLog;
use super::batcher::ReportSink;
use super::registry::{DeliveryRecord, TaskRegistry};
use super::stats::StatsRecorder;
use crate::domain::{
    DeliveryState, ErrorKind, SendErrorCode, SendTask, StatusLabel, StatusReport, TaskId,
};
use crate::ports::{
    Clock, DeliveryResult, MessageSender, SendRequest, SendSignal, SignalSink, TransmissionResult,
};

pub struct DeliveryStateMachine {
    registry: Mutex<TaskRegistry>,
    sender: Arc<dyn MessageSender>,
    signals: SignalSink,
    reports: Arc<dyn ReportSink>,
    stats: StatsRecorder,
    activity: ActivityLog,
    clock: Arc<dyn Clock>,
    delivery_timeout: Duration,
}

impl DeliveryStateMachine {
    /// Returns the machine and the receiving end of its signal channel
    /// (drive it with [`DeliveryStateMachine::run_signals`]).
    pub fn new(
        sender: Arc<dyn MessageSender>,
        reports: Arc<dyn ReportSink>,
        stats: StatsRecorder,
        activity: ActivityLog,
        clock: Arc<dyn Clock>,
        delivery_timeout: Duration,
    ) -> (Self, UnboundedReceiver<SendSignal>) {
        let (signals, rx) = SignalSink::channel();
        let machine = Self {
            registry: Mutex::new(TaskRegistry::new()),
            sender,
            signals,
            reports,
            stats,
            activity,
            clock,
            delivery_timeout,
        };
        (machine, rx)
    }

    /// Register a fetched task, report `processing`, then dispatch it.
    pub async fn accept(&self, task: SendTask) {
        let task_id = task.task_id;
        let processing = task_report(&task, StatusLabel::Processing);
        let record = DeliveryRecord::new(task, self.clock.now_millis());

        let replaced = self.registry.lock().await.insert(record);
        if let Some(previous) = replaced {
            warn!(%task_id, previous_state = ?previous.state, "task id reused while still in flight; previous record replaced");
        }

        self.reports.emit(processing).await;
        self.dispatch(task_id).await;
    }

    async fn dispatch(&self, task_id: TaskId) {
        let prepared = {
            let mut registry = self.registry.lock().await;
            let Some(record) = registry.get_mut(task_id) else {
                return;
            };
            if !record.mark_dispatch_pending() {
                debug!(%task_id, state = ?record.state, "task is not awaiting dispatch");
                return;
            }
            let pending = task_report(&record.task, StatusLabel::Pending);
            record.mark_dispatched();
            let request = SendRequest {
                task_id,
                destination: record.task.destination.clone(),
                body: record.task.body.clone(),
                signals: self.signals.clone(),
            };
            (pending, request)
        };
        let (pending, request) = prepared;

        self.reports.emit(pending).await;
        debug!(%task_id, "handing message to sender");
        if let Err(e) = self.sender.send(request).await {
            warn!(%task_id, kind = ?e.kind(), error = %e, "sender failed; concluding task as UNKNOWN_ERROR");
            self.conclude_send_failure(task_id, SendErrorCode::Unknown).await;
        }
    }

    pub async fn handle_signal(&self, signal: SendSignal) {
        match signal {
            SendSignal::Transmission {
                task_id,
                result: TransmissionResult::Sent,
            } => self.on_sent(task_id).await,
            SendSignal::Transmission {
                task_id,
                result: TransmissionResult::Failed(code),
            } => self.conclude_send_failure(task_id, code).await,
            SendSignal::Delivery {
                task_id,
                result: DeliveryResult::Delivered,
            } => self.on_delivered(task_id).await,
            SendSignal::Delivery {
                task_id,
                result: DeliveryResult::Unconfirmed,
            } => self.on_unconfirmed(task_id).await,
        }
    }

    async fn on_sent(&self, task_id: TaskId) {
        let now = self.clock.now_millis();
        let report = {
            let mut registry = self.registry.lock().await;
            let Some(record) = registry.get_mut(task_id) else {
                debug!(%task_id, "transmission result for unknown task dropped");
                return;
            };
            if !record.mark_sent(now) {
                debug!(%task_id, state = ?record.state, "transmission result ignored");
                return;
            }
            task_report(&record.task, StatusLabel::Sent)
                .with_sent_at(now)
        };

        self.stats.record_sent().await;
        self.activity.record(format!("SMS sent: {task_id}")).await;
        self.reports.emit(report).await;
    }

    async fn conclude_send_failure(&self, task_id: TaskId, code: SendErrorCode) {
        let now = self.clock.now_millis();
        let report = {
            let mut registry = self.registry.lock().await;
            let Some(record) = registry.get_mut(task_id) else {
                debug!(%task_id, "transmission failure for unknown task dropped");
                return;
            };
            if !record.mark_send_failed(code) {
                debug!(%task_id, state = ?record.state, "transmission failure ignored");
                return;
            }
            let report = task_report(&record.task, StatusLabel::Failed)
                .with_error(code)
                .with_sent_at(now);
            registry.remove(task_id);
            report
        };

        warn!(%task_id, kind = ?ErrorKind::Transmission, code = code.as_str(), "send failed");
        self.stats.record_failed().await;
        self.activity
            .record(format!("SMS failed: {task_id} ({})", code.as_str()))
            .await;
        self.reports.emit(report).await;
    }

    async fn on_delivered(&self, task_id: TaskId) {
        let now = self.clock.now_millis();
        let report = {
            let mut registry = self.registry.lock().await;
            let Some(record) = registry.get_mut(task_id) else {
                debug!(%task_id, "delivery result for unknown task dropped");
                return;
            };
            let sent_at = record.sent_at_ms;
            if !record.mark_delivered(now) {
                debug!(%task_id, state = ?record.state, "delivery result ignored");
                return;
            }
            let mut report = task_report(&record.task, StatusLabel::Delivered);
            if let Some(sent_at) = sent_at {
                report = report.with_sent_at(sent_at);
            }
            registry.remove(task_id);
            report.with_delivered_at(now)
        };

        self.stats.record_delivered().await;
        self.activity.record(format!("SMS delivered: {task_id}")).await;
        self.reports.emit(report).await;
    }

    async fn on_unconfirmed(&self, task_id: TaskId) {
        let report = {
            let mut registry = self.registry.lock().await;
            let Some(record) = registry.get_mut(task_id) else {
                debug!(%task_id, "delivery result for unknown task dropped");
                return;
            };
            if !record.mark_unconfirmed() {
                debug!(%task_id, state = ?record.state, "delivery result ignored");
                return;
            }
            let report = unconfirmed_report(record);
            registry.remove(task_id);
            report
        };

        warn!(%task_id, kind = ?ErrorKind::DeliveryAmbiguous, "delivery not confirmed");
        self.activity
            .record(format!("SMS delivery unconfirmed: {task_id}"))
            .await;
        self.reports.emit(report).await;
    }

    /// Conclude records older than the delivery timeout.
    ///
    /// `sent` は delivery-unconfirmed、それ以前の状態は UNKNOWN_ERROR の send-failed。
    pub async fn evict_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let timeout_ms = self.delivery_timeout.as_millis() as i64;

        let concluded: Vec<StatusReport> = {
            let mut registry = self.registry.lock().await;
            registry
                .expired(now, timeout_ms)
                .into_iter()
                .filter_map(|task_id| registry.remove(task_id))
                .map(|mut record| {
                    if record.state == DeliveryState::Sent && record.mark_unconfirmed() {
                        unconfirmed_report(&record)
                    } else {
                        record.mark_send_failed(SendErrorCode::Unknown);
                        task_report(&record.task, StatusLabel::Failed)
                            .with_error(SendErrorCode::Unknown)
                            .with_sent_at(now)
                    }
                })
                .collect()
        };

        let count = concluded.len();
        for report in concluded {
            warn!(task_id = %report.queue_id, status = report.status.as_str(), "delivery timed out; evicting");
            if report.status == StatusLabel::Failed {
                self.stats.record_failed().await;
            }
            self.activity
                .record(format!("SMS timed out: {}", report.queue_id))
                .await;
            self.reports.emit(report).await;
        }
        count
    }

    /// Drive signals until shutdown.
    pub async fn run_signals(
        self: Arc<Self>,
        mut signals: UnboundedReceiver<SendSignal>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                signal = signals.recv() => match signal {
                    Some(signal) => self.handle_signal(signal).await,
                    None => break,
                },
            }
        }
    }

    pub async fn in_flight(&self) -> usize {
        self.registry.lock().await.len()
    }

    pub async fn state_of(&self, task_id: TaskId) -> Option<DeliveryState> {
        self.registry.lock().await.get(task_id).map(|r| r.state)
    }

    /// A sink the sender can use to report results for this machine.
    pub fn signal_sink(&self) -> SignalSink {
        self.signals.clone()
    }
}

/// Every report echoes the message body as `sms_sent`.
fn task_report(task: &SendTask, status: StatusLabel) -> StatusReport {
    StatusReport::new(task, status).with_body(task.body.clone())
}

fn unconfirmed_report(record: &DeliveryRecord) -> StatusReport {
    let report = task_report(&record.task, StatusLabel::SentUnconfirmed);
    match record.sent_at_ms {
        Some(sent_at) => report.with_sent_at(sent_at),
        None => report,
    }
}
