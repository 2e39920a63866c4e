//! Status report batcher.
//!
//! - タイマー（既定 10 秒）ごとに flush
//! - `delivered` / `failed` が積まれたら即 flush
//! - flush は pending を空の Vec と入れ替えてから送る（ロックを跨いで await しない）
//! - 失敗したらバッチ丸ごとを pending の先頭へ戻す（落とさない、順序も保つ）

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::FlushOutcome;
use crate::domain::StatusReport;
use crate::ports::RemoteEndpoint;

/// Where the delivery state machine emits its reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn emit(&self, report: StatusReport);
}

#[derive(Clone)]
pub struct StatusBatcher {
    inner: Arc<BatcherInner>,
}

struct BatcherInner {
    pending: Mutex<Vec<StatusReport>>,
    endpoint: Arc<dyn RemoteEndpoint>,
}

impl StatusBatcher {
    pub fn new(endpoint: Arc<dyn RemoteEndpoint>) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                pending: Mutex::new(Vec::new()),
                endpoint,
            }),
        }
    }

    pub async fn enqueue(&self, report: StatusReport) {
        let flush_now = report.status.triggers_flush();
        self.inner.pending.lock().await.push(report);

        if flush_now {
            let batcher = self.clone();
            tokio::spawn(async move {
                batcher.flush().await;
            });
        }
    }

    pub async fn flush(&self) -> FlushOutcome {
        let batch = std::mem::take(&mut *self.inner.pending.lock().await);
        if batch.is_empty() {
            return FlushOutcome::Idle;
        }

        let count = batch.len();
        match self.inner.endpoint.report_statuses(&batch).await {
            Ok(()) => {
                debug!(count, "status reports delivered");
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                warn!(count, kind = ?e.kind(), error = %e, "status report flush failed; requeueing");
                let mut pending = self.inner.pending.lock().await;
                let newer = std::mem::replace(&mut *pending, batch);
                pending.extend(newer);
                FlushOutcome::Requeued(count)
            }
        }
    }

    pub async fn pending(&self) -> Vec<StatusReport> {
        self.inner.pending.lock().await.clone()
    }
}

#[async_trait]
impl ReportSink for StatusBatcher {
    async fn emit(&self, report: StatusReport) {
        self.enqueue(report).await;
    }
}
