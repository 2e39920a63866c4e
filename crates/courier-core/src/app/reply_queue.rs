//! Durable reply queue.
//!
//! # 方針
//! - メモリ上の VecDeque と永続コピーは常に一致させる（変更のたびに同期保存、送信より前）
//! - flush は古い順に最大 batch_size 件。失敗したらバッチを先頭へ戻す（元の順序のまま）
//! - flush は同時に 1 本だけ（compare_exchange のフラグ）
//! - タイマー間隔は watch チャネルで差し替え可能

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::FlushOutcome;
use super::stats::StatsRecorder;
use crate::domain::ReplyRecord;
use crate::ports::{Clock, RemoteEndpoint, Store, load_or_default};

pub type ReplyStore = dyn Store<VecDeque<ReplyRecord>>;

#[derive(Clone)]
pub struct ReplyQueue {
    inner: Arc<ReplyQueueInner>,
}

struct ReplyQueueInner {
    queue: Mutex<VecDeque<ReplyRecord>>,
    store: Arc<ReplyStore>,
    endpoint: Arc<dyn RemoteEndpoint>,
    batch_size: usize,
    flushing: AtomicBool,
    interval_tx: watch::Sender<Duration>,
    stats: StatsRecorder,
    clock: Arc<dyn Clock>,
}

/// Clears the in-flight flag even if the flush future is dropped.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReplyQueue {
    /// Load the persisted queue (missing/empty/corrupt store = empty queue).
    pub fn open(
        store: Arc<ReplyStore>,
        endpoint: Arc<dyn RemoteEndpoint>,
        batch_size: usize,
        interval: Duration,
        stats: StatsRecorder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let queue = load_or_default(store.as_ref(), "reply queue");
        if !queue.is_empty() {
            info!(count = queue.len(), "restored persisted replies");
        }
        let (interval_tx, _) = watch::channel(interval);
        Self {
            inner: Arc::new(ReplyQueueInner {
                queue: Mutex::new(queue),
                store,
                endpoint,
                batch_size: batch_size.max(1),
                flushing: AtomicBool::new(false),
                interval_tx,
                stats,
                clock,
            }),
        }
    }

    /// Append and persist; starts a flush once the batch threshold is reached.
    pub async fn enqueue(&self, record: ReplyRecord) -> usize {
        let len = {
            let mut queue = self.inner.queue.lock().await;
            queue.push_back(record);
            self.persist(&queue);
            queue.len()
        };
        debug!(queued = len, "reply queued");

        if len >= self.inner.batch_size {
            self.force_sync();
        }
        len
    }

    /// Flush outside the timer. No-op while another flush is in flight.
    pub fn force_sync(&self) {
        let queue = self.clone();
        tokio::spawn(async move {
            queue.flush().await;
        });
    }

    pub async fn flush(&self) -> FlushOutcome {
        if self
            .inner
            .flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("reply flush already in flight");
            return FlushOutcome::Busy;
        }
        let _guard = FlushGuard(&self.inner.flushing);
        self.flush_batch().await
    }

    async fn flush_batch(&self) -> FlushOutcome {
        let batch = {
            let mut queue = self.inner.queue.lock().await;
            if queue.is_empty() {
                return FlushOutcome::Idle;
            }
            let take = queue.len().min(self.inner.batch_size);
            let batch: Vec<ReplyRecord> = queue.drain(..take).collect();
            self.persist(&queue);
            batch
        };

        let count = batch.len();
        match self.inner.endpoint.submit_replies(&batch).await {
            Ok(()) => {
                info!(count, "replies delivered");
                self.inner
                    .stats
                    .record_reply_sync(count, self.inner.clock.now_millis())
                    .await;
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                warn!(count, kind = ?e.kind(), error = %e, "reply flush failed; requeueing at front");
                {
                    let mut queue = self.inner.queue.lock().await;
                    for record in batch.into_iter().rev() {
                        queue.push_front(record);
                    }
                    self.persist(&queue);
                }
                self.inner.stats.record_reply_failure(count).await;
                FlushOutcome::Requeued(count)
            }
        }
    }

    fn persist(&self, queue: &VecDeque<ReplyRecord>) {
        if let Err(e) = self.inner.store.save(queue) {
            error!(kind = ?e.kind(), error = %e, count = queue.len(), "failed to persist reply queue");
        }
    }

    /// Replace the flush interval; the running timer restarts with it.
    pub fn set_interval(&self, interval: Duration) {
        self.inner.interval_tx.send_replace(interval);
    }

    pub fn interval(&self) -> Duration {
        *self.inner.interval_tx.borrow()
    }

    /// Timer that spawns a flush every interval until shutdown.
    pub fn spawn_timer(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let queue = self.clone();
        let interval_rx = self.inner.interval_tx.subscribe();
        tokio::spawn(queue.run_timer(interval_rx, shutdown))
    }

    async fn run_timer(
        self,
        mut interval_rx: watch::Receiver<Duration>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            let period = *interval_rx.borrow_and_update();
            tokio::select! {
                _ = tokio::time::sleep(period) => {
                    let queue = self.clone();
                    tokio::spawn(async move {
                        queue.flush().await;
                    });
                }
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    debug!(interval = ?*interval_rx.borrow(), "reply flush interval changed");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.queue.lock().await.is_empty()
    }

    /// Oldest first.
    pub async fn snapshot(&self) -> Vec<ReplyRecord> {
        self.inner.queue.lock().await.iter().cloned().collect()
    }
}
