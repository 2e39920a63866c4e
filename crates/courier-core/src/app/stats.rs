//! Cumulative gateway counters.
//!
//! 送信数・配達数・失敗数・返信の種類別ヒストグラムなど。
//! 更新のたびに Store へ保存し、再起動しても累積が続きます。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::ReplyType;
use crate::ports::{Store, load_or_default};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayStats {
    pub sent: u64,
    pub delivered: u64,
    pub failed: u64,
    pub replies_sent_to_server: u64,
    pub replies_failed_to_send: u64,
    pub last_reply_sync_ms: Option<i64>,
    pub reply_counts: BTreeMap<ReplyType, u64>,
    pub total_replies: u64,
}

/// Shared handle that updates and persists `GatewayStats`.
#[derive(Clone)]
pub struct StatsRecorder {
    inner: Arc<Mutex<GatewayStats>>,
    store: Arc<dyn Store<GatewayStats>>,
}

impl StatsRecorder {
    pub fn open(store: Arc<dyn Store<GatewayStats>>) -> Self {
        let stats = load_or_default(store.as_ref(), "stats");
        Self {
            inner: Arc::new(Mutex::new(stats)),
            store,
        }
    }

    pub async fn record_sent(&self) {
        self.update(|s| s.sent += 1).await;
    }

    pub async fn record_delivered(&self) {
        self.update(|s| s.delivered += 1).await;
    }

    pub async fn record_failed(&self) {
        self.update(|s| s.failed += 1).await;
    }

    pub async fn record_reply_sync(&self, count: usize, at_ms: i64) {
        self.update(|s| {
            s.replies_sent_to_server += count as u64;
            s.last_reply_sync_ms = Some(at_ms);
        })
        .await;
    }

    pub async fn record_reply_failure(&self, count: usize) {
        self.update(|s| s.replies_failed_to_send += count as u64).await;
    }

    pub async fn record_reply(&self, reply_type: ReplyType) {
        self.update(|s| {
            *s.reply_counts.entry(reply_type).or_insert(0) += 1;
            s.total_replies += 1;
        })
        .await;
    }

    pub async fn snapshot(&self) -> GatewayStats {
        self.inner.lock().await.clone()
    }

    async fn update(&self, f: impl FnOnce(&mut GatewayStats)) {
        let mut stats = self.inner.lock().await;
        f(&mut stats);
        if let Err(e) = self.store.save(&stats) {
            warn!(kind = ?e.kind(), error = %e, "failed to persist stats");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::MemoryStore;

    #[tokio::test]
    async fn counters_accumulate_and_persist() {
        let store = Arc::new(MemoryStore::<GatewayStats>::new());
        let stats = StatsRecorder::open(store.clone());

        stats.record_sent().await;
        stats.record_sent().await;
        stats.record_delivered().await;
        stats.record_reply(ReplyType::OptOut).await;
        stats.record_reply(ReplyType::OptOut).await;
        stats.record_reply_sync(2, 9_000).await;

        let reopened = StatsRecorder::open(store).snapshot().await;
        assert_eq!(reopened.sent, 2);
        assert_eq!(reopened.delivered, 1);
        assert_eq!(reopened.reply_counts.get(&ReplyType::OptOut), Some(&2));
        assert_eq!(reopened.total_replies, 2);
        assert_eq!(reopened.replies_sent_to_server, 2);
        assert_eq!(reopened.last_reply_sync_ms, Some(9_000));
    }

    #[tokio::test]
    async fn histogram_is_keyed_by_wire_names() {
        let store = Arc::new(MemoryStore::<GatewayStats>::new());
        let stats = StatsRecorder::open(store.clone());
        stats.record_reply(ReplyType::PinConfirmation).await;

        let raw = store.raw().unwrap();
        assert!(raw.contains(r#""pin_confirmation":1"#), "{raw}");
    }

    #[tokio::test]
    async fn corrupt_store_starts_from_zero() {
        let store = Arc::new(MemoryStore::<GatewayStats>::with_raw("{\"sent\": "));
        let stats = StatsRecorder::open(store);
        assert_eq!(stats.snapshot().await, GatewayStats::default());
    }
}
