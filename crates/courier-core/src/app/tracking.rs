//! Shipment tracking for reply correlation.
//!
//! 宛先番号ごとに直近の `{shipment_id, queue_id, sent_timestamp}` を持ち、
//! 返信が相関ウィンドウ（既定 24 時間）内なら紐付けます。
//! 別に「最近送った番号」のリストを上限付きで持ち、関連判定に使います。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::{CorrelationId, SendTask, TaskId};
use crate::ports::{Store, load_or_default};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentTrack {
    pub shipment_id: CorrelationId,
    pub queue_id: TaskId,
    pub sent_timestamp: i64,
}

pub type TrackMap = HashMap<String, ShipmentTrack>;

pub struct ShipmentTracker {
    tracks: Mutex<TrackMap>,
    recent: Mutex<VecDeque<String>>,
    track_store: Arc<dyn Store<TrackMap>>,
    recent_store: Arc<dyn Store<VecDeque<String>>>,
    max_recent: usize,
    window_ms: i64,
}

impl ShipmentTracker {
    pub fn open(
        track_store: Arc<dyn Store<TrackMap>>,
        recent_store: Arc<dyn Store<VecDeque<String>>>,
        max_recent: usize,
        window: Duration,
    ) -> Self {
        let tracks = load_or_default(track_store.as_ref(), "shipment tracks");
        let mut recent = load_or_default(recent_store.as_ref(), "recent numbers");
        recent.truncate(max_recent);
        Self {
            tracks: Mutex::new(tracks),
            recent: Mutex::new(recent),
            track_store,
            recent_store,
            max_recent,
            window_ms: window.as_millis() as i64,
        }
    }

    /// Remember where a task went. Tracks older than the window are pruned.
    pub async fn track(&self, task: &SendTask) {
        {
            let mut tracks = self.tracks.lock().await;
            let now = task.dispatched_at_ms;
            tracks.retain(|_, t| now - t.sent_timestamp < self.window_ms);
            tracks.insert(
                task.destination.clone(),
                ShipmentTrack {
                    shipment_id: task.correlation_id,
                    queue_id: task.task_id,
                    sent_timestamp: now,
                },
            );
            if let Err(e) = self.track_store.save(&tracks) {
                warn!(kind = ?e.kind(), error = %e, "failed to persist shipment tracks");
            }
        }

        let mut recent = self.recent.lock().await;
        if !recent.contains(&task.destination) {
            recent.push_front(task.destination.clone());
            recent.truncate(self.max_recent);
            if let Err(e) = self.recent_store.save(&recent) {
                warn!(kind = ?e.kind(), error = %e, "failed to persist recent numbers");
            }
        }
    }

    /// Tracking record for `address` if it was sent within the correlation window.
    pub async fn find_related(&self, address: &str, now_ms: i64) -> Option<ShipmentTrack> {
        let tracks = self.tracks.lock().await;
        tracks
            .get(address)
            .filter(|t| now_ms - t.sent_timestamp < self.window_ms)
            .cloned()
    }

    pub async fn is_recent(&self, address: &str) -> bool {
        self.recent.lock().await.iter().any(|n| n == address)
    }

    /// Newest first.
    pub async fn recent(&self) -> Vec<String> {
        self.recent.lock().await.iter().cloned().collect()
    }
}
