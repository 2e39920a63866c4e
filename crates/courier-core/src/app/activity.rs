//! Operator-facing activity log.
//!
//! 直近 N 行だけを新しい順に保持し、tick ごとと shutdown 時に保存します。
//! `logging_enabled = false` のときは tracing にだけ流して保持しません。

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::ports::{Clock, Store, load_or_default};

#[derive(Clone)]
pub struct ActivityLog {
    inner: Arc<ActivityInner>,
}

struct ActivityInner {
    lines: Mutex<VecDeque<String>>,
    max_lines: usize,
    enabled: bool,
    store: Arc<dyn Store<VecDeque<String>>>,
    clock: Arc<dyn Clock>,
}

impl ActivityLog {
    pub fn open(
        store: Arc<dyn Store<VecDeque<String>>>,
        clock: Arc<dyn Clock>,
        max_lines: usize,
        enabled: bool,
    ) -> Self {
        let mut lines = load_or_default(store.as_ref(), "activity log");
        lines.truncate(max_lines);
        Self {
            inner: Arc::new(ActivityInner {
                lines: Mutex::new(lines),
                max_lines,
                enabled,
                store,
                clock,
            }),
        }
    }

    pub async fn record(&self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "courier::activity", "{message}");
        if !self.inner.enabled {
            return;
        }
        let line = format!("{} - {message}", self.inner.clock.now().format("%H:%M:%S"));
        let mut lines = self.inner.lines.lock().await;
        lines.push_front(line);
        lines.truncate(self.inner.max_lines);
    }

    pub async fn persist(&self) {
        let lines = self.inner.lines.lock().await;
        if let Err(e) = self.inner.store.save(&lines) {
            warn!(kind = ?e.kind(), error = %e, "failed to persist activity log");
        }
    }

    /// Newest first.
    pub async fn lines(&self) -> Vec<String> {
        self.inner.lines.lock().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::MemoryStore;
    use crate::ports::FixedClock;

    fn log(store: Arc<MemoryStore<VecDeque<String>>>, max: usize, enabled: bool) -> ActivityLog {
        // 1970-01-01 01:02:03 UTC
        let clock = Arc::new(FixedClock::from_millis(3_723_000));
        ActivityLog::open(store, clock, max, enabled)
    }

    #[tokio::test]
    async fn keeps_newest_lines_first_up_to_the_cap() {
        let log = log(Arc::new(MemoryStore::new()), 2, true);
        log.record("one").await;
        log.record("two").await;
        log.record("three").await;

        assert_eq!(log.lines().await, vec!["01:02:03 - three", "01:02:03 - two"]);
    }

    #[tokio::test]
    async fn disabled_log_keeps_nothing() {
        let log = log(Arc::new(MemoryStore::new()), 10, false);
        log.record("ignored").await;
        assert!(log.lines().await.is_empty());
    }

    #[tokio::test]
    async fn persisted_lines_are_reloaded() {
        let store = Arc::new(MemoryStore::new());
        let first = log(store.clone(), 10, true);
        first.record("started").await;
        first.persist().await;

        let second = log(store, 10, true);
        assert_eq!(second.lines().await, vec!["01:02:03 - started"]);
    }
}
