//! Gateway - 構築（builder）と実行（タイマーループ + graceful shutdown）
//!
//! # Fail-fast 設計
//! - build() 時に設定を検証し、sender 未設定や HTTP クライアント構築失敗はここで返す
//! - 起動後はどの失敗も「ログを出して続行」
//!
//! # タスク構成
//! - main loop: probe タイマー（掃除 + poll）と status flush タイマー
//! - signal loop: sender からの送信結果・配達結果
//! - reply timer: 返信キューの定期 flush
//!
//! ネットワーク I/O は毎回 spawn したタスクで行い、タイマーループを止めません。

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use super::activity::ActivityLog;
use super::batcher::StatusBatcher;
use super::delivery::DeliveryStateMachine;
use super::intake::{KeywordClassifier, ReplyClassifier, ReplyIntake, resolve_device_id};
use super::poller::Poller;
use super::reply_queue::ReplyQueue;
use super::stats::{GatewayStats, StatsRecorder};
use super::tracking::{ShipmentTracker, TrackMap};
use super::FlushOutcome;
use crate::config::GatewayConfig;
use crate::domain::{ConfigError, DeviceInfo, EndpointError, ReplyRecord};
use crate::impls::{HttpEndpoint, JsonFileStore, MemoryStore};
use crate::ports::{
    Clock, KeepAlive, MessageSender, NoopKeepAlive, RemoteEndpoint, SendSignal, SignalSink, Store,
    SystemClock, UlidGenerator,
};

/// Durable stores for everything the gateway persists.
#[derive(Clone)]
pub struct StateStores {
    pub replies: Arc<dyn Store<VecDeque<ReplyRecord>>>,
    pub stats: Arc<dyn Store<GatewayStats>>,
    pub tracks: Arc<dyn Store<TrackMap>>,
    pub recent: Arc<dyn Store<VecDeque<String>>>,
    pub activity: Arc<dyn Store<VecDeque<String>>>,
    pub device: Arc<dyn Store<String>>,
}

impl StateStores {
    /// One JSON file per store under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            replies: Arc::new(JsonFileStore::new(dir.join("reply_queue.json"))),
            stats: Arc::new(JsonFileStore::new(dir.join("stats.json"))),
            tracks: Arc::new(JsonFileStore::new(dir.join("shipment_tracks.json"))),
            recent: Arc::new(JsonFileStore::new(dir.join("recent_numbers.json"))),
            activity: Arc::new(JsonFileStore::new(dir.join("activity_log.json"))),
            device: Arc::new(JsonFileStore::new(dir.join("device_id.json"))),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            replies: Arc::new(MemoryStore::new()),
            stats: Arc::new(MemoryStore::new()),
            tracks: Arc::new(MemoryStore::new()),
            recent: Arc::new(MemoryStore::new()),
            activity: Arc::new(MemoryStore::new()),
            device: Arc::new(MemoryStore::new()),
        }
    }
}

/// BuildError はゲートウェイ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no message sender configured")]
    MissingSender,

    #[error("failed to create endpoint client: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("invalid classifier pattern: {0}")]
    Classifier(#[from] regex::Error),
}

/// GatewayBuilder はゲートウェイを構築
///
/// # 使用例
/// ```ignore
/// let gateway = Gateway::builder(config)
///     .sender(Arc::new(MySender))
///     .build()?;
/// let handle = gateway.start().await;
/// ```
pub struct GatewayBuilder {
    config: GatewayConfig,
    endpoint: Option<Arc<dyn RemoteEndpoint>>,
    sender: Option<Arc<dyn MessageSender>>,
    clock: Arc<dyn Clock>,
    classifier: Option<Arc<dyn ReplyClassifier>>,
    keep_alive: Arc<dyn KeepAlive>,
    stores: Option<StateStores>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            endpoint: None,
            sender: None,
            clock: Arc::new(SystemClock),
            classifier: None,
            keep_alive: Arc::new(NoopKeepAlive),
            stores: None,
        }
    }

    /// Replace the HTTP endpoint built from the configuration.
    pub fn endpoint(mut self, endpoint: Arc<dyn RemoteEndpoint>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn sender(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn ReplyClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn keep_alive(mut self, keep_alive: Arc<dyn KeepAlive>) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Replace the JSON files under `state_dir`.
    pub fn stores(mut self, stores: StateStores) -> Self {
        self.stores = Some(stores);
        self
    }

    pub fn build(self) -> Result<Gateway, BuildError> {
        let config = self.config;
        config.validate()?;
        let sender = self.sender.ok_or(BuildError::MissingSender)?;
        let endpoint: Arc<dyn RemoteEndpoint> = match self.endpoint {
            Some(endpoint) => endpoint,
            None => Arc::new(HttpEndpoint::from_config(&config)?),
        };
        let classifier: Arc<dyn ReplyClassifier> = match self.classifier {
            Some(classifier) => classifier,
            None => Arc::new(KeywordClassifier::new()?),
        };
        let stores = self
            .stores
            .unwrap_or_else(|| StateStores::in_dir(&config.state_dir));
        let clock = self.clock;

        let stats = StatsRecorder::open(stores.stats.clone());
        let activity = ActivityLog::open(
            stores.activity.clone(),
            clock.clone(),
            config.max_log_entries,
            config.logging_enabled,
        );
        let batcher = StatusBatcher::new(endpoint.clone());
        let (machine, signals) = DeliveryStateMachine::new(
            sender,
            Arc::new(batcher.clone()),
            stats.clone(),
            activity.clone(),
            clock.clone(),
            config.delivery_timeout(),
        );
        let machine = Arc::new(machine);
        let tracker = Arc::new(ShipmentTracker::open(
            stores.tracks.clone(),
            stores.recent.clone(),
            config.max_tracked_numbers,
            config.correlation_window(),
        ));
        let poller = Arc::new(Poller::new(
            endpoint.clone(),
            machine.clone(),
            tracker.clone(),
            activity.clone(),
            clock.clone(),
        ));
        let reply_queue = ReplyQueue::open(
            stores.replies.clone(),
            endpoint,
            config.reply_batch_size(),
            config.reply_flush_interval(),
            stats.clone(),
            clock.clone(),
        );
        let device = DeviceInfo {
            platform_version: config.platform_version.clone(),
            app_version: config.app_version.clone(),
            device_id: resolve_device_id(stores.device.as_ref(), &UlidGenerator::new(clock)),
        };
        let intake = Arc::new(ReplyIntake::new(
            reply_queue.clone(),
            tracker,
            classifier,
            config.relevance_filter,
            config.our_phone_number.clone(),
            device,
            stats.clone(),
            activity.clone(),
        ));

        Ok(Gateway {
            config,
            poller,
            machine,
            signals,
            batcher,
            reply_queue,
            intake,
            stats,
            activity,
            keep_alive: self.keep_alive,
        })
    }
}

/// A fully wired gateway that has not been started yet.
pub struct Gateway {
    config: GatewayConfig,
    poller: Arc<Poller>,
    machine: Arc<DeliveryStateMachine>,
    signals: UnboundedReceiver<SendSignal>,
    batcher: StatusBatcher,
    reply_queue: ReplyQueue,
    intake: Arc<ReplyIntake>,
    stats: StatsRecorder,
    activity: ActivityLog,
    keep_alive: Arc<dyn KeepAlive>,
}

impl Gateway {
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    /// Sink the sender uses to report transmission and delivery results.
    pub fn signal_sink(&self) -> SignalSink {
        self.machine.signal_sink()
    }

    pub async fn start(self) -> GatewayHandle {
        self.keep_alive.acquire();
        self.activity.record("Gateway started").await;
        info!(
            probe_interval = ?self.config.probe_interval(),
            reply_interval = ?self.config.reply_flush_interval(),
            "gateway started"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let main_loop = tokio::spawn(run_main_loop(
            self.poller.clone(),
            self.machine.clone(),
            self.batcher.clone(),
            self.activity.clone(),
            self.config.probe_interval(),
            self.config.status_flush_interval(),
            shutdown_rx.clone(),
        ));
        let signal_loop = tokio::spawn(
            self.machine
                .clone()
                .run_signals(self.signals, shutdown_rx.clone()),
        );
        let reply_timer = self.reply_queue.spawn_timer(shutdown_rx);

        GatewayHandle {
            shutdown_tx,
            joins: vec![main_loop, signal_loop, reply_timer],
            config: self.config,
            machine: self.machine,
            batcher: self.batcher,
            reply_queue: self.reply_queue,
            intake: self.intake,
            stats: self.stats,
            activity: self.activity,
            keep_alive: self.keep_alive,
        }
    }
}

/// Running gateway.
/// - `shutdown()` でタイマーを止め、最後の status flush をしてから keep-alive を解放する
/// - 実行中のネットワーク処理は強制キャンセルしない
pub struct GatewayHandle {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    config: GatewayConfig,
    machine: Arc<DeliveryStateMachine>,
    batcher: StatusBatcher,
    reply_queue: ReplyQueue,
    intake: Arc<ReplyIntake>,
    stats: StatsRecorder,
    activity: ActivityLog,
    keep_alive: Arc<dyn KeepAlive>,
}

impl GatewayHandle {
    pub fn intake(&self) -> Arc<ReplyIntake> {
        self.intake.clone()
    }

    pub fn reply_queue(&self) -> &ReplyQueue {
        &self.reply_queue
    }

    pub fn signal_sink(&self) -> SignalSink {
        self.machine.signal_sink()
    }

    pub async fn stats(&self) -> GatewayStats {
        self.stats.snapshot().await
    }

    pub async fn activity(&self) -> Vec<String> {
        self.activity.lines().await
    }

    /// Change the reply flush interval (clamped to the configured bounds).
    pub fn set_reply_flush_interval(&self, secs: u64) -> Duration {
        let interval = self.config.clamp_reply_interval(secs);
        self.reply_queue.set_interval(interval);
        interval
    }

    pub async fn shutdown(self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
        for join in self.joins {
            let _ = join.await;
        }

        match self.batcher.flush().await {
            FlushOutcome::Requeued(count) => {
                warn!(count, "final status flush failed; reports dropped at shutdown")
            }
            outcome => info!(?outcome, "final status flush"),
        }
        let in_flight = self.machine.in_flight().await;
        if in_flight > 0 {
            info!(in_flight, "stopping with tasks still awaiting results");
        }

        self.activity.record("Gateway stopped").await;
        self.activity.persist().await;
        self.keep_alive.release();
        info!("gateway stopped");
    }
}

async fn run_main_loop(
    poller: Arc<Poller>,
    machine: Arc<DeliveryStateMachine>,
    batcher: StatusBatcher,
    activity: ActivityLog,
    probe_every: Duration,
    flush_every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut probe = tokio::time::interval(probe_every);
    probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut flush = tokio::time::interval_at(Instant::now() + flush_every, flush_every);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

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
            _ = probe.tick() => {
                machine.evict_expired().await;
                let poller = Arc::clone(&poller);
                tokio::spawn(async move {
                    poller.tick().await;
                });
                activity.persist().await;
            }
            _ = flush.tick() => {
                let batcher = batcher.clone();
                tokio::spawn(async move {
                    batcher.flush().await;
                });
            }
        }
    }
}
