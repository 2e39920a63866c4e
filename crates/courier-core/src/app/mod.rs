//! App - アプリケーション層
//!
//! ports を組み合わせてゲートウェイのロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Poller**: 1 tick ごとにタスクを 1 件取得して状態機械へ渡す
//! - **DeliveryStateMachine**: 送信結果・配達結果の信号でタスクを進める
//! - **StatusBatcher**: ステータスレポートをまとめて送る（終端レポートは即時）
//! - **ReplyQueue**: 永続化された返信キュー（バッチ送信、失敗時は先頭へ戻す）
//! - **ReplyIntake**: 受信返信の関連判定・分類・相関付け
//! - **Gateway**: 上記のワイヤリングとタイマーループ、graceful shutdown

pub mod activity;
pub mod batcher;
pub mod delivery;
pub mod gateway;
pub mod intake;
pub mod poller;
pub mod registry;
pub mod reply_queue;
pub mod stats;
pub mod tracking;

pub use self::activity::ActivityLog;
pub use self::batcher::{ReportSink, StatusBatcher};
pub use self::delivery::DeliveryStateMachine;
pub use self::gateway::{BuildError, Gateway, GatewayBuilder, GatewayHandle, StateStores};
pub use self::intake::{KeywordClassifier, RelevanceFilter, ReplyClassifier, ReplyIntake};
pub use self::poller::{PollOutcome, Poller};
pub use self::registry::{DeliveryRecord, TaskRegistry};
pub use self::reply_queue::ReplyQueue;
pub use self::stats::{GatewayStats, StatsRecorder};
pub use self::tracking::{ShipmentTrack, ShipmentTracker};

/// Result of one flush attempt (status batcher or reply queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing pending; no network call was made.
    Idle,
    /// Another flush is in flight.
    Busy,
    /// The endpoint accepted this many items.
    Delivered(usize),
    /// The send failed and this many items went back to the pending set.
    Requeued(usize),
}
