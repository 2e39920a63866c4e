//! MessageSender port - キャリア送信プリミティブ
//!
//! sender は宛先と本文を受け取って送信を「投入」するだけで、
//! 結果は後から SignalSink 経由で非同期に返ってきます。
//! 送信結果（transmission）と配達結果（delivery）は別々の信号ですが、
//! 1 本のチャネルに流れ、到着順に状態機械が処理します。

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::{SendError, SendErrorCode, TaskId};

/// Outcome of handing the message to the carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionResult {
    Sent,
    Failed(SendErrorCode),
}

/// Outcome reported by the recipient's network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered,
    /// Negative or cancelled delivery report.
    Unconfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendSignal {
    Transmission {
        task_id: TaskId,
        result: TransmissionResult,
    },
    Delivery {
        task_id: TaskId,
        result: DeliveryResult,
    },
}

impl SendSignal {
    pub fn task_id(&self) -> TaskId {
        match self {
            SendSignal::Transmission { task_id, .. } | SendSignal::Delivery { task_id, .. } => {
                *task_id
            }
        }
    }
}

/// Callback handle given to the sender with every request.
///
/// 受信側（状態機械）が止まった後の信号は捨てます。
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: mpsc::UnboundedSender<SendSignal>,
}

impl SignalSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SendSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn transmission(&self, task_id: TaskId, result: TransmissionResult) {
        self.emit(SendSignal::Transmission { task_id, result });
    }

    pub fn delivery(&self, task_id: TaskId, result: DeliveryResult) {
        self.emit(SendSignal::Delivery { task_id, result });
    }

    pub fn emit(&self, signal: SendSignal) {
        if self.tx.send(signal).is_err() {
            debug!(task_id = %signal.task_id(), "signal receiver closed; dropping signal");
        }
    }
}

/// One message handed to the sender.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub task_id: TaskId,
    pub destination: String,
    pub body: String,
    pub signals: SignalSink,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Submit the message. Returning `Err` concludes the task as `UNKNOWN_ERROR`.
    async fn send(&self, request: SendRequest) -> Result<(), SendError>;
}
