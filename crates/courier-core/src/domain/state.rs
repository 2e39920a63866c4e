//! Delivery state machine states.

use serde::{Deserialize, Serialize};

/// Delivery state of one in-flight task.
///
/// State transitions:
/// - Received -> DispatchPending -> Dispatched
/// - Dispatched -> Sent -> Delivered
/// - Dispatched -> Sent -> DeliveryUnconfirmed
/// - Dispatched -> SendFailed
///
/// `Received` と `DispatchPending` からも SendFailed へ落とせる
/// （sender 呼び出し前の失敗、タイムアウト掃除）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Fetched from the coordinator, registered.
    Received,

    /// `pending` report emitted, not yet handed to the sender.
    DispatchPending,

    /// Handed to the sender, waiting for the transmission result.
    Dispatched,

    /// Transmission confirmed, waiting for the delivery result.
    Sent,

    /// Transmission failed with a carrier error code.
    SendFailed,

    /// Delivery confirmed.
    Delivered,

    /// Delivery result negative, cancelled or never received.
    DeliveryUnconfirmed,
}

impl DeliveryState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryState::Delivered | DeliveryState::DeliveryUnconfirmed | DeliveryState::SendFailed
        )
    }

    /// Is `next` a legal successor of `self`?
    pub fn can_transition_to(self, next: DeliveryState) -> bool {
        use DeliveryState::*;
        matches!(
            (self, next),
            (Received, DispatchPending)
                | (DispatchPending, Dispatched)
                | (Dispatched, Sent)
                | (Received | DispatchPending | Dispatched, SendFailed)
                | (Sent, Delivered)
                | (Sent, DeliveryUnconfirmed)
        )
    }
}
