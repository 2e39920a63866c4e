//! Domain identifiers (strongly-typed IDs).
//!
//! コーディネータから届く ID は 2 種類あります。
//! - `queue_id`: poll セッション内だけで有効な短命の整数（TaskId）
//! - `shipment_id`: サーバ側で払い出される長命の整数（CorrelationId）
//!
//! どちらも wire 上は素の整数なので、`Id<T>` は `i64` を包み、
//! Phantom type のマーカーでコンパイル時に取り違えを防ぎます。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"queue-", "shipment-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// JSON 上は数値そのもの（`7`）としてシリアライズされます。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: i64,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

impl<T: IdMarker> From<i64> for Id<T> {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// コーディネータのキュー枠（queue_id）のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueSlot {}

impl IdMarker for QueueSlot {
    fn prefix() -> &'static str {
        "queue-"
    }
}

/// 配送（shipment_id）のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shipment {}

impl IdMarker for Shipment {
    fn prefix() -> &'static str {
        "shipment-"
    }
}

/// Identifier of a send task, scoped to the poll session. Values are reused.
pub type TaskId = Id<QueueSlot>;

/// Long-lived, server-assigned id used to correlate replies with shipments.
pub type CorrelationId = Id<Shipment>;
