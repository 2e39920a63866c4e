//! KeepAlive port - wake lock 相当のリソース
//!
//! ゲートウェイ起動時に acquire、shutdown 時に release されます。

pub trait KeepAlive: Send + Sync {
    fn acquire(&self);
    fn release(&self);
}

/// 何もしない KeepAlive（デフォルト）
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKeepAlive;

impl KeepAlive for NoopKeepAlive {
    fn acquire(&self) {}
    fn release(&self) {}
}
