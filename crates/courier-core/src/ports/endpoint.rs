//! RemoteEndpoint port - コーディネータとの HTTP やり取り
//!
//! 3 つの操作を持ちます。
//! - fetch_task: 1 tick につき 1 件のタスクを取得
//! - report_statuses: ステータスレポートの送信
//! - submit_replies: 受信返信のバッチ送信
//!
//! 成功以外はすべて `EndpointError` で返し、呼び出し側がログを出して回復します。

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::{EndpointError, ReplyRecord, StatusReport, TaskPayload};

/// Result of one task fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Task(TaskPayload),
    /// HTTP 204 (or an empty 200 body).
    Empty,
}

#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    async fn fetch_task(&self) -> Result<FetchOutcome, EndpointError>;

    /// Success means HTTP 200. An empty slice is a no-op.
    async fn report_statuses(&self, reports: &[StatusReport]) -> Result<(), EndpointError>;

    /// Success means HTTP 200. An empty slice is a no-op.
    async fn submit_replies(&self, replies: &[ReplyRecord]) -> Result<(), EndpointError>;
}

/// Batch body: a single object for one item, otherwise an ordered array.
pub fn encode_batch<T: Serialize>(items: &[T]) -> Result<Value, serde_json::Error> {
    match items {
        [single] => serde_json::to_value(single),
        many => serde_json::to_value(many),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Item {
        n: u32,
    }

    #[test]
    fn single_item_is_sent_as_object() {
        let body = encode_batch(&[Item { n: 1 }]).unwrap();
        assert_eq!(body, json!({"n": 1}));
    }

    #[test]
    fn several_items_are_sent_as_ordered_array() {
        let body = encode_batch(&[Item { n: 1 }, Item { n: 2 }, Item { n: 3 }]).unwrap();
        assert_eq!(body, json!([{"n": 1}, {"n": 2}, {"n": 3}]));
    }
}
