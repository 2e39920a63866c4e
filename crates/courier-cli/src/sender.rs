use async_trait::async_trait;
use courier_core::domain::SendError;
use courier_core::ports::{DeliveryResult, MessageSender, SendRequest, TransmissionResult};
use tracing::info;

/// キャリアを使わない sender
///
/// 送信内容をログに出し、送信成功と配達成功の信号をそのまま返します。
pub struct DryRunSender;

#[async_trait]
impl MessageSender for DryRunSender {
    async fn send(&self, request: SendRequest) -> Result<(), SendError> {
        info!(
            task_id = %request.task_id,
            destination = %request.destination,
            chars = request.body.chars().count(),
            "dry-run send"
        );
        request
            .signals
            .transmission(request.task_id, TransmissionResult::Sent);
        request
            .signals
            .delivery(request.task_id, DeliveryResult::Delivered);
        Ok(())
    }
}
