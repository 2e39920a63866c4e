//! Inbound reply records queued for the coordinator.

use serde::{Deserialize, Serialize};

use super::ids::{CorrelationId, TaskId};

/// Classification tag of an inbound reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyType {
    PinConfirmation,
    OptOut,
    DeliveryConfirmation,
    RescheduleRequest,
    Complaint,
    GeneralInquiry,
    Unknown,
}

impl ReplyType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplyType::PinConfirmation => "pin_confirmation",
            ReplyType::OptOut => "opt_out",
            ReplyType::DeliveryConfirmation => "delivery_confirmation",
            ReplyType::RescheduleRequest => "reschedule_request",
            ReplyType::Complaint => "complaint",
            ReplyType::GeneralInquiry => "general_inquiry",
            ReplyType::Unknown => "unknown",
        }
    }
}

/// Metadata of the gateway device that received the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(rename = "android_version")]
    pub platform_version: String,
    pub app_version: String,
    pub device_id: String,
}

/// One inbound reply. Persisted until the coordinator accepts the batch holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub phone_from: String,
    pub phone_to: String,
    pub message: String,
    pub received_timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipment_id: Option<CorrelationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_queue_id: Option<TaskId>,
    pub reply_type: ReplyType,
    pub device_info: DeviceInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device() -> DeviceInfo {
        DeviceInfo {
            platform_version: "14".into(),
            app_version: "1.0.0".into(),
            device_id: "dev-1".into(),
        }
    }

    #[test]
    fn uncorrelated_reply_omits_dispatch_context() {
        let record = ReplyRecord {
            phone_from: "+381600000001".into(),
            phone_to: "+381600000099".into(),
            message: "when?".into(),
            received_timestamp: 5,
            shipment_id: None,
            original_queue_id: None,
            reply_type: ReplyType::GeneralInquiry,
            device_info: device(),
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "phone_from": "+381600000001",
                "phone_to": "+381600000099",
                "message": "when?",
                "received_timestamp": 5,
                "reply_type": "general_inquiry",
                "device_info": {"android_version": "14", "app_version": "1.0.0", "device_id": "dev-1"}
            })
        );
    }

    #[test]
    fn correlated_reply_survives_persistence() {
        let record = ReplyRecord {
            phone_from: "+381600000001".into(),
            phone_to: "+381600000099".into(),
            message: "PIN 1234".into(),
            received_timestamp: 5,
            shipment_id: Some(CorrelationId::new(100)),
            original_queue_id: Some(TaskId::new(7)),
            reply_type: ReplyType::PinConfirmation,
            device_info: device(),
        };
        let stored = serde_json::to_string(&record).unwrap();
        assert!(stored.contains(r#""shipment_id":100"#));
        assert!(stored.contains(r#""original_queue_id":7"#));
        let loaded: ReplyRecord = serde_json::from_str(&stored).unwrap();
        assert_eq!(loaded, record);
    }
}
