//! Reply intake.
//!
//! 受信 SMS を返信レコードに変換して ReplyQueue に積みます。
//! 1. 関連判定（RelevanceFilter）
//! 2. 分類（ReplyClassifier、差し替え可能なポリシー）
//! 3. 直近の配送との相関付け（ShipmentTracker）

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::activity::ActivityLog;
use super::reply_queue::ReplyQueue;
use super::stats::StatsRecorder;
use super::tracking::ShipmentTracker;
use crate::domain::{DeviceInfo, ReplyRecord, ReplyType};
use crate::ports::{IdGenerator, Store};

const RELEVANT_KEYWORDS: [&str; 8] = [
    "PIN",
    "STOP",
    "DELIVERED",
    "RECEIVED",
    "RESCHEDULE",
    "DELAY",
    "SHIPMENT",
    "PACKAGE",
];

/// Which inbound messages become reply records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceFilter {
    /// Every inbound message.
    #[default]
    AcceptAll,
    /// Messages containing a shipment keyword, or from a recently contacted number.
    KeywordOrRecent,
}

impl RelevanceFilter {
    pub fn is_relevant(self, body: &str, origin_is_recent: bool) -> bool {
        match self {
            RelevanceFilter::AcceptAll => true,
            RelevanceFilter::KeywordOrRecent => {
                if origin_is_recent {
                    return true;
                }
                let upper = body.to_uppercase();
                RELEVANT_KEYWORDS.iter().any(|k| upper.contains(k))
            }
        }
    }
}

pub trait ReplyClassifier: Send + Sync {
    fn classify(&self, body: &str) -> ReplyType;
}

/// Keyword rules, checked in order; the first match wins.
///
/// キーワードは部分一致（"STOPPED" も opt-out、"weekend" も "END" に当たる）。
pub struct KeywordClassifier {
    pin: Regex,
    rules: Vec<(ReplyType, Regex)>,
}

impl KeywordClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        let rules = [
            (ReplyType::OptOut, "STOP|UNSUBSCRIBE|CANCEL|QUIT|END"),
            (ReplyType::DeliveryConfirmation, "DELIVERED|RECEIVED|GOT IT|COLLECTED|PICKED UP"),
            (ReplyType::RescheduleRequest, "RESCHEDULE|POSTPONE|DELAY|LATER|TOMORROW"),
            (ReplyType::Complaint, "PROBLEM|ISSUE|WRONG|ERROR|MISTAKE|COMPLAINT"),
            (ReplyType::GeneralInquiry, r"\?|WHEN|WHERE|HOW|WHAT|WHY"),
        ]
        .into_iter()
        .map(|(reply_type, pattern)| Ok((reply_type, case_insensitive(pattern)?)))
        .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            pin: case_insensitive(r"\bPIN:?\s*(\d{4})\b")?,
            rules,
        })
    }

    /// The 4-digit PIN in a confirmation reply.
    fn pin_code<'a>(&self, body: &'a str) -> Option<&'a str> {
        self.pin
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

impl ReplyClassifier for KeywordClassifier {
    fn classify(&self, body: &str) -> ReplyType {
        if self.pin_code(body).is_some() {
            return ReplyType::PinConfirmation;
        }
        self.rules
            .iter()
            .find(|(_, pattern)| pattern.is_match(body))
            .map(|(reply_type, _)| *reply_type)
            .unwrap_or(ReplyType::Unknown)
    }
}

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Entry point for the inbound-message collaborator.
pub struct ReplyIntake {
    queue: ReplyQueue,
    tracker: Arc<ShipmentTracker>,
    classifier: Arc<dyn ReplyClassifier>,
    relevance: RelevanceFilter,
    our_number: String,
    device: DeviceInfo,
    stats: StatsRecorder,
    activity: ActivityLog,
}

impl ReplyIntake {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: ReplyQueue,
        tracker: Arc<ShipmentTracker>,
        classifier: Arc<dyn ReplyClassifier>,
        relevance: RelevanceFilter,
        our_number: impl Into<String>,
        device: DeviceInfo,
        stats: StatsRecorder,
        activity: ActivityLog,
    ) -> Self {
        Self {
            queue,
            tracker,
            classifier,
            relevance,
            our_number: our_number.into(),
            device,
            stats,
            activity,
        }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Queue an inbound message as a reply record. Returns its classification,
    /// or `None` when the relevance filter drops it.
    pub async fn on_inbound(
        &self,
        origin: &str,
        body: &str,
        received_at_ms: i64,
    ) -> Option<ReplyType> {
        let is_recent = self.tracker.is_recent(origin).await;
        if !self.relevance.is_relevant(body, is_recent) {
            debug!(origin, "inbound message not relevant; ignored");
            return None;
        }

        let reply_type = self.classifier.classify(body);
        let related = self.tracker.find_related(origin, received_at_ms).await;
        let record = ReplyRecord {
            phone_from: origin.to_string(),
            phone_to: self.our_number.clone(),
            message: body.to_string(),
            received_timestamp: received_at_ms,
            shipment_id: related.as_ref().map(|t| t.shipment_id),
            original_queue_id: related.as_ref().map(|t| t.queue_id),
            reply_type,
            device_info: self.device.clone(),
        };

        let queued = self.queue.enqueue(record).await;
        self.stats.record_reply(reply_type).await;
        self.activity
            .record(format!(
                "Reply from {origin}: {} (queue size {queued})",
                reply_type.as_str()
            ))
            .await;
        Some(reply_type)
    }
}

/// Device id from the store, or a fresh one that is persisted for next time.
pub fn resolve_device_id(store: &dyn Store<String>, generator: &dyn IdGenerator) -> String {
    match store.load() {
        Ok(Some(id)) if !id.trim().is_empty() => return id,
        Ok(_) => {}
        Err(e) => warn!(kind = ?e.kind(), error = %e, "device id store unreadable; generating a new id"),
    }
    let id = generator.generate_device_id();
    if let Err(e) = store.save(&id) {
        warn!(kind = ?e.kind(), error = %e, "failed to persist device id");
    }
    id
}
