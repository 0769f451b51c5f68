use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WalletEventKind {
    RequestStateChanged,
    ManualReviewNeeded,
    CreditDeductionFailed,
    BenefitTypeConverted,
}

/// Queued notification emitted toward the messaging/ticketing sink.
/// Consumers are out of process; publishing is fire-and-continue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEvent {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub kind: WalletEventKind,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl WalletEvent {
    pub fn new(wallet_id: Uuid, kind: WalletEventKind, reason: impl Into<String>, payload: serde_json::Value) -> Self {
        WalletEvent {
            id: Uuid::new_v4(),
            wallet_id,
            kind,
            reason: reason.into(),
            occurred_at: Utc::now(),
            payload,
        }
    }
}
