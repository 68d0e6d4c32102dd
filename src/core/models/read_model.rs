use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::wallet::{Completion, SplitWallet, WalletKind, WalletStatus};

/// Denormalized wallet projection consumed by display and reporting
/// collaborators. Derived from the aggregate at any time; a stale mirror
/// is repaired, never trusted over the aggregate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletSummary {
    pub wallet_id: Uuid,
    pub source_bill_id: String,
    pub kind: WalletKind,
    pub status: WalletStatus,
    pub collected_amount: u64,
    pub total_amount_due: u64,
    pub percentage: f64,
    pub remaining: u64,
    pub participant_count: usize,
    pub settled_count: usize,
    pub loser_id: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl WalletSummary {
    pub fn project(wallet: &SplitWallet) -> Self {
        let completion = Completion::from_amounts(wallet.paid_sum(), wallet.total_amount_due);
        WalletSummary {
            wallet_id: wallet.id,
            source_bill_id: wallet.source_bill_id.clone(),
            kind: wallet.kind,
            status: wallet.status,
            collected_amount: completion.collected_amount,
            total_amount_due: completion.total_amount_due,
            percentage: completion.percentage,
            remaining: completion.remaining,
            participant_count: wallet.participants.len(),
            settled_count: wallet.participants.iter().filter(|p| p.is_settled()).count(),
            loser_id: wallet.recorded_loser().map(String::from),
            updated_at: Utc::now(),
        }
    }
}
