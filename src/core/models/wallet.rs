use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalletKind {
    /// Each participant owes a fixed share; the creator withdraws once funded.
    Fair,
    /// Participants lock equal stakes and one is randomly selected to forfeit.
    Degen,
    /// Persistent multi-member wallet with ongoing contributions/withdrawals.
    Shared,
}

impl std::fmt::Display for WalletKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WalletKind::Fair => "FAIR",
            WalletKind::Degen => "DEGEN",
            WalletKind::Shared => "SHARED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalletStatus {
    Created,
    Funding,
    Locked,
    RouletteComplete,
    Withdrawing,
    Closed,
}

impl std::fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WalletStatus::Created => "CREATED",
            WalletStatus::Funding => "FUNDING",
            WalletStatus::Locked => "LOCKED",
            WalletStatus::RouletteComplete => "ROULETTE_COMPLETE",
            WalletStatus::Withdrawing => "WITHDRAWING",
            WalletStatus::Closed => "CLOSED",
        };
        write!(f, "{}", s)
    }
}

/// Participant status transitions are monotonic: once a participant
/// reaches `Locked` or `Paid` it never regresses to `Pending`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParticipantStatus {
    Pending,
    Locked,
    Paid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub amount_owed: u64,
    pub amount_paid: u64,
    pub status: ParticipantStatus,
    /// Transaction signature of the participant's funding transfer.
    pub last_transfer_ref: Option<String>,
}

impl Participant {
    pub fn new(user_id: impl Into<String>, amount_owed: u64) -> Self {
        Participant {
            user_id: user_id.into(),
            amount_owed,
            amount_paid: 0,
            status: ParticipantStatus::Pending,
            last_transfer_ref: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ParticipantStatus::Pending
    }

    pub fn is_locked(&self) -> bool {
        self.status == ParticipantStatus::Locked
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.status, ParticipantStatus::Locked | ParticipantStatus::Paid)
    }
}

/// Aggregate root for one pooled on-chain wallet. The aggregate is the
/// source of truth for participants and status; the on-chain balance is
/// the source of truth for money.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SplitWallet {
    pub id: Uuid,
    pub source_bill_id: String,
    pub kind: WalletKind,
    pub creator_id: String,
    pub on_chain_address: String,
    pub public_key: String,
    pub status: WalletStatus,
    pub total_amount_due: u64,
    pub collected_amount: u64,
    pub participants: Vec<Participant>,
    pub roulette_audit: Option<super::roulette::RouletteAudit>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SplitWallet {
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn participant_mut(&mut self, user_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user_id == user_id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.participant(user_id).is_some()
    }

    pub fn is_creator(&self, user_id: &str) -> bool {
        self.creator_id == user_id
    }

    pub fn all_locked(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(Participant::is_locked)
    }

    pub fn all_settled(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(Participant::is_settled)
    }

    /// Sum of everything participants have paid in so far.
    pub fn paid_sum(&self) -> u64 {
        self.participants.iter().map(|p| p.amount_paid).sum()
    }

    pub fn recorded_loser(&self) -> Option<&str> {
        self.roulette_audit
            .as_ref()
            .map(|a| a.selected_loser_id.as_str())
    }
}

/// Funding progress as shown to display collaborators. Overpayment must
/// never surface as more than 100% or a negative remainder.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Completion {
    pub collected_amount: u64,
    pub total_amount_due: u64,
    pub percentage: f64,
    pub remaining: u64,
}

impl Completion {
    pub fn from_amounts(collected: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            (collected as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        };
        Completion {
            collected_amount: collected,
            total_amount_due: total,
            percentage,
            remaining: total.saturating_sub(collected),
        }
    }
}
