use crate::core::errors::EngineError;
use crate::core::models::custody::KeyCustodyRecord;
use crate::core::models::read_model::WalletSummary;
use crate::core::models::wallet::{SplitWallet, WalletKind, WalletStatus};
use async_trait::async_trait;
use uuid::Uuid;

/// Authoritative store for the wallet aggregate and its custody record.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn save_wallet(&self, wallet: SplitWallet) -> Result<(), EngineError>;
    async fn get_wallet(&self, wallet_id: Uuid) -> Result<Option<SplitWallet>, EngineError>;
    async fn get_wallet_by_bill(
        &self,
        bill_id: &str,
        kind: WalletKind,
    ) -> Result<Option<SplitWallet>, EngineError>;
    /// Used only to roll back a creation whose custody persist failed.
    async fn delete_wallet(&self, wallet_id: Uuid) -> Result<(), EngineError>;
    /// Conditional replace: succeeds only while the stored wallet is
    /// still in `expected` status. Single-writer transitions (roulette,
    /// winner payout, close) go through here.
    async fn update_wallet_if_status(
        &self,
        wallet: SplitWallet,
        expected: WalletStatus,
    ) -> Result<bool, EngineError>;
    async fn save_custody_record(&self, record: KeyCustodyRecord) -> Result<(), EngineError>;
    async fn get_custody_record(
        &self,
        wallet_id: Uuid,
    ) -> Result<Option<KeyCustodyRecord>, EngineError>;
}

/// Denormalized read-model mirror. Writes here are best-effort; the
/// aggregate can re-derive any summary at any time.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    async fn save_summary(&self, summary: WalletSummary) -> Result<(), EngineError>;
    async fn get_summary(&self, wallet_id: Uuid) -> Result<Option<WalletSummary>, EngineError>;
}

pub mod in_memory;
