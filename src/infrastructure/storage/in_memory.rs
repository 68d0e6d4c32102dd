use crate::core::errors::EngineError;
use crate::core::models::custody::KeyCustodyRecord;
use crate::core::models::read_model::WalletSummary;
use crate::core::models::wallet::{SplitWallet, WalletKind, WalletStatus};
use crate::infrastructure::storage::{MirrorStore, WalletStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryWalletStore {
    wallets: Arc<RwLock<HashMap<Uuid, SplitWallet>>>,
    wallets_by_bill: Arc<RwLock<HashMap<(String, WalletKind), Uuid>>>,
    custody_records: Arc<RwLock<HashMap<Uuid, KeyCustodyRecord>>>,
    fail_custody_writes: Arc<RwLock<bool>>,
    fail_wallet_writes: Arc<RwLock<bool>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: make the next custody persists fail so creation
    /// rollback paths can be exercised.
    pub async fn set_fail_custody_writes(&self, fail: bool) {
        *self.fail_custody_writes.write().await = fail;
    }

    /// Test hook: make wallet persists fail so best-effort update paths
    /// can be exercised.
    pub async fn set_fail_wallet_writes(&self, fail: bool) {
        *self.fail_wallet_writes.write().await = fail;
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn save_wallet(&self, wallet: SplitWallet) -> Result<(), EngineError> {
        if *self.fail_wallet_writes.read().await {
            return Err(EngineError::Storage("wallet write unavailable".to_string()));
        }
        let mut wallets = self.wallets.write().await;
        let mut by_bill = self.wallets_by_bill.write().await;
        by_bill.insert((wallet.source_bill_id.clone(), wallet.kind), wallet.id);
        wallets.insert(wallet.id, wallet);
        Ok(())
    }

    async fn get_wallet(&self, wallet_id: Uuid) -> Result<Option<SplitWallet>, EngineError> {
        let wallets = self.wallets.read().await;
        Ok(wallets.get(&wallet_id).cloned())
    }

    async fn get_wallet_by_bill(
        &self,
        bill_id: &str,
        kind: WalletKind,
    ) -> Result<Option<SplitWallet>, EngineError> {
        let by_bill = self.wallets_by_bill.read().await;
        let wallets = self.wallets.read().await;
        Ok(by_bill
            .get(&(bill_id.to_string(), kind))
            .and_then(|id| wallets.get(id).cloned()))
    }

    async fn delete_wallet(&self, wallet_id: Uuid) -> Result<(), EngineError> {
        let mut wallets = self.wallets.write().await;
        if let Some(wallet) = wallets.remove(&wallet_id) {
            let mut by_bill = self.wallets_by_bill.write().await;
            by_bill.remove(&(wallet.source_bill_id.clone(), wallet.kind));
        }
        Ok(())
    }

    async fn update_wallet_if_status(
        &self,
        wallet: SplitWallet,
        expected: WalletStatus,
    ) -> Result<bool, EngineError> {
        if *self.fail_wallet_writes.read().await {
            return Err(EngineError::Storage("wallet write unavailable".to_string()));
        }
        let mut wallets = self.wallets.write().await;
        match wallets.get(&wallet.id) {
            Some(current) if current.status == expected => {
                wallets.insert(wallet.id, wallet);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(EngineError::NotFound(format!("wallet {}", wallet.id))),
        }
    }

    async fn save_custody_record(&self, record: KeyCustodyRecord) -> Result<(), EngineError> {
        if *self.fail_custody_writes.read().await {
            return Err(EngineError::Storage("custody write unavailable".to_string()));
        }
        let mut records = self.custody_records.write().await;
        records.insert(record.wallet_id, record);
        Ok(())
    }

    async fn get_custody_record(
        &self,
        wallet_id: Uuid,
    ) -> Result<Option<KeyCustodyRecord>, EngineError> {
        let records = self.custody_records.read().await;
        Ok(records.get(&wallet_id).cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryMirrorStore {
    summaries: Arc<RwLock<HashMap<Uuid, WalletSummary>>>,
    fail_writes: Arc<RwLock<bool>>,
}

impl InMemoryMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: simulate an unavailable mirror.
    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().await = fail;
    }
}

#[async_trait]
impl MirrorStore for InMemoryMirrorStore {
    async fn save_summary(&self, summary: WalletSummary) -> Result<(), EngineError> {
        if *self.fail_writes.read().await {
            return Err(EngineError::Sync("mirror unavailable".to_string()));
        }
        let mut summaries = self.summaries.write().await;
        summaries.insert(summary.wallet_id, summary);
        Ok(())
    }

    async fn get_summary(&self, wallet_id: Uuid) -> Result<Option<WalletSummary>, EngineError> {
        let summaries = self.summaries.read().await;
        Ok(summaries.get(&wallet_id).cloned())
    }
}
