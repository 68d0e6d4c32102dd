use crate::core::errors::EngineError;
use crate::core::models::read_model::WalletSummary;
use crate::core::models::wallet::SplitWallet;
use crate::infrastructure::ledger::LedgerClient;
use crate::infrastructure::storage::{MirrorStore, WalletStore};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Keeps the denormalized read-model in step with the wallet aggregate.
/// Mirror writes are fire-and-forget: the aggregate is the source of
/// truth and can re-derive the mirror at any time, so a failed write is
/// logged and never blocks the funding or withdrawal path.
#[derive(Clone)]
pub struct DataSynchronizer {
    store: Arc<dyn WalletStore>,
    mirror: Arc<dyn MirrorStore>,
    ledger: Arc<dyn LedgerClient>,
    pending: Arc<Mutex<HashSet<Uuid>>>,
}

impl DataSynchronizer {
    pub fn new(
        store: Arc<dyn WalletStore>,
        mirror: Arc<dyn MirrorStore>,
        ledger: Arc<dyn LedgerClient>,
    ) -> Self {
        DataSynchronizer {
            store,
            mirror,
            ledger,
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Project the wallet into the mirror without blocking the caller.
    pub fn spawn_sync(&self, wallet: SplitWallet) {
        let mirror = Arc::clone(&self.mirror);
        tokio::spawn(async move {
            let wallet_id = wallet.id;
            if let Err(err) = mirror.save_summary(WalletSummary::project(&wallet)).await {
                warn!(%wallet_id, %err, "mirror write failed");
            }
        });
    }

    /// Synchronous projection, used by read-repair and the drain loop.
    pub async fn sync_now(&self, wallet: &SplitWallet) -> Result<(), EngineError> {
        self.mirror
            .save_summary(WalletSummary::project(wallet))
            .await
            .map_err(|err| EngineError::Sync(err.to_string()))
    }

    /// Read the wallet summary, repairing the mirror when it is missing
    /// or visibly behind the aggregate.
    pub async fn summary(&self, wallet_id: Uuid) -> Result<WalletSummary, EngineError> {
        let wallet = self
            .store
            .get_wallet(wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet_id)))?;

        let mirrored = self.mirror.get_summary(wallet_id).await.unwrap_or(None);
        let stale = match &mirrored {
            Some(summary) => {
                summary.collected_amount != wallet.paid_sum() || summary.status != wallet.status
            }
            None => true,
        };

        if stale {
            debug!(%wallet_id, "mirror stale, re-projecting");
            let fresh = WalletSummary::project(&wallet);
            if let Err(err) = self.mirror.save_summary(fresh.clone()).await {
                warn!(%wallet_id, %err, "mirror repair failed");
            }
            return Ok(fresh);
        }

        Ok(mirrored.expect("checked above"))
    }

    /// Remember a wallet whose aggregate persist failed so background
    /// reconciliation can retry it.
    pub async fn enqueue(&self, wallet_id: Uuid) {
        self.pending.lock().await.insert(wallet_id);
        info!(%wallet_id, "queued for reconciliation");
    }

    /// Drain the reconciliation queue. For each wallet the aggregate is
    /// re-read, its collected amount reconciled against the on-chain
    /// balance (the larger wins, since on-chain truth can lag), and both
    /// stores are rewritten. Returns how many wallets were reconciled.
    pub async fn run_pending(&self) -> usize {
        let queued: Vec<Uuid> = {
            let mut pending = self.pending.lock().await;
            pending.drain().collect()
        };

        let mut reconciled = 0;
        for wallet_id in queued {
            match self.reconcile_one(wallet_id).await {
                Ok(()) => reconciled += 1,
                Err(err) => {
                    warn!(%wallet_id, %err, "reconciliation failed, requeueing");
                    self.pending.lock().await.insert(wallet_id);
                }
            }
        }
        reconciled
    }

    async fn reconcile_one(&self, wallet_id: Uuid) -> Result<(), EngineError> {
        let mut wallet = self
            .store
            .get_wallet(wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet_id)))?;

        let on_chain = self.ledger.get_balance(&wallet.on_chain_address).await?;
        wallet.collected_amount = wallet.paid_sum().max(on_chain);

        self.store.save_wallet(wallet.clone()).await?;
        self.sync_now(&wallet).await
    }
}
