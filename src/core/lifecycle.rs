use crate::core::custody::KeyCustodyService;
use crate::core::dedup::DeduplicationGuard;
use crate::core::errors::EngineError;
use crate::core::models::wallet::{
    Completion, Participant, SplitWallet, WalletKind, WalletStatus,
};
use crate::core::sync::DataSynchronizer;
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::ledger::LedgerClient;
use crate::infrastructure::logging::AuditLogger;
use crate::infrastructure::storage::WalletStore;
use chrono::Utc;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// One participant's share at wallet creation time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantShare {
    pub user_id: String,
    pub amount_owed: u64,
}

/// The single factory input for every wallet-creation caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateWalletRequest {
    pub bill_id: String,
    pub kind: WalletKind,
    pub creator_id: String,
    pub participants: Vec<ParticipantShare>,
    pub total_amount: u64,
}

/// Owns wallet creation, identity, and status bookkeeping. All reads go
/// through the deduplication guard so N concurrent identical lookups
/// share one underlying fetch.
#[derive(Clone)]
pub struct SplitWalletLifecycleManager {
    store: Arc<dyn WalletStore>,
    custody: Arc<KeyCustodyService>,
    ledger: Arc<dyn LedgerClient>,
    sync: DataSynchronizer,
    audit: Arc<dyn AuditLogger>,
    reads: Arc<DeduplicationGuard<Result<SplitWallet, EngineError>>>,
    balance_cache: TtlCache<u64>,
}

impl SplitWalletLifecycleManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn WalletStore>,
        custody: Arc<KeyCustodyService>,
        ledger: Arc<dyn LedgerClient>,
        sync: DataSynchronizer,
        audit: Arc<dyn AuditLogger>,
        read_window: Duration,
        read_retention: Duration,
        balance_cache: TtlCache<u64>,
    ) -> Self {
        SplitWalletLifecycleManager {
            store,
            custody,
            ledger,
            sync,
            audit,
            reads: Arc::new(DeduplicationGuard::new(read_window, read_retention)),
            balance_cache,
        }
    }

    /// Create the wallet for a bill/kind pair. The wallet record and its
    /// custody record persist as one logical unit: if custody fails, the
    /// wallet is rolled back and `CustodyError` reported; a wallet must
    /// never exist without retrievable custody.
    pub async fn create(&self, request: CreateWalletRequest) -> Result<SplitWallet, EngineError> {
        validate_request(&request)?;

        if let Some(existing) = self
            .store
            .get_wallet_by_bill(&request.bill_id, request.kind)
            .await?
        {
            return Err(EngineError::StateConflict(format!(
                "wallet {} already exists for bill {} ({})",
                existing.id, request.bill_id, request.kind
            )));
        }

        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key = hex::encode(signing_key.verifying_key().to_bytes());

        let wallet = SplitWallet {
            id: Uuid::new_v4(),
            source_bill_id: request.bill_id.clone(),
            kind: request.kind,
            creator_id: request.creator_id.clone(),
            on_chain_address: public_key.clone(),
            public_key,
            status: WalletStatus::Created,
            total_amount_due: request.total_amount,
            collected_amount: 0,
            participants: request
                .participants
                .iter()
                .map(|share| Participant::new(share.user_id.clone(), share.amount_owed))
                .collect(),
            roulette_audit: None,
            created_at: Utc::now(),
            completed_at: None,
        };

        // Fair wallets are creator-custody; Degen/Shared let every
        // participant request decryption.
        let accessors: Vec<String> = match request.kind {
            WalletKind::Fair => vec![request.creator_id.clone()],
            WalletKind::Degen | WalletKind::Shared => request
                .participants
                .iter()
                .map(|share| share.user_id.clone())
                .collect(),
        };

        self.store.save_wallet(wallet.clone()).await?;
        if let Err(err) = self
            .custody
            .store(
                wallet.id,
                wallet.kind,
                &signing_key.to_bytes(),
                &request.creator_id,
                accessors,
            )
            .await
        {
            warn!(wallet_id = %wallet.id, %err, "custody persist failed, rolling back wallet");
            self.store.delete_wallet(wallet.id).await.ok();
            return Err(EngineError::Custody(err.to_string()));
        }

        info!(wallet_id = %wallet.id, bill_id = %wallet.source_bill_id, kind = %wallet.kind, "wallet created");
        self.audit
            .record(
                "wallet_created",
                serde_json::json!({
                    "wallet_id": wallet.id,
                    "bill_id": wallet.source_bill_id,
                    "kind": wallet.kind,
                    "total_amount": wallet.total_amount_due,
                }),
                Some(&request.creator_id),
            )
            .await
            .ok();
        self.sync.spawn_sync(wallet.clone());

        Ok(wallet)
    }

    pub async fn get(&self, wallet_id: Uuid) -> Result<SplitWallet, EngineError> {
        let store = Arc::clone(&self.store);
        let key = format!("wallet:{}", wallet_id);
        self.reads
            .run(&key, async move {
                store
                    .get_wallet(wallet_id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet_id)))
            })
            .await
    }

    pub async fn get_by_bill(
        &self,
        bill_id: &str,
        kind: WalletKind,
    ) -> Result<SplitWallet, EngineError> {
        let store = Arc::clone(&self.store);
        let bill = bill_id.to_string();
        let key = format!("bill:{}:{}", bill_id, kind);
        self.reads
            .run(&key, async move {
                store
                    .get_wallet_by_bill(&bill, kind)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(format!("bill {} ({})", bill, kind)))
            })
            .await
    }

    /// Funding progress. The collected figure prefers the larger of the
    /// aggregate sum and the on-chain balance, since on-chain truth can
    /// lag behind confirmations; the percentage is clamped so overpayment
    /// never displays as more than 100% or a negative remainder.
    pub async fn completion(&self, wallet_id: Uuid) -> Result<Completion, EngineError> {
        let wallet = self.get(wallet_id).await?;
        let on_chain = self.cached_balance(&wallet.on_chain_address).await;
        let collected = wallet.paid_sum().max(on_chain.unwrap_or(0));
        Ok(Completion::from_amounts(collected, wallet.total_amount_due))
    }

    async fn cached_balance(&self, address: &str) -> Option<u64> {
        if let Some(balance) = self.balance_cache.get(address).await {
            return Some(balance);
        }
        match self.ledger.get_balance(address).await {
            Ok(balance) => {
                self.balance_cache.insert(address, balance).await;
                Some(balance)
            }
            Err(err) => {
                warn!(address, %err, "balance read failed, using aggregate only");
                None
            }
        }
    }
}

fn validate_request(request: &CreateWalletRequest) -> Result<(), EngineError> {
    if request.bill_id.trim().is_empty() {
        return Err(EngineError::Validation("bill id is required".to_string()));
    }
    if request.creator_id.trim().is_empty() {
        return Err(EngineError::Validation("creator id is required".to_string()));
    }
    if request.participants.is_empty() {
        return Err(EngineError::Validation(
            "at least one participant is required".to_string(),
        ));
    }
    if request.total_amount == 0 {
        return Err(EngineError::Validation(
            "total amount must be positive".to_string(),
        ));
    }
    if request.participants.iter().any(|p| p.amount_owed == 0) {
        return Err(EngineError::Validation(
            "participant shares must be positive".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for share in &request.participants {
        if !seen.insert(share.user_id.as_str()) {
            return Err(EngineError::Validation(format!(
                "duplicate participant {}",
                share.user_id
            )));
        }
    }
    if request.kind == WalletKind::Degen {
        let first = request.participants[0].amount_owed;
        if request.participants.iter().any(|p| p.amount_owed != first) {
            return Err(EngineError::Validation(
                "degen stakes must be equal".to_string(),
            ));
        }
    }
    Ok(())
}
