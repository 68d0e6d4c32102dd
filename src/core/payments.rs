use crate::config::EngineSettings;
use crate::core::confirmation::await_confirmation;
use crate::core::dedup::{DeduplicationGuard, idempotency_key};
use crate::core::errors::EngineError;
use crate::core::models::wallet::{ParticipantStatus, SplitWallet, WalletKind, WalletStatus};
use crate::core::sync::DataSynchronizer;
use crate::infrastructure::directory::UserDirectory;
use crate::infrastructure::ledger::LedgerClient;
use crate::infrastructure::logging::AuditLogger;
use crate::infrastructure::storage::WalletStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of a confirmed contribution. Every coalesced caller of an
/// identical request receives the same receipt, signature included.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContributionReceipt {
    pub wallet_id: Uuid,
    pub participant_id: String,
    pub amount: u64,
    pub signature: String,
    pub participant_status: ParticipantStatus,
}

/// Funding path: participant -> wallet. Consults the deduplication guard
/// first, then the ledger, then updates the aggregate and triggers the
/// read-model projection.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    store: Arc<dyn WalletStore>,
    ledger: Arc<dyn LedgerClient>,
    secondary_ledger: Option<Arc<dyn LedgerClient>>,
    directory: Arc<dyn UserDirectory>,
    sync: DataSynchronizer,
    audit: Arc<dyn AuditLogger>,
    guard: Arc<DeduplicationGuard<Result<ContributionReceipt, EngineError>>>,
    settings: EngineSettings,
}

impl PaymentOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn WalletStore>,
        ledger: Arc<dyn LedgerClient>,
        secondary_ledger: Option<Arc<dyn LedgerClient>>,
        directory: Arc<dyn UserDirectory>,
        sync: DataSynchronizer,
        audit: Arc<dyn AuditLogger>,
        settings: EngineSettings,
    ) -> Self {
        let guard = Arc::new(DeduplicationGuard::new(
            settings.dedup_in_flight_window,
            settings.dedup_retention,
        ));
        PaymentOrchestrator {
            store,
            ledger,
            secondary_ledger,
            directory,
            sync,
            audit,
            guard,
            settings,
        }
    }

    pub async fn contribute(
        &self,
        wallet_id: Uuid,
        participant_id: &str,
        amount: u64,
    ) -> Result<ContributionReceipt, EngineError> {
        let key = idempotency_key(&[
            participant_id,
            &wallet_id.to_string(),
            &amount.to_string(),
            "fund",
        ]);
        let this = self.clone();
        let participant_id = participant_id.to_string();
        self.guard
            .run(&key, async move {
                this.contribute_inner(wallet_id, &participant_id, amount).await
            })
            .await
    }

    async fn contribute_inner(
        &self,
        wallet_id: Uuid,
        participant_id: &str,
        amount: u64,
    ) -> Result<ContributionReceipt, EngineError> {
        if amount == 0 {
            return Err(EngineError::Validation(
                "contribution amount must be positive".to_string(),
            ));
        }

        let wallet = self
            .store
            .get_wallet(wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet_id)))?;

        if !matches!(wallet.status, WalletStatus::Created | WalletStatus::Funding) {
            return Err(EngineError::StateConflict(format!(
                "wallet {} is not accepting contributions ({})",
                wallet_id, wallet.status
            )));
        }

        let participant = wallet.participant(participant_id).ok_or_else(|| {
            EngineError::Authorization(format!(
                "user {} is not a participant of wallet {}",
                participant_id, wallet_id
            ))
        })?;
        if !participant.is_pending() {
            return Err(EngineError::StateConflict(format!(
                "participant {} has already paid into wallet {}",
                participant_id, wallet_id
            )));
        }

        // The stored address must be a real public key before anything is
        // submitted; a database identifier must never reach the ledger.
        if !self.ledger.is_valid_address(&wallet.on_chain_address) {
            return Err(EngineError::Validation(format!(
                "wallet {} address is not a well-formed public key",
                wallet_id
            )));
        }

        let source = self
            .directory
            .primary_address(participant_id)
            .await?
            .filter(|addr| self.ledger.is_valid_address(addr))
            .ok_or_else(|| {
                EngineError::Validation(format!(
                    "participant {} has no usable source wallet",
                    participant_id
                ))
            })?;

        let balance = self.payer_balance(&source).await?;
        if balance < amount {
            return Err(EngineError::Validation(format!(
                "participant {} balance {} is below contribution {}",
                participant_id, balance, amount
            )));
        }

        let signature = self
            .ledger
            .submit_transfer(&source, &wallet.on_chain_address, amount)
            .await?;
        await_confirmation(
            &self.ledger,
            &signature,
            self.settings.confirm_attempts,
            self.settings.confirm_timeout,
        )
        .await?;

        // The confirmed transfer is authoritative from here on. The
        // aggregate update is best-effort: a persist failure is logged
        // and queued for reconciliation, never surfaced as a funding
        // failure.
        let updated = self
            .apply_contribution(wallet_id, participant_id, amount, &signature)
            .await;

        let participant_status = match updated {
            Ok(ref wallet) => {
                self.sync.spawn_sync(wallet.clone());
                wallet
                    .participant(participant_id)
                    .map(|p| p.status)
                    .unwrap_or(ParticipantStatus::Paid)
            }
            Err(ref err) => {
                warn!(%wallet_id, participant_id, %err, "contribution persist failed after confirmed transfer");
                self.sync.enqueue(wallet_id).await;
                settled_status(wallet.kind)
            }
        };

        info!(%wallet_id, participant_id, amount, signature, "contribution confirmed");
        self.audit
            .record(
                "contribution_confirmed",
                serde_json::json!({
                    "wallet_id": wallet_id,
                    "participant_id": participant_id,
                    "amount": amount,
                    "signature": signature,
                }),
                Some(participant_id),
            )
            .await
            .ok();

        Ok(ContributionReceipt {
            wallet_id,
            participant_id: participant_id.to_string(),
            amount,
            signature,
            participant_status,
        })
    }

    /// Re-reads the freshest aggregate before mutating so concurrent
    /// contributions from other participants are not overwritten.
    async fn apply_contribution(
        &self,
        wallet_id: Uuid,
        participant_id: &str,
        amount: u64,
        signature: &str,
    ) -> Result<SplitWallet, EngineError> {
        let mut wallet = self
            .store
            .get_wallet(wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet_id)))?;

        let kind = wallet.kind;
        let participant = wallet.participant_mut(participant_id).ok_or_else(|| {
            EngineError::NotFound(format!("participant {}", participant_id))
        })?;
        participant.amount_paid += amount;
        participant.status = settled_status(kind);
        participant.last_transfer_ref = Some(signature.to_string());

        wallet.collected_amount = wallet.paid_sum();
        if wallet.status == WalletStatus::Created {
            wallet.status = WalletStatus::Funding;
        }
        if kind == WalletKind::Degen && wallet.all_locked() {
            wallet.status = WalletStatus::Locked;
        }

        self.store.save_wallet(wallet.clone()).await?;
        Ok(wallet)
    }

    async fn payer_balance(&self, address: &str) -> Result<u64, EngineError> {
        let mut primary_err = None;
        if !self.settings.primary_balance_unreliable {
            match self.ledger.get_balance(address).await {
                Ok(balance) => return Ok(balance),
                Err(err) => {
                    warn!(address, %err, "primary balance source failed");
                    primary_err = Some(err);
                }
            }
        }
        if let Some(secondary) = &self.secondary_ledger {
            return secondary.get_balance(address).await;
        }
        Err(primary_err.unwrap_or_else(|| {
            EngineError::Ledger("no usable balance source".to_string())
        }))
    }
}

fn settled_status(kind: WalletKind) -> ParticipantStatus {
    match kind {
        // Degen stakes stay locked until the roulette resolves them.
        WalletKind::Degen => ParticipantStatus::Locked,
        WalletKind::Fair | WalletKind::Shared => ParticipantStatus::Paid,
    }
}
