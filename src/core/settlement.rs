use crate::config::EngineSettings;
use crate::core::confirmation::await_confirmation;
use crate::core::custody::KeyCustodyService;
use crate::core::dedup::{DeduplicationGuard, idempotency_key};
use crate::core::errors::EngineError;
use crate::core::models::transfer::{SignerSlot, TransferTransaction};
use crate::core::models::wallet::{
    ParticipantStatus, SplitWallet, WalletKind, WalletStatus,
};
use crate::core::sync::DataSynchronizer;
use crate::infrastructure::cosign::FeePayerCoSigner;
use crate::infrastructure::directory::UserDirectory;
use crate::infrastructure::ledger::LedgerClient;
use crate::infrastructure::logging::AuditLogger;
use crate::infrastructure::storage::WalletStore;
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub wallet_id: Uuid,
    pub requester_id: String,
    pub destination: String,
    pub amount: u64,
    pub signature: String,
    pub wallet_status: WalletStatus,
}

/// Which authorization path a withdrawal took. Decides the single-writer
/// mark taken before submission and the terminal bookkeeping after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WithdrawalPlan {
    FairPayout,
    DegenWinnerPayout,
    DegenLoserRefund,
    SharedWithdrawal,
}

/// Wallet state to restore if the transfer never reaches the ledger.
struct SingleWriterMark {
    original: SplitWallet,
    expected_now: WalletStatus,
}

/// Withdrawal path: wallet -> participant/external. Resolves custody,
/// obtains the fee-payer co-signature, re-verifies the on-chain balance,
/// and closes the wallet when its kind-specific terminal condition holds.
#[derive(Clone)]
pub struct SettlementEngine {
    store: Arc<dyn WalletStore>,
    ledger: Arc<dyn LedgerClient>,
    custody: Arc<KeyCustodyService>,
    cosigner: Arc<dyn FeePayerCoSigner>,
    directory: Arc<dyn UserDirectory>,
    sync: DataSynchronizer,
    audit: Arc<dyn AuditLogger>,
    guard: Arc<DeduplicationGuard<Result<WithdrawalReceipt, EngineError>>>,
    settings: EngineSettings,
}

impl SettlementEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn WalletStore>,
        ledger: Arc<dyn LedgerClient>,
        custody: Arc<KeyCustodyService>,
        cosigner: Arc<dyn FeePayerCoSigner>,
        directory: Arc<dyn UserDirectory>,
        sync: DataSynchronizer,
        audit: Arc<dyn AuditLogger>,
        settings: EngineSettings,
    ) -> Self {
        let guard = Arc::new(DeduplicationGuard::new(
            settings.dedup_in_flight_window,
            settings.dedup_retention,
        ));
        SettlementEngine {
            store,
            ledger,
            custody,
            cosigner,
            directory,
            sync,
            audit,
            guard,
            settings,
        }
    }

    pub async fn withdraw(
        &self,
        wallet_id: Uuid,
        requester_id: &str,
        destination: &str,
        amount: u64,
    ) -> Result<WithdrawalReceipt, EngineError> {
        let key = idempotency_key(&[
            requester_id,
            &wallet_id.to_string(),
            destination,
            &amount.to_string(),
            "withdraw",
        ]);
        let this = self.clone();
        let requester_id = requester_id.to_string();
        let destination = destination.to_string();
        self.guard
            .run(&key, async move {
                this.withdraw_inner(wallet_id, &requester_id, &destination, amount)
                    .await
            })
            .await
    }

    async fn withdraw_inner(
        &self,
        wallet_id: Uuid,
        requester_id: &str,
        destination: &str,
        amount: u64,
    ) -> Result<WithdrawalReceipt, EngineError> {
        if amount == 0 {
            return Err(EngineError::Validation(
                "withdrawal amount must be positive".to_string(),
            ));
        }

        let wallet = self
            .store
            .get_wallet(wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet_id)))?;
        if wallet.status == WalletStatus::Closed {
            return Err(EngineError::StateConflict(format!(
                "wallet {} is closed",
                wallet_id
            )));
        }

        // Destination is settled before any ledger traffic: a provided
        // well-formed address wins, otherwise the requester's own primary
        // wallet, otherwise ValidationError.
        let provided = destination.trim();
        let provided_valid = !provided.is_empty() && self.ledger.is_valid_address(provided);
        let requester_primary = self
            .directory
            .primary_address(requester_id)
            .await?
            .filter(|addr| self.ledger.is_valid_address(addr));
        let resolved = if provided_valid {
            provided.to_string()
        } else {
            requester_primary.clone().ok_or_else(|| {
                EngineError::Validation(format!(
                    "no usable destination for user {}",
                    requester_id
                ))
            })?
        };

        let plan = self.authorize(&wallet, requester_id, amount, provided_valid, &resolved, requester_primary.as_deref())?;
        let mark = self.mark_single_writer(plan, &wallet, requester_id).await?;

        // Everything up to submission can still be undone by restoring
        // the pre-withdrawal state; once the transfer is on the ledger
        // there is no cancellation.
        let submitted = self
            .sign_cosign_submit(&wallet, &resolved, amount, requester_id)
            .await;
        let signature = match submitted {
            Ok(signature) => signature,
            Err(err) => {
                self.revert(mark).await;
                return Err(err);
            }
        };

        if let Err(err) = await_confirmation(
            &self.ledger,
            &signature,
            self.settings.confirm_attempts,
            self.settings.confirm_timeout,
        )
        .await
        {
            // The transfer may still land; the single-writer mark stays
            // so nobody can double-spend while its fate is unknown.
            warn!(%wallet_id, signature, %err, "withdrawal unconfirmed, wallet held for reconciliation");
            self.sync.enqueue(wallet_id).await;
            return Err(err);
        }

        let final_status = self
            .finalize(plan, wallet_id, requester_id, &signature)
            .await;

        info!(%wallet_id, requester_id, amount, destination = %resolved, signature, "withdrawal confirmed");
        self.audit
            .record(
                "withdrawal_confirmed",
                serde_json::json!({
                    "wallet_id": wallet_id,
                    "requester_id": requester_id,
                    "destination": resolved,
                    "amount": amount,
                    "signature": signature,
                }),
                Some(requester_id),
            )
            .await
            .ok();

        Ok(WithdrawalReceipt {
            wallet_id,
            requester_id: requester_id.to_string(),
            destination: resolved,
            amount,
            signature,
            wallet_status: final_status,
        })
    }

    /// Kind- and role-specific authorization. Returns the plan that
    /// drives the single-writer mark and terminal bookkeeping.
    fn authorize(
        &self,
        wallet: &SplitWallet,
        requester_id: &str,
        amount: u64,
        destination_provided: bool,
        resolved: &str,
        requester_primary: Option<&str>,
    ) -> Result<WithdrawalPlan, EngineError> {
        match wallet.kind {
            WalletKind::Fair => {
                if !wallet.is_creator(requester_id) {
                    return Err(EngineError::Authorization(format!(
                        "only the creator may withdraw from fair wallet {}",
                        wallet.id
                    )));
                }
                if !wallet.all_settled() {
                    return Err(EngineError::StateConflict(format!(
                        "fair wallet {} is not fully funded",
                        wallet.id
                    )));
                }
                Ok(WithdrawalPlan::FairPayout)
            }
            WalletKind::Degen => {
                let loser = wallet.recorded_loser().ok_or_else(|| {
                    EngineError::StateConflict(format!(
                        "roulette has not been executed for wallet {}",
                        wallet.id
                    ))
                })?;
                if requester_id == loser {
                    let participant = wallet.participant(requester_id).ok_or_else(|| {
                        EngineError::Authorization(format!(
                            "user {} is not a participant of wallet {}",
                            requester_id, wallet.id
                        ))
                    })?;
                    if participant.status == ParticipantStatus::Paid {
                        return Err(EngineError::StateConflict(format!(
                            "loser refund already settled for wallet {}",
                            wallet.id
                        )));
                    }
                    // The refund must leave the platform: an in-app
                    // custodial balance is never re-credited.
                    if !destination_provided
                        || requester_primary.map(|a| a == resolved).unwrap_or(false)
                    {
                        return Err(EngineError::Validation(format!(
                            "loser refund for wallet {} requires an external destination",
                            wallet.id
                        )));
                    }
                    if amount > participant.amount_paid {
                        return Err(EngineError::Validation(format!(
                            "loser refund is limited to the locked stake of {}",
                            participant.amount_paid
                        )));
                    }
                    Ok(WithdrawalPlan::DegenLoserRefund)
                } else {
                    if !wallet.is_member(requester_id) {
                        return Err(EngineError::Authorization(format!(
                            "user {} is not a participant of wallet {}",
                            requester_id, wallet.id
                        )));
                    }
                    if wallet.status != WalletStatus::RouletteComplete {
                        return Err(EngineError::StateConflict(format!(
                            "pool of wallet {} has already been claimed",
                            wallet.id
                        )));
                    }
                    let pool = wallet.paid_sum();
                    if amount != pool {
                        return Err(EngineError::Validation(format!(
                            "winner payout must claim the full pool of {}",
                            pool
                        )));
                    }
                    Ok(WithdrawalPlan::DegenWinnerPayout)
                }
            }
            WalletKind::Shared => {
                let participant = wallet.participant(requester_id).ok_or_else(|| {
                    EngineError::Authorization(format!(
                        "user {} is not a member of shared wallet {}",
                        requester_id, wallet.id
                    ))
                })?;
                if amount > participant.amount_paid {
                    return Err(EngineError::Authorization(format!(
                        "withdrawal exceeds member {}'s contribution of {}",
                        requester_id, participant.amount_paid
                    )));
                }
                Ok(WithdrawalPlan::SharedWithdrawal)
            }
        }
    }

    /// Take the conditional status update that makes exactly-once paths
    /// exactly-once. Only one caller can win each of these writes.
    async fn mark_single_writer(
        &self,
        plan: WithdrawalPlan,
        wallet: &SplitWallet,
        requester_id: &str,
    ) -> Result<Option<SingleWriterMark>, EngineError> {
        match plan {
            WithdrawalPlan::FairPayout | WithdrawalPlan::DegenWinnerPayout => {
                let mut updated = wallet.clone();
                updated.status = WalletStatus::Withdrawing;
                let won = self
                    .store
                    .update_wallet_if_status(updated, wallet.status)
                    .await?;
                if !won {
                    return Err(EngineError::StateConflict(format!(
                        "a withdrawal from wallet {} is already underway",
                        wallet.id
                    )));
                }
                Ok(Some(SingleWriterMark {
                    original: wallet.clone(),
                    expected_now: WalletStatus::Withdrawing,
                }))
            }
            WithdrawalPlan::DegenLoserRefund => {
                let mut updated = wallet.clone();
                {
                    let participant = updated.participant_mut(requester_id).ok_or_else(|| {
                        EngineError::NotFound(format!("participant {}", requester_id))
                    })?;
                    participant.status = ParticipantStatus::Paid;
                }
                let won = self
                    .store
                    .update_wallet_if_status(updated, wallet.status)
                    .await?;
                if !won {
                    return Err(EngineError::StateConflict(format!(
                        "wallet {} changed while the refund was being prepared",
                        wallet.id
                    )));
                }
                Ok(Some(SingleWriterMark {
                    original: wallet.clone(),
                    expected_now: wallet.status,
                }))
            }
            WithdrawalPlan::SharedWithdrawal => Ok(None),
        }
    }

    async fn revert(&self, mark: Option<SingleWriterMark>) {
        if let Some(mark) = mark {
            let wallet_id = mark.original.id;
            match self
                .store
                .update_wallet_if_status(mark.original, mark.expected_now)
                .await
            {
                Ok(true) => {}
                Ok(false) => warn!(%wallet_id, "could not restore pre-withdrawal state: status moved"),
                Err(err) => warn!(%wallet_id, %err, "could not restore pre-withdrawal state"),
            }
        }
    }

    /// Resolve the signing key, build and sign the transfer, obtain the
    /// fee-payer co-signature, verify the signer slots, re-check the
    /// on-chain balance, and submit.
    async fn sign_cosign_submit(
        &self,
        wallet: &SplitWallet,
        destination: &str,
        amount: u64,
        requester_id: &str,
    ) -> Result<String, EngineError> {
        let material = self.custody.retrieve(wallet.id, requester_id).await?;
        let seed: [u8; 32] = material.as_slice().try_into().map_err(|_| {
            EngineError::Custody("key material is not a 32-byte seed".to_string())
        })?;
        let signing_key = SigningKey::from_bytes(&seed);
        if hex::encode(signing_key.verifying_key().to_bytes()) != wallet.on_chain_address {
            return Err(EngineError::Custody(format!(
                "decoded key does not match wallet {}",
                wallet.id
            )));
        }

        let mut tx = TransferTransaction::new(&wallet.on_chain_address, destination, amount);
        let wallet_signature = signing_key.sign(&tx.signing_message());
        tx.signers.push(SignerSlot {
            address: wallet.on_chain_address.clone(),
            signature: Some(hex::encode(wallet_signature.to_bytes())),
        });

        let cosigned = self.cosigner.co_sign(tx).await?;
        let expected_fee_payer = if self.settings.fee_payer_address.is_empty() {
            self.cosigner.fee_payer_address()
        } else {
            self.settings.fee_payer_address.clone()
        };
        // The co-signer's output is structural input to the ledger; a
        // misplaced fee payer is rejected here, not by the network.
        if !cosigned.fee_payer_slot_is(&expected_fee_payer) {
            return Err(EngineError::Validation(format!(
                "fee payer {} is not in the expected signer slot",
                expected_fee_payer
            )));
        }

        // Cached balances are for display; the authoritative check reads
        // the chain immediately before submission.
        let on_chain = self.ledger.get_balance(&wallet.on_chain_address).await?;
        if on_chain < amount {
            return Err(EngineError::StateConflict(format!(
                "on-chain balance {} of wallet {} is below withdrawal {}",
                on_chain, wallet.id, amount
            )));
        }

        self.ledger.submit_signed(&cosigned).await
    }

    /// Post-confirmation bookkeeping: transfer refs, terminal close.
    async fn finalize(
        &self,
        plan: WithdrawalPlan,
        wallet_id: Uuid,
        requester_id: &str,
        signature: &str,
    ) -> WalletStatus {
        let mut wallet = match self.store.get_wallet(wallet_id).await {
            Ok(Some(wallet)) => wallet,
            _ => return WalletStatus::Withdrawing,
        };

        if plan == WithdrawalPlan::DegenLoserRefund {
            if let Some(participant) = wallet.participant_mut(requester_id) {
                participant.last_transfer_ref = Some(signature.to_string());
            }
            if let Err(err) = self.store.save_wallet(wallet.clone()).await {
                warn!(%wallet_id, %err, "refund bookkeeping persist failed");
                self.sync.enqueue(wallet_id).await;
            }
        }

        let remaining = self
            .ledger
            .get_balance(&wallet.on_chain_address)
            .await
            .unwrap_or(u64::MAX);
        let terminal = match wallet.kind {
            WalletKind::Fair => wallet.all_settled(),
            WalletKind::Degen => wallet.roulette_audit.is_some(),
            WalletKind::Shared => true,
        };

        if remaining <= self.settings.close_dust_threshold && terminal {
            let expected = wallet.status;
            wallet.status = WalletStatus::Closed;
            wallet.completed_at = Some(Utc::now());
            match self.store.update_wallet_if_status(wallet.clone(), expected).await {
                Ok(true) => {
                    self.custody.forget(wallet_id).await;
                    info!(%wallet_id, "wallet closed");
                }
                Ok(false) => {
                    // Someone else advanced the wallet; their view wins.
                    wallet.status = expected;
                }
                Err(err) => {
                    warn!(%wallet_id, %err, "close persist failed");
                    wallet.status = expected;
                    self.sync.enqueue(wallet_id).await;
                }
            }
        }

        self.sync.spawn_sync(wallet.clone());
        wallet.status
    }
}
