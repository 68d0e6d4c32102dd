use crate::core::errors::EngineError;
use crate::core::models::roulette::RouletteAudit;
use crate::core::models::wallet::{WalletKind, WalletStatus};
use crate::core::sync::DataSynchronizer;
use crate::infrastructure::logging::AuditLogger;
use crate::infrastructure::storage::WalletStore;
use chrono::Utc;
use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const ENTROPY_SOURCE_ID: &str = "os-rng";

/// Single-writer randomized loser selection for Degen wallets. The audit
/// record and the `Locked -> RouletteComplete` transition are written as
/// one conditional update that only one caller can win; everyone else
/// observes the recorded outcome.
#[derive(Clone)]
pub struct RouletteEngine {
    store: Arc<dyn WalletStore>,
    audit: Arc<dyn AuditLogger>,
    sync: DataSynchronizer,
}

impl RouletteEngine {
    pub fn new(
        store: Arc<dyn WalletStore>,
        audit: Arc<dyn AuditLogger>,
        sync: DataSynchronizer,
    ) -> Self {
        RouletteEngine { store, audit, sync }
    }

    /// Execute the roulette, or return the already-recorded outcome if it
    /// has run before. Re-invocation never re-rolls.
    pub async fn execute(
        &self,
        wallet_id: Uuid,
        requester_id: &str,
    ) -> Result<RouletteAudit, EngineError> {
        let wallet = self
            .store
            .get_wallet(wallet_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet_id)))?;

        if wallet.kind != WalletKind::Degen {
            return Err(EngineError::Validation(format!(
                "wallet {} is not a degen split",
                wallet_id
            )));
        }
        if !wallet.is_creator(requester_id) {
            return Err(EngineError::Authorization(format!(
                "only the creator may execute the roulette for wallet {}",
                wallet_id
            )));
        }
        if let Some(audit) = &wallet.roulette_audit {
            return Ok(audit.clone());
        }
        if wallet.status != WalletStatus::Locked || !wallet.all_locked() {
            return Err(EngineError::StateConflict(format!(
                "wallet {} is not fully locked ({})",
                wallet_id, wallet.status
            )));
        }

        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let loser = {
            let mut index_bytes = [0u8; 8];
            index_bytes.copy_from_slice(&seed[..8]);
            let index = (u64::from_le_bytes(index_bytes) % wallet.participants.len() as u64) as usize;
            wallet.participants[index].user_id.clone()
        };

        let audit = RouletteAudit {
            seed: hex::encode(seed),
            entropy_source_id: ENTROPY_SOURCE_ID.to_string(),
            selected_loser_id: loser.clone(),
            executed_by: requester_id.to_string(),
            executed_at: Utc::now(),
        };

        let mut updated = wallet.clone();
        updated.status = WalletStatus::RouletteComplete;
        updated.roulette_audit = Some(audit.clone());

        let won = self
            .store
            .update_wallet_if_status(updated.clone(), WalletStatus::Locked)
            .await?;
        if !won {
            // Lost the race: someone else's selection is the recorded
            // one. Hand back whatever was written.
            let current = self
                .store
                .get_wallet(wallet_id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("wallet {}", wallet_id)))?;
            return current.roulette_audit.clone().ok_or_else(|| {
                EngineError::StateConflict(format!(
                    "wallet {} left the locked state without a roulette outcome",
                    wallet_id
                ))
            });
        }

        info!(%wallet_id, loser = %loser, "roulette executed");
        self.audit
            .record(
                "roulette_executed",
                serde_json::json!({
                    "wallet_id": wallet_id,
                    "selected_loser_id": loser,
                    "entropy_source_id": ENTROPY_SOURCE_ID,
                }),
                Some(requester_id),
            )
            .await
            .ok();
        self.sync.spawn_sync(updated);

        Ok(audit)
    }
}
