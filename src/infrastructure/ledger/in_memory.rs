use crate::core::errors::EngineError;
use crate::core::models::transfer::TransferTransaction;
use crate::infrastructure::ledger::{ConfirmationStatus, LedgerClient};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct RecordedTransfer {
    pub signature: String,
    pub from: String,
    pub to: String,
    pub amount: u64,
}

/// Simulated ledger used by the binary and the test suite: hex addresses,
/// instant transfers, optional slow-confirmation and failure modes.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    accounts: Arc<RwLock<HashMap<String, u64>>>,
    transfers: Arc<RwLock<Vec<RecordedTransfer>>>,
    statuses: Arc<RwLock<HashMap<String, ConfirmationStatus>>>,
    /// Signature -> confirm() calls still answering `Pending`.
    pending_countdown: Arc<RwLock<HashMap<String, u32>>>,
    slow_confirmations: Arc<RwLock<u32>>,
    fail_submissions: Arc<RwLock<bool>>,
    fail_balance_reads: Arc<RwLock<bool>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn credit(&self, address: &str, amount: u64) {
        let mut accounts = self.accounts.write().await;
        *accounts.entry(address.to_string()).or_insert(0) += amount;
    }

    pub async fn balance_of(&self, address: &str) -> u64 {
        let accounts = self.accounts.read().await;
        accounts.get(address).copied().unwrap_or(0)
    }

    pub async fn transfer_count(&self) -> usize {
        self.transfers.read().await.len()
    }

    pub async fn transfers_to(&self, address: &str) -> Vec<RecordedTransfer> {
        self.transfers
            .read()
            .await
            .iter()
            .filter(|t| t.to == address)
            .cloned()
            .collect()
    }

    /// Newly submitted transfers answer `Pending` for the next `n`
    /// confirm() calls before turning `Confirmed`.
    pub async fn set_slow_confirmations(&self, n: u32) {
        *self.slow_confirmations.write().await = n;
    }

    pub async fn set_fail_submissions(&self, fail: bool) {
        *self.fail_submissions.write().await = fail;
    }

    pub async fn set_fail_balance_reads(&self, fail: bool) {
        *self.fail_balance_reads.write().await = fail;
    }

    async fn record(&self, from: &str, to: &str, amount: u64) -> Result<String, EngineError> {
        if *self.fail_submissions.read().await {
            return Err(EngineError::Ledger("submission rejected".to_string()));
        }

        let mut accounts = self.accounts.write().await;
        let from_balance = accounts.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(EngineError::Ledger(format!(
                "insufficient funds in {}: {} < {}",
                from, from_balance, amount
            )));
        }
        accounts.insert(from.to_string(), from_balance - amount);
        *accounts.entry(to.to_string()).or_insert(0) += amount;
        drop(accounts);

        let signature = hex::encode(Uuid::new_v4().as_bytes()) + &hex::encode(Uuid::new_v4().as_bytes());
        self.transfers.write().await.push(RecordedTransfer {
            signature: signature.clone(),
            from: from.to_string(),
            to: to.to_string(),
            amount,
        });

        let slow = *self.slow_confirmations.read().await;
        if slow > 0 {
            self.pending_countdown.write().await.insert(signature.clone(), slow);
            self.statuses
                .write()
                .await
                .insert(signature.clone(), ConfirmationStatus::Pending);
        } else {
            self.statuses
                .write()
                .await
                .insert(signature.clone(), ConfirmationStatus::Confirmed);
        }
        Ok(signature)
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn submit_transfer(
        &self,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<String, EngineError> {
        if !self.is_valid_address(from) || !self.is_valid_address(to) {
            return Err(EngineError::Ledger("malformed address".to_string()));
        }
        self.record(from, to, amount).await
    }

    async fn submit_signed(&self, tx: &TransferTransaction) -> Result<String, EngineError> {
        if tx.signers.is_empty() || tx.signers.iter().any(|s| s.signature.is_none()) {
            return Err(EngineError::Ledger("missing signatures".to_string()));
        }
        if !self.is_valid_address(&tx.from) || !self.is_valid_address(&tx.to) {
            return Err(EngineError::Ledger("malformed address".to_string()));
        }
        self.record(&tx.from, &tx.to, tx.amount).await
    }

    async fn get_balance(&self, address: &str) -> Result<u64, EngineError> {
        if *self.fail_balance_reads.read().await {
            return Err(EngineError::Ledger("balance read unavailable".to_string()));
        }
        Ok(self.balance_of(address).await)
    }

    async fn confirm(&self, signature: &str) -> Result<ConfirmationStatus, EngineError> {
        let mut countdown = self.pending_countdown.write().await;
        if let Some(remaining) = countdown.get_mut(signature) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(ConfirmationStatus::Pending);
            }
            countdown.remove(signature);
            self.statuses
                .write()
                .await
                .insert(signature.to_string(), ConfirmationStatus::Confirmed);
        }
        drop(countdown);

        let statuses = self.statuses.read().await;
        Ok(statuses
            .get(signature)
            .copied()
            .unwrap_or(ConfirmationStatus::Unknown))
    }

    fn is_valid_address(&self, address: &str) -> bool {
        address.len() == 64 && address.chars().all(|c| c.is_ascii_hexdigit())
    }
}
