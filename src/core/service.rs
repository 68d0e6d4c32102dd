use crate::config::EngineSettings;
use crate::core::custody::KeyCustodyService;
use crate::core::errors::EngineError;
use crate::core::lifecycle::{CreateWalletRequest, SplitWalletLifecycleManager};
use crate::core::models::audit::AuditRecord;
use crate::core::models::read_model::WalletSummary;
use crate::core::models::roulette::RouletteAudit;
use crate::core::models::wallet::{Completion, SplitWallet, WalletKind};
use crate::core::payments::{ContributionReceipt, PaymentOrchestrator};
use crate::core::roulette::RouletteEngine;
use crate::core::settlement::{SettlementEngine, WithdrawalReceipt};
use crate::core::sync::DataSynchronizer;
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::cosign::FeePayerCoSigner;
use crate::infrastructure::directory::UserDirectory;
use crate::infrastructure::keystore::DeviceKeystore;
use crate::infrastructure::ledger::LedgerClient;
use crate::infrastructure::logging::AuditLogger;
use crate::infrastructure::storage::{MirrorStore, WalletStore};
use std::sync::Arc;
use uuid::Uuid;

/// External collaborators the engine is wired with. Everything the
/// components share (caches, guards, the custody service) lives inside
/// this context rather than in process globals, so each instance (and
/// each test) owns its lifetimes.
pub struct EngineDeps {
    pub store: Arc<dyn WalletStore>,
    pub mirror: Arc<dyn MirrorStore>,
    pub ledger: Arc<dyn LedgerClient>,
    pub secondary_ledger: Option<Arc<dyn LedgerClient>>,
    pub keystore: Arc<dyn DeviceKeystore>,
    pub cosigner: Arc<dyn FeePayerCoSigner>,
    pub directory: Arc<dyn UserDirectory>,
    pub audit: Arc<dyn AuditLogger>,
}

/// Facade over the settlement engine. Collaborators call the operations
/// here; the components behind them share one custody service, one
/// balance cache, and one synchronizer.
pub struct SplitPoolService {
    lifecycle: SplitWalletLifecycleManager,
    payments: PaymentOrchestrator,
    roulette: RouletteEngine,
    settlement: SettlementEngine,
    sync: DataSynchronizer,
    custody: Arc<KeyCustodyService>,
    audit: Arc<dyn AuditLogger>,
}

impl SplitPoolService {
    pub fn new(deps: EngineDeps, settings: EngineSettings) -> Self {
        let custody = Arc::new(KeyCustodyService::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.keystore),
            settings.key_cache_ttl,
            settings.vault_secret.clone(),
        ));
        let sync = DataSynchronizer::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.mirror),
            Arc::clone(&deps.ledger),
        );
        let balance_cache = TtlCache::new(settings.balance_cache_ttl);

        let lifecycle = SplitWalletLifecycleManager::new(
            Arc::clone(&deps.store),
            Arc::clone(&custody),
            Arc::clone(&deps.ledger),
            sync.clone(),
            Arc::clone(&deps.audit),
            settings.dedup_in_flight_window,
            settings.dedup_retention,
            balance_cache.clone(),
        );
        let payments = PaymentOrchestrator::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.ledger),
            deps.secondary_ledger.clone(),
            Arc::clone(&deps.directory),
            sync.clone(),
            Arc::clone(&deps.audit),
            settings.clone(),
        );
        let roulette = RouletteEngine::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.audit),
            sync.clone(),
        );
        let settlement = SettlementEngine::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.ledger),
            Arc::clone(&custody),
            Arc::clone(&deps.cosigner),
            Arc::clone(&deps.directory),
            sync.clone(),
            Arc::clone(&deps.audit),
            settings,
        );

        SplitPoolService {
            lifecycle,
            payments,
            roulette,
            settlement,
            sync,
            custody,
            audit: deps.audit,
        }
    }

    pub async fn create_wallet(
        &self,
        request: CreateWalletRequest,
    ) -> Result<SplitWallet, EngineError> {
        self.lifecycle.create(request).await
    }

    pub async fn get_wallet(&self, wallet_id: Uuid) -> Result<SplitWallet, EngineError> {
        self.lifecycle.get(wallet_id).await
    }

    pub async fn get_wallet_by_bill(
        &self,
        bill_id: &str,
        kind: WalletKind,
    ) -> Result<SplitWallet, EngineError> {
        self.lifecycle.get_by_bill(bill_id, kind).await
    }

    pub async fn completion(&self, wallet_id: Uuid) -> Result<Completion, EngineError> {
        self.lifecycle.completion(wallet_id).await
    }

    pub async fn contribute(
        &self,
        wallet_id: Uuid,
        participant_id: &str,
        amount: u64,
    ) -> Result<ContributionReceipt, EngineError> {
        self.payments.contribute(wallet_id, participant_id, amount).await
    }

    pub async fn execute_roulette(
        &self,
        wallet_id: Uuid,
        requester_id: &str,
    ) -> Result<RouletteAudit, EngineError> {
        self.roulette.execute(wallet_id, requester_id).await
    }

    pub async fn withdraw(
        &self,
        wallet_id: Uuid,
        requester_id: &str,
        destination: &str,
        amount: u64,
    ) -> Result<WithdrawalReceipt, EngineError> {
        self.settlement
            .withdraw(wallet_id, requester_id, destination, amount)
            .await
    }

    /// Read-model view with read-repair.
    pub async fn wallet_summary(&self, wallet_id: Uuid) -> Result<WalletSummary, EngineError> {
        self.sync.summary(wallet_id).await
    }

    /// Drain the background reconciliation queue. Returns how many
    /// wallets were repaired.
    pub async fn run_reconciliation(&self) -> usize {
        self.sync.run_pending().await
    }

    pub async fn audit_trail(&self) -> Result<Vec<AuditRecord>, EngineError> {
        self.audit.records().await
    }

    pub fn custody(&self) -> &Arc<KeyCustodyService> {
        &self.custody
    }
}
