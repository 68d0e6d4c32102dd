mod dedup_tests;
mod lifecycle_tests;
mod roulette_tests;
mod settlement_tests;
mod sync_tests;

use crate::config::EngineSettings;
use crate::core::lifecycle::{CreateWalletRequest, ParticipantShare};
use crate::core::models::wallet::{SplitWallet, WalletKind};
use crate::core::service::{EngineDeps, SplitPoolService};
use crate::infrastructure::cosign::FeePayerCoSigner;
use crate::infrastructure::cosign::local::LocalCoSigner;
use crate::infrastructure::directory::in_memory::InMemoryDirectory;
use crate::infrastructure::keystore::in_memory::InMemoryKeystore;
use crate::infrastructure::ledger::LedgerClient;
use crate::infrastructure::ledger::in_memory::InMemoryLedger;
use crate::infrastructure::logging::in_memory::InMemoryAuditLog;
use crate::infrastructure::storage::WalletStore;
use crate::infrastructure::storage::in_memory::{InMemoryMirrorStore, InMemoryWalletStore};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::sync::Arc;
use std::time::Duration;

pub struct TestHarness {
    pub service: SplitPoolService,
    pub store: Arc<InMemoryWalletStore>,
    pub mirror: Arc<InMemoryMirrorStore>,
    pub ledger: Arc<InMemoryLedger>,
    pub directory: Arc<InMemoryDirectory>,
    pub keystore: Arc<InMemoryKeystore>,
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        vault_secret: "test-vault-secret".to_string(),
        dedup_in_flight_window: Duration::from_secs(5),
        // Keep retention near zero so sequential duplicate calls in
        // tests exercise the state machine, not the result cache.
        dedup_retention: Duration::from_millis(1),
        key_cache_ttl: Duration::from_secs(60),
        balance_cache_ttl: Duration::from_millis(1),
        confirm_attempts: 3,
        confirm_timeout: Duration::from_millis(500),
        fee_payer_address: String::new(),
        primary_balance_unreliable: false,
        close_dust_threshold: 0,
    }
}

pub fn create_test_service() -> TestHarness {
    harness_with(test_settings(), None, None)
}

pub fn harness_with(
    settings: EngineSettings,
    secondary_ledger: Option<Arc<dyn LedgerClient>>,
    cosigner: Option<Arc<dyn FeePayerCoSigner>>,
) -> TestHarness {
    let store = Arc::new(InMemoryWalletStore::new());
    let mirror = Arc::new(InMemoryMirrorStore::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let keystore = Arc::new(InMemoryKeystore::new());

    let store_dyn: Arc<dyn crate::infrastructure::storage::WalletStore> = store.clone();
    let mirror_dyn: Arc<dyn crate::infrastructure::storage::MirrorStore> = mirror.clone();
    let ledger_dyn: Arc<dyn crate::infrastructure::ledger::LedgerClient> = ledger.clone();
    let keystore_dyn: Arc<dyn crate::infrastructure::keystore::DeviceKeystore> = keystore.clone();
    let directory_dyn: Arc<dyn crate::infrastructure::directory::UserDirectory> = directory.clone();
    let deps = EngineDeps {
        store: store_dyn,
        mirror: mirror_dyn,
        ledger: ledger_dyn,
        secondary_ledger,
        keystore: keystore_dyn,
        cosigner: cosigner.unwrap_or_else(|| Arc::new(LocalCoSigner::generate())),
        directory: directory_dyn,
        audit: Arc::new(InMemoryAuditLog::new()),
    };

    TestHarness {
        service: SplitPoolService::new(deps, settings),
        store,
        mirror,
        ledger,
        directory,
        keystore,
    }
}

impl TestHarness {
    /// Gives the user a funded on-chain account registered as their
    /// primary wallet.
    pub async fn fund_user(&self, user_id: &str, balance: u64) -> String {
        let address = random_address();
        self.ledger.credit(&address, balance).await;
        self.directory.set_primary_address(user_id, &address).await;
        address
    }

    /// A Degen wallet with every stake locked, ready for the roulette.
    pub async fn locked_degen_wallet(
        &self,
        creator: &str,
        users: &[&str],
        stake: u64,
    ) -> SplitWallet {
        for user in users {
            self.fund_user(user, stake * 10).await;
        }
        let wallet = self
            .service
            .create_wallet(CreateWalletRequest {
                bill_id: format!("bill-degen-{}", creator),
                kind: WalletKind::Degen,
                creator_id: creator.to_string(),
                participants: shares(&users.iter().map(|u| (*u, stake)).collect::<Vec<_>>()),
                total_amount: stake * users.len() as u64,
            })
            .await
            .expect("wallet creation");
        for user in users {
            self.service
                .contribute(wallet.id, user, stake)
                .await
                .expect("contribution");
        }
        self.store
            .get_wallet(wallet.id)
            .await
            .expect("store read")
            .expect("wallet exists")
    }

    /// A fully funded Fair wallet.
    pub async fn funded_fair_wallet(
        &self,
        creator: &str,
        users: &[(&str, u64)],
        total: u64,
    ) -> SplitWallet {
        for (user, owed) in users {
            self.fund_user(user, owed * 10).await;
        }
        let wallet = self
            .service
            .create_wallet(CreateWalletRequest {
                bill_id: format!("bill-fair-{}", creator),
                kind: WalletKind::Fair,
                creator_id: creator.to_string(),
                participants: shares(users),
                total_amount: total,
            })
            .await
            .expect("wallet creation");
        for (user, owed) in users {
            self.service
                .contribute(wallet.id, user, *owed)
                .await
                .expect("contribution");
        }
        self.store
            .get_wallet(wallet.id)
            .await
            .expect("store read")
            .expect("wallet exists")
    }
}

pub fn shares(entries: &[(&str, u64)]) -> Vec<ParticipantShare> {
    entries
        .iter()
        .map(|(user_id, amount_owed)| ParticipantShare {
            user_id: user_id.to_string(),
            amount_owed: *amount_owed,
        })
        .collect()
}

pub fn random_address() -> String {
    hex::encode(SigningKey::generate(&mut OsRng).verifying_key().to_bytes())
}
