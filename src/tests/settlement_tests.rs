use crate::core::errors::EngineError;
use crate::core::lifecycle::CreateWalletRequest;
use crate::core::models::transfer::{SignerSlot, TransferTransaction};
use crate::core::models::wallet::{WalletKind, WalletStatus};
use crate::infrastructure::cosign::FeePayerCoSigner;
use crate::infrastructure::directory::UserDirectory;
use crate::infrastructure::storage::WalletStore;
use crate::tests::{create_test_service, harness_with, random_address, shares, test_settings};
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn degen_winner_claims_the_pool_exactly_once() {
    let h = create_test_service();
    let users = ["alice", "bob", "dave"];
    let wallet = h.locked_degen_wallet("carol", &users, 30).await;
    let audit = h.service.execute_roulette(wallet.id, "carol").await.unwrap();
    let winner = *users
        .iter()
        .find(|u| **u != audit.selected_loser_id)
        .unwrap();

    let receipt = h.service.withdraw(wallet.id, winner, "", 90).await.unwrap();
    assert_eq!(receipt.amount, 90);
    assert_eq!(receipt.wallet_status, WalletStatus::Closed);
    assert_eq!(h.ledger.balance_of(&wallet.on_chain_address).await, 0);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let err = h.service.withdraw(wallet.id, winner, "", 90).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn degen_winner_must_claim_the_full_pool() {
    let h = create_test_service();
    let users = ["alice", "bob"];
    let wallet = h.locked_degen_wallet("carol", &users, 30).await;
    let audit = h.service.execute_roulette(wallet.id, "carol").await.unwrap();
    let winner = *users
        .iter()
        .find(|u| **u != audit.selected_loser_id)
        .unwrap();

    let err = h.service.withdraw(wallet.id, winner, "", 30).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn degen_loser_refund_goes_to_an_external_destination_once() {
    let h = create_test_service();
    let users = ["alice", "bob", "dave"];
    let wallet = h.locked_degen_wallet("carol", &users, 30).await;
    let audit = h.service.execute_roulette(wallet.id, "carol").await.unwrap();
    let loser = audit.selected_loser_id.as_str();

    // Empty destination would fall back to the in-app wallet: rejected.
    let err = h.service.withdraw(wallet.id, loser, "", 30).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // The loser's own custodial address is not external either.
    let primary = h.directory.primary_address(loser).await.unwrap().unwrap();
    let err = h
        .service
        .withdraw(wallet.id, loser, &primary, 30)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // The refund is capped at the locked stake.
    let external = random_address();
    let err = h
        .service
        .withdraw(wallet.id, loser, &external, 40)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let receipt = h
        .service
        .withdraw(wallet.id, loser, &external, 30)
        .await
        .unwrap();
    assert_eq!(receipt.destination, external);
    assert_eq!(h.ledger.balance_of(&external).await, 30);

    // Exactly once: a second refund to a fresh destination conflicts.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let another = random_address();
    let err = h
        .service
        .withdraw(wallet.id, loser, &another, 30)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn fair_withdrawal_is_creator_only_and_closes_the_wallet() {
    let h = create_test_service();
    let wallet = h
        .funded_fair_wallet("carol", &[("alice", 50), ("bob", 50)], 100)
        .await;

    let err = h.service.withdraw(wallet.id, "alice", "", 100).await.unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));

    let carol_primary = h.fund_user("carol", 0).await;
    let receipt = h.service.withdraw(wallet.id, "carol", "", 100).await.unwrap();
    assert_eq!(receipt.destination, carol_primary);
    assert_eq!(receipt.wallet_status, WalletStatus::Closed);
    assert_eq!(h.ledger.balance_of(&carol_primary).await, 100);
}

#[tokio::test]
async fn fair_withdrawal_requires_full_funding() {
    let h = create_test_service();
    h.fund_user("alice", 1_000).await;
    h.fund_user("carol", 0).await;

    let wallet = h
        .service
        .create_wallet(CreateWalletRequest {
            bill_id: "bill-underfunded".to_string(),
            kind: WalletKind::Fair,
            creator_id: "carol".to_string(),
            participants: shares(&[("alice", 50), ("bob", 50)]),
            total_amount: 100,
        })
        .await
        .unwrap();
    h.service.contribute(wallet.id, "alice", 50).await.unwrap();

    let err = h.service.withdraw(wallet.id, "carol", "", 50).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn unresolvable_destination_fails_before_the_ledger_is_touched() {
    let h = create_test_service();
    let wallet = h
        .service
        .create_wallet(CreateWalletRequest {
            bill_id: "bill-nodest".to_string(),
            kind: WalletKind::Fair,
            creator_id: "carol".to_string(),
            participants: shares(&[("alice", 50)]),
            total_amount: 50,
        })
        .await
        .unwrap();

    // Carol has no primary wallet registered and provided no destination.
    let err = h.service.withdraw(wallet.id, "carol", "", 50).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(h.ledger.transfer_count().await, 0);
}

/// Co-signer that signs correctly but leaves the fee payer out of the
/// expected slot.
struct TailCoSigner {
    signing_key: SigningKey,
    address: String,
}

impl TailCoSigner {
    fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let address = hex::encode(signing_key.verifying_key().to_bytes());
        TailCoSigner { signing_key, address }
    }
}

#[async_trait]
impl FeePayerCoSigner for TailCoSigner {
    async fn co_sign(
        &self,
        mut tx: TransferTransaction,
    ) -> Result<TransferTransaction, EngineError> {
        let signature = self.signing_key.sign(&tx.signing_message());
        tx.signers.push(SignerSlot {
            address: self.address.clone(),
            signature: Some(hex::encode(signature.to_bytes())),
        });
        Ok(tx)
    }

    fn fee_payer_address(&self) -> String {
        self.address.clone()
    }
}

#[tokio::test]
async fn misplaced_fee_payer_is_rejected_locally() {
    let cosigner: Arc<dyn FeePayerCoSigner> = Arc::new(TailCoSigner::generate());
    let h = harness_with(test_settings(), None, Some(cosigner));

    let wallet = h.funded_fair_wallet("carol", &[("alice", 50)], 50).await;
    h.fund_user("carol", 0).await;

    let funding_transfers = h.ledger.transfer_count().await;
    let err = h.service.withdraw(wallet.id, "carol", "", 50).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // Nothing reached the network and the wallet state was restored.
    assert_eq!(h.ledger.transfer_count().await, funding_transfers);
    let stored = h.store.get_wallet(wallet.id).await.unwrap().unwrap();
    assert_eq!(stored.status, WalletStatus::Funding);
}

#[tokio::test]
async fn shared_members_withdraw_within_their_contribution() {
    let h = create_test_service();
    h.fund_user("alice", 1_000).await;
    h.fund_user("bob", 1_000).await;

    let wallet = h
        .service
        .create_wallet(CreateWalletRequest {
            bill_id: "bill-shared".to_string(),
            kind: WalletKind::Shared,
            creator_id: "alice".to_string(),
            participants: shares(&[("alice", 50), ("bob", 50)]),
            total_amount: 100,
        })
        .await
        .unwrap();
    h.service.contribute(wallet.id, "alice", 50).await.unwrap();
    h.service.contribute(wallet.id, "bob", 50).await.unwrap();

    let err = h
        .service
        .withdraw(wallet.id, "mallory", &random_address(), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));

    let err = h.service.withdraw(wallet.id, "alice", "", 60).await.unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));

    let receipt = h.service.withdraw(wallet.id, "alice", "", 30).await.unwrap();
    assert_eq!(receipt.amount, 30);
    // Funds remain, so the wallet stays open for the other members.
    assert_eq!(receipt.wallet_status, WalletStatus::Funding);
    assert_eq!(h.ledger.balance_of(&wallet.on_chain_address).await, 70);
}
