use crate::core::errors::EngineError;
use crate::core::lifecycle::CreateWalletRequest;
use crate::core::models::wallet::{WalletKind, WalletStatus};
use crate::infrastructure::storage::WalletStore;
use crate::tests::{create_test_service, shares};

#[tokio::test]
async fn roulette_selects_exactly_one_locked_participant() {
    let h = create_test_service();
    let users = ["alice", "bob", "dave"];
    let wallet = h.locked_degen_wallet("carol", &users, 30).await;
    assert_eq!(wallet.status, WalletStatus::Locked);

    let audit = h.service.execute_roulette(wallet.id, "carol").await.unwrap();
    assert!(users.contains(&audit.selected_loser_id.as_str()));
    assert_eq!(audit.executed_by, "carol");
    assert_eq!(audit.entropy_source_id, "os-rng");
    assert_eq!(audit.seed.len(), 64);

    // The status transition and the audit are visible together.
    let stored = h.store.get_wallet(wallet.id).await.unwrap().unwrap();
    assert_eq!(stored.status, WalletStatus::RouletteComplete);
    assert_eq!(
        stored.roulette_audit.as_ref().unwrap().selected_loser_id,
        audit.selected_loser_id
    );
}

#[tokio::test]
async fn re_invocation_returns_the_recorded_outcome() {
    let h = create_test_service();
    let wallet = h.locked_degen_wallet("carol", &["alice", "bob", "dave"], 30).await;

    let first = h.service.execute_roulette(wallet.id, "carol").await.unwrap();
    let second = h.service.execute_roulette(wallet.id, "carol").await.unwrap();

    // No new selection: seed and loser are byte-identical.
    assert_eq!(first, second);
}

#[tokio::test]
async fn only_the_creator_may_execute() {
    let h = create_test_service();
    let wallet = h.locked_degen_wallet("carol", &["alice", "bob"], 30).await;

    let err = h
        .service
        .execute_roulette(wallet.id, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));
}

#[tokio::test]
async fn execution_requires_every_stake_locked() {
    let h = create_test_service();
    h.fund_user("alice", 1_000).await;
    h.fund_user("bob", 1_000).await;

    let wallet = h
        .service
        .create_wallet(CreateWalletRequest {
            bill_id: "bill-partial".to_string(),
            kind: WalletKind::Degen,
            creator_id: "carol".to_string(),
            participants: shares(&[("alice", 30), ("bob", 30)]),
            total_amount: 60,
        })
        .await
        .unwrap();
    h.service.contribute(wallet.id, "alice", 30).await.unwrap();

    let err = h
        .service
        .execute_roulette(wallet.id, "carol")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn non_degen_wallets_cannot_roll() {
    let h = create_test_service();
    let wallet = h
        .funded_fair_wallet("carol", &[("alice", 50), ("bob", 50)], 100)
        .await;

    let err = h
        .service
        .execute_roulette(wallet.id, "carol")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}
