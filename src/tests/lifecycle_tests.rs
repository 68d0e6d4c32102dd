use crate::core::errors::EngineError;
use crate::core::lifecycle::CreateWalletRequest;
use crate::core::models::wallet::{WalletKind, WalletStatus};
use crate::infrastructure::ledger::LedgerClient;
use crate::tests::{create_test_service, shares};
use uuid::Uuid;

fn request(kind: WalletKind) -> CreateWalletRequest {
    CreateWalletRequest {
        bill_id: "bill-99".to_string(),
        kind,
        creator_id: "carol".to_string(),
        participants: shares(&[("alice", 50), ("bob", 50)]),
        total_amount: 100,
    }
}

#[tokio::test]
async fn creation_is_checked_then_created_per_bill_and_kind() {
    let h = create_test_service();

    let wallet = h.service.create_wallet(request(WalletKind::Fair)).await.unwrap();
    assert_eq!(wallet.status, WalletStatus::Created);
    assert!(h.ledger.is_valid_address(&wallet.on_chain_address));

    let err = h
        .service
        .create_wallet(request(WalletKind::Fair))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    // A different kind for the same bill is a different wallet.
    let degen = h
        .service
        .create_wallet(CreateWalletRequest {
            participants: shares(&[("alice", 50), ("bob", 50)]),
            ..request(WalletKind::Degen)
        })
        .await
        .unwrap();
    assert_ne!(degen.id, wallet.id);

    let by_bill = h
        .service
        .get_wallet_by_bill("bill-99", WalletKind::Fair)
        .await
        .unwrap();
    assert_eq!(by_bill.id, wallet.id);
}

#[tokio::test]
async fn custody_failure_rolls_the_wallet_back() {
    let h = create_test_service();

    h.store.set_fail_custody_writes(true).await;
    let err = h
        .service
        .create_wallet(request(WalletKind::Degen))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Custody(_)));

    // No orphaned wallet without retrievable custody.
    h.store.set_fail_custody_writes(false).await;
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let err = h
        .service
        .get_wallet_by_bill("bill-99", WalletKind::Degen)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // The same request succeeds once custody is writable again.
    h.service.create_wallet(request(WalletKind::Degen)).await.unwrap();
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let h = create_test_service();

    let mut empty = request(WalletKind::Fair);
    empty.participants = vec![];
    assert!(matches!(
        h.service.create_wallet(empty).await.unwrap_err(),
        EngineError::Validation(_)
    ));

    let mut zero_total = request(WalletKind::Fair);
    zero_total.total_amount = 0;
    assert!(matches!(
        h.service.create_wallet(zero_total).await.unwrap_err(),
        EngineError::Validation(_)
    ));

    let mut duplicated = request(WalletKind::Fair);
    duplicated.participants = shares(&[("alice", 50), ("alice", 50)]);
    assert!(matches!(
        h.service.create_wallet(duplicated).await.unwrap_err(),
        EngineError::Validation(_)
    ));

    let mut uneven = request(WalletKind::Degen);
    uneven.participants = shares(&[("alice", 30), ("bob", 40)]);
    assert!(matches!(
        h.service.create_wallet(uneven).await.unwrap_err(),
        EngineError::Validation(_)
    ));
}

#[tokio::test]
async fn unknown_lookups_report_not_found() {
    let h = create_test_service();

    let err = h.service.get_wallet(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = h
        .service
        .get_wallet_by_bill("no-such-bill", WalletKind::Shared)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
