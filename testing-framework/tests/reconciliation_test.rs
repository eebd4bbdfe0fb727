#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//! Association guard and balance reconciler against the test ledger

mod common;

use common::Harness;
use ledger_testing_framework::prelude::*;
use ledger_testing_framework::services::Asset;
use proptest::prelude::*;

#[tokio::test]
async fn test_association_is_idempotent() {
    let h = Harness::new(3, 1);
    let token_id = h.create_token(1_000).await;
    let account = h.account(2);

    let first = ensure_associated(&h.client, &token_id, account).await.unwrap();
    assert!(first.submitted());
    let count = h.ledger.transaction_count();

    let second = ensure_associated(&h.client, &token_id, account).await.unwrap();
    assert_eq!(second, AssociationOutcome::AlreadyAssociated);
    assert_eq!(h.ledger.transaction_count(), count);
}

#[tokio::test]
async fn test_token_reconcile_moves_delta_both_ways() {
    let h = Harness::new(3, 2);
    let token_id = h.create_token(1_000).await;
    let account = h.account(1);
    let reconciler = h.reconciler();
    ensure_associated(&h.client, &token_id, account).await.unwrap();

    let up = reconciler
        .reconcile_token(&h.client, &token_id, account, 100)
        .await
        .unwrap();
    match up {
        ReconcileOutcome::Transferred {
            asset, from, amount, ..
        } => {
            assert_eq!(asset, Asset::Token(token_id));
            assert_eq!(from, h.account(0).id);
            assert_eq!(amount, 100);
        }
        ReconcileOutcome::Unchanged => panic!("expected a transfer"),
    }

    let down = reconciler
        .reconcile_token(&h.client, &token_id, account, 40)
        .await
        .unwrap();
    assert!(matches!(
        down,
        ReconcileOutcome::Transferred { from, amount: 60, .. } if from == account.id
    ));

    assert_eq!(h.token_balance(&token_id, 1).await, 40);
    assert_eq!(h.token_balance(&token_id, 0).await, 960);
    h.ledger.check_invariants().unwrap();
}

#[tokio::test]
async fn test_equal_target_issues_no_transaction() {
    let h = Harness::new(2, 3);
    let token_id = h.create_token(500).await;
    let account = h.account(1);
    let reconciler = h.reconciler();
    ensure_associated(&h.client, &token_id, account).await.unwrap();
    reconciler
        .reconcile_token(&h.client, &token_id, account, 25)
        .await
        .unwrap();

    let count = h.ledger.transaction_count();
    let outcome = reconciler
        .reconcile_token(&h.client, &token_id, account, 25)
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert_eq!(h.ledger.transaction_count(), count);
}

#[tokio::test]
async fn test_native_reconcile_only_moves_excess() {
    let h = Harness::new(2, 4);
    let account = h.account(1);
    let reconciler = h.reconciler();
    let reserve = Hbar::from_hbars(1);
    let target = Hbar::from_hbars(10);

    let outcome = reconciler
        .reconcile_native_currency(&h.client, account, target, reserve)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        ReconcileOutcome::Transferred { asset: Asset::Hbar, amount, .. }
            if amount == Hbar::from_hbars(989).to_tinybars()
    ));

    // The account paid the fee for its own corrective transfer
    let balance = h.ledger.hbar_balance(&account.id).unwrap();
    assert_eq!(balance, target + reserve - h.ledger.fee());

    let count = h.ledger.transaction_count();
    for higher_target in [target, Hbar::from_hbars(500)] {
        let outcome = reconciler
            .reconcile_native_currency(&h.client, account, higher_target, reserve)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
    }
    assert_eq!(h.ledger.transaction_count(), count);
    h.ledger.check_invariants().unwrap();
}

#[tokio::test]
async fn test_token_reconcile_requires_association() {
    let h = Harness::new(2, 5);
    let token_id = h.create_token(100).await;

    let err = h
        .reconciler()
        .reconcile_token(&h.client, &token_id, h.account(1), 10)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(Status::TokenNotAssociatedToAccount));
}

#[tokio::test]
async fn test_reference_account_is_never_reconciled_against_itself() {
    let h = Harness::new(2, 7);
    let token_id = h.create_token(1_000).await;
    let reference = h.account(0);
    let reconciler = h.reconciler();
    let count = h.ledger.transaction_count();
    let balance = h.ledger.hbar_balance(&reference.id).unwrap();

    let native = reconciler
        .reconcile_native_currency(&h.client, reference, Hbar::from_hbars(1), Hbar::from_hbars(1))
        .await
        .unwrap();
    assert_eq!(native, ReconcileOutcome::Unchanged);

    let same = reconciler
        .reconcile_token(&h.client, &token_id, reference, 1_000)
        .await
        .unwrap();
    assert_eq!(same, ReconcileOutcome::Unchanged);

    let err = reconciler
        .reconcile_token(&h.client, &token_id, reference, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Configuration(_)));

    assert_eq!(h.ledger.transaction_count(), count);
    assert_eq!(h.ledger.hbar_balance(&reference.id).unwrap(), balance);
}

struct Convergence {
    balance: u64,
    treasury: u64,
    second_pass: ReconcileOutcome,
    transactions_before: usize,
    transactions_after: usize,
    conserved: bool,
}

async fn reconcile_twice(prior: u64, target: u64) -> Convergence {
    let h = Harness::new(2, 6);
    let token_id = h.create_token(1_000).await;
    let account = h.account(1);
    let reconciler = h.reconciler();
    ensure_associated(&h.client, &token_id, account).await.unwrap();

    reconciler
        .reconcile_token(&h.client, &token_id, account, prior)
        .await
        .unwrap();
    reconciler
        .reconcile_token(&h.client, &token_id, account, target)
        .await
        .unwrap();

    let transactions_before = h.ledger.transaction_count();
    let second_pass = reconciler
        .reconcile_token(&h.client, &token_id, account, target)
        .await
        .unwrap();

    Convergence {
        balance: h.token_balance(&token_id, 1).await,
        treasury: h.token_balance(&token_id, 0).await,
        second_pass,
        transactions_before,
        transactions_after: h.ledger.transaction_count(),
        conserved: h.ledger.check_invariants().is_ok(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_token_reconcile_converges_and_conserves(prior in 0u64..=1_000, target in 0u64..=1_000) {
        let result = tokio_test::block_on(reconcile_twice(prior, target));

        prop_assert_eq!(result.balance, target);
        prop_assert_eq!(result.balance + result.treasury, 1_000);
        prop_assert_eq!(result.second_pass, ReconcileOutcome::Unchanged);
        prop_assert_eq!(result.transactions_before, result.transactions_after);
        prop_assert!(result.conserved);
    }
}
