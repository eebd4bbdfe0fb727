#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//! Signature requirements: threshold submit keys, multi-party transfers and
//! transactions paid by someone other than the sender

mod common;

use common::Harness;
use ledger_common::crypto::PrivateKey;
use ledger_testing_framework::prelude::*;
use ledger_testing_framework::rpc::TransactionReceipt;
use ledger_testing_framework::services::topic;
use ledger_testing_framework::transaction::{TopicMessageSubmitBody, TransactionBody};

async fn submit(
    tx: &mut PendingTransaction,
    client: &LedgerClient,
) -> Result<TransactionReceipt, LedgerError> {
    tx.execute(client).await?.get_receipt(client).await
}

fn message(topic_id: TopicId, text: &str) -> PendingTransaction {
    PendingTransaction::new(TransactionBody::TopicMessageSubmit(TopicMessageSubmitBody {
        topic_id,
        message: text.as_bytes().to_vec(),
    }))
}

#[tokio::test]
async fn test_one_of_two_threshold_accepts_single_signature() {
    let h = Harness::new(3, 10);
    let key = ThresholdKey::new(
        vec![h.account(1).public_key(), h.account(2).public_key()],
        1,
    )
    .unwrap();
    assert_eq!(key.threshold(), 1);
    assert_eq!(key.len(), 2);
    let topic_id = topic::create_topic(&h.client, "Hedera is great!", Some(key.clone().into()))
        .await
        .unwrap();

    let info = topic::topic_info(&h.client, &topic_id).await.unwrap();
    assert_eq!(info.submit_key, Some(Key::Threshold(key)));
    assert_eq!(info.submit_key.unwrap().required_signatures(), 1);

    // Paid by account 0, so only the quorum signature counts towards the key
    let as_reference = h.client.with_operator(h.account(0));
    let receipt = topic::submit_message(&as_reference, &topic_id, "Hello Future", &h.pool)
        .await
        .unwrap();
    assert_eq!(receipt.topic_sequence_number, Some(1));
}

#[tokio::test]
async fn test_two_of_two_threshold_rejects_single_signature() {
    let h = Harness::new(3, 11);
    let key = Key::from(
        ThresholdKey::new(
            vec![h.account(1).public_key(), h.account(2).public_key()],
            2,
        )
        .unwrap(),
    );
    let topic_id = topic::create_topic(&h.client, "strict", Some(key.clone()))
        .await
        .unwrap();

    // Operator (account 1) signs, account 2 does not
    let mut short = message(topic_id, "not enough");
    let err = submit(&mut short, &h.client).await.unwrap_err();
    assert_eq!(err.status(), Some(Status::InvalidSignature));

    let mut full = message(topic_id, "quorum");
    full.freeze_with(&h.client)
        .unwrap()
        .sign_for_quorum(&key, &h.pool)
        .unwrap();
    let receipt = submit(&mut full, &h.client).await.unwrap();
    assert!(receipt.status.is_success());
}

#[tokio::test]
async fn test_quorum_needs_keys_from_the_pool() {
    let h = Harness::new(2, 12);
    let outsider = PrivateKey::generate().public_key();
    let key = Key::from(ThresholdKey::new(vec![h.account(1).public_key(), outsider], 2).unwrap());

    let mut tx = message(TopicId::from_num(9_999), "unused");
    tx.freeze_with(&h.client).unwrap();
    let err = tx.sign_for_quorum(&key, &h.pool).unwrap_err();
    assert!(matches!(err, LedgerError::Configuration(_)));
}

#[tokio::test]
async fn test_multi_party_transfer_needs_every_debited_signature() {
    let h = Harness::new(5, 13);
    let token_id = h.create_token(1_000).await;
    let reconciler = h.reconciler();
    for index in 1..=4 {
        ensure_associated(&h.client, &token_id, h.account(index)).await.unwrap();
        reconciler
            .reconcile_token(&h.client, &token_id, h.account(index), 100)
            .await
            .unwrap();
    }

    let legs = || {
        TransferTransactionBuilder::multi_party(
            token_id,
            &[(h.account(1).id, 10), (h.account(2).id, 10)],
            &[(h.account(3).id, 10), (h.account(4).id, 10)],
        )
        .unwrap()
    };

    // Account 1 pays and signs as operator; account 2 is debited but silent
    let mut unsigned = legs();
    let err = submit(&mut unsigned, &h.client).await.unwrap_err();
    assert_eq!(err.status(), Some(Status::InvalidSignature));
    assert_eq!(h.token_balance(&token_id, 2).await, 100);

    let mut signed = legs();
    signed
        .freeze_with(&h.client)
        .unwrap()
        .sign(&h.account(2).private_key)
        .unwrap();
    submit(&mut signed, &h.client).await.unwrap();

    let balances = [
        h.token_balance(&token_id, 1).await,
        h.token_balance(&token_id, 2).await,
        h.token_balance(&token_id, 3).await,
        h.token_balance(&token_id, 4).await,
    ];
    assert_eq!(balances, [90, 90, 110, 110]);
    h.ledger.check_invariants().unwrap();
}

#[tokio::test]
async fn test_unbalanced_transfer_is_rejected() {
    let h = Harness::new(3, 14);
    let token_id = h.create_token(1_000).await;
    let mut tx = TransferTransactionBuilder::multi_party(
        token_id,
        &[(h.account(0).id, 10)],
        &[(h.account(1).id, 5)],
    )
    .unwrap();

    let as_treasury = h.client.with_operator(h.account(0));
    let err = submit(&mut tx, &as_treasury).await.unwrap_err();
    assert!(err.status().is_some());
    assert_eq!(h.token_balance(&token_id, 0).await, 1_000);
}

#[tokio::test]
async fn test_operator_pays_for_transaction_signed_by_sender() {
    let h = Harness::new(3, 15);
    let token_id = h.create_token(1_000).await;
    let reconciler = h.reconciler();
    for index in 1..=2 {
        ensure_associated(&h.client, &token_id, h.account(index)).await.unwrap();
        reconciler
            .reconcile_token(&h.client, &token_id, h.account(index), 100)
            .await
            .unwrap();
    }

    let first = h.account(1);
    let second = h.account(2);
    let first_before = h.ledger.hbar_balance(&first.id).unwrap();
    let second_before = h.ledger.hbar_balance(&second.id).unwrap();

    let mut tx =
        TransferTransactionBuilder::token_transfer(token_id, second.id, first.id, 10).unwrap();
    tx.freeze_with(&h.client)
        .unwrap()
        .sign(&second.private_key)
        .unwrap();
    let response = tx.execute(&h.client).await.unwrap();
    response.get_receipt(&h.client).await.unwrap();

    let record = response.get_record(&h.client).await.unwrap();
    assert_eq!(record.payer(), first.id);
    assert_eq!(record.transaction_fee, h.ledger.fee());
    assert_eq!(
        h.ledger.hbar_balance(&first.id).unwrap(),
        first_before - h.ledger.fee()
    );
    assert_eq!(h.ledger.hbar_balance(&second.id).unwrap(), second_before);
    assert_eq!(h.token_balance(&token_id, 1).await, 110);
}

#[tokio::test]
async fn test_frozen_transaction_cannot_be_submitted_twice() {
    let h = Harness::new(2, 16);
    let mut tx =
        TransferTransactionBuilder::hbar_transfer(h.account(1).id, h.account(0).id, Hbar::from_hbars(1))
            .unwrap();
    submit(&mut tx, &h.client).await.unwrap();

    let err = tx.execute(&h.client).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}
