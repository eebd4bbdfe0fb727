#![allow(clippy::unwrap_used)]
//! Topic publishing observed through the message observer

mod common;

use common::Harness;
use ledger_testing_framework::prelude::*;
use ledger_testing_framework::services::topic;

fn paused_harness(seed: u64) -> (Harness, Arc<dyn Clock>) {
    let clock: Arc<dyn Clock> = Arc::new(PausedClock::attach());
    let mut h = Harness::new(3, seed);
    h.client = h.client.clone().with_clock(clock.clone());
    (h, clock)
}

#[tokio::test(start_paused = true)]
async fn test_messages_observed_in_publication_order() {
    let (h, clock) = paused_harness(20);
    let submit_key = Key::from(h.account(1).public_key());
    let topic_id = topic::create_topic(&h.client, "ordering", Some(submit_key))
        .await
        .unwrap();

    let mut observer = MessageObserver::new(clock);
    observer.subscribe(&h.client, &topic_id).await.unwrap();
    for text in ["m1", "m2"] {
        topic::submit_message(&h.client, &topic_id, text, &h.pool)
            .await
            .unwrap();
    }

    let observation = observer
        .await_messages(2, Duration::from_secs(4))
        .await
        .unwrap();
    assert!(!observation.timed_out);
    assert_eq!(observation.texts(), vec!["m1", "m2"]);
    let sequence: Vec<u64> = observation
        .messages
        .iter()
        .map(|message| message.sequence_number)
        .collect();
    assert_eq!(sequence, vec![1, 2]);

    let info = topic::topic_info(&h.client, &topic_id).await.unwrap();
    assert_eq!(info.sequence_number, 2);
    assert_eq!(info.memo, "ordering");
}

#[tokio::test(start_paused = true)]
async fn test_late_subscriber_receives_history() {
    let (h, clock) = paused_harness(21);
    let topic_id = topic::create_topic(&h.client, "history", None).await.unwrap();
    topic::submit_message(&h.client, &topic_id, "before", &h.pool)
        .await
        .unwrap();

    let mut observer = MessageObserver::new(clock);
    observer.subscribe(&h.client, &topic_id).await.unwrap();
    topic::submit_message(&h.client, &topic_id, "after", &h.pool)
        .await
        .unwrap();

    let messages = observer
        .await_messages(2, Duration::from_secs(4))
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].text(), "after");
}

#[tokio::test(start_paused = true)]
async fn test_wrong_submit_key_is_rejected_and_not_observed() {
    let (h, clock) = paused_harness(22);
    let submit_key = Key::from(h.account(2).public_key());
    let topic_id = topic::create_topic(&h.client, "guarded", Some(submit_key))
        .await
        .unwrap();

    let mut observer = MessageObserver::new(clock);
    observer.subscribe(&h.client, &topic_id).await.unwrap();

    let mut tx = PendingTransaction::new(
        ledger_testing_framework::transaction::TransactionBody::TopicMessageSubmit(
            ledger_testing_framework::transaction::TopicMessageSubmitBody {
                topic_id,
                message: b"intruder".to_vec(),
            },
        ),
    );
    let err = tx
        .execute(&h.client)
        .await
        .unwrap()
        .get_receipt(&h.client)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(Status::InvalidSignature));

    let observation = observer
        .await_messages(1, Duration::from_secs(2))
        .await
        .unwrap();
    assert!(observation.timed_out);
    assert!(observation.messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_receipts_wait_out_consensus_lag() {
    let clock: Arc<dyn Clock> = Arc::new(PausedClock::attach());
    let h = Harness::with_ledger(2, 23, |builder| builder.with_receipt_lag(3));
    let client = h.client.clone().with_clock(clock.clone());

    let started = clock.now();
    let topic_id = topic::create_topic(&client, "slow", None).await.unwrap();
    assert!(clock.elapsed(started) >= client.poll_interval() * 3);

    let receipt = topic::submit_message(&client, &topic_id, "eventually", &h.pool)
        .await
        .unwrap();
    assert_eq!(receipt.topic_sequence_number, Some(1));
}
