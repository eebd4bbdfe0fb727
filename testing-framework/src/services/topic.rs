use ledger_common::{LedgerError, TopicId};

use crate::{
    accounts::AccountPool,
    client::LedgerClient,
    keys::Key,
    rpc::{TopicInfo, TransactionReceipt},
    transaction::{PendingTransaction, TopicCreateBody, TopicMessageSubmitBody, TransactionBody},
};

/// Create a topic paid by the client's operator
pub async fn create_topic(
    client: &LedgerClient,
    memo: &str,
    submit_key: Option<Key>,
) -> Result<TopicId, LedgerError> {
    let mut tx = PendingTransaction::new(TransactionBody::TopicCreate(TopicCreateBody {
        memo: memo.to_owned(),
        admin_key: None,
        submit_key,
    }));
    let receipt = tx.execute(client).await?.get_receipt(client).await?;
    let topic_id = receipt
        .topic_id
        .ok_or_else(|| LedgerError::invalid_state("topic create receipt carries no topic id"))?;

    log::info!("Created topic {} with memo {:?}", topic_id, memo);
    Ok(topic_id)
}

pub async fn topic_info(client: &LedgerClient, topic_id: &TopicId) -> Result<TopicInfo, LedgerError> {
    client.rpc().topic_info(topic_id).await
}

/// Publish `message`, signing for the topic's submit key from the pool
///
/// The receipt carries the message's sequence number.
pub async fn submit_message(
    client: &LedgerClient,
    topic_id: &TopicId,
    message: &str,
    pool: &AccountPool,
) -> Result<TransactionReceipt, LedgerError> {
    let info = topic_info(client, topic_id).await?;

    let mut tx = PendingTransaction::new(TransactionBody::TopicMessageSubmit(
        TopicMessageSubmitBody {
            topic_id: *topic_id,
            message: message.as_bytes().to_vec(),
        },
    ));
    tx.freeze_with(client)?;
    if let Some(submit_key) = &info.submit_key {
        tx.sign_for_quorum(submit_key, pool)?;
    }

    let receipt = tx.execute(client).await?.get_receipt(client).await?;
    log::debug!(
        "Message #{} published to topic {}",
        receipt.topic_sequence_number.unwrap_or_default(),
        topic_id
    );
    Ok(receipt)
}
