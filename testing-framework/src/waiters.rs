//! Bounded polling primitives
//!
//! Every wait has a deadline measured on the client's [`Clock`], so paused
//! test runtimes resolve them without real delays.

use ledger_common::{AccountId, LedgerError, TokenId, TransactionId};
use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    client::LedgerClient,
    orchestrator::Clock,
    rpc::{TransactionReceipt, TransactionRecord},
};

/// Poll `probe` every `interval` until it yields a value or `timeout` elapses
///
/// The probe runs at least once. Errors from the probe abort the wait.
pub async fn wait_until<T, F, Fut>(
    clock: &Arc<dyn Clock>,
    timeout: Duration,
    interval: Duration,
    condition: &str,
    mut probe: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, LedgerError>>,
{
    let started = clock.now();
    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }

        let waited = clock.elapsed(started);
        if waited >= timeout {
            log::warn!("gave up waiting for {} after {:?}", condition, waited);
            return Err(LedgerError::ObservationTimeout {
                condition: condition.to_owned(),
                waited,
            });
        }
        clock.sleep(interval.min(timeout - waited)).await;
    }
}

/// Wait until the transaction reaches consensus and return its receipt,
/// whatever its status
pub async fn wait_for_receipt(
    client: &LedgerClient,
    transaction_id: &TransactionId,
) -> Result<TransactionReceipt, LedgerError> {
    let condition = format!("receipt of {}", transaction_id);
    wait_until(
        client.clock(),
        client.receipt_timeout(),
        client.poll_interval(),
        &condition,
        move || client.rpc().get_receipt(transaction_id),
    )
    .await
}

pub async fn wait_for_record(
    client: &LedgerClient,
    transaction_id: &TransactionId,
) -> Result<TransactionRecord, LedgerError> {
    let condition = format!("record of {}", transaction_id);
    wait_until(
        client.clock(),
        client.receipt_timeout(),
        client.poll_interval(),
        &condition,
        move || client.rpc().get_record(transaction_id),
    )
    .await
}

/// Wait until `account` holds exactly `expected` units of `token`
pub async fn wait_for_token_balance(
    client: &LedgerClient,
    account: &AccountId,
    token: &TokenId,
    expected: u64,
    timeout: Duration,
) -> Result<u64, LedgerError> {
    let condition = format!("{} to hold {} of token {}", account, expected, token);
    wait_until(
        client.clock(),
        timeout,
        client.poll_interval(),
        &condition,
        move || async move {
            let balance = client.rpc().account_balance(account).await?.token(token);
            Ok((balance == expected).then_some(balance))
        },
    )
    .await
}
