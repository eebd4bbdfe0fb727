//! Balance reconciliation against the reference account
//!
//! Preconditions are stated as target balances. The reconciler queries the
//! current balance and submits the single transfer that closes the gap, or
//! nothing at all when there is no gap.

use ledger_common::{AccountId, Hbar, LedgerError, TokenId};

use crate::{
    accounts::Account,
    client::LedgerClient,
    rpc::TransactionReceipt,
    transaction::TransferTransactionBuilder,
};

/// Asset moved by a corrective transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Hbar,
    Token(TokenId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Already at target, no transaction issued
    Unchanged,
    Transferred {
        asset: Asset,
        from: AccountId,
        to: AccountId,
        amount: u64,
        receipt: TransactionReceipt,
    },
}

impl ReconcileOutcome {
    pub fn submitted(&self) -> bool {
        matches!(self, Self::Transferred { .. })
    }
}

pub struct BalanceReconciler {
    reference: Account,
}

impl BalanceReconciler {
    pub fn new(reference: Account) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &Account {
        &self.reference
    }

    /// Move any hbars above `target + reserve` back to the reference account
    ///
    /// Never tops an account up: an account already at or below the target
    /// is left alone. The reserve stays on the account so it can keep paying
    /// its own fees. The transfer is paid and signed by `account`, so the
    /// resulting balance ends a fee below `target + reserve`.
    pub async fn reconcile_native_currency(
        &self,
        client: &LedgerClient,
        account: &Account,
        target: Hbar,
        reserve: Hbar,
    ) -> Result<ReconcileOutcome, LedgerError> {
        // Excess on the reference account has nowhere else to go
        if account.id == self.reference.id {
            log::debug!("{} is the reference account, leaving its hbars", account.id);
            return Ok(ReconcileOutcome::Unchanged);
        }

        let balance = client.rpc().account_balance(&account.id).await?.hbars;
        let available = balance.saturating_sub(reserve);
        if available <= target {
            log::debug!(
                "{} holds {}, nothing above {} + {} reserve",
                account.id,
                balance,
                target,
                reserve
            );
            return Ok(ReconcileOutcome::Unchanged);
        }

        let excess = available.saturating_sub(target);
        let as_account = client.with_operator(account);
        let mut tx =
            TransferTransactionBuilder::hbar_transfer(account.id, self.reference.id, excess)?;
        let receipt = tx
            .execute(&as_account)
            .await?
            .get_receipt(&as_account)
            .await?;

        log::info!(
            "Moved {} excess from {} to {}",
            excess,
            account.id,
            self.reference.id
        );
        Ok(ReconcileOutcome::Transferred {
            asset: Asset::Hbar,
            from: account.id,
            to: self.reference.id,
            amount: excess.to_tinybars(),
            receipt,
        })
    }

    /// Transfer the difference between `target` and the current token
    /// balance, in whichever direction closes it
    ///
    /// The debited side pays and signs. `account` must already be
    /// associated with the token. The reference account can only be
    /// reconciled to the balance it already holds.
    pub async fn reconcile_token(
        &self,
        client: &LedgerClient,
        token_id: &TokenId,
        account: &Account,
        target: u64,
    ) -> Result<ReconcileOutcome, LedgerError> {
        let current = client.rpc().account_balance(&account.id).await?.token(token_id);

        let (from, to, amount) = match current.cmp(&target) {
            std::cmp::Ordering::Equal => {
                log::debug!("{} already holds {} of {}", account.id, target, token_id);
                return Ok(ReconcileOutcome::Unchanged);
            }
            _ if account.id == self.reference.id => {
                return Err(LedgerError::configuration(format!(
                    "reference account {} holds {} of {}, cannot reconcile it to {} against itself",
                    account.id, current, token_id, target
                )));
            }
            std::cmp::Ordering::Less => (&self.reference, account, target - current),
            std::cmp::Ordering::Greater => (account, &self.reference, current - target),
        };

        let as_sender = client.with_operator(from);
        let mut tx = TransferTransactionBuilder::token_transfer(*token_id, from.id, to.id, amount)?;
        let receipt = tx
            .execute(&as_sender)
            .await?
            .get_receipt(&as_sender)
            .await?;

        log::info!(
            "Moved {} of token {} from {} to {} (target {})",
            amount,
            token_id,
            from.id,
            to.id,
            target
        );
        Ok(ReconcileOutcome::Transferred {
            asset: Asset::Token(*token_id),
            from: from.id,
            to: to.id,
            amount,
            receipt,
        })
    }
}
