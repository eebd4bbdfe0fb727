use ledger_common::{AccountId, Hbar, LedgerError, TokenId};

use super::PendingTransaction;

/// Shorthands for the transfer shapes scenarios build
///
/// The builder does not check that legs net to zero; an unbalanced list is
/// left for the ledger to reject.
pub struct TransferTransactionBuilder;

impl TransferTransactionBuilder {
    /// `amount` of `token` from one account to another
    pub fn token_transfer(
        token_id: TokenId,
        from: AccountId,
        to: AccountId,
        amount: u64,
    ) -> Result<PendingTransaction, LedgerError> {
        let amount = leg_amount(amount)?;
        let mut tx = PendingTransaction::transfer();
        tx.add_token_transfer(token_id, from, -amount)?
            .add_token_transfer(token_id, to, amount)?;
        Ok(tx)
    }

    pub fn hbar_transfer(
        from: AccountId,
        to: AccountId,
        amount: Hbar,
    ) -> Result<PendingTransaction, LedgerError> {
        let tinybars = leg_amount(amount.to_tinybars())?;
        let mut tx = PendingTransaction::transfer();
        tx.add_hbar_transfer(from, -tinybars)?
            .add_hbar_transfer(to, tinybars)?;
        Ok(tx)
    }

    /// One token, many legs: `debits` leave each listed account, `credits`
    /// arrive on each listed account
    pub fn multi_party(
        token_id: TokenId,
        debits: &[(AccountId, u64)],
        credits: &[(AccountId, u64)],
    ) -> Result<PendingTransaction, LedgerError> {
        let mut tx = PendingTransaction::transfer();
        for (account, amount) in debits {
            tx.add_token_transfer(token_id, *account, -leg_amount(*amount)?)?;
        }
        for (account, amount) in credits {
            tx.add_token_transfer(token_id, *account, leg_amount(*amount)?)?;
        }
        Ok(tx)
    }
}

// Legs are signed, so amounts above i64::MAX cannot be expressed
fn leg_amount(amount: u64) -> Result<i64, LedgerError> {
    i64::try_from(amount).map_err(|_| {
        LedgerError::configuration(format!(
            "transfer amount {} exceeds the largest leg of {}",
            amount,
            i64::MAX
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionBody;

    #[test]
    fn test_multi_party_legs() {
        let token = TokenId::from_num(5000);
        let ids: Vec<AccountId> = (1..=4).map(AccountId::from_num).collect();
        let tx = TransferTransactionBuilder::multi_party(
            token,
            &[(ids[0], 10), (ids[1], 10)],
            &[(ids[2], 10), (ids[3], 10)],
        )
        .unwrap();

        let TransactionBody::Transfer(body) = tx.body() else {
            panic!("expected a transfer body");
        };
        let amounts: Vec<i64> = body.token_transfers.iter().map(|leg| leg.amount).collect();
        assert_eq!(amounts, vec![-10, -10, 10, 10]);
        assert_eq!(body.debited_accounts(), vec![ids[0], ids[1]]);
    }

    #[test]
    fn test_oversized_amount_is_bad_input() {
        let ids: Vec<AccountId> = (1..=2).map(AccountId::from_num).collect();
        let token = TokenId::from_num(5000);

        let err = TransferTransactionBuilder::token_transfer(token, ids[0], ids[1], u64::MAX)
            .err()
            .unwrap();
        assert!(matches!(err, LedgerError::Configuration(_)), "{:?}", err);

        let err = TransferTransactionBuilder::hbar_transfer(ids[0], ids[1], Hbar::from_tinybars(u64::MAX))
            .err()
            .unwrap();
        assert!(matches!(err, LedgerError::Configuration(_)), "{:?}", err);

        assert!(TransferTransactionBuilder::token_transfer(token, ids[0], ids[1], i64::MAX as u64).is_ok());
    }

    #[test]
    fn test_self_transfer_merges_to_zero() {
        let account = AccountId::from_num(7);
        let tx = TransferTransactionBuilder::hbar_transfer(account, account, Hbar::from_hbars(1))
            .unwrap();
        let TransactionBody::Transfer(body) = tx.body() else {
            panic!("expected a transfer body");
        };
        assert_eq!(body.hbar_transfers.len(), 1);
        assert_eq!(body.hbar_transfers[0].amount, 0);
    }
}
