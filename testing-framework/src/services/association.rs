use ledger_common::{LedgerError, Status, TokenId};

use crate::{
    accounts::Account,
    client::LedgerClient,
    rpc::TransactionReceipt,
    transaction::{PendingTransaction, TokenAssociateBody, TransactionBody},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationOutcome {
    AlreadyAssociated,
    Associated(TransactionReceipt),
}

impl AssociationOutcome {
    pub fn submitted(&self) -> bool {
        matches!(self, Self::Associated(_))
    }
}

/// Make sure `account` may hold `token`, associating it only when needed
///
/// The association is paid for and signed by the account itself. Calling
/// this again for the same pair never submits a second transaction.
pub async fn ensure_associated(
    client: &LedgerClient,
    token_id: &TokenId,
    account: &Account,
) -> Result<AssociationOutcome, LedgerError> {
    let info = client.rpc().account_info(&account.id).await?;
    if info.token_relationships.contains_key(token_id) {
        log::debug!("{} already associated with token {}", account.id, token_id);
        return Ok(AssociationOutcome::AlreadyAssociated);
    }

    let as_account = client.with_operator(account);
    let mut tx = PendingTransaction::new(TransactionBody::TokenAssociate(TokenAssociateBody {
        account_id: account.id,
        token_ids: vec![*token_id],
    }));
    tx.freeze_with(&as_account)?.sign(&account.private_key)?;

    let response = tx.execute(&as_account).await?;
    match response.get_receipt(&as_account).await {
        Ok(receipt) => {
            log::info!("Associated {} with token {}", account.id, token_id);
            Ok(AssociationOutcome::Associated(receipt))
        }
        // Someone associated the pair between our query and our submission
        Err(err) if err.status() == Some(Status::TokenAlreadyAssociatedToAccount) => {
            Ok(AssociationOutcome::AlreadyAssociated)
        }
        Err(err) => Err(err),
    }
}
