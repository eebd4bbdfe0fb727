//! Transaction lifecycle
//!
//! A [`PendingTransaction`] moves through
//! `building -> frozen -> (partially) signed -> submitted`. Freezing fixes
//! the transaction id (and with it the payer) and the bytes every signer
//! signs; from then on the body can no longer change.

mod body;
mod transfer;

pub use body::*;
pub use transfer::TransferTransactionBuilder;

use ledger_common::{
    crypto::{Hash, PrivateKey, PublicKey, Signature},
    AccountId, LedgerError, TokenId, TransactionId,
};

use crate::{
    accounts::AccountPool,
    client::LedgerClient,
    keys::Key,
    rpc::{TransactionReceipt, TransactionRecord},
    waiters,
};

#[derive(Debug)]
enum Stage {
    Building,
    Frozen {
        transaction_id: TransactionId,
        digest: Hash,
        signatures: Vec<(PublicKey, Signature)>,
    },
    Submitted {
        transaction_id: TransactionId,
    },
}

#[derive(Debug)]
pub struct PendingTransaction {
    body: TransactionBody,
    memo: String,
    stage: Stage,
}

impl PendingTransaction {
    pub fn new(body: TransactionBody) -> Self {
        Self {
            body,
            memo: String::new(),
            stage: Stage::Building,
        }
    }

    /// Empty transfer, legs are added afterwards
    pub fn transfer() -> Self {
        Self::new(TransactionBody::Transfer(TransferBody::default()))
    }

    pub fn with_memo<S: Into<String>>(mut self, memo: S) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn body(&self) -> &TransactionBody {
        &self.body
    }

    fn transfer_body_mut(&mut self) -> Result<&mut TransferBody, LedgerError> {
        if !matches!(self.stage, Stage::Building) {
            return Err(LedgerError::invalid_state(
                "transfer legs cannot change once the transaction is frozen",
            ));
        }
        match &mut self.body {
            TransactionBody::Transfer(transfer) => Ok(transfer),
            other => Err(LedgerError::invalid_state(format!(
                "cannot add transfer legs to a {} transaction",
                other.kind()
            ))),
        }
    }

    /// Add a native currency leg, in tinybars (negative debits)
    pub fn add_hbar_transfer(
        &mut self,
        account_id: AccountId,
        tinybars: i64,
    ) -> Result<&mut Self, LedgerError> {
        self.transfer_body_mut()?.add_hbar(account_id, tinybars);
        Ok(self)
    }

    /// Add a token leg (negative debits)
    pub fn add_token_transfer(
        &mut self,
        token_id: TokenId,
        account_id: AccountId,
        amount: i64,
    ) -> Result<&mut Self, LedgerError> {
        self.transfer_body_mut()?.add_token(token_id, account_id, amount);
        Ok(self)
    }

    /// Fix the transaction id with the client's operator as payer.
    /// Freezing an already frozen transaction is a no-op.
    pub fn freeze_with(&mut self, client: &LedgerClient) -> Result<&mut Self, LedgerError> {
        match self.stage {
            Stage::Building => {
                let payer = client.operator_account_id()?;
                let transaction_id = TransactionId::generate(payer);
                let digest = signing_digest(&transaction_id, &self.memo, &self.body)?;
                self.stage = Stage::Frozen {
                    transaction_id,
                    digest,
                    signatures: Vec::new(),
                };
                Ok(self)
            }
            Stage::Frozen { .. } => Ok(self),
            Stage::Submitted { transaction_id } => Err(LedgerError::invalid_state(format!(
                "transaction {} was already submitted",
                transaction_id
            ))),
        }
    }

    /// Add a signature; signing twice with the same key keeps one signature
    pub fn sign(&mut self, key: &PrivateKey) -> Result<&mut Self, LedgerError> {
        match &mut self.stage {
            Stage::Frozen {
                digest, signatures, ..
            } => {
                let public_key = key.public_key();
                if !signatures.iter().any(|(signer, _)| *signer == public_key) {
                    signatures.push((public_key, key.sign(digest.as_bytes())));
                }
                Ok(self)
            }
            Stage::Building => Err(LedgerError::invalid_state(
                "transaction must be frozen before it is signed",
            )),
            Stage::Submitted { .. } => Err(LedgerError::invalid_state(
                "transaction was already submitted",
            )),
        }
    }

    /// Sign with pool members of `key` until its threshold is met
    ///
    /// Keys already signed count towards the threshold. Fails with a
    /// configuration error when the pool does not hold enough member keys.
    pub fn sign_for_quorum(
        &mut self,
        key: &Key,
        pool: &AccountPool,
    ) -> Result<&mut Self, LedgerError> {
        let required = key.required_signatures();
        let members = key.public_keys();
        let already = self.signers();
        let mut signed = members
            .iter()
            .filter(|member| already.contains(*member))
            .count();

        for member in &members {
            if signed >= required {
                break;
            }
            if already.contains(member) {
                continue;
            }
            if let Some(account) = pool.find_by_public_key(member) {
                self.sign(&account.private_key)?;
                signed += 1;
            }
        }

        if signed < required {
            return Err(LedgerError::configuration(format!(
                "only {} of the {} signatures required by {} are available in the pool",
                signed, required, key
            )));
        }
        Ok(self)
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        match &self.stage {
            Stage::Building => None,
            Stage::Frozen { transaction_id, .. } | Stage::Submitted { transaction_id } => {
                Some(*transaction_id)
            }
        }
    }

    pub fn is_frozen(&self) -> bool {
        !matches!(self.stage, Stage::Building)
    }

    pub fn signers(&self) -> Vec<PublicKey> {
        match &self.stage {
            Stage::Frozen { signatures, .. } => signatures.iter().map(|(key, _)| *key).collect(),
            _ => Vec::new(),
        }
    }

    /// Freeze if needed, add the operator's signature and submit
    pub async fn execute(&mut self, client: &LedgerClient) -> Result<TransactionResponse, LedgerError> {
        self.freeze_with(client)?;
        let operator_key = client.operator()?.private_key.clone();
        self.sign(&operator_key)?;

        let (transaction_id, signatures) = match &self.stage {
            Stage::Frozen {
                transaction_id,
                signatures,
                ..
            } => (*transaction_id, signatures.clone()),
            _ => return Err(LedgerError::invalid_state("transaction is not frozen")),
        };

        let signed = SignedTransaction {
            transaction_id,
            memo: self.memo.clone(),
            body: self.body.clone(),
            signatures,
        };

        // Once handed to the ledger the transaction is spent, even if precheck rejects it
        self.stage = Stage::Submitted { transaction_id };
        log::debug!("submitting {} {}", self.body.kind(), transaction_id);
        client.rpc().submit(signed).await?;

        Ok(TransactionResponse { transaction_id })
    }
}

/// Handle to a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionResponse {
    pub transaction_id: TransactionId,
}

impl TransactionResponse {
    /// Wait for consensus; any status but `SUCCESS` is a rejection
    pub async fn get_receipt(&self, client: &LedgerClient) -> Result<TransactionReceipt, LedgerError> {
        let receipt = waiters::wait_for_receipt(client, &self.transaction_id).await?;
        if !receipt.status.is_success() {
            log::warn!(
                "transaction {} failed with {}",
                self.transaction_id,
                receipt.status
            );
            return Err(LedgerError::rejection(
                receipt.status,
                Some(self.transaction_id),
            ));
        }
        Ok(receipt)
    }

    pub async fn get_record(&self, client: &LedgerClient) -> Result<TransactionRecord, LedgerError> {
        waiters::wait_for_record(client, &self.transaction_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{keys::ThresholdKey, rpc::TestLedgerBuilder};
    use std::sync::Arc;

    fn setup() -> (AccountPool, LedgerClient) {
        let pool = AccountPool::generate(4, 11);
        let ledger = Arc::new(TestLedgerBuilder::new().with_pool(&pool).build());
        let mut client = LedgerClient::new(ledger);
        client.set_operator(pool.get(0).unwrap());
        (pool, client)
    }

    #[test]
    fn test_sign_before_freeze_is_invalid_state() {
        let key = PrivateKey::generate();
        let mut tx = PendingTransaction::transfer();
        assert!(matches!(tx.sign(&key), Err(LedgerError::InvalidState(_))));
    }

    #[test]
    fn test_legs_frozen_after_freeze() {
        let (pool, client) = setup();
        let from = pool.get(1).unwrap().id;
        let mut tx = PendingTransaction::transfer();
        tx.add_hbar_transfer(from, -5).unwrap();
        tx.freeze_with(&client).unwrap();

        assert!(matches!(
            tx.add_hbar_transfer(from, -5),
            Err(LedgerError::InvalidState(_))
        ));
        // Freezing again keeps the original id
        let id = tx.transaction_id();
        tx.freeze_with(&client).unwrap();
        assert_eq!(tx.transaction_id(), id);
        assert_eq!(id.map(|id| id.payer()), Some(pool.get(0).unwrap().id));
    }

    #[test]
    fn test_signing_is_idempotent_per_key() {
        let (pool, client) = setup();
        let mut tx = PendingTransaction::transfer();
        tx.freeze_with(&client).unwrap();
        let key = &pool.get(1).unwrap().private_key;
        tx.sign(key).unwrap().sign(key).unwrap();
        assert_eq!(tx.signers(), vec![key.public_key()]);
    }

    #[tokio::test]
    async fn test_execute_twice_is_invalid_state() {
        let (pool, client) = setup();
        let mut tx = PendingTransaction::transfer();
        tx.add_hbar_transfer(pool.get(0).unwrap().id, -10)
            .unwrap()
            .add_hbar_transfer(pool.get(1).unwrap().id, 10)
            .unwrap();

        let response = tx.execute(&client).await.unwrap();
        assert!(response.get_receipt(&client).await.is_ok());
        assert!(matches!(
            tx.execute(&client).await,
            Err(LedgerError::InvalidState(_))
        ));
    }

    #[test]
    fn test_quorum_signs_only_what_is_needed() {
        let (pool, client) = setup();
        let members = vec![pool.get(1).unwrap().public_key(), pool.get(2).unwrap().public_key()];
        let key: Key = ThresholdKey::new(members.clone(), 1).unwrap().into();

        let mut tx = PendingTransaction::transfer();
        tx.freeze_with(&client).unwrap();
        tx.sign_for_quorum(&key, &pool).unwrap();
        assert_eq!(tx.signers(), vec![members[0]]);

        let strict: Key = ThresholdKey::new(members.clone(), 2).unwrap().into();
        tx.sign_for_quorum(&strict, &pool).unwrap();
        assert_eq!(tx.signers(), members);
    }

    #[test]
    fn test_quorum_unreachable_is_configuration_error() {
        let (pool, client) = setup();
        let outsider = PrivateKey::generate().public_key();
        let members = vec![pool.get(1).unwrap().public_key(), outsider];
        let key: Key = ThresholdKey::new(members, 2).unwrap().into();

        let mut tx = PendingTransaction::transfer();
        tx.freeze_with(&client).unwrap();
        assert!(matches!(
            tx.sign_for_quorum(&key, &pool),
            Err(LedgerError::Configuration(_))
        ));
    }
}
