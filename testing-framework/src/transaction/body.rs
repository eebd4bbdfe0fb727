use ledger_common::{
    crypto::{hash, Hash, PublicKey, Signature},
    AccountId, LedgerError, TokenId, TopicId, TransactionId,
};
use serde::{Deserialize, Serialize};

use crate::keys::Key;

/// Native currency leg, signed tinybars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HbarTransfer {
    pub account_id: AccountId,
    pub amount: i64,
}

/// Token leg, signed amount in the token's smallest unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub token_id: TokenId,
    pub account_id: AccountId,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBody {
    pub hbar_transfers: Vec<HbarTransfer>,
    pub token_transfers: Vec<TokenTransfer>,
}

impl TransferBody {
    // Legs for the same account (and token) merge into one
    pub(crate) fn add_hbar(&mut self, account_id: AccountId, amount: i64) {
        match self
            .hbar_transfers
            .iter_mut()
            .find(|leg| leg.account_id == account_id)
        {
            Some(leg) => leg.amount += amount,
            None => self.hbar_transfers.push(HbarTransfer { account_id, amount }),
        }
    }

    pub(crate) fn add_token(&mut self, token_id: TokenId, account_id: AccountId, amount: i64) {
        match self
            .token_transfers
            .iter_mut()
            .find(|leg| leg.token_id == token_id && leg.account_id == account_id)
        {
            Some(leg) => leg.amount += amount,
            None => self.token_transfers.push(TokenTransfer {
                token_id,
                account_id,
                amount,
            }),
        }
    }

    /// Accounts whose balance a leg decreases
    pub fn debited_accounts(&self) -> Vec<AccountId> {
        let mut debited: Vec<AccountId> = Vec::new();
        let hbar = self
            .hbar_transfers
            .iter()
            .filter(|leg| leg.amount < 0)
            .map(|leg| leg.account_id);
        let token = self
            .token_transfers
            .iter()
            .filter(|leg| leg.amount < 0)
            .map(|leg| leg.account_id);

        for account in hbar.chain(token) {
            if !debited.contains(&account) {
                debited.push(account);
            }
        }
        debited
    }

    pub fn is_empty(&self) -> bool {
        self.hbar_transfers.is_empty() && self.token_transfers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenSupplyType {
    Infinite,
    Finite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCreateBody {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub initial_supply: u64,
    pub treasury_account_id: AccountId,
    pub supply_type: TokenSupplyType,
    /// Only meaningful for `Finite` tokens
    pub max_supply: u64,
    pub admin_key: Option<Key>,
    pub supply_key: Option<Key>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMintBody {
    pub token_id: TokenId,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAssociateBody {
    pub account_id: AccountId,
    pub token_ids: Vec<TokenId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCreateBody {
    pub memo: String,
    pub admin_key: Option<Key>,
    pub submit_key: Option<Key>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessageSubmitBody {
    pub topic_id: TopicId,
    pub message: Vec<u8>,
}

/// Every transaction kind the harness submits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionBody {
    Transfer(TransferBody),
    TokenCreate(TokenCreateBody),
    TokenMint(TokenMintBody),
    TokenAssociate(TokenAssociateBody),
    TopicCreate(TopicCreateBody),
    TopicMessageSubmit(TopicMessageSubmitBody),
}

impl TransactionBody {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transfer(_) => "CryptoTransfer",
            Self::TokenCreate(_) => "TokenCreate",
            Self::TokenMint(_) => "TokenMint",
            Self::TokenAssociate(_) => "TokenAssociate",
            Self::TopicCreate(_) => "TopicCreate",
            Self::TopicMessageSubmit(_) => "ConsensusSubmitMessage",
        }
    }
}

#[derive(Serialize)]
struct SigningPayload<'a> {
    transaction_id: &'a TransactionId,
    memo: &'a str,
    body: &'a TransactionBody,
}

/// Digest every signer signs, fixed at freeze time
pub fn signing_digest(
    transaction_id: &TransactionId,
    memo: &str,
    body: &TransactionBody,
) -> Result<Hash, LedgerError> {
    let payload = SigningPayload {
        transaction_id,
        memo,
        body,
    };
    let bytes = serde_json::to_vec(&payload)
        .map_err(|e| LedgerError::invalid_state(format!("cannot encode transaction: {}", e)))?;
    Ok(hash(&bytes))
}

/// A frozen transaction with the signatures collected so far, as sent to the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction_id: TransactionId,
    pub memo: String,
    pub body: TransactionBody,
    pub signatures: Vec<(PublicKey, Signature)>,
}

impl SignedTransaction {
    pub fn digest(&self) -> Result<Hash, LedgerError> {
        signing_digest(&self.transaction_id, &self.memo, &self.body)
    }
}
