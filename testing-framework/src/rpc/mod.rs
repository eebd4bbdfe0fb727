//! Ledger RPC seam
//!
//! Everything the harness asks of the ledger goes through [`LedgerRpc`]:
//! balance and info queries, submission, receipt and record lookups, and
//! topic subscriptions. [`TestLedger`] implements it in-process.

mod builder;
mod test_ledger;

pub use builder::TestLedgerBuilder;
pub use test_ledger::TestLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use ledger_common::{
    crypto::Hash, AccountId, Hbar, LedgerError, Status, TokenId, TopicId, TransactionId,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    keys::Key,
    transaction::{HbarTransfer, SignedTransaction, TokenSupplyType, TokenTransfer},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub hbars: Hbar,
    pub tokens: IndexMap<TokenId, u64>,
}

impl AccountBalance {
    /// Balance of `token`, zero when the account holds none
    pub fn token(&self, token: &TokenId) -> u64 {
        self.tokens.get(token).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRelationship {
    pub token_id: TokenId,
    pub balance: u64,
    pub decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: AccountId,
    pub key: Key,
    pub balance: Hbar,
    pub token_relationships: IndexMap<TokenId, TokenRelationship>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token_id: TokenId,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub total_supply: u64,
    pub supply_type: TokenSupplyType,
    /// Zero for infinite supply tokens
    pub max_supply: u64,
    pub treasury_account_id: AccountId,
    pub admin_key: Option<Key>,
    pub supply_key: Option<Key>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    pub topic_id: TopicId,
    pub memo: String,
    pub admin_key: Option<Key>,
    pub submit_key: Option<Key>,
    pub sequence_number: u64,
    pub running_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub status: Status,
    pub transaction_id: TransactionId,
    pub account_id: Option<AccountId>,
    pub token_id: Option<TokenId>,
    pub topic_id: Option<TopicId>,
    pub topic_sequence_number: Option<u64>,
    pub total_supply: Option<u64>,
}

impl TransactionReceipt {
    pub(crate) fn with_status(transaction_id: TransactionId, status: Status) -> Self {
        Self {
            status,
            transaction_id,
            account_id: None,
            token_id: None,
            topic_id: None,
            topic_sequence_number: None,
            total_supply: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub receipt: TransactionReceipt,
    pub consensus_timestamp: DateTime<Utc>,
    pub transaction_fee: Hbar,
    pub memo: String,
    pub hbar_transfers: Vec<HbarTransfer>,
    pub token_transfers: Vec<TokenTransfer>,
}

impl TransactionRecord {
    /// Account that paid the fee
    pub fn payer(&self) -> AccountId {
        self.transaction_id.payer()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessage {
    pub topic_id: TopicId,
    pub sequence_number: u64,
    pub contents: Vec<u8>,
    pub consensus_timestamp: DateTime<Utc>,
    pub running_hash: Hash,
}

impl TopicMessage {
    /// Contents decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

/// Live stream of a topic's messages in sequence-number order, starting
/// with the messages already on the topic
pub struct TopicSubscription {
    topic_id: TopicId,
    receiver: mpsc::UnboundedReceiver<TopicMessage>,
}

impl TopicSubscription {
    pub fn new(topic_id: TopicId, receiver: mpsc::UnboundedReceiver<TopicMessage>) -> Self {
        Self { topic_id, receiver }
    }

    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    /// Next message, `None` once the ledger closes the stream
    pub async fn next(&mut self) -> Option<TopicMessage> {
        self.receiver.recv().await
    }
}

/// Ledger operations the harness depends on
///
/// Queries for entities that do not exist fail with a `LedgerRejection`
/// carrying the matching `INVALID_*_ID` status.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Submit a signed transaction. Precheck failures (unknown payer,
    /// duplicate id, bad or missing payer signature, payer cannot cover the
    /// fee) are returned as rejections here; everything else surfaces in
    /// the receipt.
    async fn submit(&self, transaction: SignedTransaction) -> Result<TransactionId, LedgerError>;

    /// Receipt once the transaction reached consensus, `None` before that
    async fn get_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<TransactionReceipt>, LedgerError>;

    async fn get_record(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerError>;

    async fn account_balance(&self, account_id: &AccountId) -> Result<AccountBalance, LedgerError>;

    async fn account_info(&self, account_id: &AccountId) -> Result<AccountInfo, LedgerError>;

    async fn token_info(&self, token_id: &TokenId) -> Result<TokenInfo, LedgerError>;

    async fn topic_info(&self, topic_id: &TopicId) -> Result<TopicInfo, LedgerError>;

    async fn subscribe_topic(&self, topic_id: &TopicId) -> Result<TopicSubscription, LedgerError>;
}
