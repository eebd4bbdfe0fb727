// In-process ledger
//
// Applies the ledger-side rules the scenarios rely on: payer precheck, flat
// fee, signature requirements (including threshold keys), zero-sum
// transfers, token association, supply keys, finite supply and topic
// sequencing. Receipts can lag a configurable number of polls behind
// submission to emulate consensus latency.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use ledger_common::{
    crypto::{chain, Hash, PublicKey},
    AccountId, Hbar, LedgerError, Status, TokenId, TopicId, TransactionId,
};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

use super::{
    AccountBalance, AccountInfo, LedgerRpc, TokenInfo, TokenRelationship, TopicInfo, TopicMessage,
    TopicSubscription, TransactionReceipt, TransactionRecord,
};
use crate::{
    invariants,
    keys::Key,
    transaction::{
        HbarTransfer, SignedTransaction, TokenAssociateBody, TokenCreateBody, TokenMintBody,
        TokenSupplyType, TokenTransfer, TopicCreateBody, TopicMessageSubmitBody, TransactionBody,
        TransferBody,
    },
};

pub(super) struct LedgerAccount {
    pub key: Key,
    pub balance: u64,
    // Presence of a token means the account is associated with it
    pub tokens: IndexMap<TokenId, u64>,
}

struct LedgerTopic {
    info: TopicInfo,
    messages: Vec<TopicMessage>,
    subscribers: Vec<mpsc::UnboundedSender<TopicMessage>>,
}

// Side effects of a successfully handled transaction
#[derive(Default)]
struct Applied {
    token_id: Option<TokenId>,
    topic_id: Option<TopicId>,
    topic_sequence_number: Option<u64>,
    total_supply: Option<u64>,
    hbar_transfers: Vec<HbarTransfer>,
    token_transfers: Vec<TokenTransfer>,
}

pub(super) struct LedgerState {
    accounts: IndexMap<AccountId, LedgerAccount>,
    tokens: IndexMap<TokenId, TokenInfo>,
    topics: IndexMap<TopicId, LedgerTopic>,
    records: HashMap<TransactionId, TransactionRecord>,
    receipt_polls: HashMap<TransactionId, usize>,
    next_entity_num: u64,
    last_consensus: DateTime<Utc>,
}

impl LedgerState {
    pub(super) fn new(accounts: IndexMap<AccountId, LedgerAccount>, next_entity_num: u64) -> Self {
        Self {
            accounts,
            tokens: IndexMap::new(),
            topics: IndexMap::new(),
            records: HashMap::new(),
            receipt_polls: HashMap::new(),
            next_entity_num,
            last_consensus: DateTime::<Utc>::MIN_UTC,
        }
    }

    fn next_entity(&mut self) -> u64 {
        let num = self.next_entity_num;
        self.next_entity_num += 1;
        num
    }

    fn next_consensus_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let timestamp = if now > self.last_consensus {
            now
        } else {
            self.last_consensus + chrono::Duration::nanoseconds(1)
        };
        self.last_consensus = timestamp;
        timestamp
    }

    fn require_signed(&self, account_id: &AccountId, signers: &HashSet<PublicKey>) -> Result<(), Status> {
        let account = self
            .accounts
            .get(account_id)
            .ok_or(Status::InvalidAccountId)?;
        if account.key.is_satisfied_by(signers) {
            Ok(())
        } else {
            Err(Status::InvalidSignature)
        }
    }

    fn apply(
        &mut self,
        body: &TransactionBody,
        signers: &HashSet<PublicKey>,
        consensus_timestamp: DateTime<Utc>,
    ) -> Result<Applied, Status> {
        match body {
            TransactionBody::Transfer(transfer) => self.apply_transfer(transfer, signers),
            TransactionBody::TokenCreate(create) => self.apply_token_create(create, signers),
            TransactionBody::TokenMint(mint) => self.apply_token_mint(mint, signers),
            TransactionBody::TokenAssociate(associate) => {
                self.apply_token_associate(associate, signers)
            }
            TransactionBody::TopicCreate(create) => self.apply_topic_create(create, signers),
            TransactionBody::TopicMessageSubmit(submit) => {
                self.apply_topic_submit(submit, signers, consensus_timestamp)
            }
        }
    }

    fn apply_transfer(
        &mut self,
        body: &TransferBody,
        signers: &HashSet<PublicKey>,
    ) -> Result<Applied, Status> {
        if body.is_empty() {
            return Err(Status::InvalidAccountAmounts);
        }
        invariants::check_zero_sum(body)?;

        let mut hbar_net: IndexMap<AccountId, i128> = IndexMap::new();
        for leg in &body.hbar_transfers {
            if !self.accounts.contains_key(&leg.account_id) {
                return Err(Status::InvalidAccountId);
            }
            *hbar_net.entry(leg.account_id).or_default() += leg.amount as i128;
        }

        let mut token_net: IndexMap<(TokenId, AccountId), i128> = IndexMap::new();
        for leg in &body.token_transfers {
            if !self.tokens.contains_key(&leg.token_id) {
                return Err(Status::InvalidTokenId);
            }
            if !self.accounts.contains_key(&leg.account_id) {
                return Err(Status::InvalidAccountId);
            }
            *token_net.entry((leg.token_id, leg.account_id)).or_default() += leg.amount as i128;
        }

        for account_id in body.debited_accounts() {
            self.require_signed(&account_id, signers)?;
        }

        for ((token_id, account_id), net) in &token_net {
            let account = &self.accounts[account_id];
            let held = account
                .tokens
                .get(token_id)
                .ok_or(Status::TokenNotAssociatedToAccount)?;
            if (*held as i128) + net < 0 {
                return Err(Status::InsufficientTokenBalance);
            }
        }
        for (account_id, net) in &hbar_net {
            if (self.accounts[account_id].balance as i128) + net < 0 {
                return Err(Status::InsufficientAccountBalance);
            }
        }

        // All checks passed, nets stay within u64 since balances can only
        // move between existing accounts
        for (account_id, net) in &hbar_net {
            if let Some(account) = self.accounts.get_mut(account_id) {
                account.balance = (account.balance as i128 + net) as u64;
            }
        }
        for ((token_id, account_id), net) in &token_net {
            if let Some(held) = self
                .accounts
                .get_mut(account_id)
                .and_then(|account| account.tokens.get_mut(token_id))
            {
                *held = (*held as i128 + net) as u64;
            }
        }

        Ok(Applied {
            hbar_transfers: body.hbar_transfers.clone(),
            token_transfers: body.token_transfers.clone(),
            ..Default::default()
        })
    }

    fn apply_token_create(
        &mut self,
        body: &TokenCreateBody,
        signers: &HashSet<PublicKey>,
    ) -> Result<Applied, Status> {
        self.require_signed(&body.treasury_account_id, signers)?;
        if let Some(admin) = &body.admin_key {
            if !admin.is_satisfied_by(signers) {
                return Err(Status::InvalidSignature);
            }
        }
        if body.supply_type == TokenSupplyType::Finite && body.initial_supply > body.max_supply {
            return Err(Status::TokenMaxSupplyReached);
        }

        let token_id = TokenId::from_num(self.next_entity());
        let info = TokenInfo {
            token_id,
            name: body.name.clone(),
            symbol: body.symbol.clone(),
            decimals: body.decimals,
            total_supply: body.initial_supply,
            supply_type: body.supply_type,
            max_supply: match body.supply_type {
                TokenSupplyType::Finite => body.max_supply,
                TokenSupplyType::Infinite => 0,
            },
            treasury_account_id: body.treasury_account_id,
            admin_key: body.admin_key.clone(),
            supply_key: body.supply_key.clone(),
        };
        self.tokens.insert(token_id, info);
        if let Some(treasury) = self.accounts.get_mut(&body.treasury_account_id) {
            treasury.tokens.insert(token_id, body.initial_supply);
        }

        Ok(Applied {
            token_id: Some(token_id),
            total_supply: Some(body.initial_supply),
            ..Default::default()
        })
    }

    fn apply_token_mint(
        &mut self,
        body: &TokenMintBody,
        signers: &HashSet<PublicKey>,
    ) -> Result<Applied, Status> {
        let info = self.tokens.get(&body.token_id).ok_or(Status::InvalidTokenId)?;
        let supply_key = info.supply_key.as_ref().ok_or(Status::TokenHasNoSupplyKey)?;
        if !supply_key.is_satisfied_by(signers) {
            return Err(Status::InvalidSignature);
        }
        if body.amount == 0 {
            return Err(Status::InvalidTokenMintAmount);
        }
        let total_supply = info
            .total_supply
            .checked_add(body.amount)
            .ok_or(Status::InvalidTokenMintAmount)?;
        if info.supply_type == TokenSupplyType::Finite && total_supply > info.max_supply {
            return Err(Status::TokenMaxSupplyReached);
        }

        let treasury = info.treasury_account_id;
        if let Some(info) = self.tokens.get_mut(&body.token_id) {
            info.total_supply = total_supply;
        }
        if let Some(held) = self
            .accounts
            .get_mut(&treasury)
            .and_then(|account| account.tokens.get_mut(&body.token_id))
        {
            *held += body.amount;
        }

        Ok(Applied {
            total_supply: Some(total_supply),
            ..Default::default()
        })
    }

    fn apply_token_associate(
        &mut self,
        body: &TokenAssociateBody,
        signers: &HashSet<PublicKey>,
    ) -> Result<Applied, Status> {
        self.require_signed(&body.account_id, signers)?;
        if let Some(missing) = body.token_ids.iter().find(|t| !self.tokens.contains_key(*t)) {
            log::debug!("association with unknown token {}", missing);
            return Err(Status::InvalidTokenId);
        }

        let account = self
            .accounts
            .get_mut(&body.account_id)
            .ok_or(Status::InvalidAccountId)?;
        if body.token_ids.iter().any(|t| account.tokens.contains_key(t)) {
            return Err(Status::TokenAlreadyAssociatedToAccount);
        }
        for token_id in &body.token_ids {
            account.tokens.insert(*token_id, 0);
        }

        Ok(Applied::default())
    }

    fn apply_topic_create(
        &mut self,
        body: &TopicCreateBody,
        signers: &HashSet<PublicKey>,
    ) -> Result<Applied, Status> {
        if let Some(admin) = &body.admin_key {
            if !admin.is_satisfied_by(signers) {
                return Err(Status::InvalidSignature);
            }
        }

        let topic_id = TopicId::from_num(self.next_entity());
        self.topics.insert(
            topic_id,
            LedgerTopic {
                info: TopicInfo {
                    topic_id,
                    memo: body.memo.clone(),
                    admin_key: body.admin_key.clone(),
                    submit_key: body.submit_key.clone(),
                    sequence_number: 0,
                    running_hash: Hash::zero(),
                },
                messages: Vec::new(),
                subscribers: Vec::new(),
            },
        );

        Ok(Applied {
            topic_id: Some(topic_id),
            ..Default::default()
        })
    }

    fn apply_topic_submit(
        &mut self,
        body: &TopicMessageSubmitBody,
        signers: &HashSet<PublicKey>,
        consensus_timestamp: DateTime<Utc>,
    ) -> Result<Applied, Status> {
        let topic = self.topics.get_mut(&body.topic_id).ok_or(Status::InvalidTopicId)?;
        if let Some(submit_key) = &topic.info.submit_key {
            if !submit_key.is_satisfied_by(signers) {
                return Err(Status::InvalidSignature);
            }
        }
        if body.message.is_empty() {
            return Err(Status::InvalidTransaction);
        }

        topic.info.sequence_number += 1;
        topic.info.running_hash = chain(&topic.info.running_hash, &body.message);
        let message = TopicMessage {
            topic_id: body.topic_id,
            sequence_number: topic.info.sequence_number,
            contents: body.message.clone(),
            consensus_timestamp,
            running_hash: topic.info.running_hash,
        };
        topic
            .subscribers
            .retain(|subscriber| subscriber.send(message.clone()).is_ok());
        topic.messages.push(message);

        Ok(Applied {
            topic_sequence_number: Some(topic.info.sequence_number),
            ..Default::default()
        })
    }
}

/// Ledger running inside the test process
///
/// Built with [`super::TestLedgerBuilder`].
pub struct TestLedger {
    state: RwLock<LedgerState>,
    fee: Hbar,
    fee_collector: AccountId,
    receipt_lag: usize,
    hbar_supply: u64,
}

impl TestLedger {
    pub(super) fn from_parts(
        state: LedgerState,
        fee: Hbar,
        fee_collector: AccountId,
        receipt_lag: usize,
    ) -> Self {
        let hbar_supply = state.accounts.values().map(|a| a.balance).sum();
        Self {
            state: RwLock::new(state),
            fee,
            fee_collector,
            receipt_lag,
            hbar_supply,
        }
    }

    /// Flat fee charged to the payer of every transaction that passes precheck
    pub fn fee(&self) -> Hbar {
        self.fee
    }

    /// Transactions that reached consensus, successful or not
    pub fn transaction_count(&self) -> usize {
        self.state.read().records.len()
    }

    /// Current balance of `account_id`, without going through a query
    pub fn hbar_balance(&self, account_id: &AccountId) -> Option<Hbar> {
        self.state
            .read()
            .accounts
            .get(account_id)
            .map(|account| Hbar::from_tinybars(account.balance))
    }

    /// Check supply conservation for the native currency and every token
    pub fn check_invariants(&self) -> Result<()> {
        let state = self.state.read();
        invariants::check_hbar_conservation(
            self.hbar_supply,
            state.accounts.values().map(|account| account.balance),
        )?;
        for info in state.tokens.values() {
            let holders = state
                .accounts
                .values()
                .filter_map(|account| account.tokens.get(&info.token_id).copied());
            invariants::check_token_conservation(info, holders)
                .with_context(|| format!("after {} transactions", state.records.len()))?;
        }
        Ok(())
    }

    fn verified_signers(transaction: &SignedTransaction) -> Result<HashSet<PublicKey>, LedgerError> {
        let digest = transaction.digest()?;
        let mut signers = HashSet::with_capacity(transaction.signatures.len());
        for (public_key, signature) in &transaction.signatures {
            public_key
                .verify(digest.as_bytes(), signature)
                .map_err(|_| {
                    LedgerError::rejection(Status::InvalidSignature, Some(transaction.transaction_id))
                })?;
            signers.insert(*public_key);
        }
        Ok(signers)
    }
}

#[async_trait]
impl LedgerRpc for TestLedger {
    async fn submit(&self, transaction: SignedTransaction) -> Result<TransactionId, LedgerError> {
        let transaction_id = transaction.transaction_id;
        let payer = transaction_id.payer();
        let reject = |status| LedgerError::rejection(status, Some(transaction_id));

        let signers = Self::verified_signers(&transaction)?;
        let mut state = self.state.write();

        let payer_account = state
            .accounts
            .get(&payer)
            .ok_or_else(|| reject(Status::PayerAccountNotFound))?;
        if state.records.contains_key(&transaction_id) {
            return Err(reject(Status::DuplicateTransaction));
        }
        if !payer_account.key.is_satisfied_by(&signers) {
            return Err(reject(Status::InvalidSignature));
        }
        let fee = self.fee.to_tinybars();
        if payer_account.balance < fee {
            return Err(reject(Status::InsufficientPayerBalance));
        }

        // Past precheck the fee is charged whatever the outcome
        if let Some(account) = state.accounts.get_mut(&payer) {
            account.balance -= fee;
        }
        if let Some(collector) = state.accounts.get_mut(&self.fee_collector) {
            collector.balance += fee;
        }

        let consensus_timestamp = state.next_consensus_timestamp();
        let outcome = state.apply(&transaction.body, &signers, consensus_timestamp);

        let mut receipt = TransactionReceipt::with_status(transaction_id, Status::Success);
        let mut hbar_transfers = Vec::new();
        let mut token_transfers = Vec::new();
        match outcome {
            Ok(applied) => {
                receipt.token_id = applied.token_id;
                receipt.topic_id = applied.topic_id;
                receipt.topic_sequence_number = applied.topic_sequence_number;
                receipt.total_supply = applied.total_supply;
                hbar_transfers = applied.hbar_transfers;
                token_transfers = applied.token_transfers;
                log::debug!(
                    "{} {} reached consensus",
                    transaction.body.kind(),
                    transaction_id
                );
            }
            Err(status) => {
                receipt.status = status;
                log::debug!(
                    "{} {} failed with {}",
                    transaction.body.kind(),
                    transaction_id,
                    status
                );
            }
        }

        state.records.insert(
            transaction_id,
            TransactionRecord {
                transaction_id,
                receipt,
                consensus_timestamp,
                transaction_fee: self.fee,
                memo: transaction.memo,
                hbar_transfers,
                token_transfers,
            },
        );

        Ok(transaction_id)
    }

    async fn get_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<TransactionReceipt>, LedgerError> {
        let mut state = self.state.write();
        if !state.records.contains_key(transaction_id) {
            return Ok(None);
        }

        let polls = state.receipt_polls.entry(*transaction_id).or_insert(0);
        if *polls < self.receipt_lag {
            *polls += 1;
            return Ok(None);
        }

        Ok(state
            .records
            .get(transaction_id)
            .map(|record| record.receipt.clone()))
    }

    async fn get_record(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        Ok(self.state.read().records.get(transaction_id).cloned())
    }

    async fn account_balance(&self, account_id: &AccountId) -> Result<AccountBalance, LedgerError> {
        let state = self.state.read();
        let account = state
            .accounts
            .get(account_id)
            .ok_or_else(|| LedgerError::rejection(Status::InvalidAccountId, None))?;

        Ok(AccountBalance {
            account_id: *account_id,
            hbars: Hbar::from_tinybars(account.balance),
            tokens: account.tokens.clone(),
        })
    }

    async fn account_info(&self, account_id: &AccountId) -> Result<AccountInfo, LedgerError> {
        let state = self.state.read();
        let account = state
            .accounts
            .get(account_id)
            .ok_or_else(|| LedgerError::rejection(Status::InvalidAccountId, None))?;

        let token_relationships = account
            .tokens
            .iter()
            .map(|(token_id, balance)| {
                let decimals = state.tokens.get(token_id).map_or(0, |info| info.decimals);
                (
                    *token_id,
                    TokenRelationship {
                        token_id: *token_id,
                        balance: *balance,
                        decimals,
                    },
                )
            })
            .collect();

        Ok(AccountInfo {
            account_id: *account_id,
            key: account.key.clone(),
            balance: Hbar::from_tinybars(account.balance),
            token_relationships,
        })
    }

    async fn token_info(&self, token_id: &TokenId) -> Result<TokenInfo, LedgerError> {
        self.state
            .read()
            .tokens
            .get(token_id)
            .cloned()
            .ok_or_else(|| LedgerError::rejection(Status::InvalidTokenId, None))
    }

    async fn topic_info(&self, topic_id: &TopicId) -> Result<TopicInfo, LedgerError> {
        self.state
            .read()
            .topics
            .get(topic_id)
            .map(|topic| topic.info.clone())
            .ok_or_else(|| LedgerError::rejection(Status::InvalidTopicId, None))
    }

    async fn subscribe_topic(&self, topic_id: &TopicId) -> Result<TopicSubscription, LedgerError> {
        // History replay and registration happen under one lock so no
        // message falls between them
        let mut state = self.state.write();
        let topic = state
            .topics
            .get_mut(topic_id)
            .ok_or_else(|| LedgerError::rejection(Status::InvalidTopicId, None))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        for message in &topic.messages {
            // The receiver is still in hand, this cannot fail
            let _ = sender.send(message.clone());
        }
        topic.subscribers.push(sender);
        log::debug!(
            "subscribed to topic {} ({} messages replayed)",
            topic_id,
            topic.messages.len()
        );

        Ok(TopicSubscription::new(*topic_id, receiver))
    }
}
