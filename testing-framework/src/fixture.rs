//! Per-scenario fixture
//!
//! Everything a scenario remembers between steps lives here, owned by the
//! scenario: the client handle with its operator, the token and topic under
//! test, and the transaction being built.

use anyhow::{Context, Result};
use ledger_common::{LedgerError, TokenId, TopicId, TransactionId};
use std::sync::Arc;

use crate::{
    accounts::{Account, AccountPool},
    client::LedgerClient,
    config::HarnessSettings,
    keys::ThresholdKey,
    orchestrator::{system_clock, Clock},
    rpc::{LedgerRpc, TokenInfo, TransactionReceipt},
    services::{BalanceReconciler, MessageObserver, TokenState},
    transaction::PendingTransaction,
};

pub struct ScenarioWorld {
    pub client: LedgerClient,
    pub pool: Arc<AccountPool>,
    pub reconciler: BalanceReconciler,
    pub observer: MessageObserver,
    pub settings: HarnessSettings,

    pub token: Option<TokenState>,
    /// Last token info fetched by an assertion step
    pub token_info: Option<TokenInfo>,
    pub topic_id: Option<TopicId>,
    pub threshold_key: Option<ThresholdKey>,
    /// Transaction built by one step and submitted by a later one
    pub pending: Option<PendingTransaction>,
    pub last_transaction_id: Option<TransactionId>,
    pub last_receipt: Option<TransactionReceipt>,
}

impl ScenarioWorld {
    pub fn builder(rpc: Arc<dyn LedgerRpc>, pool: Arc<AccountPool>) -> ScenarioWorldBuilder {
        ScenarioWorldBuilder::new(rpc, pool)
    }

    pub fn account(&self, index: usize) -> Result<Account, LedgerError> {
        self.pool.get(index).cloned()
    }

    /// Make pool account `index` the operator of this scenario's handle
    pub fn use_operator(&mut self, index: usize) -> Result<Account, LedgerError> {
        let account = self.account(index)?;
        self.client.set_operator(&account);
        Ok(account)
    }

    pub fn token_id(&self) -> Result<TokenId> {
        self.token
            .as_ref()
            .map(|token| token.token_id)
            .context("no token has been created in this scenario")
    }

    pub fn topic_id(&self) -> Result<TopicId> {
        self.topic_id
            .context("no topic has been created in this scenario")
    }
}

/// Builder for ScenarioWorld instances
///
/// ```rust,ignore
/// let world = ScenarioWorld::builder(ledger, pool)
///     .with_clock(Arc::new(PausedClock::attach()))
///     .with_settings(HarnessSettings::from_env()?)
///     .build()?;
/// ```
pub struct ScenarioWorldBuilder {
    rpc: Arc<dyn LedgerRpc>,
    pool: Arc<AccountPool>,
    clock: Option<Arc<dyn Clock>>,
    settings: HarnessSettings,
}

impl ScenarioWorldBuilder {
    pub fn new(rpc: Arc<dyn LedgerRpc>, pool: Arc<AccountPool>) -> Self {
        Self {
            rpc,
            pool,
            clock: None,
            settings: HarnessSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_settings(mut self, settings: HarnessSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The reference account starts as operator
    pub fn build(self) -> Result<ScenarioWorld, LedgerError> {
        let clock = self.clock.unwrap_or_else(system_clock);
        let reference = self.pool.reference()?.clone();

        let mut client = LedgerClient::new(self.rpc)
            .with_clock(clock.clone())
            .with_receipt_timeout(self.settings.receipt_timeout);
        client.set_operator(&reference);

        Ok(ScenarioWorld {
            client,
            pool: self.pool,
            reconciler: BalanceReconciler::new(reference),
            observer: MessageObserver::new(clock),
            settings: self.settings,
            token: None,
            token_info: None,
            topic_id: None,
            threshold_key: None,
            pending: None,
            last_transaction_id: None,
            last_receipt: None,
        })
    }
}
