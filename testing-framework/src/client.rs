use ledger_common::{
    config::{DEFAULT_RECEIPT_POLL_INTERVAL, DEFAULT_RECEIPT_TIMEOUT},
    crypto::PrivateKey,
    AccountId, LedgerError,
};
use std::{sync::Arc, time::Duration};

use crate::{
    accounts::Account,
    orchestrator::{system_clock, Clock},
    rpc::LedgerRpc,
};

/// Identity that pays for and signs outgoing transactions
#[derive(Debug, Clone)]
pub struct Operator {
    pub account_id: AccountId,
    pub private_key: PrivateKey,
}

impl From<&Account> for Operator {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            private_key: account.private_key.clone(),
        }
    }
}

/// Handle every ledger call goes through
///
/// Cheap to clone. A handle has at most one operator; acting as another
/// account for a single operation goes through [`LedgerClient::with_operator`],
/// which leaves the caller's handle untouched.
#[derive(Clone)]
pub struct LedgerClient {
    rpc: Arc<dyn LedgerRpc>,
    operator: Option<Operator>,
    clock: Arc<dyn Clock>,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl LedgerClient {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self {
            rpc,
            operator: None,
            clock: system_clock(),
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Replace the active operator
    pub fn set_operator(&mut self, account: &Account) {
        log::debug!("operator set to account {} ({})", account.index, account.id);
        self.operator = Some(Operator::from(account));
    }

    /// Derived handle acting as `account`
    pub fn with_operator(&self, account: &Account) -> Self {
        let mut derived = self.clone();
        derived.set_operator(account);
        derived
    }

    pub fn operator(&self) -> Result<&Operator, LedgerError> {
        self.operator
            .as_ref()
            .ok_or_else(|| LedgerError::configuration("no operator set on the ledger client"))
    }

    pub fn operator_account_id(&self) -> Result<AccountId, LedgerError> {
        self.operator().map(|operator| operator.account_id)
    }

    pub fn rpc(&self) -> &dyn LedgerRpc {
        self.rpc.as_ref()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn receipt_timeout(&self) -> Duration {
        self.receipt_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{accounts::AccountPool, rpc::TestLedgerBuilder};

    #[test]
    fn test_operator_required() {
        let client = LedgerClient::new(Arc::new(TestLedgerBuilder::new().build()));
        assert!(matches!(
            client.operator(),
            Err(LedgerError::Configuration(_))
        ));
    }

    #[test]
    fn test_derived_handle_leaves_original_untouched() {
        let pool = AccountPool::generate(2, 3);
        let mut client = LedgerClient::new(Arc::new(TestLedgerBuilder::new().with_pool(&pool).build()));
        client.set_operator(pool.get(0).unwrap());

        let derived = client.with_operator(pool.get(1).unwrap());
        assert_eq!(derived.operator_account_id().unwrap(), pool.get(1).unwrap().id);
        assert_eq!(client.operator_account_id().unwrap(), pool.get(0).unwrap().id);

        client.set_operator(pool.get(1).unwrap());
        assert_eq!(client.operator_account_id().unwrap(), pool.get(1).unwrap().id);
    }
}
