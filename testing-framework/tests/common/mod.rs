#![allow(dead_code)]

use ledger_testing_framework::prelude::*;
use ledger_testing_framework::services::token;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A funded pool, the ledger it lives on, and a client operated by account 1
pub struct Harness {
    pub pool: Arc<AccountPool>,
    pub ledger: Arc<TestLedger>,
    pub client: LedgerClient,
}

impl Harness {
    pub fn new(accounts: usize, seed: u64) -> Self {
        Self::with_ledger(accounts, seed, |builder| builder)
    }

    pub fn with_ledger<F>(accounts: usize, seed: u64, configure: F) -> Self
    where
        F: FnOnce(TestLedgerBuilder) -> TestLedgerBuilder,
    {
        init_logging();
        let pool = Arc::new(AccountPool::generate(accounts, seed));
        let ledger = Arc::new(configure(TestLedgerBuilder::new().with_pool(&pool)).build());
        let mut client = LedgerClient::new(ledger.clone());
        client.set_operator(pool.get(1).unwrap());
        Self {
            pool,
            ledger,
            client,
        }
    }

    pub fn account(&self, index: usize) -> &Account {
        self.pool.get(index).unwrap()
    }

    pub fn reconciler(&self) -> BalanceReconciler {
        BalanceReconciler::new(self.pool.reference().unwrap().clone())
    }

    /// Finite HTT token held entirely by the treasury (account 0)
    pub async fn create_token(&self, supply: u64) -> TokenId {
        let treasury = self.account(0);
        let spec = TokenSpec::finite("Test Token", "HTT", 2, supply);
        let (state, _) = token::create_token(&self.client, treasury, &spec, &[])
            .await
            .unwrap();
        state.token_id
    }

    pub async fn token_balance(&self, token_id: &TokenId, index: usize) -> u64 {
        token::token_balance(&self.client, token_id, &self.account(index).id)
            .await
            .unwrap()
    }
}
