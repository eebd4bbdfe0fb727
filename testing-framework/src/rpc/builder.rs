//! TestLedgerBuilder - Fluent API for configuring TestLedger instances

use indexmap::IndexMap;
use ledger_common::{crypto::PrivateKey, crypto::PublicKey, AccountId, Hbar};

use super::test_ledger::{LedgerAccount, LedgerState, TestLedger};
use crate::{accounts::AccountPool, keys::Key};

// Account credited with every fee
const FEE_COLLECTOR: AccountId = AccountId::from_num(98);

// Entities created on the ledger are numbered from here unless the funded
// accounts already reach further
const FIRST_ENTITY_NUM: u64 = 5000;

/// Builder for TestLedger instances
///
/// # Example
///
/// ```rust,ignore
/// let ledger = TestLedgerBuilder::new()
///     .with_pool(&pool)
///     .with_balance(pool.get(0)?.id, Hbar::from_hbars(10_000))
///     .with_fee(Hbar::from_tinybars(50_000))
///     .with_receipt_lag(2)
///     .build();
/// ```
pub struct TestLedgerBuilder {
    accounts: IndexMap<AccountId, (PublicKey, Hbar)>,
    default_balance: Hbar,
    fee: Hbar,
    receipt_lag: usize,
}

impl TestLedgerBuilder {
    /// Create new builder with defaults
    ///
    /// Default configuration:
    /// - pool accounts funded with 1,000 hbars
    /// - flat fee of 0.001 hbar
    /// - receipts available on the first poll
    pub fn new() -> Self {
        Self {
            accounts: IndexMap::new(),
            default_balance: Hbar::from_hbars(1_000),
            fee: Hbar::from_tinybars(100_000),
            receipt_lag: 0,
        }
    }

    /// Balance given to accounts added afterwards through `with_pool`
    pub fn with_default_balance(mut self, balance: Hbar) -> Self {
        self.default_balance = balance;
        self
    }

    /// Register every pool account, funded with the default balance
    pub fn with_pool(mut self, pool: &AccountPool) -> Self {
        for account in pool.iter() {
            self.accounts
                .insert(account.id, (account.public_key(), self.default_balance));
        }
        self
    }

    /// Register (or re-fund) a single account
    pub fn with_account(mut self, id: AccountId, key: PublicKey, balance: Hbar) -> Self {
        self.accounts.insert(id, (key, balance));
        self
    }

    /// Override the balance of an already registered account
    pub fn with_balance(mut self, id: AccountId, balance: Hbar) -> Self {
        if let Some(entry) = self.accounts.get_mut(&id) {
            entry.1 = balance;
        }
        self
    }

    pub fn with_fee(mut self, fee: Hbar) -> Self {
        self.fee = fee;
        self
    }

    /// Number of receipt polls answered with "not yet" for each transaction
    pub fn with_receipt_lag(mut self, polls: usize) -> Self {
        self.receipt_lag = polls;
        self
    }

    pub fn build(self) -> TestLedger {
        let mut accounts: IndexMap<AccountId, LedgerAccount> = self
            .accounts
            .into_iter()
            .map(|(id, (key, balance))| {
                (
                    id,
                    LedgerAccount {
                        key: Key::Ed25519(key),
                        balance: balance.to_tinybars(),
                        tokens: IndexMap::new(),
                    },
                )
            })
            .collect();

        accounts.entry(FEE_COLLECTOR).or_insert_with(|| LedgerAccount {
            key: Key::Ed25519(PrivateKey::generate().public_key()),
            balance: 0,
            tokens: IndexMap::new(),
        });

        let next_entity_num = accounts
            .keys()
            .map(|id| id.num + 1)
            .max()
            .unwrap_or(0)
            .max(FIRST_ENTITY_NUM);

        log::debug!(
            "test ledger with {} accounts, fee {}, receipt lag {}",
            accounts.len(),
            self.fee,
            self.receipt_lag
        );

        TestLedger::from_parts(
            LedgerState::new(accounts, next_entity_num),
            self.fee,
            FEE_COLLECTOR,
            self.receipt_lag,
        )
    }
}

impl Default for TestLedgerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
