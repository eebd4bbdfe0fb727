use ledger_common::{
    config::{AccountsConfig, REFERENCE_ACCOUNT_INDEX},
    crypto::{PrivateKey, PublicKey},
    AccountId, LedgerError,
};
use rand::{rngs::StdRng, SeedableRng};

// Generated pools are numbered from here, clear of system accounts
const GENERATED_ACCOUNT_BASE: u64 = 1001;

/// A pool member: stable identity plus the key that signs for it
#[derive(Debug, Clone)]
pub struct Account {
    pub index: usize,
    pub id: AccountId,
    pub private_key: PrivateKey,
}

impl Account {
    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }
}

/// Fixed, indexed set of pre-funded test accounts
///
/// Membership never changes after construction. Index 0 is the reference
/// account: it is the token treasury and the counterparty of every
/// corrective transfer.
#[derive(Debug, Clone)]
pub struct AccountPool {
    accounts: Vec<Account>,
}

impl AccountPool {
    /// Build the pool from the configured account list
    pub fn from_config(config: &AccountsConfig) -> Result<Self, LedgerError> {
        let accounts = config
            .accounts
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let private_key = PrivateKey::from_str_ed25519(&entry.private_key).map_err(|e| {
                    LedgerError::configuration(format!("account {}: {}", entry.id, e))
                })?;
                Ok(Account {
                    index,
                    id: entry.id,
                    private_key,
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        log::info!(
            "Account pool ready on {} with {} accounts",
            config.network,
            accounts.len()
        );
        Ok(Self { accounts })
    }

    /// Deterministic pool for tests: the same seed yields the same keys
    pub fn generate(count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let accounts = (0..count)
            .map(|index| Account {
                index,
                id: AccountId::from_num(GENERATED_ACCOUNT_BASE + index as u64),
                private_key: PrivateKey::from_rng(&mut rng),
            })
            .collect();
        Self { accounts }
    }

    pub fn get(&self, index: usize) -> Result<&Account, LedgerError> {
        self.accounts.get(index).ok_or_else(|| {
            LedgerError::configuration(format!(
                "account index {} requested but the pool holds {} accounts",
                index,
                self.accounts.len()
            ))
        })
    }

    /// Fail up front when a scenario needs more accounts than configured
    pub fn require(&self, count: usize) -> Result<(), LedgerError> {
        if self.accounts.len() < count {
            return Err(LedgerError::configuration(format!(
                "scenario needs {} accounts, pool holds {}",
                count,
                self.accounts.len()
            )));
        }
        Ok(())
    }

    /// Treasury and counterparty of every reconciliation
    pub fn reference(&self) -> Result<&Account, LedgerError> {
        self.get(REFERENCE_ACCOUNT_INDEX)
    }

    pub fn find_by_public_key(&self, key: &PublicKey) -> Option<&Account> {
        self.accounts.iter().find(|account| account.public_key() == *key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
