use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};

use crate::{error::LedgerError, ids::AccountId};

// Receipt status code the ledger uses for a successful transaction
pub const SUCCESS_STATUS_CODE: i32 = 22;

// 8 decimals numbers
pub const HBAR_DECIMALS: u8 = 8;
// 100 000 000 tinybars to represent 1 hbar
pub const TINYBARS_PER_HBAR: u64 = 10u64.pow(HBAR_DECIMALS as u32);

// Balance kept untouched on a pool account when excess hbars are moved back
// to the reference account, so the account can still pay its own fees
pub const MINIMUM_FEE_RESERVE: u64 = TINYBARS_PER_HBAR;

// Suite-wide step budget, a step may declare its own
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(60);

// How long a published message is awaited before the observation fails
pub const DEFAULT_OBSERVATION_WINDOW: Duration = Duration::from_secs(4);

// Receipt polling
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(250);

// Index of the account that acts as treasury and reference account
pub const REFERENCE_ACCOUNT_INDEX: usize = 0;

// Environment variables holding the account list
pub const ACCOUNTS_FILE_ENV: &str = "LEDGER_ACCOUNTS_FILE";
pub const ACCOUNTS_ENV: &str = "LEDGER_ACCOUNTS";
pub const NETWORK_ENV: &str = "LEDGER_NETWORK";

pub const DEFAULT_NETWORK: &str = "testnet";

/// One configured test account: its ledger id and its private key
/// (raw or DER encoded hex)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    pub id: AccountId,
    pub private_key: String,
}

/// Static account list, loaded once at process start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    #[serde(default = "default_network")]
    pub network: String,
    pub accounts: Vec<AccountEntry>,
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_owned()
}

impl AccountsConfig {
    /// Load the account list from the environment.
    ///
    /// `LEDGER_ACCOUNTS_FILE` points to a JSON file, `LEDGER_ACCOUNTS` holds
    /// either the same JSON document or a bare JSON array of accounts.
    /// The file takes precedence when both are set.
    pub fn from_env() -> Result<Self, LedgerError> {
        let mut config = if let Ok(path) = env::var(ACCOUNTS_FILE_ENV) {
            Self::from_file(path)?
        } else if let Ok(inline) = env::var(ACCOUNTS_ENV) {
            Self::from_json(&inline)?
        } else {
            return Err(LedgerError::configuration(format!(
                "neither {} nor {} is set",
                ACCOUNTS_FILE_ENV, ACCOUNTS_ENV
            )));
        };

        if let Ok(network) = env::var(NETWORK_ENV) {
            config.network = network;
        }

        log::debug!(
            "Loaded {} accounts for network {}",
            config.accounts.len(),
            config.network
        );
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LedgerError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, LedgerError> {
        let config = match serde_json::from_str::<Self>(content) {
            Ok(config) => config,
            Err(document_err) => match serde_json::from_str::<Vec<AccountEntry>>(content) {
                Ok(accounts) => Self {
                    network: default_network(),
                    accounts,
                },
                Err(_) => {
                    return Err(LedgerError::configuration(format!(
                        "malformed accounts configuration: {}",
                        document_err
                    )))
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), LedgerError> {
        if self.accounts.is_empty() {
            return Err(LedgerError::configuration("account list is empty"));
        }

        for (idx, entry) in self.accounts.iter().enumerate() {
            if self.accounts[..idx].iter().any(|other| other.id == entry.id) {
                return Err(LedgerError::configuration(format!(
                    "account {} is listed twice",
                    entry.id
                )));
            }
        }

        Ok(())
    }
}
