use ledger_common::{
    config::{
        DEFAULT_OBSERVATION_WINDOW, DEFAULT_RECEIPT_TIMEOUT, DEFAULT_STEP_TIMEOUT,
        MINIMUM_FEE_RESERVE,
    },
    Hbar, LedgerError,
};
use std::{env, str::FromStr, time::Duration};

pub const STEP_TIMEOUT_ENV: &str = "LEDGER_STEP_TIMEOUT_SECS";
pub const OBSERVATION_WINDOW_ENV: &str = "LEDGER_OBSERVATION_WINDOW_MS";
pub const FEE_RESERVE_ENV: &str = "LEDGER_FEE_RESERVE_TINYBARS";
pub const RECEIPT_TIMEOUT_ENV: &str = "LEDGER_RECEIPT_TIMEOUT_SECS";

/// Budgets and reserves shared by every scenario of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessSettings {
    /// Budget of a step that does not declare its own
    pub step_timeout: Duration,
    /// How long published messages are awaited
    pub observation_window: Duration,
    /// Hbars left on an account when its excess is moved back
    pub fee_reserve: Hbar,
    pub receipt_timeout: Duration,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
            observation_window: DEFAULT_OBSERVATION_WINDOW,
            fee_reserve: Hbar::from_tinybars(MINIMUM_FEE_RESERVE),
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }
}

impl HarnessSettings {
    /// Defaults, overridden by whichever environment variables are set
    pub fn from_env() -> Result<Self, LedgerError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env` over an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LedgerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, STEP_TIMEOUT_ENV)? {
            settings.step_timeout = Duration::from_secs(secs);
        }
        if let Some(millis) = parse_var::<u64, _>(&lookup, OBSERVATION_WINDOW_ENV)? {
            settings.observation_window = Duration::from_millis(millis);
        }
        if let Some(tinybars) = parse_var::<u64, _>(&lookup, FEE_RESERVE_ENV)? {
            settings.fee_reserve = Hbar::from_tinybars(tinybars);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, RECEIPT_TIMEOUT_ENV)? {
            settings.receipt_timeout = Duration::from_secs(secs);
        }

        log::debug!("harness settings: {:?}", settings);
        Ok(settings)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, LedgerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            LedgerError::configuration(format!("{}={:?} is invalid: {}", name, raw, e))
        }),
    }
}
