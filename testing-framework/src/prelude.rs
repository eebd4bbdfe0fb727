//! Common imports for scenario tests
//!
//! ```rust,ignore
//! use ledger_testing_framework::prelude::*;
//! ```

pub use std::sync::Arc;
pub use std::time::Duration;

pub use ledger_common::{
    AccountId, Hbar, LedgerError, Status, TokenId, TopicId, TransactionId,
};

pub use crate::accounts::{Account, AccountPool};
pub use crate::client::LedgerClient;
pub use crate::config::HarnessSettings;
pub use crate::fixture::ScenarioWorld;
pub use crate::keys::{Key, ThresholdKey};
pub use crate::orchestrator::{Clock, PausedClock, SystemClock};
pub use crate::rpc::{LedgerRpc, TestLedger, TestLedgerBuilder};
pub use crate::scenarios::{load_feature, parse_feature, FeatureReport, ScenarioExecutor};
pub use crate::services::{
    ensure_associated, AssociationOutcome, BalanceReconciler, MessageObserver, ReconcileOutcome,
    TokenSpec, TokenState,
};
pub use crate::steps::StepRegistry;
pub use crate::transaction::{PendingTransaction, TransferTransactionBuilder};
pub use crate::waiters::wait_until;
