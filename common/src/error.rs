use std::time::Duration;
use thiserror::Error;

use crate::{ids::TransactionId, status::Status};

/// Failures surfaced by the reconciliation layer.
///
/// Nothing in the harness retries on any of these: they bubble up to the
/// scenario step, which fails.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// Pool or account list malformed or too small for the scenario
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The ledger answered with a non-success status
    #[error("{}", rejection_message(.status, .transaction_id))]
    LedgerRejection {
        status: Status,
        transaction_id: Option<TransactionId>,
    },

    /// An awaited condition did not hold within its budget
    #[error("Timed out after {waited:?} waiting for {condition}")]
    ObservationTimeout { condition: String, waited: Duration },

    /// A transaction was used against its lifecycle (signed before freeze,
    /// mutated after freeze, executed twice)
    #[error("Invalid transaction state: {0}")]
    InvalidState(String),
}

fn rejection_message(status: &Status, transaction_id: &Option<TransactionId>) -> String {
    match transaction_id {
        Some(id) => format!(
            "Transaction {} rejected with status {} ({})",
            id,
            status,
            status.code()
        ),
        None => format!("Request rejected with status {} ({})", status, status.code()),
    }
}

impl LedgerError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn rejection(status: Status, transaction_id: Option<TransactionId>) -> Self {
        Self::LedgerRejection {
            status,
            transaction_id,
        }
    }

    /// Status carried by a ledger rejection
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::LedgerRejection { status, .. } => Some(*status),
            _ => None,
        }
    }
}
