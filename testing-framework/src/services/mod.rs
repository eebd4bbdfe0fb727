//! Services built on [`crate::client::LedgerClient`]
//!
//! - association: idempotent token association
//! - reconciler: minimal corrective transfers to reach a target balance
//! - token / topic: create, mint, publish and info queries
//! - observer: bounded observation of a topic's message stream

pub mod association;
pub mod observer;
pub mod reconciler;
pub mod token;
pub mod topic;

pub use association::{ensure_associated, AssociationOutcome};
pub use observer::{MessageObserver, Observation};
pub use reconciler::{Asset, BalanceReconciler, ReconcileOutcome};
pub use token::{TokenSpec, TokenState};
