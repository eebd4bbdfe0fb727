//! # Ledger Testing Framework
//!
//! Deterministic preconditions for behavior-driven scenarios that exercise a
//! ledger's account, token and topic services with a small pool of reused,
//! pre-funded accounts.
//!
//! ## Architecture Overview
//!
//! - **rpc**: the `LedgerRpc` seam and `TestLedger`, its in-process implementation
//! - **client**: `LedgerClient`, the explicit operator handle every call goes through
//! - **accounts**: the fixed `AccountPool`
//! - **transaction**: `PendingTransaction` lifecycle and transfer legs
//! - **services**: association guard, balance reconciler, token and topic
//!   services, message observer
//! - **steps / scenarios**: the step table and the YAML feature runner
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ledger_testing_framework::prelude::*;
//!
//! #[tokio::test]
//! async fn test_token_feature() {
//!     let pool = Arc::new(AccountPool::generate(5, 42));
//!     let ledger = Arc::new(TestLedgerBuilder::new().with_pool(&pool).build());
//!
//!     let feature = parse_feature(include_str!("../features/token_service.yaml")).unwrap();
//!     let executor = ScenarioExecutor::new(StepRegistry::with_default_steps().unwrap(), ledger, pool);
//!     let report = executor.run(&feature).await;
//!     assert!(report.success());
//! }
//! ```
//!
//! ## Design Principles
//!
//! 1. **Explicit context**: no global operator, no global "token under test"
//! 2. **Idempotent convergence**: preconditions issue zero transactions when
//!    the ledger already matches the target
//! 3. **Bounded waits**: every awaited condition carries its own timeout
//! 4. **Scenario isolation**: a failing scenario never affects the next one

#![warn(clippy::all)]

/// Pool of reusable test accounts
pub mod accounts;

/// Operator handle used to authorize ledger calls
pub mod client;

/// Harness settings (timeouts, reserves) with environment overrides
pub mod config;

/// Per-scenario fixture
pub mod fixture;

// Conservation checks over transfer lists and token supply
pub mod invariants;

/// Authorization keys, including m-of-n threshold keys
pub mod keys;

/// Clock abstraction for deterministic time control
pub mod orchestrator;

/// Ledger RPC seam and the in-process test ledger
pub mod rpc;

/// YAML feature files and their executor
pub mod scenarios;

/// Reconciliation services built on top of the client
pub mod services;

/// Step definition table
pub mod steps;

/// Transaction construction, freezing and signing
pub mod transaction;

/// Bounded polling primitives
pub mod waiters;

// Convenient re-exports for common usage
pub mod prelude;

pub use accounts::{Account, AccountPool};
pub use client::LedgerClient;
pub use orchestrator::{Clock, PausedClock, SystemClock};
pub use rpc::{LedgerRpc, TestLedger, TestLedgerBuilder};

/// Framework version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
