#![allow(clippy::module_inception)]
#![allow(clippy::upper_case_acronyms)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod hbar;
pub mod ids;
pub mod status;

pub use error::LedgerError;
pub use hbar::Hbar;
pub use ids::{AccountId, EntityIdError, TokenId, TopicId, TransactionId};
pub use status::Status;
