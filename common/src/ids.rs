// Ledger entity identifiers
//
// Every entity (account, token, topic) is addressed as `shard.realm.num`.
// A transaction is addressed by its payer and the instant it was frozen.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
    sync::atomic::{AtomicI64, Ordering},
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("Invalid entity id '{0}': expected shard.realm.num")]
    Format(String),

    #[error("Invalid transaction id '{0}': expected shard.realm.num@seconds.nanos")]
    TransactionFormat(String),
}

fn parse_entity(s: &str) -> Result<(u64, u64, u64), EntityIdError> {
    let mut parts = s.trim().split('.');
    let mut next = || -> Result<u64, EntityIdError> {
        parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| EntityIdError::Format(s.to_owned()))
    };

    let id = (next()?, next()?, next()?);
    if parts.next().is_some() {
        return Err(EntityIdError::Format(s.to_owned()));
    }
    Ok(id)
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            pub shard: u64,
            pub realm: u64,
            pub num: u64,
        }

        impl $name {
            pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
                Self { shard, realm, num }
            }

            /// Entity in the default shard and realm
            pub const fn from_num(num: u64) -> Self {
                Self::new(0, 0, num)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (shard, realm, num) = parse_entity(s)?;
                Ok(Self::new(shard, realm, num))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

entity_id!(
    /// Ledger account, the holder of hbars and token balances
    AccountId
);
entity_id!(
    /// Fungible token type
    TokenId
);
entity_id!(
    /// Consensus topic, an ordered append-only message channel
    TopicId
);

// Last valid-start handed out, in nanoseconds since the epoch.
// Two transactions frozen in the same nanosecond would otherwise share an id.
static LAST_VALID_START: AtomicI64 = AtomicI64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start_seconds: i64,
    pub valid_start_nanos: u32,
}

impl TransactionId {
    pub const fn new(account_id: AccountId, valid_start_seconds: i64, valid_start_nanos: u32) -> Self {
        Self {
            account_id,
            valid_start_seconds,
            valid_start_nanos,
        }
    }

    /// Fresh id for a transaction paid by `payer`.
    /// Valid starts are strictly increasing within the process.
    pub fn generate(payer: AccountId) -> Self {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let mut last = LAST_VALID_START.load(Ordering::Relaxed);
        let stamp = loop {
            let candidate = now.max(last + 1);
            match LAST_VALID_START.compare_exchange_weak(
                last,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break candidate,
                Err(current) => last = current,
            }
        };

        Self::new(
            payer,
            stamp.div_euclid(1_000_000_000),
            stamp.rem_euclid(1_000_000_000) as u32,
        )
    }

    /// The account paying for the transaction
    pub fn payer(&self) -> AccountId {
        self.account_id
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:09}",
            self.account_id, self.valid_start_seconds, self.valid_start_nanos
        )
    }
}

impl FromStr for TransactionId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || EntityIdError::TransactionFormat(s.to_owned());
        let (account, start) = s.split_once('@').ok_or_else(err)?;
        let (seconds, nanos) = start.split_once('.').ok_or_else(err)?;

        Ok(Self::new(
            account.parse().map_err(|_| err())?,
            seconds.parse().map_err(|_| err())?,
            nanos.parse().map_err(|_| err())?,
        ))
    }
}

impl Serialize for TransactionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
