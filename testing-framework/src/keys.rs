use ledger_common::{crypto::PublicKey, LedgerError};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt};

/// Authorization requirement attached to an account, token or topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    /// A single signature from this key
    Ed25519(PublicKey),
    /// At least `threshold` distinct signatures among the listed keys
    Threshold(ThresholdKey),
}

impl Key {
    /// Whether the given signers meet this requirement
    pub fn is_satisfied_by(&self, signers: &HashSet<PublicKey>) -> bool {
        match self {
            Key::Ed25519(key) => signers.contains(key),
            Key::Threshold(threshold) => threshold.matching(signers) >= threshold.threshold(),
        }
    }

    /// Every public key that may contribute a signature
    pub fn public_keys(&self) -> Vec<PublicKey> {
        match self {
            Key::Ed25519(key) => vec![*key],
            Key::Threshold(threshold) => threshold.keys().to_vec(),
        }
    }

    /// Signatures needed for the requirement to hold
    pub fn required_signatures(&self) -> usize {
        match self {
            Key::Ed25519(_) => 1,
            Key::Threshold(threshold) => threshold.threshold(),
        }
    }
}

impl From<PublicKey> for Key {
    fn from(key: PublicKey) -> Self {
        Key::Ed25519(key)
    }
}

impl From<ThresholdKey> for Key {
    fn from(key: ThresholdKey) -> Self {
        Key::Threshold(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Ed25519(key) => write!(f, "{}", key),
            Key::Threshold(threshold) => write!(f, "{}", threshold),
        }
    }
}

/// m-of-n composite key
///
/// Keys are kept in the order they were given and never repeat, so the
/// threshold is always reachable with distinct signers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholdKey")]
pub struct ThresholdKey {
    threshold: usize,
    keys: Vec<PublicKey>,
}

// Wire shape, validated through `ThresholdKey::new`
#[derive(Deserialize)]
struct RawThresholdKey {
    threshold: usize,
    keys: Vec<PublicKey>,
}

impl TryFrom<RawThresholdKey> for ThresholdKey {
    type Error = LedgerError;

    fn try_from(raw: RawThresholdKey) -> Result<Self, Self::Error> {
        ThresholdKey::new(raw.keys, raw.threshold)
    }
}

impl ThresholdKey {
    /// Build a threshold key; `threshold` must be within `1..=keys.len()`
    pub fn new(keys: Vec<PublicKey>, threshold: usize) -> Result<Self, LedgerError> {
        if keys.is_empty() {
            return Err(LedgerError::configuration("threshold key needs at least one key"));
        }
        if threshold == 0 || threshold > keys.len() {
            return Err(LedgerError::configuration(format!(
                "threshold {} is outside 1..={}",
                threshold,
                keys.len()
            )));
        }

        let mut seen = HashSet::with_capacity(keys.len());
        if let Some(dup) = keys.iter().find(|key| !seen.insert(**key)) {
            return Err(LedgerError::configuration(format!(
                "key {} appears twice in threshold key",
                dup
            )));
        }

        Ok(Self { threshold, keys })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn keys(&self) -> &[PublicKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.keys.contains(key)
    }

    // Number of member keys present among the signers
    fn matching(&self, signers: &HashSet<PublicKey>) -> usize {
        self.keys.iter().filter(|key| signers.contains(key)).count()
    }
}

impl fmt::Display for ThresholdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThresholdKey({} of [", self.threshold)?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", key)?;
        }
        write!(f, "])")
    }
}
