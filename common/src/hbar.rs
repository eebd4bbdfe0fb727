use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display, Formatter},
    ops::{Add, Sub},
};

use crate::config::{HBAR_DECIMALS, TINYBARS_PER_HBAR};

/// Native currency amount, stored in tinybars
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hbar(u64);

impl Hbar {
    pub const ZERO: Hbar = Hbar(0);

    pub const fn from_tinybars(tinybars: u64) -> Self {
        Self(tinybars)
    }

    /// Saturates at `u64::MAX` tinybars; use [`Hbar::checked_from_hbars`]
    /// for amounts that come from user input
    pub const fn from_hbars(hbars: u64) -> Self {
        Self(hbars.saturating_mul(TINYBARS_PER_HBAR))
    }

    /// `None` when the amount does not fit in tinybars
    pub const fn checked_from_hbars(hbars: u64) -> Option<Self> {
        match hbars.checked_mul(TINYBARS_PER_HBAR) {
            Some(tinybars) => Some(Self(tinybars)),
            None => None,
        }
    }

    pub const fn to_tinybars(self) -> u64 {
        self.0
    }

    /// Whole hbars, truncating the fractional part
    pub const fn whole_hbars(self) -> u64 {
        self.0 / TINYBARS_PER_HBAR
    }

    pub fn checked_add(self, other: Hbar) -> Option<Hbar> {
        self.0.checked_add(other.0).map(Hbar)
    }

    pub fn checked_sub(self, other: Hbar) -> Option<Hbar> {
        self.0.checked_sub(other.0).map(Hbar)
    }

    pub fn saturating_sub(self, other: Hbar) -> Hbar {
        Hbar(self.0.saturating_sub(other.0))
    }
}

// Operators saturate; checked variants above report overflow instead
impl Add for Hbar {
    type Output = Hbar;

    fn add(self, rhs: Hbar) -> Hbar {
        Hbar(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Hbar {
    type Output = Hbar;

    fn sub(self, rhs: Hbar) -> Hbar {
        self.saturating_sub(rhs)
    }
}

impl Display for Hbar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$} ℏ",
            self.0 / TINYBARS_PER_HBAR,
            self.0 % TINYBARS_PER_HBAR,
            width = HBAR_DECIMALS as usize
        )
    }
}
