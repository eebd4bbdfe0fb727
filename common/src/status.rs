// Ledger response codes
//
// Only the codes the harness can observe are listed. The numeric values are
// the ones used on the wire by the ledger protocol, SUCCESS (22) being the
// canonical success sentinel.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, FromRepr};

use crate::config::SUCCESS_STATUS_CODE;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    FromRepr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    InvalidTransaction = 1,
    PayerAccountNotFound = 2,
    InvalidSignature = 7,
    InsufficientPayerBalance = 10,
    DuplicateTransaction = 11,
    InvalidAccountId = 15,
    Unknown = 21,
    Success = 22,
    InsufficientAccountBalance = 28,
    InvalidAccountAmounts = 48,
    InvalidTopicId = 150,
    InvalidTokenId = 167,
    InsufficientTokenBalance = 178,
    TokenHasNoSupplyKey = 180,
    InvalidTokenMintAmount = 182,
    TokenNotAssociatedToAccount = 184,
    TokenAlreadyAssociatedToAccount = 194,
    TransfersNotZeroSumForToken = 199,
    TokenMaxSupplyReached = 232,
}

impl Status {
    /// Protocol code of this status
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Resolve a protocol code, `None` for codes the harness does not model
    pub fn from_code(code: i32) -> Option<Self> {
        Self::from_repr(code)
    }

    pub fn is_success(self) -> bool {
        self.code() == SUCCESS_STATUS_CODE
    }
}
