//! Conservation checks
//!
//! - Zero-sum transfer lists, per asset (what the ledger enforces on every
//!   transfer)
//! - Token supply conservation: the balances of every holder add up to the
//!   token's total supply
//! - Native currency conservation across a closed set of accounts

use anyhow::{bail, Result};
use indexmap::IndexMap;
use ledger_common::{Status, TokenId};

use crate::{rpc::TokenInfo, transaction::TransferBody};

/// Every asset in a transfer list must net to zero.
///
/// Native legs failing the check map to `INVALID_ACCOUNT_AMOUNTS`, token legs
/// to `TRANSFERS_NOT_ZERO_SUM_FOR_TOKEN`.
pub fn check_zero_sum(body: &TransferBody) -> Result<(), Status> {
    let hbar_net: i128 = body
        .hbar_transfers
        .iter()
        .map(|leg| leg.amount as i128)
        .sum();
    if hbar_net != 0 {
        return Err(Status::InvalidAccountAmounts);
    }

    let mut token_net: IndexMap<TokenId, i128> = IndexMap::new();
    for leg in &body.token_transfers {
        *token_net.entry(leg.token_id).or_default() += leg.amount as i128;
    }
    if token_net.values().any(|net| *net != 0) {
        return Err(Status::TransfersNotZeroSumForToken);
    }

    Ok(())
}

/// Holder balances must add up to the reported total supply
pub fn check_token_conservation<I>(info: &TokenInfo, balances: I) -> Result<()>
where
    I: IntoIterator<Item = u64>,
{
    let held: u128 = balances.into_iter().map(u128::from).sum();
    if held != u128::from(info.total_supply) {
        bail!(
            "token {} holders own {} but total supply is {}",
            info.token_id,
            held,
            info.total_supply
        );
    }
    Ok(())
}

/// Tinybars across a closed set of accounts never change
pub fn check_hbar_conservation<I>(expected_total: u64, balances: I) -> Result<()>
where
    I: IntoIterator<Item = u64>,
{
    let total: u128 = balances.into_iter().map(u128::from).sum();
    if total != u128::from(expected_total) {
        bail!(
            "hbar supply drifted: expected {} tinybars, found {}",
            expected_total,
            total
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{HbarTransfer, TokenSupplyType, TokenTransfer};
    use ledger_common::AccountId;

    fn token_leg(token: u64, account: u64, amount: i64) -> TokenTransfer {
        TokenTransfer {
            token_id: TokenId::from_num(token),
            account_id: AccountId::from_num(account),
            amount,
        }
    }

    #[test]
    fn test_multi_party_token_transfer_nets_to_zero() {
        let body = TransferBody {
            hbar_transfers: vec![],
            token_transfers: vec![
                token_leg(9, 1, -10),
                token_leg(9, 2, -10),
                token_leg(9, 3, 10),
                token_leg(9, 4, 10),
            ],
        };
        assert_eq!(check_zero_sum(&body), Ok(()));
    }

    #[test]
    fn test_unbalanced_legs_map_to_status() {
        let hbar = TransferBody {
            hbar_transfers: vec![
                HbarTransfer {
                    account_id: AccountId::from_num(1),
                    amount: -5,
                },
                HbarTransfer {
                    account_id: AccountId::from_num(2),
                    amount: 4,
                },
            ],
            token_transfers: vec![],
        };
        assert_eq!(check_zero_sum(&hbar), Err(Status::InvalidAccountAmounts));

        // Balanced overall but not per token
        let tokens = TransferBody {
            hbar_transfers: vec![],
            token_transfers: vec![token_leg(9, 1, -5), token_leg(10, 2, 5)],
        };
        assert_eq!(
            check_zero_sum(&tokens),
            Err(Status::TransfersNotZeroSumForToken)
        );
    }

    #[test]
    fn test_token_conservation() {
        let info = TokenInfo {
            token_id: TokenId::from_num(9),
            name: "Test Token".into(),
            symbol: "HTT".into(),
            decimals: 2,
            total_supply: 1000,
            supply_type: TokenSupplyType::Finite,
            max_supply: 1000,
            treasury_account_id: AccountId::from_num(1),
            admin_key: None,
            supply_key: None,
        };
        assert!(check_token_conservation(&info, [600, 400]).is_ok());
        assert!(check_token_conservation(&info, [600, 300]).is_err());
        assert!(check_hbar_conservation(10, [3, 7]).is_ok());
        assert!(check_hbar_conservation(10, [3, 8]).is_err());
    }
}
