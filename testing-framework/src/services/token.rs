use ledger_common::{AccountId, LedgerError, TokenId};

use crate::{
    accounts::Account,
    client::LedgerClient,
    keys::Key,
    rpc::{TokenInfo, TransactionReceipt},
    transaction::{
        PendingTransaction, TokenCreateBody, TokenMintBody, TokenSupplyType, TransactionBody,
    },
};

/// What a scenario asks for when it creates a fungible token
#[derive(Debug, Clone)]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub initial_supply: u64,
    pub supply_type: TokenSupplyType,
    pub max_supply: Option<u64>,
    pub admin_key: Option<Key>,
    pub supply_key: Option<Key>,
}

impl TokenSpec {
    /// Mintable token with no cap
    pub fn infinite<S: Into<String>>(name: S, symbol: S, decimals: u32) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            initial_supply: 0,
            supply_type: TokenSupplyType::Infinite,
            max_supply: None,
            admin_key: None,
            supply_key: None,
        }
    }

    /// Token issued once at its maximum supply
    pub fn finite<S: Into<String>>(name: S, symbol: S, decimals: u32, supply: u64) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            initial_supply: supply,
            supply_type: TokenSupplyType::Finite,
            max_supply: Some(supply),
            admin_key: None,
            supply_key: None,
        }
    }

    pub fn with_admin_key(mut self, key: Key) -> Self {
        self.admin_key = Some(key);
        self
    }

    pub fn with_supply_key(mut self, key: Key) -> Self {
        self.supply_key = Some(key);
        self
    }
}

/// Local view of the token under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenState {
    pub token_id: TokenId,
    pub decimals: u32,
    pub supply_type: TokenSupplyType,
    pub max_supply: Option<u64>,
    tracked_supply: u64,
    stale: bool,
}

impl TokenState {
    pub fn from_info(info: &TokenInfo) -> Self {
        Self {
            token_id: info.token_id,
            decimals: info.decimals,
            supply_type: info.supply_type,
            max_supply: match info.supply_type {
                TokenSupplyType::Finite => Some(info.max_supply),
                TokenSupplyType::Infinite => None,
            },
            tracked_supply: info.total_supply,
            stale: false,
        }
    }

    /// Last known total supply, `None` once a mint made it stale
    pub fn tracked_supply(&self) -> Option<u64> {
        (!self.stale).then_some(self.tracked_supply)
    }

    pub fn record_mint(&mut self) {
        self.stale = true;
    }

    pub fn sync_from(&mut self, info: &TokenInfo) {
        *self = Self::from_info(info);
    }
}

/// Create a fungible token with `treasury` as treasury and payer
///
/// Signatures beyond the treasury's (admin key holders) come from `sign_with`.
pub async fn create_token(
    client: &LedgerClient,
    treasury: &Account,
    spec: &TokenSpec,
    sign_with: &[&Account],
) -> Result<(TokenState, TransactionReceipt), LedgerError> {
    let as_treasury = client.with_operator(treasury);
    let mut tx = PendingTransaction::new(TransactionBody::TokenCreate(TokenCreateBody {
        name: spec.name.clone(),
        symbol: spec.symbol.clone(),
        decimals: spec.decimals,
        initial_supply: spec.initial_supply,
        treasury_account_id: treasury.id,
        supply_type: spec.supply_type,
        max_supply: spec.max_supply.unwrap_or(0),
        admin_key: spec.admin_key.clone(),
        supply_key: spec.supply_key.clone(),
    }));
    tx.freeze_with(&as_treasury)?;
    for signer in sign_with {
        tx.sign(&signer.private_key)?;
    }

    let receipt = tx
        .execute(&as_treasury)
        .await?
        .get_receipt(&as_treasury)
        .await?;
    let token_id = receipt.token_id.ok_or_else(|| {
        LedgerError::invalid_state("token create receipt carries no token id")
    })?;

    let info = token_info(client, &token_id).await?;
    log::info!(
        "Created token {} ({}) with supply {} ({:?})",
        token_id,
        info.symbol,
        info.total_supply,
        info.supply_type
    );
    Ok((TokenState::from_info(&info), receipt))
}

/// Mint `amount` into the treasury, signed by the supply key holder
pub async fn mint(
    client: &LedgerClient,
    token: &mut TokenState,
    amount: u64,
    supply_key_holder: &Account,
) -> Result<TransactionReceipt, LedgerError> {
    let mut tx = PendingTransaction::new(TransactionBody::TokenMint(TokenMintBody {
        token_id: token.token_id,
        amount,
    }));
    tx.freeze_with(client)?.sign(&supply_key_holder.private_key)?;

    let receipt = tx.execute(client).await?.get_receipt(client).await?;
    token.record_mint();
    log::info!("Minted {} of token {}", amount, token.token_id);
    Ok(receipt)
}

pub async fn token_info(client: &LedgerClient, token_id: &TokenId) -> Result<TokenInfo, LedgerError> {
    client.rpc().token_info(token_id).await
}

pub async fn token_balance(
    client: &LedgerClient,
    token_id: &TokenId,
    account_id: &AccountId,
) -> Result<u64, LedgerError> {
    Ok(client.rpc().account_balance(account_id).await?.token(token_id))
}
