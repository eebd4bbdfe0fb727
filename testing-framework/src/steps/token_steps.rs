//! Token service steps
//!
//! Account 0 is the treasury and the reference account. Ordinals in step
//! text (`first` .. `fourth`) name pool accounts 1 to 4.

use anyhow::{bail, ensure, Context, Result};
use ledger_common::{Hbar, Status};

use super::{fund_above, hbar_amount, StepArgs, StepError, StepRegistry};
use crate::{
    fixture::ScenarioWorld,
    keys::Key,
    rpc::TokenInfo,
    services::{ensure_associated, token, TokenSpec},
    transaction::TransferTransactionBuilder,
    waiters,
};

const TOKEN_NAME: &str = "Test Token";
const TOKEN_SYMBOL: &str = "HTT";
const TOKEN_DECIMALS: u32 = 2;
const TREASURY: usize = 0;

pub fn register(registry: &mut StepRegistry) -> Result<(), StepError> {
    registry
        .register(r"A Hedera account with more than (\d+) hbar", |world, args| {
            Box::pin(treasury_funded(world, args))
        })?
        .register(r"I create a token named Test Token \(HTT\)", |world, _| {
            Box::pin(create_mintable_token(world))
        })?
        .register(
            r"I create a fixed supply token named Test Token \(HTT\) with (\d+) tokens",
            |world, args| Box::pin(create_fixed_token(world, args)),
        )?
        .register(r#"The token has the name "([^"]*)""#, |world, args| {
            Box::pin(token_name(world, args))
        })?
        .register(r#"The token has the symbol "([^"]*)""#, |world, args| {
            Box::pin(token_symbol(world, args))
        })?
        .register(r"The token has (\d+) decimals", |world, args| {
            Box::pin(token_decimals(world, args))
        })?
        .register(r"The token is owned by the account", |world, _| {
            Box::pin(token_owner(world))
        })?
        .register(r"The total supply of the token is (\d+)", |world, args| {
            Box::pin(total_supply(world, args))
        })?
        .register(r"An attempt to mint (\d+) additional tokens succeeds", |world, args| {
            Box::pin(mint_succeeds(world, args))
        })?
        .register(r"An attempt to mint tokens fails", |world, _| {
            Box::pin(mint_fails(world))
        })?
        .register(r"A first hedera account with more than (\d+) hbar", |world, args| {
            Box::pin(first_account_funded(world, args))
        })?
        .register(r"A second Hedera account", |world, _| {
            Box::pin(second_account(world))
        })?
        .register(r"A token named Test Token \(HTT\) with (\d+) tokens", |world, args| {
            Box::pin(token_with_supply(world, args))
        })?
        .register(
            r"The (first|second|third|fourth) account holds (\d+) HTT tokens",
            |world, args| Box::pin(account_holds(world, args)),
        )?
        .register(
            r"The (first|second|third|fourth) account should hold (\d+) HTT tokens",
            |world, args| Box::pin(account_should_hold(world, args)),
        )?
        .register(
            r"The first account creates a transaction to transfer (\d+) HTT tokens to the second account",
            |world, args| Box::pin(first_creates_transfer(world, args)),
        )?
        .register(
            r"The second account creates a transaction to transfer (\d+) HTT tokens to the first account",
            |world, args| Box::pin(second_creates_transfer(world, args)),
        )?
        .register(r"The first account submits the transaction", |world, _| {
            Box::pin(first_submits(world))
        })?
        .register(r"The first account has paid for the transaction fee", |world, _| {
            Box::pin(first_paid_fee(world))
        })?
        .register(
            r"A first hedera account with more than (\d+) hbar and (\d+) HTT tokens",
            |world, args| Box::pin(first_account_with_tokens(world, args)),
        )?
        .register(
            r"A (second|third|fourth) Hedera account with (\d+) hbar and (\d+) HTT tokens",
            |world, args| Box::pin(account_with_hbar_and_tokens(world, args)),
        )?
        .register(
            r"A transaction is created to transfer (\d+) HTT tokens out of the first and second account and (\d+) HTT tokens into the third account and (\d+) HTT tokens into the fourth account",
            |world, args| Box::pin(multi_party_transfer(world, args)),
        )?;
    Ok(())
}

async fn treasury_funded(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    world.use_operator(TREASURY)?;
    fund_above(world, TREASURY, args.int(0)?).await
}

async fn create_mintable_token(world: &mut ScenarioWorld) -> Result<()> {
    let treasury = world.account(TREASURY)?;
    let spec = TokenSpec::infinite(TOKEN_NAME, TOKEN_SYMBOL, TOKEN_DECIMALS)
        .with_supply_key(Key::from(treasury.public_key()));

    let (state, receipt) = token::create_token(&world.client, &treasury, &spec, &[])
        .await
        .context("creating mintable token")?;
    world.token = Some(state);
    world.last_transaction_id = Some(receipt.transaction_id);
    world.last_receipt = Some(receipt);
    Ok(())
}

async fn create_fixed_token(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let supply = args.int(0)?;
    let treasury = world.account(TREASURY)?;
    let spec = TokenSpec::finite(TOKEN_NAME, TOKEN_SYMBOL, TOKEN_DECIMALS, supply)
        .with_admin_key(Key::from(treasury.public_key()));

    let (state, receipt) = token::create_token(&world.client, &treasury, &spec, &[&treasury])
        .await
        .context("creating fixed supply token")?;
    world.token = Some(state);
    world.last_transaction_id = Some(receipt.transaction_id);
    world.last_receipt = Some(receipt);
    Ok(())
}

/// Refresh the cached token info and hand it out
async fn refresh_token_info(world: &mut ScenarioWorld) -> Result<&TokenInfo> {
    let token_id = world.token_id()?;
    let info = token::token_info(&world.client, &token_id).await?;
    if let Some(state) = world.token.as_mut() {
        state.sync_from(&info);
    }
    Ok(world.token_info.insert(info))
}

async fn token_name(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let expected = args.str(0)?;
    let info = refresh_token_info(world).await?;
    ensure!(info.name == expected, "token name is {:?}, expected {:?}", info.name, expected);
    Ok(())
}

async fn token_symbol(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let expected = args.str(0)?;
    let info = refresh_token_info(world).await?;
    ensure!(
        info.symbol == expected,
        "token symbol is {:?}, expected {:?}",
        info.symbol,
        expected
    );
    Ok(())
}

async fn token_decimals(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let expected: u32 = args.int(0)?;
    let info = refresh_token_info(world).await?;
    ensure!(
        info.decimals == expected,
        "token has {} decimals, expected {}",
        info.decimals,
        expected
    );
    Ok(())
}

async fn token_owner(world: &mut ScenarioWorld) -> Result<()> {
    let treasury = world.account(TREASURY)?.id;
    let info = refresh_token_info(world).await?;
    ensure!(
        info.treasury_account_id == treasury,
        "token treasury is {}, expected {}",
        info.treasury_account_id,
        treasury
    );
    Ok(())
}

async fn total_supply(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let expected: u64 = args.int(0)?;
    let info = refresh_token_info(world).await?;
    ensure!(
        info.total_supply == expected,
        "total supply is {}, expected {}",
        info.total_supply,
        expected
    );
    Ok(())
}

async fn mint_succeeds(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let amount: u64 = args.int(0)?;
    let supply_key_holder = world.account(TREASURY)?;
    let before = refresh_token_info(world).await?.total_supply;

    let state = world.token.as_mut().context("no token has been created")?;
    let receipt = token::mint(&world.client, state, amount, &supply_key_holder)
        .await
        .with_context(|| format!("minting {} tokens", amount))?;
    world.last_transaction_id = Some(receipt.transaction_id);
    world.last_receipt = Some(receipt);

    let after = refresh_token_info(world).await?.total_supply;
    ensure!(
        before.checked_add(amount) == Some(after),
        "total supply went from {} to {} after minting {}",
        before,
        after,
        amount
    );
    Ok(())
}

async fn mint_fails(world: &mut ScenarioWorld) -> Result<()> {
    let holder = world.account(TREASURY)?;
    let state = world.token.as_mut().context("no token has been created")?;

    match token::mint(&world.client, state, 1, &holder).await {
        Ok(receipt) => bail!("mint was accepted with status {}", receipt.status),
        Err(err) => match err.status() {
            Some(Status::TokenHasNoSupplyKey) => {
                log::info!("Mint rejected as expected: {}", err);
                Ok(())
            }
            _ => Err(err).context("mint failed for an unexpected reason"),
        },
    }
}

async fn first_account_funded(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    world.use_operator(1)?;
    fund_above(world, 1, args.int(0)?).await
}

async fn second_account(world: &mut ScenarioWorld) -> Result<()> {
    world.pool.require(3)?;
    Ok(())
}

/// Create the scenario's finite token unless one already exists
async fn token_with_supply(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let supply: u64 = args.int(0)?;
    if world.token.is_none() {
        create_fixed_token(world, args).await?;
    }

    let info = refresh_token_info(world).await?;
    ensure!(
        info.total_supply >= supply,
        "token supply {} is below the {} the scenario needs",
        info.total_supply,
        supply
    );
    Ok(())
}

/// Associate, then move tokens to or from the treasury until the target holds
async fn reconcile_tokens(world: &mut ScenarioWorld, index: usize, target: u64) -> Result<()> {
    let account = world.account(index)?;
    let token_id = world.token_id()?;

    ensure_associated(&world.client, &token_id, &account).await?;
    world
        .reconciler
        .reconcile_token(&world.client, &token_id, &account, target)
        .await
        .with_context(|| format!("bringing {} to {} tokens", account.id, target))?;
    assert_token_balance(world, index, target).await
}

async fn assert_token_balance(world: &ScenarioWorld, index: usize, expected: u64) -> Result<()> {
    let account = world.account(index)?;
    let balance = token::token_balance(&world.client, &world.token_id()?, &account.id).await?;
    ensure!(
        balance == expected,
        "{} holds {} tokens, expected {}",
        account.id,
        balance,
        expected
    );
    Ok(())
}

async fn account_holds(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    reconcile_tokens(world, args.ordinal(0)?, args.int(1)?).await
}

/// Balances reached through another party's transaction may lag behind its
/// receipt, so this waits up to the observation window
async fn account_should_hold(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let account = world.account(args.ordinal(0)?)?;
    let expected = args.int(1)?;
    waiters::wait_for_token_balance(
        &world.client,
        &account.id,
        &world.token_id()?,
        expected,
        world.settings.observation_window,
    )
    .await
    .with_context(|| format!("{} should hold {} tokens", account.id, expected))?;
    Ok(())
}

async fn first_creates_transfer(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let amount = args.int(0)?;
    let first = world.use_operator(1)?;
    let second = world.account(2)?;

    let mut tx =
        TransferTransactionBuilder::token_transfer(world.token_id()?, first.id, second.id, amount)?;
    tx.freeze_with(&world.client)?;
    world.pending = Some(tx);
    Ok(())
}

/// Built with the first account as payer, authorized by the second
async fn second_creates_transfer(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let amount = args.int(0)?;
    world.use_operator(1)?;
    let first = world.account(1)?;
    let second = world.account(2)?;

    let mut tx =
        TransferTransactionBuilder::token_transfer(world.token_id()?, second.id, first.id, amount)?;
    tx.freeze_with(&world.client)?.sign(&second.private_key)?;
    world.pending = Some(tx);
    Ok(())
}

async fn first_submits(world: &mut ScenarioWorld) -> Result<()> {
    world.use_operator(1)?;
    let mut tx = world
        .pending
        .take()
        .context("no transaction has been created in this scenario")?;

    let response = tx.execute(&world.client).await?;
    world.last_transaction_id = Some(response.transaction_id);
    let receipt = response
        .get_receipt(&world.client)
        .await
        .context("submitted transaction was not accepted")?;
    world.last_receipt = Some(receipt);
    Ok(())
}

async fn first_paid_fee(world: &mut ScenarioWorld) -> Result<()> {
    let first = world.account(1)?;
    let transaction_id = world
        .last_transaction_id
        .context("no transaction has been submitted in this scenario")?;

    let record = waiters::wait_for_record(&world.client, &transaction_id).await?;
    ensure!(
        record.payer() == first.id,
        "transaction fee was paid by {}, expected {}",
        record.payer(),
        first.id
    );
    ensure!(
        record.transaction_fee > Hbar::ZERO,
        "transaction {} charged no fee",
        transaction_id
    );
    Ok(())
}

async fn first_account_with_tokens(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    fund_above(world, 1, args.int(0)?).await?;
    reconcile_tokens(world, 1, args.int(1)?).await
}

/// Excess hbars go back to the reference account; balances below the target
/// are left alone
async fn account_with_hbar_and_tokens(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let index = args.ordinal(0)?;
    let target = hbar_amount(args.int(1)?)?;
    let ceiling = target
        .checked_add(world.settings.fee_reserve)
        .with_context(|| format!("{} plus the fee reserve overflows", target))?;
    let tokens = args.int(2)?;
    let account = world.account(index)?;

    world
        .reconciler
        .reconcile_native_currency(&world.client, &account, target, world.settings.fee_reserve)
        .await
        .with_context(|| format!("moving excess hbars off {}", account.id))?;
    let balance = world.client.rpc().account_balance(&account.id).await?.hbars;
    ensure!(
        balance <= ceiling,
        "{} still holds {} after reconciliation",
        account.id,
        balance
    );

    reconcile_tokens(world, index, tokens).await
}

async fn multi_party_transfer(world: &mut ScenarioWorld, args: StepArgs) -> Result<()> {
    let out_each: u64 = args.int(0)?;
    let into_third: u64 = args.int(1)?;
    let into_fourth: u64 = args.int(2)?;

    let first = world.use_operator(1)?;
    let second = world.account(2)?;
    let third = world.account(3)?;
    let fourth = world.account(4)?;

    let mut tx = TransferTransactionBuilder::multi_party(
        world.token_id()?,
        &[(first.id, out_each), (second.id, out_each)],
        &[(third.id, into_third), (fourth.id, into_fourth)],
    )?;
    tx.freeze_with(&world.client)?.sign(&second.private_key)?;
    world.pending = Some(tx);
    Ok(())
}
