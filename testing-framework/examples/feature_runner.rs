// File: testing-framework/examples/feature_runner.rs
//
// Runs YAML feature files against an in-process test ledger.
//
// The account pool comes from LEDGER_ACCOUNTS_FILE / LEDGER_ACCOUNTS when
// set, otherwise a deterministic pool is generated from --seed.
//
// Run this example with:
//   cargo run --example feature_runner -- features/token_service.yaml
//   RUST_LOG=debug cargo run --example feature_runner -- --receipt-lag 2

use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, process::ExitCode, sync::Arc};

use ledger_common::{config::AccountsConfig, Hbar};
use ledger_testing_framework::{
    config::HarnessSettings,
    scenarios::{load_feature, ScenarioExecutor},
    steps::StepRegistry,
    AccountPool, TestLedgerBuilder,
};

#[derive(Debug, Parser)]
#[command(name = "feature_runner", about = "Run ledger feature files")]
struct Args {
    /// Feature files to run, in order
    #[arg(default_values_t = [
        "features/topic_service.yaml".to_string(),
        "features/token_service.yaml".to_string(),
    ])]
    features: Vec<String>,

    /// Accounts in a generated pool
    #[arg(long, default_value_t = 5)]
    accounts: usize,

    /// Seed of the generated pool
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Starting balance of each pool account, in hbars
    #[arg(long, default_value_t = 1_000)]
    balance: u64,

    /// Flat fee, in tinybars
    #[arg(long, default_value_t = 100_000)]
    fee: u64,

    /// Receipt polls answered "not yet" before consensus
    #[arg(long, default_value_t = 0)]
    receipt_lag: usize,
}

fn load_pool(args: &Args) -> Result<AccountPool> {
    match AccountsConfig::from_env() {
        Ok(config) => Ok(AccountPool::from_config(&config)?),
        Err(err) => {
            log::info!("{}; generating {} accounts", err, args.accounts);
            Ok(AccountPool::generate(args.accounts, args.seed))
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let settings = HarnessSettings::from_env()?;
    let pool = Arc::new(load_pool(&args)?);
    let ledger = Arc::new(
        TestLedgerBuilder::new()
            .with_default_balance(Hbar::from_hbars(args.balance))
            .with_pool(&pool)
            .with_fee(Hbar::from_tinybars(args.fee))
            .with_receipt_lag(args.receipt_lag)
            .build(),
    );

    let registry = StepRegistry::with_default_steps()?;
    let executor = ScenarioExecutor::new(registry, ledger.clone(), pool).with_settings(settings);

    let mut all_passed = true;
    for path in args.features.iter().map(PathBuf::from) {
        let feature = load_feature(&path)?;
        let report = executor.run(&feature).await;
        for line in &report.log {
            println!("{}", line);
        }
        println!(
            "\n{}: {} passed, {} failed\n",
            report.feature,
            report.passed(),
            report.failed()
        );
        all_passed &= report.success();
    }

    ledger
        .check_invariants()
        .context("ledger invariants violated after the run")?;
    Ok(all_passed)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
