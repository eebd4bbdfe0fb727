#![allow(clippy::unwrap_used)]
//! Shipped feature files run end to end through the executor

mod common;

use ledger_testing_framework::prelude::*;
use ledger_testing_framework::scenarios::StepStatus;

const TOPIC_FEATURE: &str = include_str!("../features/topic_service.yaml");
const TOKEN_FEATURE: &str = include_str!("../features/token_service.yaml");

fn executor(seed: u64) -> (ScenarioExecutor, Arc<TestLedger>) {
    common::init_logging();
    let pool = Arc::new(AccountPool::generate(5, seed));
    let ledger = Arc::new(TestLedgerBuilder::new().with_pool(&pool).build());
    let registry = StepRegistry::with_default_steps().unwrap();
    (ScenarioExecutor::new(registry, ledger.clone(), pool), ledger)
}

fn assert_passed(report: &FeatureReport) {
    assert!(report.success(), "{}", report.log.join("\n"));
}

#[tokio::test]
async fn test_topic_feature_passes() {
    let (executor, ledger) = executor(30);
    let report = executor.run(&parse_feature(TOPIC_FEATURE).unwrap()).await;

    assert_passed(&report);
    assert_eq!(report.passed(), 2);
    ledger.check_invariants().unwrap();
}

#[tokio::test]
async fn test_token_feature_passes() {
    let (executor, ledger) = executor(31);
    let report = executor.run(&parse_feature(TOKEN_FEATURE).unwrap()).await;

    assert_passed(&report);
    let fixed = report.scenario("Create a fixed supply token").unwrap();
    assert_eq!(fixed.steps_executed(), fixed.steps.len());
    ledger.check_invariants().unwrap();
}

#[tokio::test]
async fn test_features_share_one_pool_across_runs() {
    let (executor, ledger) = executor(32);
    let token = parse_feature(TOKEN_FEATURE).unwrap();
    let topic = parse_feature(TOPIC_FEATURE).unwrap();

    // Preconditions converge no matter what the previous run left behind
    for feature in [&token, &topic, &token] {
        assert_passed(&executor.run(feature).await);
    }
    ledger.check_invariants().unwrap();
}

#[tokio::test]
async fn test_failed_scenario_does_not_leak_into_the_next() {
    let (executor, _) = executor(33);
    let feature = parse_feature(
        r#"
feature: "isolation"
scenarios:
  - name: "wrong expectation"
    steps:
      - "Given A Hedera account with more than 10 hbar"
      - "When I create a fixed supply token named Test Token (HTT) with 1000 tokens"
      - "Then The total supply of the token is 999"
      - "And An attempt to mint tokens fails"
  - name: "fresh token"
    steps:
      - "Given A Hedera account with more than 10 hbar"
      - "When I create a token named Test Token (HTT)"
      - "Then The total supply of the token is 0"
      - "And An attempt to mint 5 additional tokens succeeds"
"#,
    )
    .unwrap();

    let report = executor.run(&feature).await;
    let failed = report.scenario("wrong expectation").unwrap();
    assert!(!failed.success());
    assert!(failed.error().unwrap().contains("999"));
    assert_eq!(failed.steps[3].status, StepStatus::Skipped);
    assert!(report.scenario("fresh token").unwrap().success(), "{}", report.log.join("\n"));
}

#[tokio::test]
async fn test_mint_on_fixed_supply_is_rejected_with_status() {
    let (executor, _) = executor(34);
    let feature = parse_feature(
        r#"
feature: "fixed supply"
scenarios:
  - name: "mint must fail"
    steps:
      - "Given A Hedera account with more than 10 hbar"
      - "When I create a fixed supply token named Test Token (HTT) with 1000 tokens"
      - "Then An attempt to mint 1 additional tokens succeeds"
"#,
    )
    .unwrap();

    let report = executor.run(&feature).await;
    let error = report.scenarios[0].error().unwrap();
    assert!(error.contains("TOKEN_HAS_NO_SUPPLY_KEY"), "{}", error);
}

#[tokio::test]
async fn test_undefined_step_is_reported() {
    let (executor, _) = executor(35);
    let feature = parse_feature(
        r#"
feature: "vocabulary"
scenarios:
  - name: "undefined"
    steps:
      - "Given a ledger that does not exist"
"#,
    )
    .unwrap();

    let report = executor.run(&feature).await;
    assert!(report.scenarios[0]
        .error()
        .unwrap()
        .contains("Undefined step"));
}

#[tokio::test]
async fn test_oversized_hbar_amounts_fail_the_step() {
    let (executor, ledger) = executor(36);
    let feature = parse_feature(
        r#"
feature: "amounts"
scenarios:
  - name: "funding floor"
    steps:
      - "Given a first account with more than 200000000000 hbars"
  - name: "reconcile target"
    steps:
      - "Given A second Hedera account with 200000000000 hbar and 100 HTT tokens"
"#,
    )
    .unwrap();

    let report = executor.run(&feature).await;
    for scenario in &report.scenarios {
        let error = scenario.error().unwrap();
        assert!(error.contains("does not fit"), "{}", error);
        assert!(!error.contains("panicked"), "{}", error);
    }
    assert_eq!(ledger.transaction_count(), 0);
}
