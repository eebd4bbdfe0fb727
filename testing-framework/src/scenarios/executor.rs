//! Feature execution engine
//!
//! Scenarios run strictly one after another, each against a fresh
//! [`ScenarioWorld`]. Steps run under a time budget resolved in this order:
//! the step's own `timeout_secs`, the step definition's timeout, the
//! feature's `default_timeout_secs`, then [`HarnessSettings::step_timeout`].
//!
//! The first failing step fails its scenario and the remaining steps are
//! skipped. Later scenarios still run.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledger_testing_framework::scenarios::{parse_feature, ScenarioExecutor};
//!
//! let feature = parse_feature(&std::fs::read_to_string("features/topic_service.yaml")?)?;
//! let executor = ScenarioExecutor::new(StepRegistry::with_default_steps()?, ledger, pool);
//! let report = executor.run(&feature).await;
//!
//! for line in &report.log {
//!     println!("{}", line);
//! }
//! assert!(report.success());
//! ```

use std::{sync::Arc, time::Duration};

use super::parser::{Feature, Scenario};
use crate::{
    accounts::AccountPool,
    config::HarnessSettings,
    fixture::ScenarioWorld,
    orchestrator::{system_clock, Clock},
    rpc::LedgerRpc,
    steps::StepRegistry,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Failed(String),
    /// Not run because an earlier step failed
    Skipped,
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub text: String,
    pub status: StepStatus,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub steps: Vec<StepReport>,
    /// Set when the scenario could not even start
    pub setup_error: Option<String>,
}

impl ScenarioReport {
    pub fn success(&self) -> bool {
        self.setup_error.is_none()
            && self
                .steps
                .iter()
                .all(|step| step.status == StepStatus::Passed)
    }

    /// First failure message, if any
    pub fn error(&self) -> Option<&str> {
        self.setup_error.as_deref().or_else(|| {
            self.steps.iter().find_map(|step| match &step.status {
                StepStatus::Failed(reason) => Some(reason.as_str()),
                _ => None,
            })
        })
    }

    pub fn steps_executed(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status != StepStatus::Skipped)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct FeatureReport {
    pub feature: String,
    pub scenarios: Vec<ScenarioReport>,
    pub log: Vec<String>,
}

impl FeatureReport {
    pub fn success(&self) -> bool {
        self.scenarios.iter().all(ScenarioReport::success)
    }

    pub fn passed(&self) -> usize {
        self.scenarios.iter().filter(|s| s.success()).count()
    }

    pub fn failed(&self) -> usize {
        self.scenarios.len() - self.passed()
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}

/// Runs parsed features against a ledger and a shared account pool
pub struct ScenarioExecutor {
    registry: StepRegistry,
    ledger: Arc<dyn LedgerRpc>,
    pool: Arc<AccountPool>,
    clock: Arc<dyn Clock>,
    settings: HarnessSettings,
}

impl ScenarioExecutor {
    pub fn new(registry: StepRegistry, ledger: Arc<dyn LedgerRpc>, pool: Arc<AccountPool>) -> Self {
        Self {
            registry,
            ledger,
            pool,
            clock: system_clock(),
            settings: HarnessSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: HarnessSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Run every scenario of `feature`
    pub async fn run(&self, feature: &Feature) -> FeatureReport {
        let mut log = Vec::new();
        push_log(&mut log, format!("Feature: {}", feature.name));
        if let Some(description) = &feature.description {
            push_log(&mut log, format!("  {}", description));
        }

        let mut scenarios = Vec::with_capacity(feature.scenarios.len());
        for scenario in &feature.scenarios {
            let report = self.run_scenario(feature, scenario, &mut log).await;
            push_log(
                &mut log,
                format!(
                    "Scenario '{}' {}",
                    report.name,
                    if report.success() { "passed" } else { "FAILED" }
                ),
            );
            scenarios.push(report);
        }

        let report = FeatureReport {
            feature: feature.name.clone(),
            scenarios,
            log,
        };
        log::info!(
            "Feature '{}': {} passed, {} failed",
            report.feature,
            report.passed(),
            report.failed()
        );
        report
    }

    async fn run_scenario(
        &self,
        feature: &Feature,
        scenario: &Scenario,
        log: &mut Vec<String>,
    ) -> ScenarioReport {
        push_log(log, format!("\n--- Scenario: {} ---", scenario.name));
        let mut report = ScenarioReport {
            name: scenario.name.clone(),
            steps: Vec::with_capacity(scenario.steps.len()),
            setup_error: None,
        };

        let world = ScenarioWorld::builder(self.ledger.clone(), self.pool.clone())
            .with_clock(self.clock.clone())
            .with_settings(self.settings)
            .build();
        let mut world = match world {
            Ok(world) => Some(world),
            Err(err) => {
                push_log(log, format!("  setup failed: {}", err));
                report.setup_error = Some(err.to_string());
                None
            }
        };

        let default_budget = feature
            .default_timeout()
            .unwrap_or(self.settings.step_timeout);

        for step in &scenario.steps {
            let text = step.text().to_owned();
            let Some(current) = world.take() else {
                push_log(log, format!("  - {} (skipped)", text));
                report.steps.push(StepReport {
                    text,
                    status: StepStatus::Skipped,
                    elapsed: Duration::ZERO,
                });
                continue;
            };

            let started = self.clock.now();
            let matched = match self.registry.resolve(&text) {
                Ok(matched) => matched,
                Err(err) => {
                    push_log(log, format!("  x {}: {}", text, err));
                    report.steps.push(StepReport {
                        text,
                        status: StepStatus::Failed(err.to_string()),
                        elapsed: Duration::ZERO,
                    });
                    continue;
                }
            };

            let budget = step
                .timeout()
                .or(matched.definition.timeout())
                .unwrap_or(default_budget);
            let handler = matched.definition.handler();
            let args = matched.args;

            // The step owns the world while it runs; a step that overruns
            // its budget keeps running detached and the scenario ends here
            let task = tokio::spawn(async move {
                let mut world = current;
                let result = handler(&mut world, args).await;
                (world, result)
            });

            let status = match tokio::time::timeout(budget, task).await {
                Ok(Ok((returned, Ok(())))) => {
                    world = Some(returned);
                    StepStatus::Passed
                }
                Ok(Ok((_, Err(err)))) => StepStatus::Failed(format!("{:#}", err)),
                Ok(Err(join_error)) => StepStatus::Failed(format!("step panicked: {}", join_error)),
                Err(_) => StepStatus::Failed(format!("step exceeded its {:?} budget", budget)),
            };

            let elapsed = self.clock.elapsed(started);
            match &status {
                StepStatus::Passed => {
                    push_log(log, format!("  ✓ {} ({:?})", text, elapsed));
                }
                StepStatus::Failed(reason) => {
                    log::warn!("Step '{}' failed: {}", text, reason);
                    push_log(log, format!("  x {}: {}", text, reason));
                }
                StepStatus::Skipped => {}
            }
            report.steps.push(StepReport {
                text,
                status,
                elapsed,
            });
        }

        report
    }
}

fn push_log(log: &mut Vec<String>, line: String) {
    log::debug!("{}", line.trim_start());
    log.push(line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        orchestrator::PausedClock,
        rpc::TestLedgerBuilder,
        scenarios::parse_feature,
        steps::{StepArgs, StepFuture},
    };

    fn pass<'a>(_: &'a mut ScenarioWorld, _: StepArgs) -> StepFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    fn fail<'a>(_: &'a mut ScenarioWorld, _: StepArgs) -> StepFuture<'a> {
        Box::pin(async { anyhow::bail!("boom") })
    }

    fn stall<'a>(world: &'a mut ScenarioWorld, _: StepArgs) -> StepFuture<'a> {
        Box::pin(async move {
            world.client.clock().sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
    }

    fn executor() -> ScenarioExecutor {
        let mut registry = StepRegistry::new();
        registry
            .register("a passing step", pass)
            .unwrap()
            .register("a failing step", fail)
            .unwrap()
            .register("a stalling step", stall)
            .unwrap();

        let pool = Arc::new(AccountPool::generate(2, 3));
        let ledger = Arc::new(TestLedgerBuilder::new().with_pool(&pool).build());
        ScenarioExecutor::new(registry, ledger, pool).with_clock(Arc::new(PausedClock::attach()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_skips_rest_and_isolates_scenarios() {
        let feature = parse_feature(
            r#"
feature: "isolation"
scenarios:
  - name: "broken"
    steps:
      - "Given a passing step"
      - "When a failing step"
      - "Then a passing step"
  - name: "healthy"
    steps:
      - "Given a passing step"
"#,
        )
        .unwrap();

        let report = executor().run(&feature).await;
        assert!(!report.success());
        assert_eq!(report.passed(), 1);

        let broken = report.scenario("broken").unwrap();
        assert_eq!(broken.steps_executed(), 2);
        assert_eq!(broken.steps[2].status, StepStatus::Skipped);
        assert!(broken.error().unwrap().contains("boom"));
        assert!(report.scenario("healthy").unwrap().success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_undefined_step_fails_scenario() {
        let feature = parse_feature(
            r#"
feature: "undefined"
scenarios:
  - name: "typo"
    steps:
      - "Given a pasing step"
"#,
        )
        .unwrap();

        let report = executor().run(&feature).await;
        let error = report.scenarios[0].error().unwrap();
        assert!(error.contains("Undefined step"), "{}", error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_budget_from_step_text() {
        let feature = parse_feature(
            r#"
feature: "budgets"
default_timeout_secs: 600
scenarios:
  - name: "slow"
    steps:
      - text: "Given a stalling step"
        timeout_secs: 2
"#,
        )
        .unwrap();

        let report = executor().run(&feature).await;
        let error = report.scenarios[0].error().unwrap();
        assert!(error.contains("2s"), "{}", error);
    }
}
