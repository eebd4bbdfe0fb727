//! YAML feature file parser
//!
//! ```yaml
//! feature: "Topic service"
//! description: "Publish and receive consensus messages"
//! default_timeout_secs: 60
//! scenarios:
//!   - name: "Publish to a private topic"
//!     steps:
//!       - "Given a first account with more than 1 hbars"
//!       - text: "Then The message \"Hello Future\" is received by the topic and can be printed to the console"
//!         timeout_secs: 10
//! ```

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, time::Duration};

use crate::steps::strip_keyword;

/// A feature file: named scenarios sharing a default step budget
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Feature {
    #[serde(rename = "feature")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Budget of every step without its own `timeout_secs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_secs: Option<u64>,

    pub scenarios: Vec<Scenario>,
}

impl Feature {
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<ScenarioStep>,
}

/// A step is plain text, or text with its own budget
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ScenarioStep {
    Text(String),
    Timed {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
}

impl ScenarioStep {
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Timed { text, .. } => text,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Text(_) => None,
            Self::Timed { timeout_secs, .. } => timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Parse and validate a YAML feature
pub fn parse_feature(yaml: &str) -> Result<Feature> {
    let feature: Feature = serde_yaml::from_str(yaml)
        .map_err(|e| anyhow::anyhow!("Failed to parse YAML feature: {}", e))?;

    validate_feature(&feature)?;
    Ok(feature)
}

pub fn load_feature<P: AsRef<Path>>(path: P) -> Result<Feature> {
    let path = path.as_ref();
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feature file {}", path.display()))?;
    parse_feature(&yaml).with_context(|| format!("In feature file {}", path.display()))
}

fn validate_feature(feature: &Feature) -> Result<()> {
    ensure!(!feature.name.trim().is_empty(), "Feature name cannot be empty");
    ensure!(
        !feature.scenarios.is_empty(),
        "Feature '{}' must have at least one scenario",
        feature.name
    );
    if let Some(secs) = feature.default_timeout_secs {
        ensure!(secs > 0, "default_timeout_secs must be positive");
    }

    let mut names = HashSet::new();
    for scenario in &feature.scenarios {
        ensure!(!scenario.name.trim().is_empty(), "Scenario name cannot be empty");
        ensure!(
            names.insert(scenario.name.as_str()),
            "Duplicate scenario name: {}",
            scenario.name
        );
        ensure!(
            !scenario.steps.is_empty(),
            "Scenario '{}' must have at least one step",
            scenario.name
        );

        for step in &scenario.steps {
            ensure!(
                strip_keyword(step.text()).is_some(),
                "Step '{}' in scenario '{}' must start with Given, When, Then, And, But or *",
                step.text(),
                scenario.name
            );
            ensure!(
                step.timeout() != Some(Duration::ZERO),
                "Step '{}' has a zero timeout",
                step.text()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_steps() {
        let yaml = r#"
feature: "Token service"
default_timeout_secs: 30
scenarios:
  - name: "Create a mintable token"
    steps:
      - "Given A Hedera account with more than 10 hbar"
      - text: "When I create a token named Test Token (HTT)"
        timeout_secs: 5
"#;
        let feature = parse_feature(yaml).unwrap();
        assert_eq!(feature.name, "Token service");
        assert_eq!(feature.default_timeout(), Some(Duration::from_secs(30)));

        let steps = &feature.scenarios[0].steps;
        assert_eq!(steps[0].timeout(), None);
        assert_eq!(steps[1].text(), "When I create a token named Test Token (HTT)");
        assert_eq!(steps[1].timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_reject_duplicate_scenarios() {
        let yaml = r#"
feature: "Dupes"
scenarios:
  - name: "same"
    steps: ["Given a step"]
  - name: "same"
    steps: ["Given a step"]
"#;
        let err = parse_feature(yaml).unwrap_err();
        assert!(err.to_string().contains("Duplicate scenario name"));
    }

    #[test]
    fn test_reject_step_without_keyword() {
        let yaml = r#"
feature: "Keywords"
scenarios:
  - name: "no keyword"
    steps: ["a step"]
"#;
        assert!(parse_feature(yaml).is_err());
    }

    #[test]
    fn test_reject_empty_scenario() {
        let yaml = r#"
feature: "Empty"
scenarios:
  - name: "nothing"
    steps: []
"#;
        assert!(parse_feature(yaml).is_err());
    }
}
