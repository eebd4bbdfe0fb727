//! Feature files and their executor
//!
//! A feature file is YAML holding named scenarios, each a list of
//! natural-language steps resolved through [`crate::steps::StepRegistry`]:
//!
//! ```yaml
//! feature: "Topic service"
//! scenarios:
//!   - name: "Publish to a private topic"
//!     steps:
//!       - "Given a first account with more than 1 hbars"
//!       - "When A topic is created with the memo \"Hedera is great!\" with the first account as the submit key"
//!       - "And The message \"Hello Future\" is published to the topic"
//!       - "Then The message \"Hello Future\" is received by the topic and can be printed to the console"
//! ```

pub mod executor;
pub mod parser;

pub use executor::{FeatureReport, ScenarioExecutor, ScenarioReport, StepReport, StepStatus};
pub use parser::{load_feature, parse_feature, Feature, Scenario, ScenarioStep};
