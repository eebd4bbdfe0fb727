//! Step definition table
//!
//! Maps natural-language step text to async handlers over a
//! [`ScenarioWorld`]. The keyword (`Given`, `When`, `Then`, `And`, `But`,
//! `*`) is stripped before matching, so a pattern matches regardless of the
//! keyword it is used with. Patterns are anchored at both ends.

pub mod token_steps;
pub mod topic_steps;

use anyhow::{ensure, Context};
use futures::future::BoxFuture;
use ledger_common::Hbar;
use regex::Regex;
use std::{str::FromStr, time::Duration};
use thiserror::Error;

use crate::{fixture::ScenarioWorld, transaction::TransferTransactionBuilder};

pub type StepFuture<'a> = BoxFuture<'a, anyhow::Result<()>>;

/// Handler signature; non-capturing closures coerce to it
pub type StepFn = for<'a> fn(&'a mut ScenarioWorld, StepArgs) -> StepFuture<'a>;

pub const KEYWORDS: [&str; 6] = ["Given", "When", "Then", "And", "But", "*"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("Step '{0}' does not start with a keyword")]
    MissingKeyword(String),

    #[error("Undefined step: '{0}'")]
    Undefined(String),

    #[error("Ambiguous step '{text}' matches {patterns:?}")]
    Ambiguous { text: String, patterns: Vec<String> },

    #[error("Capture {index}: {reason}")]
    Capture { index: usize, reason: String },

    #[error("Invalid step pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },
}

/// Split `Given some text` into its keyword and body
pub fn strip_keyword(text: &str) -> Option<(&'static str, &str)> {
    let text = text.trim();
    KEYWORDS.iter().find_map(|keyword| {
        let rest = text.strip_prefix(keyword)?;
        if *keyword == "*" || rest.starts_with(char::is_whitespace) {
            Some((*keyword, rest.trim_start()))
        } else {
            None
        }
    })
}

/// Captured groups of a matched step, typed on access
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepArgs {
    captures: Vec<String>,
}

impl StepArgs {
    pub fn new(captures: Vec<String>) -> Self {
        Self { captures }
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    pub fn str(&self, index: usize) -> Result<&str, StepError> {
        self.captures
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| StepError::Capture {
                index,
                reason: format!("only {} captures", self.captures.len()),
            })
    }

    pub fn int<T>(&self, index: usize) -> Result<T, StepError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.str(index)?;
        raw.parse().map_err(|e| StepError::Capture {
            index,
            reason: format!("'{}' is not a number: {}", raw, e),
        })
    }

    /// `first` .. `fourth` as pool indices 1 ..= 4 (index 0 is the treasury)
    pub fn ordinal(&self, index: usize) -> Result<usize, StepError> {
        let raw = self.str(index)?;
        ordinal_index(raw).ok_or_else(|| StepError::Capture {
            index,
            reason: format!("'{}' is not an ordinal", raw),
        })
    }
}

pub fn ordinal_index(word: &str) -> Option<usize> {
    match word.to_ascii_lowercase().as_str() {
        "first" => Some(1),
        "second" => Some(2),
        "third" => Some(3),
        "fourth" => Some(4),
        _ => None,
    }
}

pub struct StepDefinition {
    pattern: Regex,
    handler: StepFn,
    timeout: Option<Duration>,
}

impl StepDefinition {
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn handler(&self) -> StepFn {
        self.handler
    }
}

/// A step text resolved to its handler
pub struct MatchedStep<'r> {
    pub keyword: &'static str,
    pub definition: &'r StepDefinition,
    pub args: StepArgs,
}

impl MatchedStep<'_> {
    pub fn run<'a>(&self, world: &'a mut ScenarioWorld) -> StepFuture<'a> {
        (self.definition.handler)(world, self.args.clone())
    }
}

#[derive(Default)]
pub struct StepRegistry {
    steps: Vec<StepDefinition>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the topic and token step libraries
    pub fn with_default_steps() -> Result<Self, StepError> {
        let mut registry = Self::new();
        topic_steps::register(&mut registry)?;
        token_steps::register(&mut registry)?;
        log::debug!("registered {} step definitions", registry.len());
        Ok(registry)
    }

    pub fn register(&mut self, pattern: &str, handler: StepFn) -> Result<&mut Self, StepError> {
        self.register_with_timeout(pattern, handler, None)
    }

    /// Register a step with its own budget instead of the scenario default
    pub fn register_with_timeout(
        &mut self,
        pattern: &str,
        handler: StepFn,
        timeout: Option<Duration>,
    ) -> Result<&mut Self, StepError> {
        let anchored = format!(
            "^{}$",
            pattern.trim_start_matches('^').trim_end_matches('$')
        );
        let pattern = Regex::new(&anchored).map_err(|e| StepError::Pattern {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;

        self.steps.push(StepDefinition {
            pattern,
            handler,
            timeout,
        });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Find the single definition matching `text`
    pub fn resolve(&self, text: &str) -> Result<MatchedStep<'_>, StepError> {
        let (keyword, body) =
            strip_keyword(text).ok_or_else(|| StepError::MissingKeyword(text.trim().to_owned()))?;

        let mut matches = self
            .steps
            .iter()
            .filter_map(|definition| {
                definition
                    .pattern
                    .captures(body)
                    .map(|captures| (definition, captures))
            })
            .collect::<Vec<_>>();

        match matches.len() {
            0 => Err(StepError::Undefined(body.to_owned())),
            1 => {
                let (definition, captures) = matches.remove(0);
                let args = captures
                    .iter()
                    .skip(1)
                    .map(|group| group.map(|m| m.as_str().to_owned()).unwrap_or_default())
                    .collect();
                Ok(MatchedStep {
                    keyword,
                    definition,
                    args: StepArgs::new(args),
                })
            }
            _ => Err(StepError::Ambiguous {
                text: body.to_owned(),
                patterns: matches
                    .iter()
                    .map(|(definition, _)| definition.pattern().to_owned())
                    .collect(),
            }),
        }
    }
}

/// Whole hbars from a step capture
pub(crate) fn hbar_amount(hbars: u64) -> anyhow::Result<Hbar> {
    Hbar::checked_from_hbars(hbars)
        .with_context(|| format!("{} hbars does not fit in a tinybar amount", hbars))
}

/// Make pool account `index` hold strictly more than `hbars`
///
/// Tops up from the reference account when needed. The reference account
/// itself can only be checked.
pub(crate) async fn fund_above(
    world: &mut ScenarioWorld,
    index: usize,
    hbars: u64,
) -> anyhow::Result<()> {
    let account = world.account(index)?;
    let floor = hbar_amount(hbars)?;
    let balance = world.client.rpc().account_balance(&account.id).await?.hbars;
    if balance > floor {
        log::debug!("{} holds {}, above {}", account.id, balance, floor);
        return Ok(());
    }

    let reference = world.reconciler.reference().clone();
    ensure!(
        reference.id != account.id,
        "reference account {} holds {}, not more than {}",
        account.id,
        balance,
        floor
    );

    let top_up = floor
        .saturating_sub(balance)
        .checked_add(world.settings.fee_reserve)
        .with_context(|| format!("funding above {} overflows", floor))?;
    let as_reference = world.client.with_operator(&reference);
    TransferTransactionBuilder::hbar_transfer(reference.id, account.id, top_up)?
        .execute(&as_reference)
        .await?
        .get_receipt(&as_reference)
        .await
        .with_context(|| format!("funding {} with {}", account.id, top_up))?;

    let balance = world.client.rpc().account_balance(&account.id).await?.hbars;
    ensure!(balance > floor, "{} holds {} after funding", account.id, balance);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop<'a>(_: &'a mut ScenarioWorld, _: StepArgs) -> StepFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    #[test]
    fn test_strip_keyword() {
        assert_eq!(strip_keyword("Given a thing"), Some(("Given", "a thing")));
        assert_eq!(strip_keyword("  And another"), Some(("And", "another")));
        assert_eq!(strip_keyword("* starred"), Some(("*", "starred")));
        assert_eq!(strip_keyword("Givena thing"), None);
        assert_eq!(strip_keyword("a thing"), None);
    }

    #[test]
    fn test_resolve_with_typed_captures() {
        let mut registry = StepRegistry::new();
        registry
            .register(r"The (first|second) account holds (\d+) HTT tokens", noop)
            .unwrap();

        let matched = registry
            .resolve("Given The second account holds 100 HTT tokens")
            .unwrap();
        assert_eq!(matched.keyword, "Given");
        assert_eq!(matched.args.ordinal(0).unwrap(), 2);
        assert_eq!(matched.args.int::<u64>(1).unwrap(), 100);
        assert!(matched.args.int::<u64>(0).is_err());
        assert!(matched.args.str(5).is_err());
    }

    #[test]
    fn test_undefined_and_ambiguous() {
        let mut registry = StepRegistry::new();
        registry.register(r"a (\w+) step", noop).unwrap();
        registry.register(r"a good (\w+)", noop).unwrap();

        assert!(matches!(
            registry.resolve("When nothing matches"),
            Err(StepError::Undefined(_))
        ));
        assert!(matches!(
            registry.resolve("Then a good step"),
            Err(StepError::Ambiguous { .. })
        ));
        assert!(matches!(
            registry.resolve("a missing keyword"),
            Err(StepError::MissingKeyword(_))
        ));
    }

    #[test]
    fn test_patterns_are_anchored() {
        let mut registry = StepRegistry::new();
        registry.register(r"a step", noop).unwrap();
        assert!(registry.resolve("Given a step with a tail").is_err());
    }

    #[test]
    fn test_default_library_has_no_collisions() {
        let registry = StepRegistry::with_default_steps().unwrap();
        assert!(registry.len() > 20);
        for text in [
            "Given a first account with more than 10 hbars",
            "Given A first hedera account with more than 10 hbar",
            "Given A Hedera account with more than 10 hbar",
            "When A first hedera account with more than 100 hbar and 100 HTT tokens",
            "Given The first account holds 100 HTT tokens",
        ] {
            assert!(registry.resolve(text).is_ok(), "{}", text);
        }
    }
}
