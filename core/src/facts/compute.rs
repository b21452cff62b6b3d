// gantry/src/facts/compute.rs

//! Fact rules and the computer that evaluates them once at run start.

use super::set::FactSet;
use super::trigger::{EventKind, Trigger};
use super::{MASTER_PUSH, PR_TARGETING_MASTER, PUBLISH_DOCS};
use crate::config::RunConfig;
use crate::error::{GantryError, GantryResult};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Closure deciding one fact from trigger metadata and static configuration.
pub type FactFn = Arc<dyn Fn(&Trigger, &RunConfig) -> anyhow::Result<bool> + Send + Sync + 'static>;

/// A named fact together with the rule that decides it.
#[derive(Clone)]
pub struct FactRule {
  pub name: String,
  rule: FactFn,
}

impl FactRule {
  pub fn new<S, F>(name: S, rule: F) -> Self
  where
    S: Into<String>,
    F: Fn(&Trigger, &RunConfig) -> anyhow::Result<bool> + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      rule: Arc::new(rule),
    }
  }
}

impl std::fmt::Debug for FactRule {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FactRule").field("name", &self.name).finish()
  }
}

/// Ordered list of fact rules. Facts are produced in registration order, and
/// a rule can only see the trigger and config, never other facts.
#[derive(Debug, Clone, Default)]
pub struct FactComputer {
  rules: Vec<FactRule>,
}

impl FactComputer {
  pub fn new() -> Self {
    Self::default()
  }

  /// The three facts the CI workflow gates on: `masterPush`,
  /// `isPrTargetingMaster` and `publishDocs`.
  pub fn ci_defaults() -> Self {
    let mut computer = Self::new();
    // Names are distinct, so registration cannot fail.
    computer.rules.push(FactRule::new(MASTER_PUSH, |trigger, config| {
      Ok(is_main_push(trigger, config))
    }));
    computer.rules.push(FactRule::new(PR_TARGETING_MASTER, |trigger, config| {
      Ok(trigger.event == EventKind::PullRequest && trigger.base_branch() == Some(config.main_branch.as_str()))
    }));
    computer.rules.push(FactRule::new(PUBLISH_DOCS, |trigger, config| {
      Ok(config.publish_docs && is_main_push(trigger, config))
    }));
    computer
  }

  /// Registers a rule. Fact names must be unique.
  pub fn add_rule(&mut self, rule: FactRule) -> GantryResult<&mut Self> {
    if self.rules.iter().any(|r| r.name == rule.name) {
      return Err(GantryError::DuplicateFact { fact: rule.name });
    }
    self.rules.push(rule);
    Ok(self)
  }

  /// Convenience wrapper around [`FactComputer::add_rule`].
  pub fn fact<S, F>(&mut self, name: S, rule: F) -> GantryResult<&mut Self>
  where
    S: Into<String>,
    F: Fn(&Trigger, &RunConfig) -> anyhow::Result<bool> + Send + Sync + 'static,
  {
    self.add_rule(FactRule::new(name, rule))
  }

  pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
    self.rules.iter().map(|r| r.name.as_str())
  }

  /// Evaluates every rule. The first failing rule aborts the computation and no
  /// partial fact set is returned.
  #[instrument(
    name = "FactComputer::compute",
    skip_all,
    fields(event = %trigger.event, ref_name = %trigger.ref_name, num_rules = self.rules.len()),
    err(Display)
  )]
  pub fn compute(&self, trigger: &Trigger, config: &RunConfig) -> GantryResult<FactSet> {
    let mut pairs = Vec::with_capacity(self.rules.len());
    for rule in &self.rules {
      let value = (rule.rule)(trigger, config).map_err(|source| {
        event!(Level::ERROR, fact = %rule.name, error = %source, "Fact rule failed.");
        GantryError::FactComputation {
          fact: rule.name.clone(),
          source,
        }
      })?;
      event!(Level::DEBUG, fact = %rule.name, value, "Fact computed.");
      pairs.push((rule.name.clone(), value));
    }
    FactSet::from_pairs(pairs)
  }
}

fn is_main_push(trigger: &Trigger, config: &RunConfig) -> bool {
  trigger.event == EventKind::Push && trigger.branch() == Some(config.main_branch.as_str())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn push_to_master() {
    let facts = FactComputer::ci_defaults()
      .compute(&Trigger::push("refs/heads/master"), &RunConfig::default())
      .unwrap();
    assert_eq!(facts.get(MASTER_PUSH), Some(true));
    assert_eq!(facts.get(PR_TARGETING_MASTER), Some(false));
    assert_eq!(facts.get(PUBLISH_DOCS), Some(false));
  }

  #[test]
  fn pull_request_into_master() {
    let facts = FactComputer::ci_defaults()
      .compute(
        &Trigger::pull_request("refs/pull/12/merge", "master"),
        &RunConfig::default().with_publish_docs(true),
      )
      .unwrap();
    assert_eq!(facts.get(MASTER_PUSH), Some(false));
    assert_eq!(facts.get(PR_TARGETING_MASTER), Some(true));
    assert_eq!(facts.get(PUBLISH_DOCS), Some(false));
  }

  #[test]
  fn publish_docs_needs_flag_and_main_push() {
    let computer = FactComputer::ci_defaults();
    let config = RunConfig::default().with_main_branch("main").with_publish_docs(true);
    let on_main = computer.compute(&Trigger::push("refs/heads/main"), &config).unwrap();
    assert_eq!(on_main.get(PUBLISH_DOCS), Some(true));
    let on_master = computer.compute(&Trigger::push("refs/heads/master"), &config).unwrap();
    assert_eq!(on_master.get(MASTER_PUSH), Some(false));
    assert_eq!(on_master.get(PUBLISH_DOCS), Some(false));
  }

  #[test]
  fn failing_rule_aborts_without_partial_facts() {
    let mut computer = FactComputer::ci_defaults();
    computer
      .fact("releaseTag", |trigger, _| {
        anyhow::bail!("cannot classify ref '{}'", trigger.ref_name)
      })
      .unwrap();
    match computer.compute(&Trigger::push("refs/heads/master"), &RunConfig::default()) {
      Err(GantryError::FactComputation { fact, source }) => {
        assert_eq!(fact, "releaseTag");
        assert!(source.to_string().contains("refs/heads/master"));
      }
      other => panic!("expected FactComputation, got {:?}", other),
    }
  }

  #[test]
  fn duplicate_rule_is_rejected() {
    let mut computer = FactComputer::ci_defaults();
    let err = computer.fact(MASTER_PUSH, |_, _| Ok(true)).unwrap_err();
    assert!(matches!(err, GantryError::DuplicateFact { .. }));
  }
}
