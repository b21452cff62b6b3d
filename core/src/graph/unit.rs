// gantry/src/graph/unit.rs

//! Declaration of a single unit of work.

use crate::gate::Gate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One step of a unit. Steps are opaque to the scheduler; only the unit
/// executor interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
  pub name: String,
  /// Shell command to run.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub run: Option<String>,
  /// Reference to a prebuilt action.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub uses: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub with: BTreeMap<String, String>,
}

impl Step {
  pub fn run<N: Into<String>, C: Into<String>>(name: N, command: C) -> Self {
    Self {
      name: name.into(),
      run: Some(command.into()),
      ..Default::default()
    }
  }

  pub fn uses<N: Into<String>, A: Into<String>>(name: N, action: A) -> Self {
    Self {
      name: name.into(),
      uses: Some(action.into()),
      ..Default::default()
    }
  }

  pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
    self.with.insert(key.into(), value.into());
    self
  }
}

/// Declaration of a unit: its predecessors, gate, steps and declared outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDef {
  pub name: String,
  /// Predecessors, in declaration order.
  pub needs: Vec<String>,
  pub gate: Gate,
  pub steps: Vec<Step>,
  /// Output names the unit promises to produce, non-empty, when it succeeds.
  pub outputs: Vec<String>,
  pub timeout: Option<Duration>,
}

impl UnitDef {
  pub fn new<S: Into<String>>(name: S) -> Self {
    Self {
      name: name.into(),
      needs: Vec::new(),
      gate: Gate::default(),
      steps: Vec::new(),
      outputs: Vec::new(),
      timeout: None,
    }
  }

  pub fn needs<I, S>(mut self, predecessors: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for predecessor in predecessors {
      let predecessor = predecessor.into();
      if !self.needs.contains(&predecessor) {
        self.needs.push(predecessor);
      }
    }
    self
  }

  pub fn gate(mut self, gate: Gate) -> Self {
    self.gate = gate;
    self
  }

  pub fn step(mut self, step: Step) -> Self {
    self.steps.push(step);
    self
  }

  pub fn output<S: Into<String>>(mut self, key: S) -> Self {
    self.outputs.push(key.into());
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }
}
