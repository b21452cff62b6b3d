// gantry/src/run/outcome.rs

//! Unit states, terminal outcomes, and the report a finished run produces.

use crate::error::{GantryResult, GateError};
use crate::facts::FactSet;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Named string values a unit hands to its declared dependents.
pub type UnitOutputs = BTreeMap<String, String>;

/// Terminal outcome of a unit. No transition follows any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  Succeeded,
  Failed,
  Skipped,
  Cancelled,
}

impl Outcome {
  /// The word gate expressions use for this outcome (`needs.x.result == 'success'`).
  pub fn result_keyword(self) -> &'static str {
    match self {
      Outcome::Succeeded => "success",
      Outcome::Failed => "failure",
      Outcome::Skipped => "skipped",
      Outcome::Cancelled => "cancelled",
    }
  }

  pub fn from_result_keyword(word: &str) -> Option<Self> {
    match word {
      "success" => Some(Outcome::Succeeded),
      "failure" => Some(Outcome::Failed),
      "skipped" => Some(Outcome::Skipped),
      "cancelled" => Some(Outcome::Cancelled),
      _ => None,
    }
  }
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Outcome::Succeeded => "succeeded",
      Outcome::Failed => "failed",
      Outcome::Skipped => "skipped",
      Outcome::Cancelled => "cancelled",
    })
  }
}

/// Lifecycle state of a unit within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
  Pending,
  Running,
  Done(Outcome),
}

impl UnitState {
  pub fn outcome(self) -> Option<Outcome> {
    match self {
      UnitState::Done(outcome) => Some(outcome),
      _ => None,
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, UnitState::Done(_))
  }
}

/// Why a unit ended `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitFailure {
  /// The executor returned an error.
  Execution { message: String },
  /// The gate could not be decided.
  Gate { error: GateError },
  /// The unit succeeded but did not produce a declared output.
  MissingOutput { key: String },
  TimedOut { after_ms: u64 },
  Panicked,
}

impl fmt::Display for UnitFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      UnitFailure::Execution { message } => write!(f, "execution failed: {}", message),
      UnitFailure::Gate { error } => write!(f, "gate could not be evaluated: {}", error),
      UnitFailure::MissingOutput { key } => write!(f, "declared output '{}' is missing or empty", key),
      UnitFailure::TimedOut { after_ms } => write!(f, "timed out after {}ms", after_ms),
      UnitFailure::Panicked => f.write_str("executor panicked"),
    }
  }
}

/// Final record of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitRecord {
  pub outcome: Outcome,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<UnitFailure>,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub outputs: UnitOutputs,
  /// Wall time spent running. Zero for units that never ran.
  #[serde(serialize_with = "serialize_millis")]
  pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_u64(duration.as_millis() as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Succeeded,
  Failed,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub status: RunStatus,
  /// Whether run cancellation was raised.
  pub cancelled: bool,
  pub facts: FactSet,
  /// Every unit in declaration order.
  pub units: IndexMap<String, UnitRecord>,
}

impl RunReport {
  /// Failed if any unit ended `failed` or `cancelled`. Skipped units never
  /// count against the run.
  pub(crate) fn new(cancelled: bool, facts: FactSet, units: IndexMap<String, UnitRecord>) -> Self {
    let status = if units
      .values()
      .any(|r| matches!(r.outcome, Outcome::Failed | Outcome::Cancelled))
    {
      RunStatus::Failed
    } else {
      RunStatus::Succeeded
    };
    Self {
      status,
      cancelled,
      facts,
      units,
    }
  }

  pub fn is_success(&self) -> bool {
    self.status == RunStatus::Succeeded
  }

  pub fn outcome(&self, unit: &str) -> Option<Outcome> {
    self.units.get(unit).map(|r| r.outcome)
  }

  pub fn record(&self, unit: &str) -> Option<&UnitRecord> {
    self.units.get(unit)
  }

  pub fn to_json(&self) -> GantryResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }
}
