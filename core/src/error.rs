// gantry/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Framework-level errors: graph construction, fact computation, manifest loading.
///
/// A unit failing at run time is never a `GantryError`; it is recorded as a
/// `failed` outcome in the run report instead.
#[derive(Debug, Error)]
pub enum GantryError {
  #[error("Unit not found: {unit}")]
  UnitNotFound { unit: String },

  #[error("Unit declared more than once: {unit}")]
  DuplicateUnit { unit: String },

  #[error("Unit '{unit}' needs unknown unit '{predecessor}'")]
  UnknownPredecessor { unit: String, predecessor: String },

  #[error("Gate of unit '{unit}' references '{referenced}', which is not in its needs")]
  UndeclaredGateReference { unit: String, referenced: String },

  #[error("Dependency cycle between units: {}", units.join(" -> "))]
  CycleDetected { units: Vec<String> },

  #[error("Fact declared more than once: {fact}")]
  DuplicateFact { fact: String },

  #[error("Computing fact '{fact}' failed. Source: {source}")]
  FactComputation {
    fact: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Invalid fact text at line {line}: {message}")]
  InvalidFactText { line: usize, message: String },

  #[error("Gate of unit '{unit}' references unknown fact '{fact}'")]
  UnknownFact { unit: String, fact: String },

  #[error("Invalid gate expression '{expression}' at position {position}: {message}")]
  GateParse {
    expression: String,
    position: usize,
    message: String,
  },

  #[error("Handler missing for unit with steps: {unit}")]
  HandlerMissing { unit: String },

  #[error("Invalid workflow manifest: {0}")]
  Manifest(#[from] serde_yaml::Error),

  #[error("Run report serialization failed: {0}")]
  Json(#[from] serde_json::Error),
}

pub type GantryResult<T, E = GantryError> = std::result::Result<T, E>;

/// Why a gate could not be decided.
///
/// Each of these marks the gated unit `failed`, so an undecidable gate can
/// never turn into a green run.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateError {
  #[error("fact '{fact}' is not defined for this run")]
  UnknownFact { fact: String },

  #[error("unit '{unit}' is not a declared predecessor")]
  UndeclaredPredecessor { unit: String },

  #[error("predecessor '{unit}' has not finished")]
  PredecessorNotTerminal { unit: String },

  #[error("predecessor '{unit}' produced no output '{key}'")]
  MissingOutput { unit: String, key: String },

  #[error("predecessor '{unit}' produced an empty output '{key}'")]
  EmptyOutput { unit: String, key: String },
}
