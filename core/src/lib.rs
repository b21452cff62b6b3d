// gantry/src/lib.rs

//! Gantry: compute run facts once, then gate a graph of independently
//! scheduled units on those facts and on their predecessors' outcomes.
//!
//! Gantry provides:
//!  - Facts: named booleans computed exactly once per run from trigger
//!    metadata, shared read-only and serializable as `name=value` text.
//!  - Gates: boolean expressions over facts, status functions (`success()`,
//!    `failure()`, `always()`, `cancelled()`), predecessor results and outputs,
//!    with skipped predecessors passing through "did not fail" checks.
//!  - A workflow graph with validation and YAML manifests.
//!  - A concurrent scheduler with run cancellation, per-unit timeouts and a
//!    pluggable `UnitExecutor` for the actual work.

pub mod config;
pub mod error;
pub mod facts;
pub mod gate;
pub mod graph;
pub mod preset;
pub mod run;

// --- Re-exports for the Public API ---

pub use crate::config::RunConfig;
pub use crate::error::{GantryError, GantryResult, GateError};

pub use crate::facts::{EventKind, FactComputer, FactRule, FactSet, Trigger};
pub use crate::gate::{Gate, GateContext, StatusCheck};
pub use crate::graph::{Manifest, Step, UnitDef, Workflow};

pub use crate::run::{
  CancelHandle, CancelSignal, HandlerExecutor, Outcome, Run, RunLedger, RunReport, RunStatus, UnitContext,
  UnitExecutor, UnitFailure, UnitOutputs, UnitRecord, UnitState,
};

/*
    Typical use:
    1. Build a `Workflow` (in code, from `preset::ci_workflow()`, or from a YAML
       manifest via `Manifest::from_yaml_str`).
    2. Register per-unit handlers on a `HandlerExecutor`, or implement
       `UnitExecutor` to hand steps to a real runner.
    3. `Run::new(workflow, executor).with_config(config)`; keep
       `run.cancel_handle()` if the run may need to be cancelled.
    4. `run.execute(&trigger).await?` returns a `RunReport` with every unit's
       outcome. `Err` means the run never started.
*/
