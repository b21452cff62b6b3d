// gantry/src/run/mod.rs

//! Executing a workflow: unit outcomes, the executor seam, cancellation, and
//! the scheduler.

pub mod cancel;
pub mod engine;
pub mod executor;
pub mod ledger;
pub mod outcome;

pub use cancel::{CancelHandle, CancelSignal};
pub use engine::Run;
pub use executor::{HandlerExecutor, UnitContext, UnitExecutor, UnitHandler};
pub use ledger::RunLedger;
pub use outcome::{Outcome, RunReport, RunStatus, UnitFailure, UnitOutputs, UnitRecord, UnitState};
