// gantry/src/gate/mod.rs

//! Gates decide whether a unit runs once all of its predecessors are terminal.
//!
//! A gate combines fact lookups, status functions (`success()`, `failure()`,
//! `always()`, `cancelled()`), per-predecessor result tests and predecessor
//! output comparisons. A skipped predecessor is neither a success nor a
//! failure, so "did not fail" gates let it through while "succeeded" gates do
//! not.

pub mod expr;
pub mod parse;

pub use expr::{Gate, GateContext, StatusCheck};
