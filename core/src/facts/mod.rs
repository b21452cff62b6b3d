// gantry/src/facts/mod.rs

//! Run facts: named booleans computed once from trigger metadata and static
//! configuration, then shared read-only with every gate and unit of the run.

pub mod compute;
pub mod set;
pub mod trigger;

pub use compute::{FactComputer, FactRule};
pub use set::FactSet;
pub use trigger::{EventKind, Trigger};

/// Name of the "push to the main branch" fact.
pub const MASTER_PUSH: &str = "masterPush";
/// Name of the "pull request targeting the main branch" fact.
pub const PR_TARGETING_MASTER: &str = "isPrTargetingMaster";
/// Name of the "documentation should be published" fact.
pub const PUBLISH_DOCS: &str = "publishDocs";
