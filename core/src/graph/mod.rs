// gantry/src/graph/mod.rs

//! Defines units of work, the `Workflow` graph they form, and YAML manifests.

pub mod definition;
pub mod manifest;
pub mod unit;

pub use definition::Workflow;
pub use manifest::Manifest;
pub use unit::{Step, UnitDef};
