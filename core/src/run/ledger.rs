// gantry/src/run/ledger.rs

//! The run ledger: per-unit states, outputs and final records, shared between
//! the scheduler and anyone observing the run.

use super::outcome::{Outcome, UnitOutputs, UnitRecord, UnitState};
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub(crate) struct LedgerData {
  pub(crate) states: IndexMap<String, UnitState>,
  /// Outputs of succeeded units only.
  pub(crate) outputs: HashMap<String, UnitOutputs>,
  pub(crate) records: HashMap<String, UnitRecord>,
}

/// Shared handle to a run's unit states.
///
/// Only the scheduler writes. Lock guards are blocking and never held across
/// an `.await`.
#[derive(Debug, Clone, Default)]
pub struct RunLedger(Arc<RwLock<LedgerData>>);

impl RunLedger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn state(&self, unit: &str) -> Option<UnitState> {
    self.0.read().states.get(unit).copied()
  }

  /// Snapshot of every unit's state, in scheduling order.
  pub fn states(&self) -> IndexMap<String, UnitState> {
    self.0.read().states.clone()
  }

  pub fn outputs(&self, unit: &str) -> Option<UnitOutputs> {
    self.0.read().outputs.get(unit).cloned()
  }

  pub(crate) fn read(&self) -> RwLockReadGuard<'_, LedgerData> {
    self.0.read()
  }

  pub(crate) fn reset<'a>(&self, units: impl IntoIterator<Item = &'a str>) {
    let mut data = self.0.write();
    *data = LedgerData::default();
    for unit in units {
      data.states.insert(unit.to_string(), UnitState::Pending);
    }
  }

  pub(crate) fn mark_running(&self, unit: &str) {
    if let Some(state) = self.0.write().states.get_mut(unit) {
      *state = UnitState::Running;
    }
  }

  /// Moves the unit to its terminal state. Returns `false`, changing nothing,
  /// if the unit was already terminal.
  pub(crate) fn finish(&self, unit: &str, record: UnitRecord) -> bool {
    let mut data = self.0.write();
    match data.states.get_mut(unit) {
      Some(state) if !state.is_terminal() => *state = UnitState::Done(record.outcome),
      _ => return false,
    }
    if record.outcome == Outcome::Succeeded {
      data.outputs.insert(unit.to_string(), record.outputs.clone());
    }
    data.records.insert(unit.to_string(), record);
    true
  }

  pub(crate) fn take_record(&self, unit: &str) -> Option<UnitRecord> {
    self.0.write().records.remove(unit)
  }
}
