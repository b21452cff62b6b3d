// gantry/src/graph/definition.rs

//! The `Workflow` struct: a named set of units forming a directed acyclic graph.

use super::unit::UnitDef;
use crate::error::{GantryError, GantryResult};
use crate::gate::Gate;
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{event, Level};

#[derive(Debug, Clone, Default)]
pub struct Workflow {
  pub name: String,
  /// Units in declaration order.
  pub(crate) units: IndexMap<String, UnitDef>,
}

impl Workflow {
  pub fn new<S: Into<String>>(name: S) -> Self {
    Self {
      name: name.into(),
      units: IndexMap::new(),
    }
  }

  /// Adds a unit. Predecessors may be declared later; [`Workflow::validate`]
  /// checks the finished graph.
  pub fn add_unit(&mut self, unit: UnitDef) -> GantryResult<&mut Self> {
    if self.units.contains_key(&unit.name) {
      return Err(GantryError::DuplicateUnit { unit: unit.name });
    }
    event!(Level::TRACE, unit = %unit.name, needs = ?unit.needs, gate = %unit.gate, "Unit added.");
    self.units.insert(unit.name.clone(), unit);
    Ok(self)
  }

  /// Builder form of [`Workflow::add_unit`].
  pub fn with_unit(mut self, unit: UnitDef) -> GantryResult<Self> {
    self.add_unit(unit)?;
    Ok(self)
  }

  /// Removes a unit and drops it from the `needs` of every other unit.
  pub fn remove_unit(&mut self, name: &str) -> Option<UnitDef> {
    let removed = self.units.shift_remove(name)?;
    for unit in self.units.values_mut() {
      unit.needs.retain(|n| n != name);
    }
    Some(removed)
  }

  pub fn set_gate(&mut self, name: &str, gate: Gate) -> GantryResult<()> {
    let unit = self.units.get_mut(name).ok_or_else(|| GantryError::UnitNotFound {
      unit: name.to_string(),
    })?;
    unit.gate = gate;
    Ok(())
  }

  pub fn unit(&self, name: &str) -> Option<&UnitDef> {
    self.units.get(name)
  }

  pub fn units(&self) -> impl Iterator<Item = &UnitDef> + '_ {
    self.units.values()
  }

  pub fn len(&self) -> usize {
    self.units.len()
  }

  pub fn is_empty(&self) -> bool {
    self.units.is_empty()
  }

  /// Units that list `name` in their `needs`.
  pub fn dependents(&self, name: &str) -> Vec<&str> {
    self
      .units
      .values()
      .filter(|u| u.needs.iter().any(|n| n == name))
      .map(|u| u.name.as_str())
      .collect()
  }

  /// Checks predecessors exist, gates only reference declared predecessors,
  /// and the graph has no cycle. Returns unit names in a topological order
  /// that keeps declaration order among independent units.
  pub fn validate(&self) -> GantryResult<Vec<&str>> {
    for unit in self.units.values() {
      for predecessor in &unit.needs {
        if !self.units.contains_key(predecessor) {
          return Err(GantryError::UnknownPredecessor {
            unit: unit.name.clone(),
            predecessor: predecessor.clone(),
          });
        }
      }
      for referenced in unit.gate.referenced_units() {
        if !unit.needs.iter().any(|n| n == referenced) {
          return Err(GantryError::UndeclaredGateReference {
            unit: unit.name.clone(),
            referenced: referenced.to_string(),
          });
        }
      }
    }
    self.topological_order()
  }

  fn topological_order(&self) -> GantryResult<Vec<&str>> {
    let mut remaining: IndexMap<&str, usize> = self
      .units
      .values()
      .map(|u| {
        let distinct: HashSet<&str> = u.needs.iter().map(String::as_str).collect();
        (u.name.as_str(), distinct.len())
      })
      .collect();
    let mut order = Vec::with_capacity(self.units.len());

    loop {
      let ready: Vec<&str> = remaining
        .iter()
        .filter(|(_, pending)| **pending == 0)
        .map(|(name, _)| *name)
        .collect();
      if ready.is_empty() {
        break;
      }
      for name in ready {
        remaining.shift_remove(name);
        order.push(name);
        for dependent in self.dependents(name) {
          if let Some(pending) = remaining.get_mut(dependent) {
            *pending -= 1;
          }
        }
      }
    }

    if remaining.is_empty() {
      Ok(order)
    } else {
      let units = self.find_cycle(&remaining);
      event!(Level::ERROR, cycle = ?units, "Workflow graph has a cycle.");
      Err(GantryError::CycleDetected { units })
    }
  }

  /// Every unit left over by Kahn's algorithm has a predecessor that is also
  /// left over, so walking predecessors from any of them must revisit a unit.
  fn find_cycle(&self, remaining: &IndexMap<&str, usize>) -> Vec<String> {
    let mut path: Vec<&str> = Vec::new();
    let mut current = match remaining.keys().next() {
      Some(name) => *name,
      None => return Vec::new(),
    };
    loop {
      if let Some(start) = path.iter().position(|n| *n == current) {
        // Read as "a needs c needs b needs a".
        let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
        cycle.push(current.to_string());
        return cycle;
      }
      path.push(current);
      let next = self.units[current]
        .needs
        .iter()
        .find(|n| remaining.contains_key(n.as_str()));
      match next {
        Some(next) => current = next.as_str(),
        None => return path.iter().map(|n| n.to_string()).collect(),
      }
    }
  }
}
