// gantry/src/facts/set.rs

//! The immutable fact mapping of a run and its plain-text form.
//!
//! Inside the process facts are real booleans. At a process or host boundary
//! they travel as `name=value` lines with `value` either `true` or `false`,
//! in the order the facts were computed.

use crate::error::{GantryError, GantryResult};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Write as _;

/// Ordered, read-only mapping of fact name to value.
///
/// There is no way to mutate a `FactSet` once it is built; a run shares it as
/// `Arc<FactSet>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FactSet {
  values: IndexMap<String, bool>,
}

impl FactSet {
  /// Builds a fact set from `(name, value)` pairs, rejecting duplicate names.
  pub fn from_pairs<I, S>(pairs: I) -> GantryResult<Self>
  where
    I: IntoIterator<Item = (S, bool)>,
    S: Into<String>,
  {
    let mut values = IndexMap::new();
    for (name, value) in pairs {
      let name = name.into();
      if values.contains_key(&name) {
        return Err(GantryError::DuplicateFact { fact: name });
      }
      values.insert(name, value);
    }
    Ok(Self { values })
  }

  pub fn get(&self, name: &str) -> Option<bool> {
    self.values.get(name).copied()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.values.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
    self.values.iter().map(|(name, value)| (name.as_str(), *value))
  }

  /// Renders the facts as `name=true|false` lines, one per fact.
  pub fn to_env_text(&self) -> String {
    let mut out = String::new();
    for (name, value) in self.iter() {
      // Writing into a String cannot fail.
      let _ = writeln!(out, "{}={}", name, value);
    }
    out
  }

  /// Parses text produced by [`FactSet::to_env_text`].
  ///
  /// Blank lines and lines starting with `#` are ignored. Anything else must be
  /// `name=true` or `name=false`; whitespace around name and value is trimmed.
  pub fn parse_env_text(text: &str) -> GantryResult<Self> {
    let mut values = IndexMap::new();
    for (idx, raw_line) in text.lines().enumerate() {
      let line_no = idx + 1;
      let line = raw_line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      let (name, value) = line.split_once('=').ok_or_else(|| GantryError::InvalidFactText {
        line: line_no,
        message: format!("expected 'name=value', got '{}'", line),
      })?;
      let name = name.trim();
      if name.is_empty() {
        return Err(GantryError::InvalidFactText {
          line: line_no,
          message: "fact name is empty".to_string(),
        });
      }
      let value = match value.trim() {
        "true" => true,
        "false" => false,
        other => {
          return Err(GantryError::InvalidFactText {
            line: line_no,
            message: format!("value of '{}' must be 'true' or 'false', got '{}'", name, other),
          })
        }
      };
      if values.insert(name.to_string(), value).is_some() {
        return Err(GantryError::InvalidFactText {
          line: line_no,
          message: format!("fact '{}' appears more than once", name),
        });
      }
    }
    Ok(Self { values })
  }
}
