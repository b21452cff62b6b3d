// gantry/src/gate/expr.rs

//! The gate expression tree and its evaluation against a run's facts and the
//! outcomes of a unit's predecessors.

use crate::error::GateError;
use crate::facts::FactSet;
use crate::run::outcome::{Outcome, UnitOutputs, UnitState};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// Status functions over all of a unit's predecessors, plus run cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCheck {
  /// Every predecessor succeeded. A skipped predecessor is not a success.
  Success,
  /// Some predecessor failed. Skipped and cancelled predecessors are not failures.
  Failure,
  /// Always true. Also opts the unit out of forced cancellation.
  Always,
  /// True iff the run was cancelled. Used without negation it also opts the
  /// unit out of forced cancellation.
  Cancelled,
}

impl StatusCheck {
  pub fn keyword(self) -> &'static str {
    match self {
      StatusCheck::Success => "success",
      StatusCheck::Failure => "failure",
      StatusCheck::Always => "always",
      StatusCheck::Cancelled => "cancelled",
    }
  }
}

/// Boolean expression deciding whether a unit runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
  Literal(bool),
  Fact { name: String, expected: bool },
  Status(StatusCheck),
  Result { unit: String, outcome: Outcome },
  Output { unit: String, key: String, expected: String },
  Not(Box<Gate>),
  And(Vec<Gate>),
  Or(Vec<Gate>),
}

impl Default for Gate {
  /// No condition: with implicit success this runs when all predecessors succeeded.
  fn default() -> Self {
    Gate::Literal(true)
  }
}

/// Everything a gate may look at: the run's facts, the unit's declared
/// predecessors with their states and outputs, and the cancellation flag.
pub struct GateContext<'a> {
  facts: &'a FactSet,
  needs: &'a [String],
  states: &'a IndexMap<String, UnitState>,
  outputs: &'a HashMap<String, UnitOutputs>,
  cancelled: bool,
}

impl<'a> GateContext<'a> {
  pub fn new(
    facts: &'a FactSet,
    needs: &'a [String],
    states: &'a IndexMap<String, UnitState>,
    outputs: &'a HashMap<String, UnitOutputs>,
    cancelled: bool,
  ) -> Self {
    Self {
      facts,
      needs,
      states,
      outputs,
      cancelled,
    }
  }

  fn outcome_of(&self, unit: &str) -> Result<Outcome, GateError> {
    if !self.needs.iter().any(|n| n == unit) {
      return Err(GateError::UndeclaredPredecessor { unit: unit.to_string() });
    }
    self
      .states
      .get(unit)
      .and_then(|state| state.outcome())
      .ok_or_else(|| GateError::PredecessorNotTerminal { unit: unit.to_string() })
  }

  fn output_of(&self, unit: &str, key: &str) -> Result<&str, GateError> {
    // Checks the predecessor is declared and finished.
    self.outcome_of(unit)?;
    let value = self
      .outputs
      .get(unit)
      .and_then(|outputs| outputs.get(key))
      .ok_or_else(|| GateError::MissingOutput {
        unit: unit.to_string(),
        key: key.to_string(),
      })?;
    if value.is_empty() {
      return Err(GateError::EmptyOutput {
        unit: unit.to_string(),
        key: key.to_string(),
      });
    }
    Ok(value)
  }

  fn predecessor_outcomes(&self) -> Result<Vec<Outcome>, GateError> {
    self.needs.iter().map(|n| self.outcome_of(n)).collect()
  }
}

impl Gate {
  // --- Builders ---

  /// `facts.<name>`: the fact is true.
  pub fn fact<S: Into<String>>(name: S) -> Self {
    Gate::Fact {
      name: name.into(),
      expected: true,
    }
  }

  pub fn fact_is<S: Into<String>>(name: S, expected: bool) -> Self {
    Gate::Fact {
      name: name.into(),
      expected,
    }
  }

  pub fn succeeded<S: Into<String>>(unit: S) -> Self {
    Gate::Result {
      unit: unit.into(),
      outcome: Outcome::Succeeded,
    }
  }

  pub fn failed<S: Into<String>>(unit: S) -> Self {
    Gate::Result {
      unit: unit.into(),
      outcome: Outcome::Failed,
    }
  }

  pub fn skipped<S: Into<String>>(unit: S) -> Self {
    Gate::Result {
      unit: unit.into(),
      outcome: Outcome::Skipped,
    }
  }

  /// The predecessor did not fail. A skipped predecessor passes through.
  pub fn not_failed<S: Into<String>>(unit: S) -> Self {
    !Gate::failed(unit)
  }

  pub fn output_eq<U: Into<String>, K: Into<String>, V: Into<String>>(unit: U, key: K, expected: V) -> Self {
    Gate::Output {
      unit: unit.into(),
      key: key.into(),
      expected: expected.into(),
    }
  }

  pub fn always() -> Self {
    Gate::Status(StatusCheck::Always)
  }

  pub fn success() -> Self {
    Gate::Status(StatusCheck::Success)
  }

  pub fn failure() -> Self {
    Gate::Status(StatusCheck::Failure)
  }

  pub fn cancelled() -> Self {
    Gate::Status(StatusCheck::Cancelled)
  }

  /// `!cancelled()`: run regardless of predecessor failure, but not on cancellation.
  pub fn not_cancelled() -> Self {
    !Gate::cancelled()
  }

  pub fn and(self, other: Gate) -> Self {
    match self {
      Gate::And(mut terms) => {
        terms.push(other);
        Gate::And(terms)
      }
      first => Gate::And(vec![first, other]),
    }
  }

  pub fn or(self, other: Gate) -> Self {
    match self {
      Gate::Or(mut terms) => {
        terms.push(other);
        Gate::Or(terms)
      }
      first => Gate::Or(vec![first, other]),
    }
  }

  // --- Inspection ---

  fn visit<'g>(&'g self, f: &mut impl FnMut(&'g Gate)) {
    f(self);
    match self {
      Gate::Not(inner) => inner.visit(&mut *f),
      Gate::And(terms) | Gate::Or(terms) => {
        for term in terms {
          term.visit(&mut *f);
        }
      }
      _ => {}
    }
  }

  fn any_node(&self, mut pred: impl FnMut(&Gate) -> bool) -> bool {
    let mut found = false;
    self.visit(&mut |g| found |= pred(g));
    found
  }

  /// Whether the gate inspects predecessor outcomes itself. Gates that do not
  /// are evaluated as `success() && gate`.
  pub fn has_status_check(&self) -> bool {
    self.any_node(|g| matches!(g, Gate::Status(_) | Gate::Result { .. }))
  }

  /// Whether the unit keeps evaluating after run cancellation instead of being
  /// forced to `cancelled`: the gate mentions `always()` or a non-negated
  /// `cancelled()`. `!cancelled()` does not opt out.
  pub fn opts_out_of_cancellation(&self) -> bool {
    self.runs_on_cancel(false)
  }

  fn runs_on_cancel(&self, negated: bool) -> bool {
    match self {
      Gate::Status(StatusCheck::Always | StatusCheck::Cancelled) => !negated,
      Gate::Not(inner) => inner.runs_on_cancel(!negated),
      Gate::And(terms) | Gate::Or(terms) => terms.iter().any(|t| t.runs_on_cancel(negated)),
      _ => false,
    }
  }

  pub fn referenced_facts(&self) -> Vec<&str> {
    let mut names = Vec::new();
    self.visit(&mut |g| {
      if let Gate::Fact { name, .. } = g {
        if !names.contains(&name.as_str()) {
          names.push(name.as_str());
        }
      }
    });
    names
  }

  /// Units named by `needs.<unit>.result` or `needs.<unit>.outputs.*`.
  pub fn referenced_units(&self) -> Vec<&str> {
    let mut units = Vec::new();
    self.visit(&mut |g| {
      if let Gate::Result { unit, .. } | Gate::Output { unit, .. } = g {
        if !units.contains(&unit.as_str()) {
          units.push(unit.as_str());
        }
      }
    });
    units
  }

  // --- Evaluation ---

  /// Decides the gate. Applies implicit success first, so outputs of a
  /// predecessor that did not succeed are never looked at by such gates.
  pub fn evaluate(&self, ctx: &GateContext<'_>) -> Result<bool, GateError> {
    if !self.has_status_check() && !Gate::success().eval(ctx)? {
      return Ok(false);
    }
    self.eval(ctx)
  }

  fn eval(&self, ctx: &GateContext<'_>) -> Result<bool, GateError> {
    match self {
      Gate::Literal(value) => Ok(*value),
      Gate::Fact { name, expected } => ctx
        .facts
        .get(name)
        .map(|value| value == *expected)
        .ok_or_else(|| GateError::UnknownFact { fact: name.clone() }),
      Gate::Status(StatusCheck::Success) => Ok(ctx.predecessor_outcomes()?.iter().all(|o| *o == Outcome::Succeeded)),
      Gate::Status(StatusCheck::Failure) => Ok(ctx.predecessor_outcomes()?.iter().any(|o| *o == Outcome::Failed)),
      Gate::Status(StatusCheck::Always) => Ok(true),
      Gate::Status(StatusCheck::Cancelled) => Ok(ctx.cancelled),
      Gate::Result { unit, outcome } => Ok(ctx.outcome_of(unit)? == *outcome),
      Gate::Output { unit, key, expected } => Ok(ctx.output_of(unit, key)? == expected),
      Gate::Not(inner) => Ok(!inner.eval(ctx)?),
      Gate::And(terms) => {
        for term in terms {
          if !term.eval(ctx)? {
            return Ok(false);
          }
        }
        Ok(true)
      }
      Gate::Or(terms) => {
        for term in terms {
          if term.eval(ctx)? {
            return Ok(true);
          }
        }
        Ok(false)
      }
    }
  }
}

impl std::ops::Not for Gate {
  type Output = Gate;

  fn not(self) -> Gate {
    match self {
      Gate::Not(inner) => *inner,
      Gate::Literal(value) => Gate::Literal(!value),
      other => Gate::Not(Box::new(other)),
    }
  }
}

/// Single quotes unless the value contains one. The gate language has no
/// escapes, so a value holding both quote kinds has no textual form.
fn quote(value: &str) -> String {
  if value.contains('\'') {
    format!("\"{}\"", value)
  } else {
    format!("'{}'", value)
  }
}

fn write_operand(f: &mut fmt::Formatter<'_>, gate: &Gate) -> fmt::Result {
  match gate {
    Gate::And(_) | Gate::Or(_) => write!(f, "({})", gate),
    _ => write!(f, "{}", gate),
  }
}

impl fmt::Display for Gate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Gate::Literal(value) => write!(f, "{}", value),
      Gate::Fact { name, expected: true } => write!(f, "facts.{}", name),
      Gate::Fact { name, expected: false } => write!(f, "facts.{} == 'false'", name),
      Gate::Status(check) => write!(f, "{}()", check.keyword()),
      Gate::Result { unit, outcome } => write!(f, "needs.{}.result == '{}'", unit, outcome.result_keyword()),
      Gate::Output { unit, key, expected } => write!(f, "needs.{}.outputs.{} == {}", unit, key, quote(expected)),
      Gate::Not(inner) => match inner.as_ref() {
        Gate::Result { unit, outcome } => write!(f, "needs.{}.result != '{}'", unit, outcome.result_keyword()),
        Gate::Output { unit, key, expected } => write!(f, "needs.{}.outputs.{} != {}", unit, key, quote(expected)),
        Gate::Fact { name, expected } => write!(f, "facts.{} != '{}'", name, expected),
        other => {
          f.write_str("!")?;
          match other {
            Gate::Literal(_) | Gate::Status(_) | Gate::Not(_) => write!(f, "{}", other),
            _ => write!(f, "({})", other),
          }
        }
      },
      Gate::And(terms) | Gate::Or(terms) => {
        let sep = if matches!(self, Gate::And(_)) { " && " } else { " || " };
        for (idx, term) in terms.iter().enumerate() {
          if idx > 0 {
            f.write_str(sep)?;
          }
          write_operand(f, term)?;
        }
        Ok(())
      }
    }
  }
}
