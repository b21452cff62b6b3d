// gantry/src/run/executor.rs

//! The boundary to whatever actually runs a unit's steps.
//!
//! The scheduler hands an executor the unit's steps, the run's facts (read
//! only) and the outputs of the unit's declared predecessors, and expects one
//! result back: `Ok(outputs)` for success, `Err` for failure.

use super::cancel::CancelSignal;
use super::outcome::UnitOutputs;
use crate::error::GantryError;
use crate::facts::FactSet;
use crate::graph::Step;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{event, Level};

/// What a unit sees while it runs.
#[derive(Debug, Clone)]
pub struct UnitContext {
  pub unit: String,
  pub steps: Vec<Step>,
  pub facts: Arc<FactSet>,
  /// Outputs of succeeded declared predecessors, keyed by predecessor name.
  pub needs: BTreeMap<String, UnitOutputs>,
  pub cancel: CancelSignal,
}

impl UnitContext {
  pub fn fact(&self, name: &str) -> Option<bool> {
    self.facts.get(name)
  }

  pub fn output(&self, predecessor: &str, key: &str) -> Option<&str> {
    self.needs.get(predecessor)?.get(key).map(String::as_str)
  }

  /// Facts as `name=value` lines, for handing to a child process or remote host.
  pub fn facts_env_text(&self) -> String {
    self.facts.to_env_text()
  }
}

#[async_trait]
pub trait UnitExecutor: Send + Sync {
  /// Runs the unit's steps. Retries, if any, belong here.
  async fn execute(&self, ctx: UnitContext) -> anyhow::Result<UnitOutputs>;
}

#[async_trait]
impl<E: UnitExecutor + ?Sized> UnitExecutor for Arc<E> {
  async fn execute(&self, ctx: UnitContext) -> anyhow::Result<UnitOutputs> {
    (**self).execute(ctx).await
  }
}

/// Type alias for a per-unit handler closure.
///
/// Handlers receive the `UnitContext` by value and must not block the runtime.
pub type UnitHandler =
  Box<dyn Fn(UnitContext) -> Pin<Box<dyn Future<Output = anyhow::Result<UnitOutputs>> + Send>> + Send + Sync>;

/// Executor dispatching each unit to a registered async closure.
///
/// A unit with no handler succeeds with no outputs if it declares no steps,
/// and fails with `HandlerMissing` otherwise.
#[derive(Default)]
pub struct HandlerExecutor {
  handlers: HashMap<String, UnitHandler>,
}

impl HandlerExecutor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers the handler for `unit`, replacing any earlier one.
  pub fn on_unit<F, Fut>(&mut self, unit: &str, handler_fn: F) -> &mut Self
  where
    F: Fn(UnitContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<UnitOutputs>> + Send + 'static,
  {
    let handler: UnitHandler = Box::new(move |ctx| Box::pin(handler_fn(ctx)));
    if self.handlers.insert(unit.to_string(), handler).is_some() {
      event!(Level::DEBUG, %unit, "Replaced unit handler.");
    }
    self
  }

  pub fn has_handler(&self, unit: &str) -> bool {
    self.handlers.contains_key(unit)
  }
}

#[async_trait]
impl UnitExecutor for HandlerExecutor {
  async fn execute(&self, ctx: UnitContext) -> anyhow::Result<UnitOutputs> {
    match self.handlers.get(&ctx.unit) {
      Some(handler) => handler(ctx).await,
      None if ctx.steps.is_empty() => {
        event!(Level::DEBUG, unit = %ctx.unit, "Unit has no steps and no handler, succeeding.");
        Ok(UnitOutputs::new())
      }
      None => Err(GantryError::HandlerMissing { unit: ctx.unit }.into()),
    }
  }
}
