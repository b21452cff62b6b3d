// tests/common/mod.rs
#![allow(dead_code)] // Not every test file uses every helper

use async_trait::async_trait;
use gantry::{FactSet, Trigger, UnitContext, UnitExecutor, UnitOutputs};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Scripted executor ---

/// What a unit does when the scripted executor runs it.
#[derive(Debug, Clone)]
pub enum Behavior {
  Succeed(UnitOutputs),
  Fail(String),
  Panic,
  /// Sleeps, then succeeds with no outputs.
  Sleep(Duration),
  /// Waits for run cancellation, then succeeds with no outputs.
  WaitForCancel,
}

/// One call the executor received.
#[derive(Debug, Clone)]
pub struct Call {
  pub unit: String,
  pub facts: FactSet,
  pub facts_text: String,
  pub needs: Vec<String>,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// Executor whose per-unit behavior is scripted up front. Units without a
/// script succeed with no outputs.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
  behaviors: HashMap<String, Behavior>,
  log: CallLog,
}

impl ScriptedExecutor {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, unit: &str, behavior: Behavior) -> Self {
    self.behaviors.insert(unit.to_string(), behavior);
    self
  }

  pub fn log(&self) -> CallLog {
    self.log.clone()
  }
}

#[async_trait]
impl UnitExecutor for ScriptedExecutor {
  async fn execute(&self, mut ctx: UnitContext) -> anyhow::Result<UnitOutputs> {
    self.log.lock().push(Call {
      unit: ctx.unit.clone(),
      facts: (*ctx.facts).clone(),
      facts_text: ctx.facts_env_text(),
      needs: ctx.needs.keys().cloned().collect(),
    });
    match self.behaviors.get(&ctx.unit).cloned() {
      None => Ok(UnitOutputs::new()),
      Some(Behavior::Succeed(outputs)) => Ok(outputs),
      Some(Behavior::Fail(message)) => Err(anyhow::anyhow!(message)),
      Some(Behavior::Panic) => panic!("unit {} blew up", ctx.unit),
      Some(Behavior::Sleep(duration)) => {
        tokio::time::sleep(duration).await;
        Ok(UnitOutputs::new())
      }
      Some(Behavior::WaitForCancel) => {
        ctx.cancel.cancelled().await;
        Ok(UnitOutputs::new())
      }
    }
  }
}

// --- Helpers ---

pub fn outputs(pairs: &[(&str, &str)]) -> UnitOutputs {
  pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn called_units(log: &CallLog) -> Vec<String> {
  log.lock().iter().map(|c| c.unit.clone()).collect()
}

pub fn was_called(log: &CallLog, unit: &str) -> bool {
  log.lock().iter().any(|c| c.unit == unit)
}

pub fn master_push() -> Trigger {
  Trigger::push("refs/heads/master")
}

pub fn pr_into_master() -> Trigger {
  Trigger::pull_request("refs/pull/7/merge", "master")
}
