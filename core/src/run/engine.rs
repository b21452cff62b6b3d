// gantry/src/run/engine.rs

//! Contains `Run::execute()`: computes facts once, then schedules units as
//! their predecessors finish, gating each one and running independent units
//! concurrently.

use super::cancel::CancelHandle;
use super::executor::{UnitContext, UnitExecutor};
use super::ledger::RunLedger;
use super::outcome::{Outcome, RunReport, UnitFailure, UnitOutputs, UnitRecord, UnitState};
use crate::config::RunConfig;
use crate::error::{GantryError, GantryResult};
use crate::facts::{FactComputer, FactSet, Trigger};
use crate::gate::GateContext;
use crate::graph::{UnitDef, Workflow};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tracing::{event, instrument, span, Instrument, Level};

/// How a spawned unit task ended.
enum TaskEnd {
  Finished(anyhow::Result<UnitOutputs>),
  TimedOut(Duration),
}

struct Finished {
  unit: String,
  started: Instant,
  result: Result<TaskEnd, JoinError>,
}

/// One execution of a workflow.
pub struct Run {
  workflow: Arc<Workflow>,
  config: RunConfig,
  computer: FactComputer,
  executor: Arc<dyn UnitExecutor>,
  cancel: CancelHandle,
  ledger: RunLedger,
}

impl Run {
  /// A run with the default CI facts and configuration.
  pub fn new<E: UnitExecutor + 'static>(workflow: Workflow, executor: E) -> Self {
    Self {
      workflow: Arc::new(workflow),
      config: RunConfig::default(),
      computer: FactComputer::ci_defaults(),
      executor: Arc::new(executor),
      cancel: CancelHandle::new(),
      ledger: RunLedger::new(),
    }
  }

  pub fn with_config(mut self, config: RunConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_facts(mut self, computer: FactComputer) -> Self {
    self.computer = computer;
    self
  }

  /// Handle to cancel this run, usable from any task.
  pub fn cancel_handle(&self) -> CancelHandle {
    self.cancel.clone()
  }

  /// Live view of unit states.
  pub fn ledger(&self) -> RunLedger {
    self.ledger.clone()
  }

  /// Executes the run to completion.
  ///
  /// Returns `Err` only for problems detected before any unit starts: an
  /// invalid graph, a failing fact rule, or a gate naming a fact that was not
  /// computed. Unit failures are reported in the returned `RunReport`.
  #[instrument(
    name = "Run::execute",
    skip_all,
    fields(
      workflow = %self.workflow.name,
      event = %trigger.event,
      ref_name = %trigger.ref_name,
      num_units = self.workflow.len(),
    ),
    err(Display)
  )]
  pub async fn execute(self, trigger: &Trigger) -> GantryResult<RunReport> {
    let order: Vec<String> = self.workflow.validate()?.into_iter().map(str::to_string).collect();

    // Facts are computed exactly once and shared read-only from here on.
    let facts = Arc::new(self.computer.compute(trigger, &self.config)?);
    check_fact_references(&self.workflow, &facts)?;
    event!(Level::INFO, facts = %facts.to_env_text().trim_end().replace('\n', ","), "Run starting.");

    self.ledger.reset(order.iter().map(String::as_str));
    let mut scheduler = Scheduler {
      run: &self,
      order: &order,
      facts: facts.clone(),
      running: JoinSet::new(),
      aborts: HashMap::new(),
      cancelled: false,
    };
    let mut cancel_signal = self.cancel.signal();
    let mut aborted = false;

    loop {
      // Cancellation may arrive while a join result is also ready, so it is
      // acted on here rather than only in the select branch.
      scheduler.cancelled = cancel_signal.is_cancelled();
      if scheduler.cancelled && !aborted {
        aborted = true;
        scheduler.abort_running();
      }
      scheduler.schedule_ready();
      if scheduler.running.is_empty() {
        break;
      }
      tokio::select! {
        joined = scheduler.running.join_next() => match joined {
          Some(Ok(finished)) => scheduler.record_finished(finished),
          Some(Err(join_err)) => {
            event!(Level::ERROR, error = %join_err, "Unit supervisor task failed.");
          }
          None => {}
        },
        _ = cancel_signal.cancelled(), if !aborted => {}
      }
    }

    Ok(self.report(&facts))
  }

  fn report(&self, facts: &FactSet) -> RunReport {
    let mut units = IndexMap::new();
    for unit in self.workflow.units() {
      let record = self.ledger.take_record(&unit.name).unwrap_or_else(|| {
        // Only reachable if a supervisor task died; never report it as green.
        event!(Level::ERROR, unit = %unit.name, "Unit has no terminal record.");
        UnitRecord {
          outcome: Outcome::Failed,
          failure: Some(UnitFailure::Panicked),
          outputs: UnitOutputs::new(),
          duration: Duration::ZERO,
        }
      });
      units.insert(unit.name.clone(), record);
    }
    let report = RunReport::new(self.cancel.is_cancelled(), facts.clone(), units);
    event!(Level::INFO, status = ?report.status, cancelled = report.cancelled, "Run finished.");
    report
  }
}

/// Fails the run up front if any gate names a fact that was not computed, so
/// no unit ever runs against an undefined fact.
fn check_fact_references(workflow: &Workflow, facts: &FactSet) -> GantryResult<()> {
  for unit in workflow.units() {
    if let Some(fact) = unit.gate.referenced_facts().into_iter().find(|f| !facts.contains(f)) {
      event!(Level::ERROR, unit = %unit.name, %fact, "Gate references an unknown fact.");
      return Err(GantryError::UnknownFact {
        unit: unit.name.clone(),
        fact: fact.to_string(),
      });
    }
  }
  Ok(())
}

struct Scheduler<'r> {
  run: &'r Run,
  order: &'r [String],
  facts: Arc<FactSet>,
  running: JoinSet<Finished>,
  aborts: HashMap<String, (AbortHandle, Instant)>,
  cancelled: bool,
}

impl Scheduler<'_> {
  fn has_capacity(&self) -> bool {
    self.run.config.max_parallel.map_or(true, |max| self.running.len() < max.max(1))
  }

  fn finish(&self, unit: &str, outcome: Outcome, failure: Option<UnitFailure>, outputs: UnitOutputs, duration: Duration) {
    let reason = failure.as_ref().map(ToString::to_string);
    let record = UnitRecord {
      outcome,
      failure,
      outputs,
      duration,
    };
    if !self.run.ledger.finish(unit, record) {
      event!(Level::TRACE, %unit, %outcome, "Unit already terminal, result dropped.");
      return;
    }
    match reason {
      Some(reason) => event!(Level::WARN, %unit, %outcome, %reason, "Unit finished."),
      None => event!(Level::INFO, %unit, %outcome, "Unit finished."),
    }
  }

  /// One pass in topological order. A unit decided in this pass is already
  /// terminal when its dependents are looked at later in the same pass.
  fn schedule_ready(&mut self) {
    let run = self.run;
    for name in self.order {
      let unit = &run.workflow.units[name.as_str()];
      if run.ledger.state(name) != Some(UnitState::Pending) {
        continue;
      }
      let waiting = unit
        .needs
        .iter()
        .any(|n| !run.ledger.state(n).map_or(false, UnitState::is_terminal));
      if waiting {
        continue;
      }

      if self.cancelled && !unit.gate.opts_out_of_cancellation() {
        self.finish(name, Outcome::Cancelled, None, UnitOutputs::new(), Duration::ZERO);
        continue;
      }

      let decision = {
        let data = run.ledger.read();
        let ctx = GateContext::new(&self.facts, &unit.needs, &data.states, &data.outputs, self.cancelled);
        unit.gate.evaluate(&ctx)
      };
      match decision {
        Ok(false) => {
          event!(Level::DEBUG, unit = %name, gate = %unit.gate, "Gate is false.");
          self.finish(name, Outcome::Skipped, None, UnitOutputs::new(), Duration::ZERO);
        }
        Err(error) => {
          event!(Level::ERROR, unit = %name, gate = %unit.gate, %error, "Gate could not be evaluated.");
          self.finish(
            name,
            Outcome::Failed,
            Some(UnitFailure::Gate { error }),
            UnitOutputs::new(),
            Duration::ZERO,
          );
        }
        Ok(true) if self.has_capacity() => self.launch(unit),
        Ok(true) => {
          event!(Level::TRACE, unit = %name, "At parallelism limit, unit stays pending.");
        }
      }
    }
  }

  fn launch(&mut self, unit: &UnitDef) {
    let needs: BTreeMap<String, UnitOutputs> = unit
      .needs
      .iter()
      .filter_map(|n| self.run.ledger.outputs(n).map(|o| (n.clone(), o)))
      .collect();
    let ctx = UnitContext {
      unit: unit.name.clone(),
      steps: unit.steps.clone(),
      facts: self.facts.clone(),
      needs,
      cancel: self.run.cancel.signal(),
    };
    let executor = self.run.executor.clone();
    let timeout = unit.timeout;
    let unit_span = span!(Level::INFO, "unit_execution", unit = %unit.name, num_steps = unit.steps.len());

    self.run.ledger.mark_running(&unit.name);
    event!(Level::INFO, unit = %unit.name, "Unit starting.");
    let started = Instant::now();

    let task = tokio::spawn(
      async move {
        match timeout {
          Some(limit) => match tokio::time::timeout(limit, executor.execute(ctx)).await {
            Ok(result) => TaskEnd::Finished(result),
            Err(_) => TaskEnd::TimedOut(limit),
          },
          None => TaskEnd::Finished(executor.execute(ctx).await),
        }
      }
      .instrument(unit_span),
    );
    self.aborts.insert(unit.name.clone(), (task.abort_handle(), started));

    // The supervisor only awaits the unit task, so it reports panics and
    // aborts of the unit instead of failing itself.
    let unit_name = unit.name.clone();
    self.running.spawn(async move {
      Finished {
        unit: unit_name,
        started,
        result: task.await,
      }
    });
  }

  fn record_finished(&mut self, finished: Finished) {
    let Finished { unit, started, result } = finished;
    self.aborts.remove(&unit);
    let duration = started.elapsed();
    let run = self.run;
    let declared = &run.workflow.units[unit.as_str()].outputs;

    match result {
      Ok(TaskEnd::Finished(Ok(outputs))) => {
        let missing = declared
          .iter()
          .find(|key| outputs.get(key.as_str()).map_or(true, |v| v.is_empty()));
        match missing {
          Some(key) => self.finish(
            &unit,
            Outcome::Failed,
            Some(UnitFailure::MissingOutput { key: key.clone() }),
            outputs,
            duration,
          ),
          None => self.finish(&unit, Outcome::Succeeded, None, outputs, duration),
        }
      }
      Ok(TaskEnd::Finished(Err(error))) => {
        let failure = UnitFailure::Execution {
          message: format!("{:#}", error),
        };
        self.finish(&unit, Outcome::Failed, Some(failure), UnitOutputs::new(), duration);
      }
      Ok(TaskEnd::TimedOut(limit)) => {
        let failure = UnitFailure::TimedOut {
          after_ms: limit.as_millis() as u64,
        };
        self.finish(&unit, Outcome::Failed, Some(failure), UnitOutputs::new(), duration);
      }
      Err(join_err) if join_err.is_panic() => {
        self.finish(&unit, Outcome::Failed, Some(UnitFailure::Panicked), UnitOutputs::new(), duration);
      }
      // Aborted on cancellation. abort_running normally recorded it already.
      Err(_) => self.finish(&unit, Outcome::Cancelled, None, UnitOutputs::new(), duration),
    }
  }

  /// Aborts every running unit whose gate does not opt out of cancellation.
  fn abort_running(&mut self) {
    event!(Level::WARN, running = self.aborts.len(), "Run cancelled.");
    let to_abort: Vec<String> = self
      .aborts
      .keys()
      .filter(|name| !self.run.workflow.units[name.as_str()].gate.opts_out_of_cancellation())
      .cloned()
      .collect();
    for name in to_abort {
      if let Some((handle, started)) = self.aborts.remove(&name) {
        handle.abort();
        self.finish(&name, Outcome::Cancelled, None, UnitOutputs::new(), started.elapsed());
      }
    }
  }
}
