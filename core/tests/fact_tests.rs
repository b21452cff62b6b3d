// tests/fact_tests.rs
mod common;

use common::*;
use gantry::{FactComputer, FactSet, GantryError, Gate, Run, RunConfig, UnitDef, Workflow};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn fan_out_workflow() -> Workflow {
  Workflow::new("fan-out")
    .with_unit(UnitDef::new("root"))
    .unwrap()
    .with_unit(UnitDef::new("a").needs(["root"]).gate(Gate::fact("masterPush")))
    .unwrap()
    .with_unit(UnitDef::new("b").needs(["root"]).gate(Gate::fact("masterPush")))
    .unwrap()
    .with_unit(UnitDef::new("c").needs(["a", "b"]))
    .unwrap()
}

#[tokio::test]
#[serial]
async fn test_facts_are_computed_once_per_run() {
  setup_tracing();
  let calls = Arc::new(AtomicUsize::new(0));
  let mut computer = FactComputer::ci_defaults();
  let counter = calls.clone();
  computer
    .fact("counted", move |_, _| {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(true)
    })
    .unwrap();

  let exec = ScriptedExecutor::new();
  let log = exec.log();
  let report = Run::new(fan_out_workflow(), exec)
    .with_facts(computer)
    .execute(&master_push())
    .await
    .unwrap();

  assert!(report.is_success());
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(log.lock().len(), 4);
}

#[tokio::test]
#[serial]
async fn test_every_unit_sees_the_same_facts() {
  setup_tracing();
  let exec = ScriptedExecutor::new();
  let log = exec.log();
  let report = Run::new(fan_out_workflow(), exec).execute(&master_push()).await.unwrap();

  let calls = log.lock();
  assert_eq!(calls.len(), 4);
  for call in calls.iter() {
    assert_eq!(call.facts, report.facts, "unit {} saw different facts", call.unit);
    assert_eq!(call.facts_text, calls[0].facts_text);
  }
  assert_eq!(report.facts.get("masterPush"), Some(true));
}

#[tokio::test]
#[serial]
async fn test_fact_text_crosses_a_process_boundary_intact() {
  setup_tracing();
  let exec = ScriptedExecutor::new();
  let log = exec.log();
  let config = RunConfig::default().with_publish_docs(true);
  let report = Run::new(fan_out_workflow(), exec)
    .with_config(config)
    .execute(&master_push())
    .await
    .unwrap();

  let text = log.lock()[0].facts_text.clone();
  assert_eq!(text, "masterPush=true\nisPrTargetingMaster=false\npublishDocs=true\n");
  let decoded = FactSet::parse_env_text(&text).unwrap();
  assert_eq!(decoded, report.facts);
}

#[tokio::test]
#[serial]
async fn test_failing_fact_rule_aborts_before_any_unit() {
  setup_tracing();
  let mut computer = FactComputer::ci_defaults();
  computer
    .fact("releaseTagged", |_, _| Err(anyhow::anyhow!("tag lookup failed")))
    .unwrap();

  let exec = ScriptedExecutor::new();
  let log = exec.log();
  let result = Run::new(fan_out_workflow(), exec)
    .with_facts(computer)
    .execute(&master_push())
    .await;

  match result {
    Err(GantryError::FactComputation { fact, source }) => {
      assert_eq!(fact, "releaseTagged");
      assert!(source.to_string().contains("tag lookup failed"));
    }
    other => panic!("expected FactComputation, got {:?}", other.map(|r| r.status)),
  }
  assert!(log.lock().is_empty());
}

#[tokio::test]
#[serial]
async fn test_gate_on_unknown_fact_fails_before_any_unit() {
  setup_tracing();
  let workflow = Workflow::new("typo")
    .with_unit(UnitDef::new("build"))
    .unwrap()
    .with_unit(UnitDef::new("ship").needs(["build"]).gate(Gate::fact("masterPsuh")))
    .unwrap();

  let exec = ScriptedExecutor::new();
  let log = exec.log();
  let result = Run::new(workflow, exec).execute(&master_push()).await;

  assert!(matches!(
    result,
    Err(GantryError::UnknownFact { ref unit, ref fact }) if unit == "ship" && fact == "masterPsuh"
  ));
  assert!(log.lock().is_empty());
}

#[tokio::test]
#[serial]
async fn test_custom_main_branch_drives_ci_facts() {
  setup_tracing();
  let exec = ScriptedExecutor::new();
  let report = Run::new(fan_out_workflow(), exec)
    .with_config(RunConfig::default().with_main_branch("main"))
    .execute(&master_push())
    .await
    .unwrap();

  assert_eq!(report.facts.get("masterPush"), Some(false));
  assert_eq!(report.outcome("a"), Some(gantry::Outcome::Skipped));
  assert_eq!(report.outcome("b"), Some(gantry::Outcome::Skipped));
  // c has the implicit success() gate and both predecessors were skipped.
  assert_eq!(report.outcome("c"), Some(gantry::Outcome::Skipped));
  assert!(report.is_success());
}
