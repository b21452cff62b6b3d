// tests/manifest_tests.rs
mod common;

use common::*;
use gantry::{GantryError, Manifest, Outcome, Run, Trigger};
use serial_test::serial;

const RELEASE_MANIFEST: &str = r#"
name: release
config:
  main_branch: main
  publish_docs: true
units:
  - name: build
    outputs: [version]
    steps:
      - name: compile
        run: cargo build --release
  - name: test
    needs: [build]
    steps:
      - name: test
        run: cargo test
  - name: docs
    needs: [build, test]
    if: "${{ !failure() }}"
    outputs: [site]
  - name: publish-docs
    needs: [docs]
    if: "facts.publishDocs && needs.docs.result == 'success'"
  - name: release
    needs: [build, test]
    if: "facts.masterPush && needs.build.outputs.version != '0.0.0'"
  - name: report
    needs: [release]
    if: "always()"
"#;

fn executor() -> ScriptedExecutor {
  ScriptedExecutor::new()
    .with("build", Behavior::Succeed(outputs(&[("version", "1.4.0")])))
    .with("docs", Behavior::Succeed(outputs(&[("site", "target/doc")])))
}

#[tokio::test]
#[serial]
async fn test_manifest_run_on_main_releases() {
  setup_tracing();
  let manifest: Manifest = RELEASE_MANIFEST.parse().unwrap();
  let exec = executor();
  let log = exec.log();
  let report = Run::new(manifest.workflow, exec)
    .with_config(manifest.config)
    .execute(&Trigger::push("refs/heads/main"))
    .await
    .unwrap();

  assert!(report.is_success());
  for unit in ["build", "test", "docs", "publish-docs", "release", "report"] {
    assert_eq!(report.outcome(unit), Some(Outcome::Succeeded), "{}", unit);
  }
  let release = log.lock().iter().find(|c| c.unit == "release").cloned().unwrap();
  assert_eq!(release.needs, vec!["build", "test"]);
}

#[tokio::test]
#[serial]
async fn test_manifest_run_on_pull_request() {
  setup_tracing();
  let manifest = Manifest::from_yaml_str(RELEASE_MANIFEST).unwrap();
  let report = Run::new(manifest.workflow, executor())
    .with_config(manifest.config)
    .execute(&Trigger::pull_request("refs/pull/3/merge", "main"))
    .await
    .unwrap();

  assert_eq!(report.facts.get("isPrTargetingMaster"), Some(true));
  assert_eq!(report.outcome("docs"), Some(Outcome::Succeeded));
  assert_eq!(report.outcome("publish-docs"), Some(Outcome::Skipped));
  assert_eq!(report.outcome("release"), Some(Outcome::Skipped));
  assert_eq!(report.outcome("report"), Some(Outcome::Succeeded));
}

#[tokio::test]
#[serial]
async fn test_manifest_with_cycle_is_rejected() {
  setup_tracing();
  let yaml = r#"
name: loop
units:
  - name: a
    needs: [c]
  - name: b
    needs: [a]
  - name: c
    needs: [b]
"#;
  match Manifest::from_yaml_str(yaml) {
    Err(GantryError::CycleDetected { units }) => {
      assert_eq!(units.first(), units.last());
      assert_eq!(units.len(), 4);
    }
    other => panic!("expected a cycle, got {:?}", other.map(|m| m.workflow.name)),
  }
}

#[tokio::test]
#[serial]
async fn test_manifest_gate_parse_error_reports_position() {
  setup_tracing();
  let yaml = "name: bad\nunits:\n  - name: a\n    if: \"facts.x == \"\n";
  match Manifest::from_yaml_str(yaml) {
    Err(GantryError::GateParse { expression, position, .. }) => {
      assert_eq!(expression, "facts.x == ");
      assert_eq!(position, 11);
    }
    other => panic!("expected a parse error, got {:?}", other.map(|m| m.workflow.name)),
  }
}

#[tokio::test]
#[serial]
async fn test_manifest_with_zero_parallelism_is_rejected() {
  setup_tracing();
  let yaml = "name: ci\nconfig:\n  max_parallel: 0\nunits:\n  - name: a\n";
  match Manifest::from_yaml_str(yaml) {
    Err(GantryError::Manifest(err)) => assert!(err.to_string().contains("max_parallel"), "{}", err),
    other => panic!("expected a manifest error, got {:?}", other.map(|m| m.workflow.name)),
  }
}
