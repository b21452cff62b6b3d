// gantry/examples/ci_preset.rs

use gantry::preset::{self, DOCS, PUBLISH, TESTS};
use gantry::{GantryResult, HandlerExecutor, Run, RunConfig, Trigger, UnitOutputs};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> GantryResult<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- CI Preset Example ---");

  // 1. The built-in CI workflow: tests, lint, docs, deploy-docs, publish,
  //    release-notes and pr-report.
  let workflow = preset::ci_workflow()?;

  // 2. Handlers stand in for a real step runner. Units without steps or
  //    handlers succeed on their own; every preset unit has steps, so each
  //    one gets a handler.
  let mut executor = HandlerExecutor::new();
  for unit in workflow.units() {
    let name = unit.name.clone();
    executor.on_unit(&unit.name, move |ctx| {
      let name = name.clone();
      async move {
        info!(unit = %name, facts = %ctx.facts_env_text().trim_end().replace('\n', " "), "Running unit.");
        let mut outputs = UnitOutputs::new();
        match name.as_str() {
          DOCS => {
            outputs.insert("site".to_string(), "docs/_build/html".to_string());
          }
          PUBLISH => {
            outputs.insert("version".to_string(), "0.4.2".to_string());
          }
          TESTS if ctx.fact("isPrTargetingMaster") == Some(true) => {
            info!("Pull request build, running the quick test matrix.");
          }
          _ => {}
        }
        Ok(outputs)
      }
    });
  }

  // 3. Run it for a push to master and for a pull request. The executor is
  //    shared between runs through an Arc.
  let executor = Arc::new(executor);
  let config = RunConfig::default().with_publish_docs(true);
  for trigger in [
    Trigger::push("refs/heads/master"),
    Trigger::pull_request("refs/pull/42/merge", "master"),
  ] {
    let report = Run::new(preset::ci_workflow()?, executor.clone())
      .with_config(config.clone())
      .execute(&trigger)
      .await?;
    info!("{} {} -> {:?}", trigger.event, trigger.ref_name, report.status);
    for (unit, record) in &report.units {
      info!("  {:<14} {}", unit, record.outcome);
    }
  }

  Ok(())
}
