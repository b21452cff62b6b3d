// gantry/examples/manifest_run.rs

use async_trait::async_trait;
use gantry::{GantryError, Manifest, Run, Trigger, UnitContext, UnitExecutor, UnitOutputs};
use std::time::Duration;
use tracing::{info, warn};

const MANIFEST: &str = r#"
name: nightly
config:
  main_branch: main
units:
  - name: build
    outputs: [artifact]
    steps:
      - name: compile
        run: cargo build --release
  - name: soak
    needs: [build]
    steps:
      - name: soak-test
        run: ./soak.sh --hours 6
  - name: notify
    needs: [soak]
    if: "always()"
    steps:
      - name: post
        uses: chat/notify@v1
        with:
          channel: nightly
  - name: upload
    needs: [build, soak]
    if: "facts.masterPush && !cancelled()"
"#;

// 1. An executor that only pretends to run steps.
struct EchoExecutor;

#[async_trait]
impl UnitExecutor for EchoExecutor {
  async fn execute(&self, mut ctx: UnitContext) -> anyhow::Result<UnitOutputs> {
    for step in &ctx.steps {
      info!(unit = %ctx.unit, step = %step.name, run = ?step.run, uses = ?step.uses, "Step.");
    }
    let mut outputs = UnitOutputs::new();
    match ctx.unit.as_str() {
      "build" => {
        outputs.insert("artifact".to_string(), "target/release/app".to_string());
      }
      "soak" => {
        // Long enough to be cancelled below.
        tokio::select! {
          _ = tokio::time::sleep(Duration::from_secs(60)) => {}
          _ = ctx.cancel.cancelled() => anyhow::bail!("soak interrupted"),
        }
      }
      _ => {}
    }
    Ok(outputs)
  }
}

#[tokio::main]
async fn main() -> Result<(), GantryError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Manifest Run Example ---");

  // 2. Load and validate the manifest.
  let manifest: Manifest = MANIFEST.parse()?;

  // 3. Start the run and cancel it while `soak` is still going. `notify`
  //    uses always(), so it still runs; `upload` is cancelled.
  let run = Run::new(manifest.workflow, EchoExecutor).with_config(manifest.config);
  let cancel = run.cancel_handle();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(200)).await;
    warn!("Cancelling the run.");
    cancel.cancel();
  });

  let report = run.execute(&Trigger::push("refs/heads/main")).await?;
  info!("Run cancelled: {}, status: {:?}", report.cancelled, report.status);
  println!("{}", report.to_json()?);

  Ok(())
}
