// gantry/src/graph/manifest.rs

//! YAML workflow manifests.

use super::definition::Workflow;
use super::unit::{Step, UnitDef};
use crate::config::RunConfig;
use crate::error::{GantryError, GantryResult};
use crate::gate::Gate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{event, Level};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestDoc {
  name: String,
  #[serde(default)]
  config: RunConfig,
  #[serde(default)]
  units: Vec<UnitDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitDoc {
  name: String,
  #[serde(default)]
  needs: Vec<String>,
  #[serde(default, rename = "if")]
  gate: Option<String>,
  #[serde(default)]
  steps: Vec<Step>,
  #[serde(default)]
  outputs: Vec<String>,
  #[serde(default)]
  timeout_secs: Option<u64>,
}

/// A parsed and validated manifest: the workflow plus the run configuration it carries.
#[derive(Debug, Clone)]
pub struct Manifest {
  pub workflow: Workflow,
  pub config: RunConfig,
}

impl Manifest {
  pub fn from_yaml_str(yaml: &str) -> GantryResult<Self> {
    let doc: ManifestDoc = serde_yaml::from_str(yaml)?;
    let mut workflow = Workflow::new(doc.name);
    for unit_doc in doc.units {
      let gate = match &unit_doc.gate {
        Some(expression) => Gate::parse(expression)?,
        None => Gate::default(),
      };
      let mut unit = UnitDef::new(unit_doc.name).needs(unit_doc.needs).gate(gate);
      unit.steps = unit_doc.steps;
      unit.outputs = unit_doc.outputs;
      unit.timeout = unit_doc.timeout_secs.map(Duration::from_secs);
      workflow.add_unit(unit)?;
    }
    workflow.validate()?;
    event!(Level::DEBUG, workflow = %workflow.name, num_units = workflow.len(), "Manifest loaded.");
    Ok(Self {
      workflow,
      config: doc.config,
    })
  }
}

impl Workflow {
  /// Parses a YAML manifest, keeping only the workflow.
  pub fn from_yaml_str(yaml: &str) -> GantryResult<Self> {
    Manifest::from_yaml_str(yaml).map(|m| m.workflow)
  }
}

impl std::str::FromStr for Manifest {
  type Err = GantryError;

  fn from_str(s: &str) -> GantryResult<Self> {
    Manifest::from_yaml_str(s)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const CI: &str = r#"
name: ci
config:
  main_branch: main
  publish_docs: true
  max_parallel: 2
units:
  - name: tests
    steps:
      - name: pytest
        run: pytest -q
  - name: docs
    needs: [tests]
    if: "!failure()"
    outputs: [site]
    steps:
      - name: build
        uses: docs/build@v2
        with:
          dir: site
  - name: deploy-docs
    needs: [docs]
    if: "${{ facts.publishDocs && needs.docs.outputs.site != '' }}"
    timeout_secs: 300
"#;

  #[test]
  fn parses_units_gates_and_config() {
    let manifest = Manifest::from_yaml_str(CI).unwrap();
    assert_eq!(manifest.config.main_branch, "main");
    assert!(manifest.config.publish_docs);
    assert_eq!(manifest.config.max_parallel, Some(2));

    let wf = &manifest.workflow;
    assert_eq!(wf.name, "ci");
    assert_eq!(wf.len(), 3);
    let tests = wf.unit("tests").unwrap();
    assert_eq!(tests.gate, Gate::default());
    assert_eq!(tests.steps[0].run.as_deref(), Some("pytest -q"));

    let docs = wf.unit("docs").unwrap();
    assert_eq!(docs.gate, !Gate::failure());
    assert_eq!(docs.outputs, vec!["site"]);
    assert_eq!(docs.steps[0].with.get("dir").map(String::as_str), Some("site"));

    let deploy = wf.unit("deploy-docs").unwrap();
    assert_eq!(deploy.timeout, Some(Duration::from_secs(300)));
    assert_eq!(
      deploy.gate,
      Gate::fact("publishDocs").and(!Gate::output_eq("docs", "site", ""))
    );
  }

  #[test]
  fn bad_gate_expression_fails_loading() {
    let yaml = "name: ci\nunits:\n  - name: a\n    if: \"facts.x &&\"\n";
    assert!(matches!(
      Manifest::from_yaml_str(yaml),
      Err(GantryError::GateParse { .. })
    ));
  }

  #[test]
  fn unknown_fields_are_rejected() {
    let yaml = "name: ci\nunits:\n  - name: a\n    runs-on: linux\n";
    assert!(matches!(Manifest::from_yaml_str(yaml), Err(GantryError::Manifest(_))));
  }

  #[test]
  fn graph_is_validated() {
    let yaml = "name: ci\nunits:\n  - name: a\n    needs: [b]\n";
    assert!(matches!(
      Workflow::from_yaml_str(yaml),
      Err(GantryError::UnknownPredecessor { .. })
    ));
  }
}
