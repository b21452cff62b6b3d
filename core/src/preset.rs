// gantry/src/preset.rs

//! The CI workflow of a typical library repository: tests and lint in
//! parallel, documentation built whenever nothing upstream failed and deployed
//! only from the main branch, a package published from the main branch, and a
//! pull request summary.

use crate::error::GantryResult;
use crate::facts::{MASTER_PUSH, PR_TARGETING_MASTER, PUBLISH_DOCS};
use crate::gate::Gate;
use crate::graph::{Step, UnitDef, Workflow};

pub const TESTS: &str = "tests";
pub const LINT: &str = "lint";
pub const DOCS: &str = "docs";
pub const DEPLOY_DOCS: &str = "deploy-docs";
pub const PUBLISH: &str = "publish";
pub const RELEASE_NOTES: &str = "release-notes";
pub const PR_REPORT: &str = "pr-report";

/// Builds the CI workflow.
///
/// | unit | needs | gate |
/// |---|---|---|
/// | `tests` | | all predecessors succeeded |
/// | `lint` | | all predecessors succeeded |
/// | `docs` | `tests`, `lint` | `!failure()` |
/// | `deploy-docs` | `docs` | `facts.publishDocs && needs.docs.result == 'success'` |
/// | `publish` | `tests`, `lint`, `docs` | `facts.masterPush && !failure() && !cancelled()` |
/// | `release-notes` | `publish` | `facts.masterPush && needs.publish.result == 'success'` |
/// | `pr-report` | `tests`, `lint` | `facts.isPrTargetingMaster && !cancelled()` |
pub fn ci_workflow() -> GantryResult<Workflow> {
  Workflow::new("ci")
    .with_unit(
      UnitDef::new(TESTS)
        .step(Step::uses("checkout", "actions/checkout@v4"))
        .step(Step::run("install", "pip install -e .[test]"))
        .step(Step::run("test", "pytest --cov")),
    )?
    .with_unit(
      UnitDef::new(LINT)
        .step(Step::uses("checkout", "actions/checkout@v4"))
        .step(Step::run("lint", "flake8 .")),
    )?
    .with_unit(
      UnitDef::new(DOCS)
        .needs([TESTS, LINT])
        .gate(!Gate::failure())
        .step(Step::run("build", "make -C docs html"))
        .output("site"),
    )?
    .with_unit(
      UnitDef::new(DEPLOY_DOCS)
        .needs([DOCS])
        .gate(Gate::fact(PUBLISH_DOCS).and(Gate::succeeded(DOCS)))
        .step(Step::uses("deploy", "peaceiris/actions-gh-pages@v3").with("publish_dir", "docs/_build/html")),
    )?
    .with_unit(
      UnitDef::new(PUBLISH)
        .needs([TESTS, LINT, DOCS])
        .gate(Gate::fact(MASTER_PUSH).and(!Gate::failure()).and(Gate::not_cancelled()))
        .step(Step::run("build", "python -m build"))
        .step(Step::uses("upload", "pypa/gh-action-pypi-publish@release/v1"))
        .output("version"),
    )?
    .with_unit(
      UnitDef::new(RELEASE_NOTES)
        .needs([PUBLISH])
        .gate(Gate::fact(MASTER_PUSH).and(Gate::succeeded(PUBLISH)))
        .step(Step::uses("draft", "release-drafter/release-drafter@v5")),
    )?
    .with_unit(
      UnitDef::new(PR_REPORT)
        .needs([TESTS, LINT])
        .gate(Gate::fact(PR_TARGETING_MASTER).and(Gate::not_cancelled()))
        .step(Step::run("summarize", "echo summary")),
    )
}
