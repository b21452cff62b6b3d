// gantry/src/facts/trigger.rs

//! Run-trigger metadata: what started the run.

use serde::{Deserialize, Serialize};
use std::fmt;

const BRANCH_PREFIX: &str = "refs/heads/";

/// The kind of event that started a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  Push,
  PullRequest,
  Release,
  WorkflowDispatch,
  Schedule,
  Other(String),
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EventKind::Push => f.write_str("push"),
      EventKind::PullRequest => f.write_str("pull_request"),
      EventKind::Release => f.write_str("release"),
      EventKind::WorkflowDispatch => f.write_str("workflow_dispatch"),
      EventKind::Schedule => f.write_str("schedule"),
      EventKind::Other(name) => f.write_str(name),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
  pub event: EventKind,
  /// Full ref, e.g. `refs/heads/master` or `refs/tags/v1.0`.
  #[serde(rename = "ref")]
  pub ref_name: String,
  /// Target branch of a pull request. Absent for other events.
  #[serde(default)]
  pub base_ref: Option<String>,
}

impl Trigger {
  pub fn new<S: Into<String>>(event: EventKind, ref_name: S, base_ref: Option<String>) -> Self {
    Self {
      event,
      ref_name: ref_name.into(),
      base_ref,
    }
  }

  pub fn push<S: Into<String>>(ref_name: S) -> Self {
    Self::new(EventKind::Push, ref_name, None)
  }

  pub fn pull_request<H: Into<String>, B: Into<String>>(head_ref: H, base_ref: B) -> Self {
    Self::new(EventKind::PullRequest, head_ref, Some(base_ref.into()))
  }

  /// Branch name of `ref_name`, or `None` if the ref is not a branch (a tag, a
  /// pull request merge ref, ...).
  pub fn branch(&self) -> Option<&str> {
    self.ref_name.strip_prefix(BRANCH_PREFIX)
  }

  /// Base branch of a pull request. Accepts both `master` and `refs/heads/master`.
  pub fn base_branch(&self) -> Option<&str> {
    self
      .base_ref
      .as_deref()
      .map(|base| base.strip_prefix(BRANCH_PREFIX).unwrap_or(base))
  }
}
