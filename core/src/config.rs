// gantry/src/config.rs

//! Static run configuration: the inputs to fact computation that do not come
//! from the trigger, plus scheduler limits.

use crate::error::GantryResult;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
  /// Branch that counts as "main" for `masterPush` / `isPrTargetingMaster`.
  #[serde(default = "default_main_branch")]
  pub main_branch: String,
  /// Static flag feeding the `publishDocs` fact.
  #[serde(default)]
  pub publish_docs: bool,
  /// Upper bound on concurrently running units. `None` means unbounded.
  #[serde(default, deserialize_with = "deserialize_max_parallel")]
  pub max_parallel: Option<usize>,
}

fn deserialize_max_parallel<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
  match Option::<usize>::deserialize(deserializer)? {
    Some(0) => Err(serde::de::Error::custom("max_parallel must be at least 1")),
    other => Ok(other),
  }
}

fn default_main_branch() -> String {
  "master".to_string()
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      main_branch: default_main_branch(),
      publish_docs: false,
      max_parallel: None,
    }
  }
}

impl RunConfig {
  pub fn from_yaml_str(yaml: &str) -> GantryResult<Self> {
    Ok(serde_yaml::from_str(yaml)?)
  }

  pub fn with_main_branch<S: Into<String>>(mut self, branch: S) -> Self {
    self.main_branch = branch.into();
    self
  }

  pub fn with_publish_docs(mut self, publish_docs: bool) -> Self {
    self.publish_docs = publish_docs;
    self
  }

  pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
    // Zero would never schedule anything.
    self.max_parallel = Some(max_parallel.max(1));
    self
  }
}
