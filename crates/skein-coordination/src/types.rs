use serde::{Deserialize, Serialize};
use skein_workflow::{ContextInfo, TaskJson};

/// Descriptor of a task registered by another process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
  #[serde(default)]
  pub workflow: String,
  #[serde(flatten)]
  pub task: TaskJson,
  /// Context-probe report of the host the task ran on, once known.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub info: Option<ContextInfo>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub endpoint: Option<String>,
}
