use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::enums::{DataMover, TaskKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  pub name: String,
  /// Command template; may embed `workflow://` references.
  pub command: String,
  #[serde(flatten)]
  pub backend: BackendDef,
  /// Caller-supplied working directory. When absent a scratch directory is
  /// generated and reclaimed once every consumer is done with it.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub working_dir: Option<PathBuf>,
  /// Transfer-service endpoint id of the host running this task.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub endpoint: Option<String>,
  /// Overrides the workflow's default mover for this task's inputs.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data_mover: Option<DataMover>,
  /// Run the task on another host over SSH.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remote: Option<RemoteHost>,
}

impl TaskDef {
  pub fn kind(&self) -> TaskKind {
    self.backend.kind()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendDef {
  Batch,
  Slurm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    partition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ntasks: Option<u32>,
    /// Memory in megabytes, passed to `--mem`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    memory: Option<u64>,
  },
  Docker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    container_id: Option<String>,
  },
  /// An already provisioned cloud instance; requires `remote`.
  Cloud,
}

impl BackendDef {
  pub fn kind(&self) -> TaskKind {
    match self {
      BackendDef::Batch => TaskKind::Batch,
      BackendDef::Slurm { .. } => TaskKind::Slurm,
      BackendDef::Docker { .. } => TaskKind::Docker,
      BackendDef::Cloud => TaskKind::Cloud,
    }
  }
}

/// SSH coordinates of a remote execution host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHost {
  pub ip: String,
  pub user: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub key_path: Option<PathBuf>,
}
