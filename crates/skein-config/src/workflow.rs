use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::enums::{DataMover, StagerMode};
use crate::error::ConfigError;
use crate::task::TaskDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub name: String,
  /// Build the graph and materialize scripts without invoking any backend.
  #[serde(default)]
  pub dry: bool,
  #[serde(default)]
  pub data_mover: DataMover,
  #[serde(default)]
  pub stager_mode: StagerMode,
  /// Overrides the engine-wide scratch base for this workflow.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scratch_dir_base: Option<PathBuf>,
  pub tasks: Vec<TaskDef>,
}

impl WorkflowDef {
  /// Parse a workflow definition from a JSON file.
  pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.display().to_string(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
      path: path.display().to_string(),
      message: e.to_string(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::enums::TaskKind;
  use crate::task::BackendDef;

  #[test]
  fn test_parse_workflow_def() {
    let json = r#"{
      "name": "wf",
      "data_mover": "COPY",
      "tasks": [
        { "name": "A", "command": "echo hi > f1", "type": "batch" },
        {
          "name": "B",
          "command": "cat workflow:///A/f1 > f2",
          "type": "slurm",
          "partition": "short",
          "ntasks": 4,
          "remote": { "ip": "10.0.0.5", "user": "hpc" }
        }
      ]
    }"#;

    let def: WorkflowDef = serde_json::from_str(json).unwrap();
    assert_eq!(def.name, "wf");
    assert!(!def.dry);
    assert_eq!(def.data_mover, DataMover::Copy);
    assert_eq!(def.stager_mode, StagerMode::Sequential);
    assert_eq!(def.tasks.len(), 2);
    assert_eq!(def.tasks[0].kind(), TaskKind::Batch);
    assert_eq!(
      def.tasks[1].backend,
      BackendDef::Slurm {
        partition: Some("short".to_string()),
        ntasks: Some(4),
        memory: None,
      }
    );
    assert_eq!(def.tasks[1].remote.as_ref().unwrap().user, "hpc");
  }

  #[test]
  fn test_from_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = WorkflowDef::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("broken.json"));
  }
}
