use std::path::PathBuf;
use std::sync::Arc;

use skein_config::{BackendDef, TaskDef, TaskKind};

use crate::batch::BatchExecutor;
use crate::docker::DockerExecutor;
use crate::error::ExecutorError;
use crate::executor::Executor;
use crate::launcher::{Launcher, LocalLauncher, SshLauncher};
use crate::slurm::SlurmExecutor;

/// Builds the adapter for a task from its backend definition.
#[derive(Debug, Clone)]
pub struct ExecutorFactory {
  scratch_dir_base: PathBuf,
}

impl ExecutorFactory {
  pub fn new(scratch_dir_base: impl Into<PathBuf>) -> Self {
    Self {
      scratch_dir_base: scratch_dir_base.into(),
    }
  }

  /// A task with a `remote` host gets its adapter behind an ssh launcher.
  pub fn build(&self, task: &TaskDef) -> Result<Arc<dyn Executor>, ExecutorError> {
    let launcher: Arc<dyn Launcher> = match &task.remote {
      Some(host) => Arc::new(SshLauncher::new(host.clone())),
      None => Arc::new(LocalLauncher),
    };

    let executor: Arc<dyn Executor> = match &task.backend {
      BackendDef::Batch => Arc::new(BatchExecutor::new(launcher)),
      BackendDef::Slurm {
        partition,
        ntasks,
        memory,
      } => Arc::new(
        SlurmExecutor::new(launcher)
          .with_partition(partition.clone())
          .with_ntasks(*ntasks)
          .with_memory(*memory),
      ),
      BackendDef::Docker {
        image,
        container_id,
      } => {
        if image.is_none() && container_id.is_none() {
          return Err(ExecutorError::InvalidBackend {
            task: task.name.clone(),
            message: "docker tasks need an image or a container_id".to_string(),
          });
        }
        Arc::new(
          DockerExecutor::new(launcher, image.clone(), self.scratch_dir_base.clone())
            .with_container(container_id.clone()),
        )
      }
      BackendDef::Cloud => {
        if task.remote.is_none() {
          return Err(ExecutorError::InvalidBackend {
            task: task.name.clone(),
            message: "cloud tasks need a remote host".to_string(),
          });
        }
        Arc::new(BatchExecutor::with_kind(TaskKind::Cloud, launcher))
      }
    };

    Ok(executor)
  }
}

#[cfg(test)]
mod tests {
  use skein_config::RemoteHost;

  use super::*;

  fn task(backend: BackendDef, remote: Option<RemoteHost>) -> TaskDef {
    TaskDef {
      name: "A".to_string(),
      command: "true".to_string(),
      backend,
      working_dir: None,
      endpoint: None,
      data_mover: None,
      remote,
    }
  }

  fn host() -> RemoteHost {
    RemoteHost {
      ip: "203.0.113.4".to_string(),
      user: "ubuntu".to_string(),
      key_path: None,
    }
  }

  #[test]
  fn test_kind_follows_backend() {
    let factory = ExecutorFactory::new("/tmp/skein");

    let cases = [
      (BackendDef::Batch, None, TaskKind::Batch),
      (
        BackendDef::Slurm {
          partition: None,
          ntasks: Some(2),
          memory: None,
        },
        None,
        TaskKind::Slurm,
      ),
      (
        BackendDef::Docker {
          image: Some("ubuntu".to_string()),
          container_id: None,
        },
        Some(host()),
        TaskKind::Docker,
      ),
      (BackendDef::Cloud, Some(host()), TaskKind::Cloud),
    ];

    for (backend, remote, kind) in cases {
      let executor = factory.build(&task(backend, remote)).unwrap();
      assert_eq!(executor.kind(), kind);
    }
  }

  #[test]
  fn test_cloud_without_remote_is_rejected() {
    let factory = ExecutorFactory::new("/tmp/skein");
    let err = factory.build(&task(BackendDef::Cloud, None)).err().unwrap();
    assert!(matches!(err, ExecutorError::InvalidBackend { .. }));
  }

  #[test]
  fn test_docker_without_image_is_rejected() {
    let factory = ExecutorFactory::new("/tmp/skein");
    let backend = BackendDef::Docker {
      image: None,
      container_id: None,
    };
    assert!(factory.build(&task(backend, None)).is_err());
  }
}
