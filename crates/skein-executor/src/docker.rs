use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use skein_config::TaskKind;
use tokio::sync::OnceCell;
use tracing::{info, instrument};

use crate::batch::{prepare_dirs, reclaim_dir};
use crate::error::ExecutorError;
use crate::executor::{Executor, Script};
use crate::launcher::{CommandSpec, Launcher};
use crate::output::ExecOutput;

/// Runs scripts inside a docker container.
///
/// Unless an existing container is named, one detached container is created
/// from the image on first use, with the scratch base bind-mounted at the
/// same path so working directories resolve identically inside and out.
pub struct DockerExecutor {
  launcher: Arc<dyn Launcher>,
  image: Option<String>,
  scratch_dir_base: PathBuf,
  container: OnceCell<String>,
}

impl DockerExecutor {
  pub fn new(launcher: Arc<dyn Launcher>, image: Option<String>, scratch_dir_base: PathBuf) -> Self {
    Self {
      launcher,
      image,
      scratch_dir_base,
      container: OnceCell::new(),
    }
  }

  /// Use an already running container instead of creating one.
  pub fn with_container(self, container_id: Option<String>) -> Self {
    Self {
      container: OnceCell::new_with(container_id),
      ..self
    }
  }

  pub fn create_command(&self, image: &str) -> CommandSpec {
    let base = self.scratch_dir_base.to_string_lossy();
    CommandSpec::new("docker").args([
      "run".to_string(),
      "-d".to_string(),
      "-t".to_string(),
      "-v".to_string(),
      format!("{base}:{base}"),
      image.to_string(),
      "/bin/sh".to_string(),
    ])
  }

  pub fn exec_command(container_id: &str, script: &Script) -> CommandSpec {
    CommandSpec::new("docker").args([
      "exec".to_string(),
      "-w".to_string(),
      script.working_dir.to_string_lossy().into_owned(),
      container_id.to_string(),
      "bash".to_string(),
      script.path().to_string_lossy().into_owned(),
    ])
  }

  async fn container_id(&self) -> Result<&str, ExecutorError> {
    let id = self
      .container
      .get_or_try_init(|| async {
        let image = self.image.as_deref().ok_or_else(|| ExecutorError::Container {
          message: "neither an image nor a container id was given".to_string(),
        })?;
        let output = self.launcher.exec(&self.create_command(image)).await?;
        if output.exit_code != 0 {
          return Err(ExecutorError::Container {
            message: output.failure_message(),
          });
        }
        let id = output.stdout.trim().to_string();
        info!(image = %image, container = %id, "container_created");
        Ok::<String, ExecutorError>(id)
      })
      .await?;
    Ok(id.as_str())
  }
}

#[async_trait]
impl Executor for DockerExecutor {
  fn kind(&self) -> TaskKind {
    TaskKind::Docker
  }

  async fn prepare(&self, working_dir: &Path) -> Result<(), ExecutorError> {
    prepare_dirs(self.launcher.as_ref(), working_dir).await
  }

  #[instrument(
    name = "docker_run",
    skip(self, script),
    fields(task = %script.task, script = %script.name)
  )]
  async fn run(&self, script: &Script) -> Result<ExecOutput, ExecutorError> {
    self.launcher.write_file(&script.path(), &script.body).await?;
    let container_id = self.container_id().await?;
    self
      .launcher
      .exec(&Self::exec_command(container_id, script))
      .await
  }

  async fn reclaim(&self, working_dir: &Path) -> Result<(), ExecutorError> {
    reclaim_dir(self.launcher.as_ref(), working_dir).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::launcher::LocalLauncher;

  #[test]
  fn test_create_mounts_scratch_base() {
    let executor = DockerExecutor::new(
      Arc::new(LocalLauncher),
      Some("ubuntu:24.04".to_string()),
      PathBuf::from("/tmp/skein"),
    );
    let command = executor.create_command("ubuntu:24.04");
    assert_eq!(
      command.args,
      vec!["run", "-d", "-t", "-v", "/tmp/skein:/tmp/skein", "ubuntu:24.04", "/bin/sh"]
    );
  }

  #[test]
  fn test_exec_runs_in_working_dir() {
    let script = Script::new("wf/A", "launcher.sh", "", "/tmp/skein/1-A");
    let command = DockerExecutor::exec_command("abc123", &script);
    assert_eq!(
      command.args,
      vec!["exec", "-w", "/tmp/skein/1-A", "abc123", "bash", "/tmp/skein/1-A/.skein/launcher.sh"]
    );
  }

  #[tokio::test]
  async fn test_given_container_is_reused() {
    let executor = DockerExecutor::new(Arc::new(LocalLauncher), None, PathBuf::from("/tmp/skein"))
      .with_container(Some("existing".to_string()));
    assert_eq!(executor.container_id().await.unwrap(), "existing");
  }

  #[tokio::test]
  async fn test_missing_image_and_container_fails() {
    let executor = DockerExecutor::new(Arc::new(LocalLauncher), None, PathBuf::from("/tmp/skein"));
    assert!(matches!(
      executor.container_id().await,
      Err(ExecutorError::Container { .. })
    ));
  }
}
