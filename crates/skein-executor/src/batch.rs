use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use skein_config::TaskKind;
use tracing::{debug, instrument};

use crate::error::ExecutorError;
use crate::executor::{CONTROL_DIR, Executor, Script, reclaimed_path};
use crate::launcher::{CommandSpec, Launcher};
use crate::output::ExecOutput;

/// Runs scripts with `bash` on the launcher's host.
///
/// Behind an [`SshLauncher`](crate::SshLauncher) this is also the cloud
/// adapter: an already provisioned instance reached over ssh.
pub struct BatchExecutor {
  kind: TaskKind,
  launcher: Arc<dyn Launcher>,
}

impl BatchExecutor {
  pub fn new(launcher: Arc<dyn Launcher>) -> Self {
    Self::with_kind(TaskKind::Batch, launcher)
  }

  pub fn with_kind(kind: TaskKind, launcher: Arc<dyn Launcher>) -> Self {
    Self { kind, launcher }
  }

  pub fn launcher(&self) -> &Arc<dyn Launcher> {
    &self.launcher
  }
}

/// Create `<working_dir>/.skein` through a launcher.
pub(crate) async fn prepare_dirs(launcher: &dyn Launcher, working_dir: &Path) -> Result<(), ExecutorError> {
  launcher.create_dir_all(&working_dir.join(CONTROL_DIR)).await
}

/// Move `<working_dir>` to `<working_dir>-removed` through a launcher.
pub(crate) async fn reclaim_dir(launcher: &dyn Launcher, working_dir: &Path) -> Result<(), ExecutorError> {
  let target = reclaimed_path(working_dir);
  debug!(from = %working_dir.display(), to = %target.display(), "scratch_dir_reclaimed");
  launcher.rename(working_dir, &target).await
}

#[async_trait]
impl Executor for BatchExecutor {
  fn kind(&self) -> TaskKind {
    self.kind
  }

  async fn prepare(&self, working_dir: &Path) -> Result<(), ExecutorError> {
    prepare_dirs(self.launcher.as_ref(), working_dir).await
  }

  #[instrument(
    name = "batch_run",
    skip(self, script),
    fields(task = %script.task, script = %script.name)
  )]
  async fn run(&self, script: &Script) -> Result<ExecOutput, ExecutorError> {
    let path = script.path();
    self.launcher.write_file(&path, &script.body).await?;

    let command = CommandSpec::new("bash")
      .arg(path.to_string_lossy())
      .cwd(&script.working_dir);
    self.launcher.exec(&command).await
  }

  async fn reclaim(&self, working_dir: &Path) -> Result<(), ExecutorError> {
    reclaim_dir(self.launcher.as_ref(), working_dir).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::launcher::LocalLauncher;

  #[tokio::test]
  async fn test_prepare_run_reclaim() {
    let base = tempfile::tempdir().unwrap();
    let wd = base.path().join("1-A");
    let executor = BatchExecutor::new(Arc::new(LocalLauncher));

    executor.prepare(&wd).await.unwrap();
    assert!(wd.join(".skein").is_dir());

    let script = Script::new("wf/A", "launcher.sh", "echo hi > f1\ncat f1\n", &wd);
    let output = executor.run(&script).await.unwrap();
    assert!(output.is_success());
    assert_eq!(output.stdout, "hi\n");
    assert!(wd.join(".skein/launcher.sh").is_file());
    assert!(wd.join("f1").is_file());

    executor.reclaim(&wd).await.unwrap();
    assert!(!wd.exists());
    assert!(base.path().join("1-A-removed/f1").is_file());
  }

  #[tokio::test]
  async fn test_failing_script_is_output_not_error() {
    let base = tempfile::tempdir().unwrap();
    let executor = BatchExecutor::new(Arc::new(LocalLauncher));
    executor.prepare(base.path()).await.unwrap();

    let script = Script::new("wf/A", "launcher.sh", "exit 4\n", base.path());
    let output = executor.run(&script).await.unwrap();
    assert_eq!(output.exit_code, 4);
    assert!(!output.is_success());
  }
}
