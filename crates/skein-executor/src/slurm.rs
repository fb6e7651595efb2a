use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use skein_config::TaskKind;
use tracing::instrument;

use crate::batch::{prepare_dirs, reclaim_dir};
use crate::error::ExecutorError;
use crate::executor::{CONTROL_DIR, Executor, Script};
use crate::launcher::{CommandSpec, Launcher};
use crate::output::ExecOutput;
use crate::probe::CONTEXT_SCRIPT;

/// Submits scripts to a Slurm cluster with a blocking `sbatch -W`.
pub struct SlurmExecutor {
  launcher: Arc<dyn Launcher>,
  partition: Option<String>,
  ntasks: Option<u32>,
  memory: Option<u64>,
}

impl SlurmExecutor {
  pub fn new(launcher: Arc<dyn Launcher>) -> Self {
    Self {
      launcher,
      partition: None,
      ntasks: None,
      memory: None,
    }
  }

  pub fn with_partition(mut self, partition: Option<String>) -> Self {
    self.partition = partition;
    self
  }

  pub fn with_ntasks(mut self, ntasks: Option<u32>) -> Self {
    self.ntasks = ntasks;
    self
  }

  /// Memory in megabytes.
  pub fn with_memory(mut self, memory: Option<u64>) -> Self {
    self.memory = memory;
    self
  }

  /// The `sbatch` invocation for a script. The context probe runs on the
  /// submitting host with plain `bash`.
  pub fn command(&self, script: &Script) -> CommandSpec {
    let path = script.path();
    if script.name == CONTEXT_SCRIPT {
      return CommandSpec::new("bash")
        .arg(path.to_string_lossy())
        .cwd(&script.working_dir);
    }

    let mut command = CommandSpec::new("sbatch");
    if let Some(partition) = &self.partition {
      command = command.arg(format!("--partition={partition}"));
    }
    if let Some(ntasks) = self.ntasks {
      command = command.arg(format!("--ntasks={ntasks}"));
    }
    if let Some(memory) = self.memory {
      command = command.arg(format!("--mem={memory}"));
    }

    let job_name = script.task.rsplit('/').next().unwrap_or(&script.task);
    let output = script.working_dir.join(CONTROL_DIR).join("slurm-%j.out");

    command
      .arg("-J")
      .arg(job_name)
      .arg("-D")
      .arg(script.working_dir.to_string_lossy())
      .arg(format!("--output={}", output.display()))
      .arg("-W")
      .arg(path.to_string_lossy())
      .cwd(&script.working_dir)
  }
}

#[async_trait]
impl Executor for SlurmExecutor {
  fn kind(&self) -> TaskKind {
    TaskKind::Slurm
  }

  async fn prepare(&self, working_dir: &Path) -> Result<(), ExecutorError> {
    prepare_dirs(self.launcher.as_ref(), working_dir).await
  }

  #[instrument(
    name = "slurm_run",
    skip(self, script),
    fields(task = %script.task, script = %script.name)
  )]
  async fn run(&self, script: &Script) -> Result<ExecOutput, ExecutorError> {
    self.launcher.write_file(&script.path(), &script.body).await?;
    self.launcher.exec(&self.command(script)).await
  }

  async fn reclaim(&self, working_dir: &Path) -> Result<(), ExecutorError> {
    reclaim_dir(self.launcher.as_ref(), working_dir).await
  }
}
