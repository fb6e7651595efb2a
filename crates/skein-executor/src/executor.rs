use std::path::{Path, PathBuf};

use async_trait::async_trait;
use skein_config::TaskKind;

use crate::error::ExecutorError;
use crate::output::ExecOutput;

/// Control subdirectory of every working directory. Holds the generated
/// scripts, captured output and staged inputs.
pub const CONTROL_DIR: &str = ".skein";

/// A script ready to run inside a task's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
  /// Qualified task name, for logs.
  pub task: String,
  /// File name under the control directory, e.g. `launcher.sh`.
  pub name: String,
  pub body: String,
  pub working_dir: PathBuf,
}

impl Script {
  pub fn new(task: impl Into<String>, name: impl Into<String>, body: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
    Self {
      task: task.into(),
      name: name.into(),
      body: body.into(),
      working_dir: working_dir.into(),
    }
  }

  /// Where the script is written on the execution host.
  pub fn path(&self) -> PathBuf {
    self.working_dir.join(CONTROL_DIR).join(&self.name)
  }
}

/// Path a reclaimed scratch directory is moved to.
pub fn reclaimed_path(working_dir: &Path) -> PathBuf {
  let mut name = working_dir.as_os_str().to_owned();
  name.push("-removed");
  PathBuf::from(name)
}

/// Capability every backend provides to a task.
#[async_trait]
pub trait Executor: Send + Sync {
  fn kind(&self) -> TaskKind;

  /// Create the working directory and its control subdirectory.
  async fn prepare(&self, working_dir: &Path) -> Result<(), ExecutorError>;

  /// Write the script to [`Script::path`] and run it.
  ///
  /// A script that runs and fails is reported through [`ExecOutput`], not as
  /// an error.
  async fn run(&self, script: &Script) -> Result<ExecOutput, ExecutorError>;

  /// Move a scratch directory out of the way once no consumer needs it.
  async fn reclaim(&self, working_dir: &Path) -> Result<(), ExecutorError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_script_path() {
    let script = Script::new("wf/A", "launcher.sh", "echo hi", "/tmp/skein/1-A");
    assert_eq!(script.path(), PathBuf::from("/tmp/skein/1-A/.skein/launcher.sh"));
  }

  #[test]
  fn test_reclaimed_path() {
    assert_eq!(
      reclaimed_path(Path::new("/tmp/skein/1-A")),
      PathBuf::from("/tmp/skein/1-A-removed")
    );
  }
}
