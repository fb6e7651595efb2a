use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use skein_config::RemoteHost;
use skein_workflow::{quote_path, shell_quote};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::ExecutorError;
use crate::output::ExecOutput;

/// A program invocation on an execution host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  pub stdin: Option<String>,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Default::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  pub fn stdin(mut self, input: impl Into<String>) -> Self {
    self.stdin = Some(input.into());
    self
  }

  /// The invocation as a single shell command line.
  pub fn to_shell(&self) -> String {
    let mut line = shell_quote(&self.program);
    for arg in &self.args {
      line.push(' ');
      line.push_str(&shell_quote(arg));
    }
    match &self.cwd {
      Some(cwd) => format!("cd {} && {}", quote_path(cwd), line),
      None => line,
    }
  }
}

/// Runs programs and touches files on one execution host.
#[async_trait]
pub trait Launcher: Send + Sync {
  async fn exec(&self, command: &CommandSpec) -> Result<ExecOutput, ExecutorError>;

  async fn write_file(&self, path: &Path, contents: &str) -> Result<(), ExecutorError>;

  async fn create_dir_all(&self, path: &Path) -> Result<(), ExecutorError>;

  async fn rename(&self, from: &Path, to: &Path) -> Result<(), ExecutorError>;
}

/// Runs everything on the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLauncher;

#[async_trait]
impl Launcher for LocalLauncher {
  async fn exec(&self, spec: &CommandSpec) -> Result<ExecOutput, ExecutorError> {
    let mut command = Command::new(&spec.program);
    command
      .args(&spec.args)
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .stdin(if spec.stdin.is_some() {
        Stdio::piped()
      } else {
        Stdio::null()
      });
    if let Some(cwd) = &spec.cwd {
      command.current_dir(cwd);
    }

    let spawn_error = |source| ExecutorError::Spawn {
      program: spec.program.clone(),
      source,
    };

    let mut child = command.spawn().map_err(spawn_error)?;
    if let (Some(input), Some(mut stdin)) = (&spec.stdin, child.stdin.take()) {
      stdin.write_all(input.as_bytes()).await.map_err(spawn_error)?;
      drop(stdin);
    }

    let output = child.wait_with_output().await.map_err(spawn_error)?;
    let result = ExecOutput {
      exit_code: output.status.code().unwrap_or(-1),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(program = %spec.program, exit_code = result.exit_code, "command_exited");
    Ok(result)
  }

  async fn write_file(&self, path: &Path, contents: &str) -> Result<(), ExecutorError> {
    tokio::fs::write(path, contents)
      .await
      .map_err(|e| ExecutorError::filesystem("write", path, e))
  }

  async fn create_dir_all(&self, path: &Path) -> Result<(), ExecutorError> {
    tokio::fs::create_dir_all(path)
      .await
      .map_err(|e| ExecutorError::filesystem("mkdir", path, e))
  }

  async fn rename(&self, from: &Path, to: &Path) -> Result<(), ExecutorError> {
    tokio::fs::rename(from, to)
      .await
      .map_err(|e| ExecutorError::filesystem("rename", from, e))
  }
}

/// Runs every operation of the wrapped launcher's host on a remote host over
/// `ssh`.
#[derive(Debug, Clone)]
pub struct SshLauncher<L = LocalLauncher> {
  host: RemoteHost,
  inner: L,
}

impl SshLauncher<LocalLauncher> {
  pub fn new(host: RemoteHost) -> Self {
    Self::wrap(host, LocalLauncher)
  }
}

impl<L: Launcher> SshLauncher<L> {
  pub fn wrap(host: RemoteHost, inner: L) -> Self {
    Self { host, inner }
  }

  pub fn host(&self) -> &RemoteHost {
    &self.host
  }

  /// `ssh` invocation running `remote` on the host.
  pub fn ssh_command(&self, remote: String) -> CommandSpec {
    let mut spec = CommandSpec::new("ssh");
    if let Some(key) = &self.host.key_path {
      spec = spec.arg("-i").arg(key.to_string_lossy());
    }
    spec
      .args(["-o", "BatchMode=yes", "-o", "StrictHostKeyChecking=no"])
      .arg(format!("{}@{}", self.host.user, self.host.ip))
      .arg(remote)
  }

  async fn run_checked(&self, operation: &'static str, path: &Path, remote: String) -> Result<(), ExecutorError> {
    let output = self.inner.exec(&self.ssh_command(remote)).await?;
    if output.exit_code != 0 {
      return Err(ExecutorError::filesystem(operation, path, output.failure_message()));
    }
    Ok(())
  }
}

#[async_trait]
impl<L: Launcher> Launcher for SshLauncher<L> {
  async fn exec(&self, command: &CommandSpec) -> Result<ExecOutput, ExecutorError> {
    let mut spec = self.ssh_command(command.to_shell());
    spec.stdin = command.stdin.clone();
    self.inner.exec(&spec).await
  }

  async fn write_file(&self, path: &Path, contents: &str) -> Result<(), ExecutorError> {
    let mut spec = self.ssh_command(format!("cat > {}", quote_path(path)));
    spec.stdin = Some(contents.to_string());
    let output = self.inner.exec(&spec).await?;
    if output.exit_code != 0 {
      return Err(ExecutorError::filesystem("write", path, output.failure_message()));
    }
    Ok(())
  }

  async fn create_dir_all(&self, path: &Path) -> Result<(), ExecutorError> {
    self
      .run_checked("mkdir", path, format!("mkdir -p {}", quote_path(path)))
      .await
  }

  async fn rename(&self, from: &Path, to: &Path) -> Result<(), ExecutorError> {
    self
      .run_checked("rename", from, format!("mv {} {}", quote_path(from), quote_path(to)))
      .await
  }
}
