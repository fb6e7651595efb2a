#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use skein_config::TaskKind;
use skein_executor::{BatchExecutor, CONTEXT_SCRIPT, ExecOutput, Executor, ExecutorError, LocalLauncher, Script};
use skein_runtime::Task;
use skein_workflow::ContextInfo;

/// Context report shared by every recording executor, so staging between
/// them always links.
pub fn local_context() -> ContextInfo {
  ContextInfo {
    machine_type: "single-machine".to_string(),
    ip: "192.0.2.10".to_string(),
    user: "tester".to_string(),
    scp: "none".to_string(),
    ftp: "none".to_string(),
    gridftp: "none".to_string(),
    skycds: "none".to_string(),
  }
}

/// Executor double: answers the context probe with a canned report, runs
/// launcher scripts through real bash and counts everything.
pub struct RecordingExecutor {
  inner: BatchExecutor,
  context: Option<String>,
  fail: bool,
  scripts: Mutex<Vec<String>>,
  prepares: AtomicUsize,
  reclaims: AtomicUsize,
}

impl RecordingExecutor {
  pub fn new() -> Arc<Self> {
    Self::build(local_context(), false)
  }

  /// Every launcher run exits non-zero.
  pub fn failing() -> Arc<Self> {
    Self::build(local_context(), true)
  }

  /// Reports `context` from the probe, e.g. to pose as another host.
  pub fn with_context(context: ContextInfo) -> Arc<Self> {
    Self::build(context, false)
  }

  fn build(context: ContextInfo, fail: bool) -> Arc<Self> {
    Arc::new(Self {
      inner: BatchExecutor::new(Arc::new(LocalLauncher)),
      context: serde_json::to_string(&context).ok(),
      fail,
      scripts: Mutex::new(Vec::new()),
      prepares: AtomicUsize::new(0),
      reclaims: AtomicUsize::new(0),
    })
  }

  pub fn scripts(&self) -> Vec<String> {
    self.scripts.lock().unwrap().clone()
  }

  pub fn launcher_runs(&self) -> usize {
    self
      .scripts()
      .iter()
      .filter(|name| name.as_str() == skein_runtime::LAUNCHER_SCRIPT)
      .count()
  }

  pub fn prepares(&self) -> usize {
    self.prepares.load(Ordering::SeqCst)
  }

  pub fn reclaims(&self) -> usize {
    self.reclaims.load(Ordering::SeqCst)
  }

  pub fn calls(&self) -> usize {
    self.prepares() + self.scripts().len() + self.reclaims()
  }
}

#[async_trait]
impl Executor for RecordingExecutor {
  fn kind(&self) -> TaskKind {
    TaskKind::Batch
  }

  async fn prepare(&self, working_dir: &Path) -> Result<(), ExecutorError> {
    self.prepares.fetch_add(1, Ordering::SeqCst);
    self.inner.prepare(working_dir).await
  }

  async fn run(&self, script: &Script) -> Result<ExecOutput, ExecutorError> {
    self.scripts.lock().unwrap().push(script.name.clone());
    if script.name == CONTEXT_SCRIPT {
      return Ok(ExecOutput {
        exit_code: 0,
        stdout: self.context.clone().unwrap_or_default(),
        stderr: String::new(),
      });
    }
    if self.fail {
      return Ok(ExecOutput {
        exit_code: 1,
        stdout: String::new(),
        stderr: "simulated failure".to_string(),
      });
    }
    self.inner.run(script).await
  }

  async fn reclaim(&self, working_dir: &Path) -> Result<(), ExecutorError> {
    self.reclaims.fetch_add(1, Ordering::SeqCst);
    self.inner.reclaim(working_dir).await
  }
}

/// A task backed by `executor`.
pub fn task(name: &str, command: &str, executor: &Arc<RecordingExecutor>) -> Task {
  Task::new(name, command, Arc::clone(executor) as Arc<dyn Executor>)
}
