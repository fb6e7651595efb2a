//! The task state machine.
//!
//! ```text
//! READY -> WAITING -> RUNNING -> FINISHED
//!             |          |
//!             +----------+-----> FAILED
//! ```
//!
//! Each started task runs as its own tokio task. It blocks on every
//! predecessor's terminal status, fails fast if any of them failed, and
//! otherwise stages its inputs, runs its launcher script and starts its
//! successors.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use skein_config::{DataMover, TaskDef, TaskKind};
use skein_coordination::attribute;
use skein_executor::{CONTEXT_SCRIPT, Executor, ExecutorError, Script, context_probe_script};
use skein_stager::{Site, StagePlan, StageRequest};
use skein_workflow::{ContextInfo, TaskJson, TaskStatus, parse_references};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::dependency::{Dependency, ExternalTask};
use crate::error::{RuntimeError, describe};
use crate::scope::WorkflowScope;
use crate::script::{LauncherParts, StageBlock, input_dir, launcher_script};

/// File name of the generated launcher under the control directory.
pub const LAUNCHER_SCRIPT: &str = "launcher.sh";

/// Observable part of a task's state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskState {
  pub status: TaskStatus,
  pub working_dir: Option<PathBuf>,
}

#[derive(Default)]
struct Edges {
  prevs: Vec<Dependency>,
  nexts: Vec<Weak<Task>>,
}

pub struct Task {
  name: String,
  command: String,
  endpoint: Option<String>,
  data_mover: Option<DataMover>,
  executor: Arc<dyn Executor>,
  state: watch::Sender<TaskState>,
  /// Set when the working directory was generated rather than supplied.
  remove_scratch_dir: AtomicBool,
  /// Consumers that still have to stage this task's output.
  reference_count: Mutex<usize>,
  edges: Mutex<Edges>,
  info: RwLock<Option<ContextInfo>>,
  script: Mutex<Option<String>>,
  history: Mutex<Vec<TaskStatus>>,
  last_error: Mutex<Option<String>>,
  scope: OnceLock<Arc<WorkflowScope>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Task {
  pub fn new(name: impl Into<String>, command: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
    Self {
      name: name.into(),
      command: command.into(),
      endpoint: None,
      data_mover: None,
      executor,
      state: watch::Sender::new(TaskState::default()),
      remove_scratch_dir: AtomicBool::new(false),
      reference_count: Mutex::new(0),
      edges: Mutex::new(Edges::default()),
      info: RwLock::new(None),
      script: Mutex::new(None),
      history: Mutex::new(vec![TaskStatus::Ready]),
      last_error: Mutex::new(None),
      scope: OnceLock::new(),
    }
  }

  pub fn from_def(def: &TaskDef, executor: Arc<dyn Executor>) -> Self {
    let mut task = Self::new(&def.name, &def.command, executor);
    if let Some(dir) = &def.working_dir {
      task = task.with_working_dir(dir);
    }
    if let Some(endpoint) = &def.endpoint {
      task = task.with_endpoint(endpoint);
    }
    if let Some(mover) = def.data_mover {
      task = task.with_data_mover(mover);
    }
    task
  }

  /// Run in a caller-supplied directory. It is never reclaimed.
  pub fn with_working_dir(self, dir: impl Into<PathBuf>) -> Self {
    let dir = dir.into();
    self.state.send_modify(|state| state.working_dir = Some(dir));
    self
  }

  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = Some(endpoint.into());
    self
  }

  /// Mover used for this task's inputs when context reports are missing.
  pub fn with_data_mover(mut self, mover: DataMover) -> Self {
    self.data_mover = Some(mover);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn command(&self) -> &str {
    &self.command
  }

  pub fn kind(&self) -> TaskKind {
    self.executor.kind()
  }

  pub fn workflow_name(&self) -> &str {
    self.scope.get().map(|s| s.name.as_str()).unwrap_or_default()
  }

  /// `<workflow>/<task>`.
  pub fn qualified_name(&self) -> String {
    format!("{}/{}", self.workflow_name(), self.name)
  }

  pub fn status(&self) -> TaskStatus {
    self.state.borrow().status
  }

  pub fn state(&self) -> TaskState {
    self.state.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<TaskState> {
    self.state.subscribe()
  }

  /// Working directory if already assigned.
  pub fn working_dir(&self) -> Option<PathBuf> {
    self.state.borrow().working_dir.clone()
  }

  pub fn removes_scratch_dir(&self) -> bool {
    self.remove_scratch_dir.load(Ordering::Acquire)
  }

  pub fn reference_count(&self) -> usize {
    *lock(&self.reference_count)
  }

  pub fn info(&self) -> Option<ContextInfo> {
    self.info.read().unwrap_or_else(|e| e.into_inner()).clone()
  }

  /// The last launcher script materialized for this task.
  pub fn last_script(&self) -> Option<String> {
    lock(&self.script).clone()
  }

  /// Every status the task went through, starting with `READY`.
  pub fn status_history(&self) -> Vec<TaskStatus> {
    lock(&self.history).clone()
  }

  pub fn last_error(&self) -> Option<String> {
    lock(&self.last_error).clone()
  }

  pub fn prevs(&self) -> Vec<Dependency> {
    lock(&self.edges).prevs.clone()
  }

  pub fn nexts(&self) -> Vec<Arc<Task>> {
    lock(&self.edges)
      .nexts
      .iter()
      .filter_map(Weak::upgrade)
      .collect()
  }

  /// Predecessor names: bare within the workflow, qualified across.
  pub fn prev_names(&self) -> Vec<String> {
    let own = self.workflow_name();
    self.prevs().iter().map(|d| d.display_name(own)).collect()
  }

  pub fn next_names(&self) -> Vec<String> {
    let own = self.workflow_name();
    self
      .nexts()
      .iter()
      .map(|t| {
        if t.workflow_name() == own {
          t.name.clone()
        } else {
          t.qualified_name()
        }
      })
      .collect()
  }

  pub fn to_json(&self) -> TaskJson {
    let state = self.state();
    TaskJson {
      name: self.name.clone(),
      status: state.status,
      working_dir: state.working_dir.map(|dir| dir.display().to_string()),
      command: self.command.clone(),
      kind: self.kind().as_str().to_string(),
      nexts: self.next_names(),
      prevs: self.prev_names(),
    }
  }

  /// Wait until a working directory is assigned.
  ///
  /// Returns `None` if the task ended without one.
  pub async fn get_scratch_dir(&self) -> Option<PathBuf> {
    let mut rx = self.state.subscribe();
    match rx
      .wait_for(|s| s.working_dir.is_some() || s.status.is_terminal())
      .await
    {
      Ok(state) => state.working_dir.clone(),
      Err(_) => None,
    }
  }

  /// Wait until the task reaches `FINISHED` or `FAILED`.
  pub async fn wait_terminal(&self) -> TaskStatus {
    let mut rx = self.state.subscribe();
    match rx.wait_for(|s| s.status.is_terminal()).await {
      Ok(state) => state.status,
      Err(_) => self.status(),
    }
  }

  pub(crate) fn attach(&self, scope: Arc<WorkflowScope>) {
    let _ = self.scope.set(scope);
  }

  pub(crate) fn site(&self) -> Site {
    Site {
      task: self.qualified_name(),
      info: self.info(),
      endpoint: self.endpoint.clone(),
    }
  }

  /// Drop every edge and the reference count.
  pub(crate) fn reset_dependencies(&self) {
    *lock(&self.edges) = Edges::default();
    *lock(&self.reference_count) = 0;
  }

  /// Record that this task consumes `prev`'s output.
  ///
  /// Returns `false` when the edge already exists; a producer is counted once
  /// per consumer however often the command references it.
  pub(crate) fn add_dependency_to(self: &Arc<Self>, prev: &Arc<Task>) -> bool {
    let dependency = Dependency::Local(Arc::downgrade(prev));
    {
      let mut edges = lock(&self.edges);
      if edges.prevs.iter().any(|d| d.same_target(&dependency)) {
        return false;
      }
      edges.prevs.push(dependency);
    }
    lock(&prev.edges).nexts.push(Arc::downgrade(self));
    prev.increment_reference_count();
    true
  }

  pub(crate) fn add_external_dependency(&self, external: Arc<ExternalTask>) -> bool {
    let dependency = Dependency::External(external);
    let mut edges = lock(&self.edges);
    if edges.prevs.iter().any(|d| d.same_target(&dependency)) {
      return false;
    }
    edges.prevs.push(dependency);
    true
  }

  pub(crate) fn increment_reference_count(&self) {
    *lock(&self.reference_count) += 1;
  }

  /// Give back one reference. The decrement that reaches zero reclaims a
  /// generated scratch directory.
  pub(crate) async fn decrement_reference_count(&self) {
    let reached_zero = {
      let mut count = lock(&self.reference_count);
      if *count == 0 {
        warn!(task = %self.qualified_name(), "reference_count_underflow");
        false
      } else {
        *count -= 1;
        *count == 0
      }
    };

    if reached_zero && self.removes_scratch_dir() {
      self.reclaim().await;
    }
  }

  async fn reclaim(&self) {
    let Some(working_dir) = self.working_dir() else {
      return;
    };
    if self.scope.get().is_some_and(|s| s.is_dry()) {
      return;
    }
    match self.executor.reclaim(&working_dir).await {
      Ok(()) => info!(
        task = %self.qualified_name(),
        working_dir = %working_dir.display(),
        "scratch_dir_reclaimed"
      ),
      Err(e) => warn!(
        task = %self.qualified_name(),
        error = %describe(&e),
        "scratch_dir_reclaim_failed"
      ),
    }
  }

  /// Move `READY -> WAITING` and spawn the task's run.
  ///
  /// Returns `false` if the task was already started; concurrent callers race
  /// on a single compare-and-set so exactly one of them wins.
  pub fn start(self: &Arc<Self>) -> bool {
    let started = self.state.send_if_modified(|state| {
      if state.status == TaskStatus::Ready {
        state.status = TaskStatus::Waiting;
        true
      } else {
        false
      }
    });

    if !started {
      debug!(task = %self.qualified_name(), status = %self.status(), "task_already_started");
      return false;
    }

    self.record(TaskStatus::Waiting);
    let task = Arc::clone(self);
    tokio::spawn(async move { task.run().await });
    true
  }

  fn record(&self, status: TaskStatus) {
    lock(&self.history).push(status);
    debug!(task = %self.qualified_name(), status = %status, "task_status_changed");
  }

  fn set_error(&self, message: String) {
    *lock(&self.last_error) = Some(message);
  }

  async fn set_status(&self, scope: &WorkflowScope, status: TaskStatus) {
    self.state.send_modify(|state| state.status = status);
    self.record(status);
    self.report_status(scope, status).await;
  }

  async fn report_status(&self, scope: &WorkflowScope, status: TaskStatus) {
    if let Some(coordinator) = scope.coordinator() {
      if let Err(e) = coordinator
        .update_task_status(scope.id(), &self.name, status)
        .await
      {
        warn!(task = %self.qualified_name(), error = %e, "coordination_update_failed");
      }
    }
  }

  async fn report_attribute(&self, scope: &WorkflowScope, name: &str, value: &str) {
    if let Some(coordinator) = scope.coordinator() {
      if let Err(e) = coordinator
        .update_task(scope.id(), &self.name, name, value)
        .await
      {
        warn!(task = %self.qualified_name(), attribute = %name, error = %e, "coordination_update_failed");
      }
    }
  }

  #[instrument(
    name = "task_run",
    skip(self),
    fields(workflow = %self.workflow_name(), task = %self.name)
  )]
  async fn run(self: Arc<Self>) {
    let Some(scope) = self.scope.get().cloned() else {
      error!("task_not_attached");
      self.state.send_modify(|state| state.status = TaskStatus::Failed);
      self.record(TaskStatus::Failed);
      return;
    };

    self.report_status(&scope, TaskStatus::Waiting).await;

    let qualified = self.qualified_name();
    let prevs = self.prevs();
    let mut failed = Vec::new();

    for dependency in &prevs {
      match dependency.wait_terminal(&qualified, &scope).await {
        Ok(TaskStatus::Failed) => failed.push(dependency.qualified_name()),
        Ok(_) => {}
        Err(e) => {
          self.fail(&scope, &prevs, e).await;
          return;
        }
      }
    }

    if !failed.is_empty() {
      info!(failed_dependencies = ?failed, "task_skipped");
      self.set_error(format!("dependency failed: {}", failed.join(", ")));
      self.release(&prevs).await;
      self.set_status(&scope, TaskStatus::Failed).await;
      return;
    }

    self.set_status(&scope, TaskStatus::Running).await;
    info!("task_started");

    match self.execute(&scope, &prevs).await {
      Ok(()) => {
        self.release(&prevs).await;
        self.set_status(&scope, TaskStatus::Finished).await;
        info!("task_finished");
        self.start_nexts();
      }
      Err(e) => self.fail(&scope, &prevs, e).await,
    }
  }

  async fn fail(&self, scope: &WorkflowScope, prevs: &[Dependency], e: RuntimeError) {
    let message = describe(&e);
    error!(error = %message, "task_failed");
    self.set_error(message);
    self.settle(prevs).await;
    self.release(prevs).await;
    self.set_status(scope, TaskStatus::Failed).await;
  }

  /// Wait for local predecessors that are still in flight. A failure while
  /// waiting on one dependency can leave others running; their output must
  /// not be reclaimed under them.
  async fn settle(&self, prevs: &[Dependency]) {
    for dependency in prevs {
      if let Dependency::Local(task) = dependency {
        if let Some(task) = task.upgrade() {
          if !task.status().is_terminal() {
            debug!(dependency = %task.qualified_name(), "awaiting_dependency_before_release");
            task.wait_terminal().await;
          }
        }
      }
    }
  }

  /// Hand back the reference held on every local predecessor.
  async fn release(&self, prevs: &[Dependency]) {
    for dependency in prevs {
      dependency.release().await;
    }
  }

  fn start_nexts(&self) {
    for next in self.nexts() {
      if next.status() == TaskStatus::Ready {
        debug!(next = %next.qualified_name(), "starting_next");
        next.start();
      }
    }
  }

  fn assign_working_dir(&self, scope: &WorkflowScope) -> PathBuf {
    if let Some(dir) = self.working_dir() {
      return dir;
    }
    let dir = scope.scratch_dir_base.join(scratch_name(&self.name));
    self.remove_scratch_dir.store(true, Ordering::Release);
    self
      .state
      .send_modify(|state| state.working_dir = Some(dir.clone()));
    debug!(working_dir = %dir.display(), "scratch_dir_assigned");
    dir
  }

  async fn execute(&self, scope: &WorkflowScope, prevs: &[Dependency]) -> Result<(), RuntimeError> {
    let working_dir = self.assign_working_dir(scope);
    self
      .report_attribute(scope, attribute::WORKING_DIR, &working_dir.display().to_string())
      .await;
    if let Some(endpoint) = &self.endpoint {
      self
        .report_attribute(scope, attribute::ENDPOINT, endpoint)
        .await;
    }

    if scope.is_dry() {
      let script = self.materialize(scope, prevs, &working_dir, true).await?;
      *lock(&self.script) = Some(script);
      return Ok(());
    }

    let backend = |source: ExecutorError| RuntimeError::Executor {
      task: self.qualified_name(),
      source,
    };

    self.executor.prepare(&working_dir).await.map_err(backend)?;
    self.probe(scope, &working_dir).await.map_err(backend)?;

    let body = self.materialize(scope, prevs, &working_dir, false).await?;
    *lock(&self.script) = Some(body.clone());

    let script = Script::new(self.qualified_name(), LAUNCHER_SCRIPT, body, &working_dir);
    let output = self.executor.run(&script).await.map_err(backend)?;
    if !output.is_success() {
      return Err(RuntimeError::Execution {
        task: self.qualified_name(),
        message: output.failure_message(),
      });
    }

    debug!(exit_code = output.exit_code, "launcher_completed");
    Ok(())
  }

  /// Run the context probe and keep its report. An unusable report leaves
  /// the task without context information, so staging falls back to the
  /// configured mover.
  async fn probe(&self, scope: &WorkflowScope, working_dir: &Path) -> Result<(), ExecutorError> {
    let script = Script::new(
      self.qualified_name(),
      CONTEXT_SCRIPT,
      context_probe_script(working_dir),
      working_dir,
    );
    let output = self.executor.run(&script).await?;
    if output.exit_code != 0 {
      warn!(error = %output.failure_message(), "context_probe_failed");
      return Ok(());
    }

    match ContextInfo::from_probe_output(&output.stdout) {
      Ok(info) => {
        debug!(ip = %info.ip, machine_type = %info.machine_type, "context_probed");
        if let Ok(encoded) = serde_json::to_string(&info) {
          self.report_attribute(scope, attribute::INFO, &encoded).await;
        }
        *self.info.write().unwrap_or_else(|e| e.into_inner()) = Some(info);
      }
      Err(e) => warn!(error = %e, "context_probe_unparsable"),
    }
    Ok(())
  }

  /// Stage every distinct reference and build the launcher script.
  ///
  /// In dry mode nothing is transferred; out-of-band transfers show up as
  /// comments.
  async fn materialize(
    &self,
    scope: &WorkflowScope,
    prevs: &[Dependency],
    working_dir: &Path,
    dry: bool,
  ) -> Result<String, RuntimeError> {
    let task = self.qualified_name();
    let references = parse_references(&self.command).map_err(|source| {
      RuntimeError::MalformedReference {
        task: task.clone(),
        source,
      }
    })?;

    // Resolve every occurrence first: a producer referenced as a whole is
    // staged once as a directory and its path references resolve inside it.
    let mut producers = Vec::with_capacity(references.len());
    for reference in &references {
      let workflow = reference.workflow_or(&scope.name);
      let dependency = prevs
        .iter()
        .find(|d| d.is(workflow, &reference.task))
        .or_else(|| prevs.iter().find(|d| d.name() == reference.task))
        .ok_or_else(|| RuntimeError::DependencyUnresolved {
          task: task.clone(),
          reference: reference.raw(&self.command).to_string(),
        })?;
      producers.push(dependency);
    }
    let whole: HashSet<String> = references
      .iter()
      .zip(&producers)
      .filter(|(reference, _)| reference.path.is_empty())
      .map(|(_, dependency)| dependency.qualified_name())
      .collect();

    let consumer = self.site();
    let default_mover = self.data_mover.unwrap_or(scope.default_mover);
    let mut staged: HashMap<(String, String), PathBuf> = HashMap::new();
    let mut targets = Vec::with_capacity(references.len());
    let mut blocks = Vec::new();

    for (reference, dependency) in references.iter().zip(&producers) {
      let qualified = dependency.qualified_name();
      let stage_path = if whole.contains(&qualified) {
        ""
      } else {
        reference.path.as_str()
      };
      let key = (qualified, stage_path.to_string());

      let staged_target = match staged.get(&key) {
        Some(target) => target.clone(),
        None => {
          let (producer, producer_dir) = dependency.producer()?;
          let inputs = input_dir(working_dir, &dependency.workflow(), &dependency.name());
          let (source, target) = if stage_path.is_empty() {
            (producer_dir, inputs.clone())
          } else {
            (producer_dir.join(stage_path), inputs.join(stage_path))
          };

          let request = StageRequest {
            consumer: &consumer,
            producer: &producer,
            source_path: source.display().to_string(),
            target_path: target.display().to_string(),
            default_mover,
          };

          let fragment = if dry {
            match scope.stager.plan(&request) {
              StagePlan::Directive { script, .. } => Some(script),
              StagePlan::Transfer { mover, request } => Some(format!(
                "# {} transfer {} -> {}\n",
                mover, request.source_path, request.destination_path
              )),
            }
          } else {
            scope
              .stager
              .stage_in(&request)
              .await
              .map_err(|source| RuntimeError::Staging {
                task: task.clone(),
                source,
              })?
          };

          let directory = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| inputs.clone());
          blocks.push(StageBlock {
            directory,
            fragment,
          });
          staged.insert(key, target.clone());
          target
        }
      };

      if stage_path == reference.path {
        targets.push(staged_target);
      } else {
        targets.push(staged_target.join(&reference.path));
      }
    }

    let join = scope.stager.join();
    Ok(launcher_script(&LauncherParts {
      working_dir,
      command: &self.command,
      references: &references,
      targets: &targets,
      blocks: &blocks,
      join: join.as_deref(),
    }))
  }
}

/// `<epoch-millis>-<task>-<suffix>`; the suffix keeps same-named tasks of
/// different workflows apart.
fn scratch_name(task: &str) -> String {
  let millis = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis())
    .unwrap_or_default();
  let suffix = uuid::Uuid::new_v4().simple().to_string();
  format!("{}-{}-{}", millis, task, &suffix[..8])
}

impl fmt::Debug for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task")
      .field("name", &self.name)
      .field("workflow", &self.workflow_name())
      .field("status", &self.status())
      .field("reference_count", &self.reference_count())
      .finish()
  }
}
