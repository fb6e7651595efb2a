//! A workflow: an ordered set of tasks plus the driver that runs them.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;
use skein_config::{DataMover, StagerMode};
use skein_coordination::Coordinator;
use skein_stager::Stager;
use skein_workflow::{Graph, TaskStatus, WorkflowJson};
use tracing::{debug, info, instrument, warn};

use crate::error::{RuntimeError, describe};
use crate::registry::Registry;
use crate::resolver;
use crate::scope::{ScopeParts, WorkflowScope};
use crate::summary::RunSummary;
use crate::task::Task;

/// Builder for [`Workflow`].
pub struct WorkflowBuilder {
  name: String,
  dry: bool,
  scratch_dir_base: PathBuf,
  data_mover: DataMover,
  stager: Option<Stager>,
  registry: Option<Registry>,
  coordinator: Option<Arc<dyn Coordinator>>,
  poll_interval: Duration,
  poll_timeout: Option<Duration>,
}

impl WorkflowBuilder {
  fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      dry: false,
      scratch_dir_base: std::env::temp_dir().join("skein"),
      data_mover: DataMover::default(),
      stager: None,
      registry: None,
      coordinator: None,
      poll_interval: Duration::from_secs(1),
      poll_timeout: None,
    }
  }

  pub fn dry(mut self, dry: bool) -> Self {
    self.dry = dry;
    self
  }

  /// Directory under which generated scratch directories are created.
  pub fn scratch_dir_base(mut self, base: impl Into<PathBuf>) -> Self {
    self.scratch_dir_base = base.into();
    self
  }

  pub fn data_mover(mut self, mover: DataMover) -> Self {
    self.data_mover = mover;
    self
  }

  pub fn stager(mut self, stager: Stager) -> Self {
    self.stager = Some(stager);
    self
  }

  /// Share a registry with other workflows so they can reference each other.
  pub fn registry(mut self, registry: Registry) -> Self {
    self.registry = Some(registry);
    self
  }

  pub fn coordinator(mut self, coordinator: Arc<dyn Coordinator>) -> Self {
    self.coordinator = Some(coordinator);
    self
  }

  /// Interval between status polls of remote dependencies.
  pub fn poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = interval;
    self
  }

  /// Bound the wait on a remote dependency. Unset waits forever.
  pub fn poll_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.poll_timeout = timeout;
    self
  }

  /// Register the workflow name and build the workflow.
  pub fn build(self) -> Result<Workflow, RuntimeError> {
    let registry = self.registry.unwrap_or_default();
    registry.register_workflow(&self.name)?;

    let scope = WorkflowScope::new(ScopeParts {
      name: self.name,
      dry: self.dry,
      default_mover: self.data_mover,
      scratch_dir_base: self.scratch_dir_base,
      stager: self
        .stager
        .unwrap_or_else(|| Stager::new(StagerMode::default())),
      registry,
      coordinator: self.coordinator,
      poll_interval: self.poll_interval,
      poll_timeout: self.poll_timeout,
    });

    Ok(Workflow {
      scope: Arc::new(scope),
      tasks: Vec::new(),
      resolved: AtomicBool::new(false),
      registered: AtomicBool::new(false),
    })
  }
}

pub struct Workflow {
  scope: Arc<WorkflowScope>,
  tasks: Vec<Arc<Task>>,
  resolved: AtomicBool,
  registered: AtomicBool,
}

impl Workflow {
  pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
    WorkflowBuilder::new(name)
  }

  pub fn name(&self) -> &str {
    &self.scope.name
  }

  /// Identifier assigned by the coordination service, 0 without one.
  pub fn id(&self) -> u64 {
    self.scope.id()
  }

  pub fn registry(&self) -> &Registry {
    &self.scope.registry
  }

  pub fn is_dry(&self) -> bool {
    self.scope.is_dry()
  }

  pub fn set_dry(&self, dry: bool) {
    self.scope.set_dry(dry);
  }

  pub fn tasks(&self) -> &[Arc<Task>] {
    &self.tasks
  }

  pub fn task(&self, name: &str) -> Option<&Arc<Task>> {
    self.tasks.iter().find(|t| t.name() == name)
  }

  /// Take ownership of a task. Its name must be unique in the workflow.
  pub fn add_task(&mut self, task: Task) -> Result<Arc<Task>, RuntimeError> {
    let task = Arc::new(task);
    task.attach(Arc::clone(&self.scope));
    self.scope.registry.register_task(&self.scope.name, &task)?;
    self.tasks.push(Arc::clone(&task));
    self.resolved.store(false, Ordering::Release);
    Ok(task)
  }

  /// Rebuild every edge and reference count from the task commands.
  #[instrument(name = "workflow_make_dependencies", skip(self), fields(workflow = %self.name()))]
  pub async fn make_dependencies(&self) -> Result<(), RuntimeError> {
    self.register_remote().await;
    self.reset();
    self.discover().await?;
    self.mark_resolved();
    Ok(())
  }

  pub(crate) fn reset(&self) {
    for task in &self.tasks {
      task.reset_dependencies();
    }
  }

  pub(crate) fn mark_resolved(&self) {
    self.resolved.store(true, Ordering::Release);
  }

  pub(crate) fn is_resolved(&self) -> bool {
    self.resolved.load(Ordering::Acquire)
  }

  pub(crate) async fn discover(&self) -> Result<(), RuntimeError> {
    let mut edges = 0;
    for task in &self.tasks {
      let linked = resolver::discover(task, &self.scope).await?;
      edges += linked.len();
      if let Some(coordinator) = self.scope.coordinator() {
        for dependency in &linked {
          if let Err(e) = coordinator
            .add_dependency(self.scope.id(), task.name(), dependency)
            .await
          {
            warn!(task = %task.qualified_name(), error = %e, "coordination_update_failed");
          }
        }
      }
    }
    debug!(workflow = %self.name(), edges, "dependencies_discovered");
    Ok(())
  }

  /// Announce the workflow and its tasks to the coordination service once.
  ///
  /// Any failure disables the service for the rest of the run.
  pub(crate) async fn register_remote(&self) {
    let Some(coordinator) = self.scope.coordinator() else {
      return;
    };
    if self.registered.swap(true, Ordering::AcqRel) {
      return;
    }

    let workflow = self.to_json();
    let id = match coordinator.create_workflow(&workflow).await {
      Ok(id) => id,
      Err(e) => {
        self.scope.disable_coordinator(&describe(&e));
        return;
      }
    };
    self.scope.set_id(id);

    for task in &self.tasks {
      if let Err(e) = coordinator.add_task(id, &task.to_json()).await {
        self.scope.disable_coordinator(&describe(&e));
        return;
      }
    }
    info!(workflow = %self.name(), id, "workflow_registered");
  }

  /// The dependency graph over qualified task names.
  pub fn graph(&self) -> Graph {
    let mut graph = Graph::new();
    add_edges(&mut graph, &self.tasks);
    graph
  }

  /// Reject dependency cycles.
  pub fn validate(&self) -> Result<(), RuntimeError> {
    match self.graph().find_cycle() {
      Some(cycle) => Err(RuntimeError::CycleDetected { cycle }),
      None => Ok(()),
    }
  }

  /// Resolve dependencies if needed, validate, then run every task and wait
  /// for all of them to settle.
  #[instrument(name = "workflow_run", skip(self), fields(workflow = %self.name()))]
  pub async fn run(&self) -> Result<RunSummary, RuntimeError> {
    if !self.is_resolved() {
      self.make_dependencies().await?;
    }
    self.validate()?;
    Ok(self.launch().await)
  }

  /// Start every task and wait for all of them to reach a terminal status.
  pub(crate) async fn launch(&self) -> RunSummary {
    info!(
      workflow = %self.name(),
      tasks = self.tasks.len(),
      dry = self.is_dry(),
      "workflow_started"
    );

    for task in &self.tasks {
      task.start();
    }
    let statuses = join_all(self.tasks.iter().map(|t| t.wait_terminal())).await;

    let mut summary = RunSummary::new(self.name());
    for (task, status) in self.tasks.iter().zip(statuses) {
      match status {
        TaskStatus::Failed => summary.failed.push(task.qualified_name()),
        _ => summary.finished.push(task.qualified_name()),
      }
    }

    info!(
      workflow = %self.name(),
      finished = summary.finished.len(),
      failed = summary.failed.len(),
      "workflow_completed"
    );
    summary
  }

  pub fn to_json(&self) -> WorkflowJson {
    let mut json = WorkflowJson::new(self.name(), self.id());
    for task in &self.tasks {
      json.tasks.insert(task.name(), task.to_json());
    }
    json
  }
}

impl Drop for Workflow {
  fn drop(&mut self) {
    self.scope.registry.unregister_workflow(&self.scope.name);
  }
}

impl std::fmt::Debug for Workflow {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Workflow")
      .field("name", &self.name())
      .field("id", &self.id())
      .field("tasks", &self.tasks.len())
      .finish()
  }
}

/// Add `prev -> task` edges for every task, keyed by qualified name.
pub(crate) fn add_edges(graph: &mut Graph, tasks: &[Arc<Task>]) {
  for task in tasks {
    let node = task.qualified_name();
    graph.add_node(node.clone());
    for dependency in task.prevs() {
      graph.add_edge(dependency.qualified_name(), node.clone());
    }
  }
}
