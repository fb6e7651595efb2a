use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use skein_workflow::{ContextInfo, TaskJson, TaskStatus, WorkflowJson};

use crate::types::RemoteTask;
use crate::{CoordinationError, Coordinator, attribute};

/// In-process coordinator.
///
/// Shared between workflows of one process it behaves like the remote
/// service, which makes the cross-process dependency path testable.
#[derive(Default)]
pub struct MemoryCoordinator {
  state: Mutex<State>,
}

#[derive(Default)]
struct State {
  next_id: u64,
  /// workflow id -> workflow name
  workflows: HashMap<u64, String>,
  /// (workflow name, task name) -> descriptor
  tasks: HashMap<(String, String), RemoteTask>,
}

impl MemoryCoordinator {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Register or replace a task descriptor directly, as another process would.
  pub fn publish(&self, remote: RemoteTask) {
    let key = (remote.workflow.clone(), remote.task.name.clone());
    self.lock().tasks.insert(key, remote);
  }

  /// Set a registered task's status directly, as its owning process would.
  pub fn set_status(&self, workflow: &str, task: &str, status: TaskStatus) -> bool {
    let mut state = self.lock();
    match state.tasks.get_mut(&(workflow.to_string(), task.to_string())) {
      Some(remote) => {
        remote.task.status = status;
        true
      }
      None => false,
    }
  }

  /// Snapshot of a task's descriptor.
  pub fn task(&self, workflow: &str, task: &str) -> Option<RemoteTask> {
    self
      .lock()
      .tasks
      .get(&(workflow.to_string(), task.to_string()))
      .cloned()
  }

  fn with_task<F>(&self, workflow_id: u64, task: &str, update: F) -> Result<(), CoordinationError>
  where
    F: FnOnce(&mut RemoteTask),
  {
    let mut state = self.lock();
    let workflow = state
      .workflows
      .get(&workflow_id)
      .cloned()
      .unwrap_or_else(|| workflow_id.to_string());
    match state.tasks.get_mut(&(workflow.clone(), task.to_string())) {
      Some(remote) => {
        update(remote);
        Ok(())
      }
      None => Err(CoordinationError::NotFound {
        workflow,
        task: task.to_string(),
      }),
    }
  }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
  async fn create_workflow(&self, workflow: &WorkflowJson) -> Result<u64, CoordinationError> {
    let mut state = self.lock();
    state.next_id += 1;
    let id = state.next_id;
    state.workflows.insert(id, workflow.name.clone());
    for (_, task) in workflow.tasks.iter() {
      state.tasks.insert(
        (workflow.name.clone(), task.name.clone()),
        RemoteTask {
          workflow: workflow.name.clone(),
          task: task.clone(),
          info: None,
          endpoint: None,
        },
      );
    }
    Ok(id)
  }

  async fn add_task(&self, workflow_id: u64, task: &TaskJson) -> Result<(), CoordinationError> {
    let mut state = self.lock();
    let workflow = state
      .workflows
      .get(&workflow_id)
      .cloned()
      .ok_or_else(|| CoordinationError::NotFound {
        workflow: workflow_id.to_string(),
        task: task.name.clone(),
      })?;
    state.tasks.insert(
      (workflow.clone(), task.name.clone()),
      RemoteTask {
        workflow,
        task: task.clone(),
        info: None,
        endpoint: None,
      },
    );
    Ok(())
  }

  async fn update_task_status(
    &self,
    workflow_id: u64,
    task: &str,
    status: TaskStatus,
  ) -> Result<(), CoordinationError> {
    self.with_task(workflow_id, task, |remote| remote.task.status = status)
  }

  async fn update_task(
    &self,
    workflow_id: u64,
    task: &str,
    name: &str,
    value: &str,
  ) -> Result<(), CoordinationError> {
    self.with_task(workflow_id, task, |remote| match name {
      attribute::WORKING_DIR => remote.task.working_dir = Some(value.to_string()),
      attribute::INFO => remote.info = serde_json::from_str::<ContextInfo>(value).ok(),
      attribute::ENDPOINT => remote.endpoint = Some(value.to_string()),
      _ => {}
    })
  }

  async fn add_dependency(
    &self,
    workflow_id: u64,
    task: &str,
    dependency: &str,
  ) -> Result<(), CoordinationError> {
    let dependency = dependency.to_string();
    self.with_task(workflow_id, task, |remote| {
      if !remote.task.prevs.contains(&dependency) {
        remote.task.prevs.push(dependency);
      }
    })
  }

  async fn get_task(&self, workflow: &str, task: &str) -> Result<RemoteTask, CoordinationError> {
    self
      .task(workflow, task)
      .ok_or_else(|| CoordinationError::NotFound {
        workflow: workflow.to_string(),
        task: task.to_string(),
      })
  }
}
