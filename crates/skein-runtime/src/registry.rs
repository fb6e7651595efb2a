//! Process-wide lookup of workflows and their tasks.
//!
//! A registry is created once (explicitly, or by a [`MetaWorkflow`]) and
//! handed to every workflow that should be able to reference the others.
//!
//! [`MetaWorkflow`]: crate::MetaWorkflow

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::error::RuntimeError;
use crate::task::Task;

#[derive(Clone, Default)]
pub struct Registry {
  inner: Arc<RwLock<Entries>>,
}

#[derive(Default)]
struct Entries {
  workflows: Vec<String>,
  /// (workflow, task name, task) in registration order.
  tasks: Vec<(String, String, Weak<Task>)>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  fn read(&self) -> RwLockReadGuard<'_, Entries> {
    self.inner.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> RwLockWriteGuard<'_, Entries> {
    self.inner.write().unwrap_or_else(|e| e.into_inner())
  }

  /// Whether both handles point at the same registry.
  pub fn same(&self, other: &Registry) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  pub fn workflows(&self) -> Vec<String> {
    self.read().workflows.clone()
  }

  pub(crate) fn register_workflow(&self, workflow: &str) -> Result<(), RuntimeError> {
    let mut entries = self.write();
    if entries.workflows.iter().any(|w| w == workflow) {
      return Err(RuntimeError::DuplicateWorkflow {
        workflow: workflow.to_string(),
      });
    }
    entries.workflows.push(workflow.to_string());
    Ok(())
  }

  /// Forget a workflow and every task registered under it.
  pub(crate) fn unregister_workflow(&self, workflow: &str) {
    let mut entries = self.write();
    entries.workflows.retain(|w| w != workflow);
    entries.tasks.retain(|(w, _, _)| w != workflow);
  }

  pub(crate) fn register_task(&self, workflow: &str, task: &Arc<Task>) -> Result<(), RuntimeError> {
    let mut entries = self.write();
    let taken = entries
      .tasks
      .iter()
      .any(|(w, t, live)| w == workflow && t == task.name() && live.strong_count() > 0);
    if taken {
      return Err(RuntimeError::DuplicateTask {
        workflow: workflow.to_string(),
        task: task.name().to_string(),
      });
    }
    entries
      .tasks
      .push((workflow.to_string(), task.name().to_string(), Arc::downgrade(task)));
    Ok(())
  }

  /// Exact lookup by workflow and task name.
  pub fn find(&self, workflow: &str, task: &str) -> Option<Arc<Task>> {
    self
      .read()
      .tasks
      .iter()
      .filter(|(w, t, _)| w == workflow && t == task)
      .find_map(|(_, _, live)| live.upgrade())
  }

  /// Lookup by task name across every workflow. Only an unambiguous match
  /// is returned.
  pub fn find_unique(&self, task: &str) -> Option<Arc<Task>> {
    let entries = self.read();
    let mut matches = entries
      .tasks
      .iter()
      .filter(|(_, t, _)| t == task)
      .filter_map(|(_, _, live)| live.upgrade());
    let first = matches.next()?;
    match matches.next() {
      Some(_) => None,
      None => Some(first),
    }
  }

  /// Lookup used by reference resolution: the named workflow first, then a
  /// unique match in any registered workflow.
  pub fn resolve(&self, workflow: &str, task: &str) -> Option<Arc<Task>> {
    self.find(workflow, task).or_else(|| self.find_unique(task))
  }

  /// Every live task of a workflow, in registration order.
  pub fn tasks_of(&self, workflow: &str) -> Vec<Arc<Task>> {
    self
      .read()
      .tasks
      .iter()
      .filter(|(w, _, _)| w == workflow)
      .filter_map(|(_, _, live)| live.upgrade())
      .collect()
  }
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let entries = self.read();
    f.debug_struct("Registry")
      .field("workflows", &entries.workflows)
      .field("tasks", &entries.tasks.len())
      .finish()
  }
}
