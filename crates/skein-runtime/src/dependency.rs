use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};

use skein_coordination::RemoteTask;
use skein_stager::Site;
use skein_workflow::TaskStatus;
use tracing::{debug, warn};

use crate::error::RuntimeError;
use crate::scope::WorkflowScope;
use crate::task::Task;

/// A task owned by another process, known only through the coordination
/// service. Never scheduled locally.
#[derive(Debug)]
pub struct ExternalTask {
  workflow: String,
  name: String,
  descriptor: Mutex<RemoteTask>,
}

impl ExternalTask {
  pub fn new(remote: RemoteTask) -> Self {
    Self {
      workflow: remote.workflow.clone(),
      name: remote.task.name.clone(),
      descriptor: Mutex::new(remote),
    }
  }

  pub fn workflow(&self) -> &str {
    &self.workflow
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Last descriptor fetched from the service.
  pub fn descriptor(&self) -> RemoteTask {
    self
      .descriptor
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  fn update(&self, remote: RemoteTask) {
    *self.descriptor.lock().unwrap_or_else(|e| e.into_inner()) = remote;
  }

  /// Poll the coordination service until the task reports a terminal status.
  async fn poll_terminal(&self, scope: &WorkflowScope) -> Result<TaskStatus, RuntimeError> {
    loop {
      let status = self.descriptor().task.status;
      if status.is_terminal() {
        return Ok(status);
      }

      tokio::time::sleep(scope.poll_interval).await;

      let Some(coordinator) = scope.coordinator() else {
        return Err(RuntimeError::DependencyUnresolved {
          task: format!("{}/{}", scope.name, self.name),
          reference: format!("{}/{}", self.workflow, self.name),
        });
      };
      match coordinator.get_task(&self.workflow, &self.name).await {
        Ok(remote) => {
          debug!(
            workflow = %self.workflow,
            task = %self.name,
            status = %remote.task.status,
            "remote_task_polled"
          );
          self.update(remote);
        }
        Err(e) => {
          warn!(workflow = %self.workflow, task = %self.name, error = %e, "remote_task_poll_failed");
        }
      }
    }
  }
}

/// An entry of a task's `prevs`.
#[derive(Debug, Clone)]
pub enum Dependency {
  /// A task scheduled in this process.
  Local(Weak<Task>),
  /// A task owned by another process.
  External(Arc<ExternalTask>),
}

impl Dependency {
  pub fn workflow(&self) -> String {
    match self {
      Dependency::Local(task) => task
        .upgrade()
        .map(|t| t.workflow_name().to_string())
        .unwrap_or_default(),
      Dependency::External(task) => task.workflow.clone(),
    }
  }

  pub fn name(&self) -> String {
    match self {
      Dependency::Local(task) => task.upgrade().map(|t| t.name().to_string()).unwrap_or_default(),
      Dependency::External(task) => task.name.clone(),
    }
  }

  /// `<workflow>/<task>`.
  pub fn qualified_name(&self) -> String {
    format!("{}/{}", self.workflow(), self.name())
  }

  /// Name as shown in `prevs`: bare within the same workflow, qualified across.
  pub(crate) fn display_name(&self, own_workflow: &str) -> String {
    let workflow = self.workflow();
    if workflow == own_workflow {
      self.name()
    } else {
      format!("{}/{}", workflow, self.name())
    }
  }

  pub(crate) fn is(&self, workflow: &str, task: &str) -> bool {
    self.workflow() == workflow && self.name() == task
  }

  pub(crate) fn same_target(&self, other: &Dependency) -> bool {
    match (self, other) {
      (Dependency::Local(a), Dependency::Local(b)) => Weak::ptr_eq(a, b),
      (Dependency::External(a), Dependency::External(b)) => {
        a.workflow == b.workflow && a.name == b.name
      }
      _ => false,
    }
  }

  pub fn status(&self) -> Option<TaskStatus> {
    match self {
      Dependency::Local(task) => task.upgrade().map(|t| t.status()),
      Dependency::External(task) => Some(task.descriptor().task.status),
    }
  }

  /// Block until the dependency reaches a terminal status.
  ///
  /// Local tasks are joined on their status channel. Remote tasks are polled
  /// at the workflow's poll interval, bounded by its poll timeout if set.
  pub(crate) async fn wait_terminal(
    &self,
    consumer: &str,
    scope: &WorkflowScope,
  ) -> Result<TaskStatus, RuntimeError> {
    match self {
      Dependency::Local(task) => {
        let task = task.upgrade().ok_or_else(|| RuntimeError::DependencyUnresolved {
          task: consumer.to_string(),
          reference: self.qualified_name(),
        })?;
        Ok(task.wait_terminal().await)
      }
      Dependency::External(task) => match scope.poll_timeout {
        Some(limit) => tokio::time::timeout(limit, task.poll_terminal(scope))
          .await
          .map_err(|_| RuntimeError::DependencyTimeout {
            task: consumer.to_string(),
            dependency: self.qualified_name(),
          })?,
        None => task.poll_terminal(scope).await,
      },
    }
  }

  /// Staging view of the producer together with its working directory.
  pub(crate) fn producer(&self) -> Result<(Site, PathBuf), RuntimeError> {
    let missing = || RuntimeError::MissingWorkingDir {
      task: self.qualified_name(),
    };
    match self {
      Dependency::Local(task) => {
        let task = task.upgrade().ok_or_else(missing)?;
        let working_dir = task.working_dir().ok_or_else(missing)?;
        Ok((task.site(), working_dir))
      }
      Dependency::External(task) => {
        let remote = task.descriptor();
        let working_dir = remote.task.working_dir.clone().ok_or_else(missing)?;
        let site = Site {
          task: self.qualified_name(),
          info: remote.info.clone(),
          endpoint: remote.endpoint.clone(),
        };
        Ok((site, PathBuf::from(working_dir)))
      }
    }
  }

  /// Give back one reference. Only local producers are reference counted.
  pub(crate) async fn release(&self) {
    if let Dependency::Local(task) = self {
      if let Some(task) = task.upgrade() {
        task.decrement_reference_count().await;
      }
    }
  }
}
