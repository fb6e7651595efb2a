//! Skein Coordination
//!
//! Client side of the optional coordination service. Workflows register
//! themselves and their tasks, report every status change and look up tasks
//! owned by other processes to wait on them.
//!
//! The [`Coordinator`] trait defines operations for:
//! - Creating a workflow and adding its tasks
//! - Updating a task's status or a single attribute
//! - Recording dependency edges
//! - Fetching a task descriptor by workflow and task name

mod http;
mod memory;
mod types;

pub use http::HttpCoordinator;
pub use memory::MemoryCoordinator;
pub use types::RemoteTask;

use async_trait::async_trait;
use skein_workflow::{TaskJson, TaskStatus, WorkflowJson};

/// Error type for coordination operations.
#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
  /// The service could not be reached at all.
  #[error("coordination service at {url} is unavailable: {source}")]
  Unavailable {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("http request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The service answered with an unexpected status code.
  #[error("coordination service returned {status}: {body}")]
  Status { status: u16, body: String },

  /// The requested workflow or task is not registered.
  #[error("task '{workflow}/{task}' is not registered")]
  NotFound { workflow: String, task: String },
}

/// Attribute names accepted by [`Coordinator::update_task`].
pub mod attribute {
  pub const WORKING_DIR: &str = "working_dir";
  /// JSON-encoded context-probe report.
  pub const INFO: &str = "info";
  pub const ENDPOINT: &str = "endpoint";
}

/// Remote bookkeeping for workflows and tasks.
#[async_trait]
pub trait Coordinator: Send + Sync {
  /// Register a workflow and return its numeric id.
  async fn create_workflow(&self, workflow: &WorkflowJson) -> Result<u64, CoordinationError>;

  async fn add_task(&self, workflow_id: u64, task: &TaskJson) -> Result<(), CoordinationError>;

  async fn update_task_status(
    &self,
    workflow_id: u64,
    task: &str,
    status: TaskStatus,
  ) -> Result<(), CoordinationError>;

  /// Set one attribute of a task (see [`attribute`]).
  async fn update_task(
    &self,
    workflow_id: u64,
    task: &str,
    attribute: &str,
    value: &str,
  ) -> Result<(), CoordinationError>;

  /// Record that `task` consumes the output of `dependency`.
  async fn add_dependency(
    &self,
    workflow_id: u64,
    task: &str,
    dependency: &str,
  ) -> Result<(), CoordinationError>;

  /// Look up a task by workflow name.
  async fn get_task(&self, workflow: &str, task: &str) -> Result<RemoteTask, CoordinationError>;
}
