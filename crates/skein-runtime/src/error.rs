//! Runtime errors.

use skein_config::ConfigError;
use skein_coordination::CoordinationError;
use skein_executor::ExecutorError;
use skein_stager::StagingError;
use skein_workflow::ReferenceError;

/// Errors that can occur while building or running workflows.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// A reference names a task that exists neither locally nor remotely.
  #[error("task '{task}': reference '{reference}' does not resolve to a known task")]
  DependencyUnresolved { task: String, reference: String },

  #[error("task '{task}': malformed reference")]
  MalformedReference {
    task: String,
    #[source]
    source: ReferenceError,
  },

  /// A task references its own output.
  #[error("task '{task}' references itself through '{reference}'")]
  SelfReference { task: String, reference: String },

  /// Moving a dependency's output into place failed.
  #[error("task '{task}': staging failed")]
  Staging {
    task: String,
    #[source]
    source: StagingError,
  },

  /// The backend ran the launcher script and it failed.
  #[error("task '{task}': execution failed with {message}")]
  Execution { task: String, message: String },

  /// The backend adapter itself failed before or around the script.
  #[error("task '{task}': backend error")]
  Executor {
    task: String,
    #[source]
    source: ExecutorError,
  },

  /// The dependency graph contains a directed cycle.
  #[error("dependency cycle detected: {}", cycle.join(" -> "))]
  CycleDetected { cycle: Vec<String> },

  #[error("coordination service unavailable")]
  CoordinationUnavailable {
    #[source]
    source: CoordinationError,
  },

  /// A remote dependency did not settle within the configured poll timeout.
  #[error("task '{task}': gave up waiting on remote dependency '{dependency}'")]
  DependencyTimeout { task: String, dependency: String },

  /// A producer finished without a known working directory.
  #[error("task '{task}' has no working directory to stage from")]
  MissingWorkingDir { task: String },

  #[error("workflow '{workflow}' already has a task named '{task}'")]
  DuplicateTask { workflow: String, task: String },

  #[error("a workflow named '{workflow}' is already registered")]
  DuplicateWorkflow { workflow: String },

  /// A workflow was added to a meta-workflow it does not share a registry with.
  #[error("workflow '{workflow}' was built against a different registry")]
  RegistryMismatch { workflow: String },

  #[error(transparent)]
  Config(#[from] ConfigError),
}

/// Render an error with its chain of sources, outermost first.
pub(crate) fn describe(error: &dyn std::error::Error) -> String {
  let mut message = error.to_string();
  let mut source = error.source();
  while let Some(cause) = source {
    message.push_str(": ");
    message.push_str(&cause.to_string());
    source = cause.source();
  }
  message
}
