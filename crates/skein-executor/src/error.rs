//! Executor errors.

/// Errors raised by a backend adapter itself, as opposed to a script that ran
/// and failed.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
  /// The program could not be started.
  #[error("failed to spawn '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// A filesystem operation on the execution host failed.
  #[error("{operation} '{path}' failed: {message}")]
  Filesystem {
    operation: &'static str,
    path: String,
    message: String,
  },

  /// The docker daemon refused to create or reach the container.
  #[error("container error: {message}")]
  Container { message: String },

  /// The task's backend definition cannot be turned into an adapter.
  #[error("invalid backend for task '{task}': {message}")]
  InvalidBackend { task: String, message: String },
}

impl ExecutorError {
  pub(crate) fn filesystem(operation: &'static str, path: &std::path::Path, message: impl ToString) -> Self {
    ExecutorError::Filesystem {
      operation,
      path: path.display().to_string(),
      message: message.to_string(),
    }
  }
}
