use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a task.
///
/// `Ready` is the only initial state; `Finished` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
  #[default]
  Ready,
  Waiting,
  Running,
  Finished,
  Failed,
}

impl TaskStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, TaskStatus::Finished | TaskStatus::Failed)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      TaskStatus::Ready => "READY",
      TaskStatus::Waiting => "WAITING",
      TaskStatus::Running => "RUNNING",
      TaskStatus::Finished => "FINISHED",
      TaskStatus::Failed => "FAILED",
    }
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TaskStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "READY" => Ok(TaskStatus::Ready),
      "WAITING" => Ok(TaskStatus::Waiting),
      "RUNNING" => Ok(TaskStatus::Running),
      "FINISHED" => Ok(TaskStatus::Finished),
      "FAILED" => Ok(TaskStatus::Failed),
      other => Err(format!("unknown task status: {}", other)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_terminal_states() {
    assert!(TaskStatus::Finished.is_terminal());
    assert!(TaskStatus::Failed.is_terminal());
    assert!(!TaskStatus::Ready.is_terminal());
    assert!(!TaskStatus::Waiting.is_terminal());
    assert!(!TaskStatus::Running.is_terminal());
  }

  #[test]
  fn test_parse_and_display() {
    assert_eq!("finished".parse::<TaskStatus>().unwrap(), TaskStatus::Finished);
    assert_eq!(TaskStatus::Waiting.to_string(), "WAITING");
    assert!("done".parse::<TaskStatus>().is_err());
    assert_eq!(serde_json::to_string(&TaskStatus::Running).unwrap(), "\"RUNNING\"");
  }
}
