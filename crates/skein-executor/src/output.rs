use serde::{Deserialize, Serialize};

/// What a backend reports after running a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
  pub exit_code: i32,
  pub stdout: String,
  pub stderr: String,
}

impl ExecOutput {
  /// A run succeeds only with exit code 0 and nothing on stderr.
  pub fn is_success(&self) -> bool {
    self.exit_code == 0 && self.stderr.trim().is_empty()
  }

  /// Short failure description for logs and errors.
  pub fn failure_message(&self) -> String {
    let stderr = self.stderr.trim();
    if stderr.is_empty() {
      format!("exit code {}", self.exit_code)
    } else {
      format!("exit code {}: {}", self.exit_code, stderr)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_success_requires_clean_stderr() {
    let ok = ExecOutput {
      exit_code: 0,
      stdout: "hi\n".to_string(),
      stderr: "\n".to_string(),
    };
    assert!(ok.is_success());

    let noisy = ExecOutput {
      exit_code: 0,
      stdout: String::new(),
      stderr: "warning: disk almost full".to_string(),
    };
    assert!(!noisy.is_success());
    assert_eq!(noisy.failure_message(), "exit code 0: warning: disk almost full");

    let failed = ExecOutput {
      exit_code: 2,
      ..Default::default()
    };
    assert!(!failed.is_success());
    assert_eq!(failed.failure_message(), "exit code 2");
  }
}
