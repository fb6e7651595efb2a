use serde::Serialize;

/// Outcome of a workflow run: qualified task names by terminal status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
  pub workflow: String,
  pub finished: Vec<String>,
  pub failed: Vec<String>,
}

impl RunSummary {
  pub fn new(workflow: impl Into<String>) -> Self {
    Self {
      workflow: workflow.into(),
      ..Self::default()
    }
  }

  pub fn is_success(&self) -> bool {
    self.failed.is_empty()
  }

  pub fn merge(&mut self, other: RunSummary) {
    self.finished.extend(other.finished);
    self.failed.extend(other.failed);
  }
}
