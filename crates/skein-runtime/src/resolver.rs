//! Dependency discovery: turn a task's `workflow://` references into edges.

use std::sync::Arc;

use skein_coordination::CoordinationError;
use skein_workflow::parse_references;
use tracing::{debug, warn};

use crate::dependency::ExternalTask;
use crate::error::RuntimeError;
use crate::scope::WorkflowScope;
use crate::task::Task;

/// Resolve every reference in `task`'s command and link the producers.
///
/// Local producers are looked up in the registry by workflow and task name,
/// falling back to an unambiguous task name in any registered workflow.
/// Anything the registry does not know is asked of the coordination service,
/// when there is one. Returns the qualified names of the producers
/// that were newly linked, in reference order.
pub(crate) async fn discover(task: &Arc<Task>, scope: &WorkflowScope) -> Result<Vec<String>, RuntimeError> {
  let references = parse_references(task.command()).map_err(|source| RuntimeError::MalformedReference {
    task: task.qualified_name(),
    source,
  })?;

  let mut linked = Vec::new();
  for reference in &references {
    let workflow = reference.workflow_or(&scope.name);
    let raw = reference.raw(task.command());

    if let Some(prev) = scope.registry.resolve(workflow, &reference.task) {
      if Arc::ptr_eq(&prev, task) {
        return Err(RuntimeError::SelfReference {
          task: task.qualified_name(),
          reference: raw.to_string(),
        });
      }
      if task.add_dependency_to(&prev) {
        debug!(task = %task.qualified_name(), dependency = %prev.qualified_name(), "dependency_linked");
        linked.push(prev.qualified_name());
      }
      continue;
    }

    let unresolved = || RuntimeError::DependencyUnresolved {
      task: task.qualified_name(),
      reference: raw.to_string(),
    };

    let Some(coordinator) = scope.coordinator() else {
      return Err(unresolved());
    };

    match coordinator.get_task(workflow, &reference.task).await {
      Ok(remote) => {
        let external = Arc::new(ExternalTask::new(remote));
        let qualified = format!("{}/{}", external.workflow(), external.name());
        if task.add_external_dependency(external) {
          debug!(task = %task.qualified_name(), dependency = %qualified, "remote_dependency_linked");
          linked.push(qualified);
        }
      }
      Err(CoordinationError::NotFound { .. }) => return Err(unresolved()),
      Err(e) => {
        warn!(task = %task.qualified_name(), reference = %raw, error = %e, "remote_lookup_failed");
        return Err(unresolved());
      }
    }
  }

  Ok(linked)
}
