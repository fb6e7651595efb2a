//! Graph of graphs: several workflows whose tasks reference each other.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use skein_workflow::{Graph, WorkflowJson};
use tracing::{debug, info, instrument, warn};

use crate::error::RuntimeError;
use crate::registry::Registry;
use crate::summary::RunSummary;
use crate::workflow::{Workflow, WorkflowBuilder, add_edges};

/// What validation learned about the composite graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
  /// Cross-workflow edges as `(producer, consumer)` qualified names.
  pub transversal: Vec<(String, String)>,
  /// Producers some other workflow waits on.
  pub needed: BTreeSet<String>,
  /// Consumers with pending cross-workflow dependencies, and everything
  /// downstream of them.
  pub needy: BTreeSet<String>,
}

pub struct MetaWorkflow {
  name: String,
  registry: Registry,
  workflows: Vec<Workflow>,
  resolved: AtomicBool,
}

impl MetaWorkflow {
  /// Create a meta-workflow together with the registry its members share.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      registry: Registry::new(),
      workflows: Vec::new(),
      resolved: AtomicBool::new(false),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  /// A workflow builder already bound to this meta-workflow's registry.
  pub fn builder(&self, name: impl Into<String>) -> WorkflowBuilder {
    Workflow::builder(name).registry(self.registry.clone())
  }

  pub fn add_workflow(&mut self, workflow: Workflow) -> Result<(), RuntimeError> {
    if !workflow.registry().same(&self.registry) {
      return Err(RuntimeError::RegistryMismatch {
        workflow: workflow.name().to_string(),
      });
    }
    self.workflows.push(workflow);
    self.resolved.store(false, Ordering::Release);
    Ok(())
  }

  pub fn workflows(&self) -> &[Workflow] {
    &self.workflows
  }

  pub fn workflow(&self, name: &str) -> Option<&Workflow> {
    self.workflows.iter().find(|w| w.name() == name)
  }

  pub fn set_dry(&self, dry: bool) {
    for workflow in &self.workflows {
      workflow.set_dry(dry);
    }
  }

  /// Rebuild every member's edges. All members are reset before any of them
  /// discovers, so cross-workflow edges survive the rebuild.
  #[instrument(name = "meta_make_dependencies", skip(self), fields(meta = %self.name))]
  pub async fn make_dependencies(&self) -> Result<(), RuntimeError> {
    for workflow in &self.workflows {
      workflow.register_remote().await;
    }
    for workflow in &self.workflows {
      workflow.reset();
    }
    for workflow in &self.workflows {
      workflow.discover().await?;
    }
    for workflow in &self.workflows {
      workflow.mark_resolved();
    }
    self.resolved.store(true, Ordering::Release);
    Ok(())
  }

  /// The dependency graph over every member, keyed by qualified names.
  pub fn graph(&self) -> Graph {
    let mut graph = Graph::new();
    for workflow in &self.workflows {
      add_edges(&mut graph, workflow.tasks());
    }
    graph
  }

  /// Check the composite graph for cycles.
  ///
  /// The needed/needy pass walks cross-workflow edges in discovery order and
  /// flags the back edge that closes a loop. The verdict is a depth-first
  /// search over the whole composite graph, which also catches cycles the
  /// pass cannot see.
  pub fn validate(&self) -> Result<ValidationReport, RuntimeError> {
    let graph = self.graph();
    let mut report = ValidationReport::default();

    for workflow in &self.workflows {
      for task in workflow.tasks() {
        for dependency in task.prevs() {
          if dependency.workflow() != workflow.name() {
            report
              .transversal
              .push((dependency.qualified_name(), task.qualified_name()));
          }
        }
      }
    }

    for (prev, task) in &report.transversal {
      report.needed.insert(prev.clone());
      let reachable = graph.reachable_from(task);
      let closes_loop = reachable.iter().any(|n| report.needed.contains(n));
      if closes_loop && report.needy.contains(prev) {
        warn!(meta = %self.name, producer = %prev, consumer = %task, "transversal_back_edge");
      }
      report.needy.extend(reachable);
    }

    if let Some(cycle) = graph.find_cycle() {
      return Err(RuntimeError::CycleDetected { cycle });
    }

    debug!(
      meta = %self.name,
      transversal = report.transversal.len(),
      "meta_workflow_validated"
    );
    Ok(report)
  }

  /// Resolve and validate if needed, then run every member concurrently.
  #[instrument(name = "meta_run", skip(self), fields(meta = %self.name))]
  pub async fn run(&self) -> Result<RunSummary, RuntimeError> {
    if !self.resolved.load(Ordering::Acquire) {
      self.make_dependencies().await?;
    }
    self.validate()?;

    info!(meta = %self.name, workflows = self.workflows.len(), "meta_workflow_started");
    let summaries = join_all(self.workflows.iter().map(|w| w.launch())).await;

    let mut total = RunSummary::new(&self.name);
    for summary in summaries {
      total.merge(summary);
    }
    info!(
      meta = %self.name,
      finished = total.finished.len(),
      failed = total.failed.len(),
      "meta_workflow_completed"
    );
    Ok(total)
  }

  /// Every member task, keyed `<workflow>/<task>`.
  pub fn to_json(&self) -> WorkflowJson {
    let mut json = WorkflowJson::new(&self.name, 0);
    for workflow in &self.workflows {
      for task in workflow.tasks() {
        json.tasks.insert(task.qualified_name(), task.to_json());
      }
    }
    json
  }
}

impl std::fmt::Debug for MetaWorkflow {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MetaWorkflow")
      .field("name", &self.name)
      .field("workflows", &self.workflows.len())
      .finish()
  }
}
