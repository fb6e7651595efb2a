//! Building workflows from their serialized definitions.

use std::sync::Arc;

use skein_config::{EngineConfig, WorkflowDef};
use skein_coordination::{Coordinator, HttpCoordinator};
use skein_executor::ExecutorFactory;
use skein_stager::Stager;
use tracing::{info, warn};

use crate::error::{RuntimeError, describe};
use crate::registry::Registry;
use crate::task::Task;
use crate::workflow::Workflow;

/// Connect to the configured coordination service, if any.
pub async fn connect_coordinator(config: &EngineConfig) -> Result<Option<Arc<dyn Coordinator>>, RuntimeError> {
  let Some(coordination) = &config.coordination else {
    return Ok(None);
  };
  let coordinator = HttpCoordinator::connect(&coordination.url)
    .await
    .map_err(|source| RuntimeError::CoordinationUnavailable { source })?;
  info!(url = %coordination.url, "coordination_connected");
  Ok(Some(Arc::new(coordinator)))
}

impl Workflow {
  /// Build a workflow and its tasks from a definition.
  ///
  /// An unreachable coordination service is logged and the workflow runs
  /// without one.
  pub async fn from_def(def: &WorkflowDef, config: &EngineConfig, registry: Registry) -> Result<Self, RuntimeError> {
    let coordinator = match connect_coordinator(config).await {
      Ok(coordinator) => coordinator,
      Err(e) => {
        warn!(workflow = %def.name, error = %describe(&e), "coordination_disabled");
        None
      }
    };
    Self::from_def_with(def, config, registry, coordinator)
  }

  /// Like [`Workflow::from_def`], with an already connected coordinator.
  pub fn from_def_with(
    def: &WorkflowDef,
    config: &EngineConfig,
    registry: Registry,
    coordinator: Option<Arc<dyn Coordinator>>,
  ) -> Result<Self, RuntimeError> {
    let scratch_dir_base = def
      .scratch_dir_base
      .clone()
      .unwrap_or_else(|| config.scratch_dir_base.clone());

    let mut builder = Workflow::builder(&def.name)
      .dry(def.dry)
      .scratch_dir_base(&scratch_dir_base)
      .data_mover(def.data_mover)
      .stager(Stager::from_config(def.stager_mode, &config.transfer))
      .registry(registry);
    if let Some(coordination) = &config.coordination {
      builder = builder
        .poll_interval(coordination.poll_interval())
        .poll_timeout(coordination.poll_timeout());
    }
    if let Some(coordinator) = coordinator {
      builder = builder.coordinator(coordinator);
    }

    let mut workflow = builder.build()?;
    let factory = ExecutorFactory::new(&scratch_dir_base);
    for task_def in &def.tasks {
      let executor = factory
        .build(task_def)
        .map_err(|source| RuntimeError::Executor {
          task: format!("{}/{}", def.name, task_def.name),
          source,
        })?;
      workflow.add_task(Task::from_def(task_def, executor))?;
    }
    Ok(workflow)
  }
}
