use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use skein_config::DataMover;
use skein_coordination::Coordinator;
use skein_stager::Stager;
use tracing::warn;

use crate::registry::Registry;

/// Workflow-wide settings and collaborators shared with every owned task.
pub(crate) struct WorkflowScope {
  pub name: String,
  id: AtomicU64,
  dry: AtomicBool,
  pub default_mover: DataMover,
  pub scratch_dir_base: PathBuf,
  pub stager: Stager,
  pub registry: Registry,
  coordinator: RwLock<Option<Arc<dyn Coordinator>>>,
  pub poll_interval: Duration,
  pub poll_timeout: Option<Duration>,
}

pub(crate) struct ScopeParts {
  pub name: String,
  pub dry: bool,
  pub default_mover: DataMover,
  pub scratch_dir_base: PathBuf,
  pub stager: Stager,
  pub registry: Registry,
  pub coordinator: Option<Arc<dyn Coordinator>>,
  pub poll_interval: Duration,
  pub poll_timeout: Option<Duration>,
}

impl WorkflowScope {
  pub fn new(parts: ScopeParts) -> Self {
    Self {
      name: parts.name,
      id: AtomicU64::new(0),
      dry: AtomicBool::new(parts.dry),
      default_mover: parts.default_mover,
      scratch_dir_base: parts.scratch_dir_base,
      stager: parts.stager,
      registry: parts.registry,
      coordinator: RwLock::new(parts.coordinator),
      poll_interval: parts.poll_interval,
      poll_timeout: parts.poll_timeout,
    }
  }

  pub fn id(&self) -> u64 {
    self.id.load(Ordering::Acquire)
  }

  pub fn set_id(&self, id: u64) {
    self.id.store(id, Ordering::Release);
  }

  pub fn is_dry(&self) -> bool {
    self.dry.load(Ordering::Acquire)
  }

  pub fn set_dry(&self, dry: bool) {
    self.dry.store(dry, Ordering::Release);
  }

  pub fn coordinator(&self) -> Option<Arc<dyn Coordinator>> {
    self
      .coordinator
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  /// Stop talking to the coordination service for the rest of the run.
  pub fn disable_coordinator(&self, reason: &str) {
    let mut slot = self.coordinator.write().unwrap_or_else(|e| e.into_inner());
    if slot.take().is_some() {
      warn!(workflow = %self.name, error = %reason, "coordination_disabled");
    }
  }
}
