//! Skein Runtime
//!
//! Schedules the tasks of one or more workflows. Every task runs as its own
//! tokio task and blocks on the terminal status of the tasks its command
//! references through `workflow://` URIs; ordering comes entirely from those
//! joins, there is no central ready queue.
//!
//! ```text
//! Workflow::make_dependencies  -> edges + reference counts
//! Workflow::run                -> start every task
//!   Task: wait prevs -> stage inputs -> run launcher -> release prevs -> start nexts
//! ```
//!
//! Workflows that reference each other share a [`Registry`], usually through
//! a [`MetaWorkflow`]. Tasks owned by other processes are reached through the
//! optional coordination service.

mod dependency;
mod error;
mod loader;
mod meta;
mod registry;
mod resolver;
mod scope;
mod script;
mod summary;
mod task;
mod workflow;

pub use dependency::{Dependency, ExternalTask};
pub use error::RuntimeError;
pub use loader::connect_coordinator;
pub use meta::{MetaWorkflow, ValidationReport};
pub use registry::Registry;
pub use script::{LauncherParts, StageBlock, input_dir, launcher_script, rewrite_command};
pub use summary::RunSummary;
pub use task::{LAUNCHER_SCRIPT, Task, TaskState};
pub use workflow::{Workflow, WorkflowBuilder};
