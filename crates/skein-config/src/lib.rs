//! Skein Config
//!
//! This crate contains the serializable configuration types for skein.
//! These types represent workflow definitions before they are turned into
//! runtime tasks, plus the engine-wide settings read at startup.
//!
//! Configuration can be loaded from:
//! - JSON workflow files (via CLI with `skein run workflow.json`)
//! - A TOML engine file (via CLI with `--config skein.toml`)
//!
//! The runtime takes these types, builds an executor for every task and
//! discovers the dependency graph from the task commands.

mod engine;
mod enums;
mod error;
mod task;
mod workflow;

pub use engine::{CoordinationConfig, EngineConfig, LogConfig, ServiceConfig, TransferConfig};
pub use enums::{DataMover, StagerMode, TaskKind};
pub use error::ConfigError;
pub use task::{BackendDef, RemoteHost, TaskDef};
pub use workflow::WorkflowDef;
