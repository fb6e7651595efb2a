//! Skein Workflow
//!
//! This crate provides the backend-independent model shared by the runtime,
//! the stager and the coordination client:
//!
//! - `workflow://` reference tokenizing and rewriting
//! - Task lifecycle status
//! - The context-probe report describing an execution host
//! - The composite dependency graph and its cycle search
//! - The JSON projection used for persistence and interchange
//! - Shell quoting shared by every generated script

mod context;
mod error;
mod graph;
mod projection;
mod reference;
mod shell;
mod status;

pub use context::{ContextInfo, Protocol};
pub use error::ReferenceError;
pub use graph::Graph;
pub use projection::{TaskJson, TaskMap, WorkflowJson};
pub use reference::{Reference, SCHEME, parse_references, rewrite_references};
pub use shell::{quote_path, shell_quote};
pub use status::TaskStatus;
