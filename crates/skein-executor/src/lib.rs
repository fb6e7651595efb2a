//! Backend adapters for skein tasks.
//!
//! Every backend implements the [`Executor`] capability: prepare a working
//! directory, run a materialized script in it and reclaim it afterwards.
//! Scripts reach their host through a [`Launcher`]; [`SshLauncher`] wraps any
//! launcher to move the whole adapter onto a remote host.
//!
//! [`ExecutorFactory`] maps a task's backend definition to its adapter.

mod batch;
mod docker;
mod error;
mod executor;
mod factory;
mod launcher;
mod output;
mod probe;
mod slurm;

pub use batch::BatchExecutor;
pub use docker::DockerExecutor;
pub use error::ExecutorError;
pub use executor::{CONTROL_DIR, Executor, Script, reclaimed_path};
pub use factory::ExecutorFactory;
pub use launcher::{CommandSpec, Launcher, LocalLauncher, SshLauncher};
pub use output::ExecOutput;
pub use probe::{CONTEXT_SCRIPT, context_probe_script};
pub use slurm::SlurmExecutor;
