use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend family a task runs on.
///
/// The name doubles as the `type` field of the JSON projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
  Batch,
  Slurm,
  Docker,
  Cloud,
}

impl TaskKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      TaskKind::Batch => "batch",
      TaskKind::Slurm => "slurm",
      TaskKind::Docker => "docker",
      TaskKind::Cloud => "cloud",
    }
  }
}

impl fmt::Display for TaskKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// How referenced bytes move from a producing task to a consuming task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataMover {
  /// Symbolic link, only valid on a shared filesystem.
  #[default]
  Link,
  /// Recursive local copy.
  Copy,
  /// Pull over secure copy from the producer's host.
  Scp,
  /// Pull over FTP from the producer's host.
  Ftp,
  /// Out-of-band transfer through a GridFTP transfer service.
  Gridftp,
  /// Out-of-band transfer through the SkyCDS content delivery service.
  Skycds,
}

impl DataMover {
  pub fn as_str(&self) -> &'static str {
    match self {
      DataMover::Link => "LINK",
      DataMover::Copy => "COPY",
      DataMover::Scp => "SCP",
      DataMover::Ftp => "FTP",
      DataMover::Gridftp => "GRIDFTP",
      DataMover::Skycds => "SKYCDS",
    }
  }

  /// Whether the mover is rendered as a line of the launcher script.
  ///
  /// The others block inside the stager until the transfer settles.
  pub fn is_shell_directive(&self) -> bool {
    !matches!(self, DataMover::Gridftp | DataMover::Skycds)
  }
}

impl fmt::Display for DataMover {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Parallelism used for shell staging directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StagerMode {
  /// Each directive runs in place, one after the other.
  #[default]
  Sequential,
  /// Directives run as background jobs on the consuming host.
  LocalParallel,
  /// Directives are submitted as single-task cluster steps.
  ClusterParallel,
}
