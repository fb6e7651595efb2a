//! Engine-wide settings loaded from a TOML file.
//!
//! ```toml
//! scratch_dir_base = "/scratch/skein"
//!
//! [coordination]
//! url = "http://localhost:57000"
//! poll_interval_ms = 1000
//!
//! [transfer]
//! poll_interval_ms = 1000
//!
//! [transfer.gridftp]
//! url = "https://transfer.example.org/v0.10"
//! token = "..."
//!
//! [log]
//! filter = "skein=debug"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
  #[serde(default = "default_scratch_dir_base")]
  pub scratch_dir_base: PathBuf,
  #[serde(default)]
  pub coordination: Option<CoordinationConfig>,
  #[serde(default)]
  pub transfer: TransferConfig,
  #[serde(default)]
  pub log: LogConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      scratch_dir_base: default_scratch_dir_base(),
      coordination: None,
      transfer: TransferConfig::default(),
      log: LogConfig::default(),
    }
  }
}

impl EngineConfig {
  /// Load the engine configuration from a TOML file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.display().to_string(),
      source,
    })?;
    Self::from_toml(&content).map_err(|message| ConfigError::Parse {
      path: path.display().to_string(),
      message,
    })
  }

  pub fn from_toml(content: &str) -> Result<Self, String> {
    toml::from_str(content).map_err(|e| e.to_string())
  }
}

/// Optional remote bookkeeping service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationConfig {
  pub url: String,
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
  /// Give up on a remote dependency after this long. Unset waits forever.
  #[serde(default)]
  pub poll_timeout_ms: Option<u64>,
}

impl CoordinationConfig {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub fn poll_timeout(&self) -> Option<Duration> {
    self.poll_timeout_ms.map(Duration::from_millis)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferConfig {
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
  #[serde(default)]
  pub gridftp: Option<ServiceConfig>,
  #[serde(default)]
  pub skycds: Option<ServiceConfig>,
}

impl Default for TransferConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: default_poll_interval_ms(),
      gridftp: None,
      skycds: None,
    }
  }
}

impl TransferConfig {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }
}

/// Base URL and bearer token of an HTTP transfer service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
  pub url: String,
  #[serde(default)]
  pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
  #[serde(default = "default_log_filter")]
  pub filter: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      filter: default_log_filter(),
    }
  }
}

fn default_scratch_dir_base() -> PathBuf {
  PathBuf::from("/tmp/skein")
}

fn default_poll_interval_ms() -> u64 {
  1000
}

fn default_log_filter() -> String {
  "skein=info,warn".to_string()
}
