//! Execution-context report produced by the context probe.
//!
//! The probe prints a single JSON object on stdout:
//!
//! ```json
//! {"type":"cluster-frontend","ip":"203.0.113.7","user":"alice",
//!  "SCP":"active","FTP":"none","GRIDFTP":"none","SKYCDS":"none"}
//! ```

use serde::{Deserialize, Serialize};

/// Transfer protocols a host can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
  Scp,
  Ftp,
  Gridftp,
  Skycds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextInfo {
  #[serde(rename = "type", default = "none")]
  pub machine_type: String,
  pub ip: String,
  #[serde(default = "none")]
  pub user: String,
  #[serde(rename = "SCP", default = "none")]
  pub scp: String,
  #[serde(rename = "FTP", default = "none")]
  pub ftp: String,
  #[serde(rename = "GRIDFTP", default = "none")]
  pub gridftp: String,
  #[serde(rename = "SKYCDS", default = "none")]
  pub skycds: String,
}

impl ContextInfo {
  /// Parse the probe's stdout, ignoring anything before the JSON object.
  pub fn from_probe_output(output: &str) -> Result<Self, serde_json::Error> {
    let trimmed = output.trim();
    let start = trimmed.rfind("\n{").map(|i| i + 1).unwrap_or(0);
    serde_json::from_str(&trimmed[start..])
  }

  /// Whether the host reports the protocol's service as active.
  pub fn is_active(&self, protocol: Protocol) -> bool {
    let state = match protocol {
      Protocol::Scp => &self.scp,
      Protocol::Ftp => &self.ftp,
      Protocol::Gridftp => &self.gridftp,
      Protocol::Skycds => &self.skycds,
    };
    state.eq_ignore_ascii_case("active")
  }

  /// Whether both reports name the same host.
  pub fn same_host(&self, other: &ContextInfo) -> bool {
    !self.ip.is_empty() && self.ip == other.ip
  }
}

fn none() -> String {
  "none".to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_probe_output() {
    let output = "some banner\n{\"type\":\"cluster-node\",\"ip\":\"10.0.0.2\",\"user\":\"bob\",\"SCP\":\"active\",\"FTP\":\"none\",\"GRIDFTP\":\"inactive\",\"SKYCDS\":\"none\"}\n";
    let info = ContextInfo::from_probe_output(output).unwrap();
    assert_eq!(info.machine_type, "cluster-node");
    assert_eq!(info.ip, "10.0.0.2");
    assert!(info.is_active(Protocol::Scp));
    assert!(!info.is_active(Protocol::Gridftp));
    assert!(!info.is_active(Protocol::Skycds));
  }

  #[test]
  fn test_missing_protocols_default_to_none() {
    let info = ContextInfo::from_probe_output(r#"{"ip":"1.2.3.4"}"#).unwrap();
    assert_eq!(info.scp, "none");
    assert_eq!(info.skycds, "none");
  }

  #[test]
  fn test_same_host_ignores_empty_ip() {
    let a = ContextInfo::from_probe_output(r#"{"ip":""}"#).unwrap();
    let b = a.clone();
    assert!(!a.same_host(&b));
  }
}
