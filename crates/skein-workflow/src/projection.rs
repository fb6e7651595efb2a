use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::status::TaskStatus;

/// JSON projection of a workflow (or a composed meta-workflow).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowJson {
  pub name: String,
  pub id: u64,
  pub tasks: TaskMap,
}

impl WorkflowJson {
  pub fn new(name: impl Into<String>, id: u64) -> Self {
    Self {
      name: name.into(),
      id,
      tasks: TaskMap::default(),
    }
  }
}

/// JSON projection of a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskJson {
  pub name: String,
  pub status: TaskStatus,
  pub working_dir: Option<String>,
  pub command: String,
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub nexts: Vec<String>,
  #[serde(default)]
  pub prevs: Vec<String>,
}

/// Task entries keyed by name, kept in insertion order.
///
/// Serialized as a JSON object so the projection reads `{"tasks": {"A": {...}}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskMap {
  entries: Vec<(String, TaskJson)>,
}

impl TaskMap {
  /// Insert or replace the entry for `key`. Replacing keeps the original position.
  pub fn insert(&mut self, key: impl Into<String>, task: TaskJson) {
    let key = key.into();
    match self.entries.iter_mut().find(|(k, _)| *k == key) {
      Some((_, existing)) => *existing = task,
      None => self.entries.push((key, task)),
    }
  }

  pub fn get(&self, key: &str) -> Option<&TaskJson> {
    self
      .entries
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, task)| task)
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(k, _)| k.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskJson)> {
    self.entries.iter().map(|(k, t)| (k.as_str(), t))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl Serialize for TaskMap {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(self.entries.iter().map(|(k, t)| (k, t)))
  }
}

impl<'de> Deserialize<'de> for TaskMap {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct TaskMapVisitor;

    impl<'de> Visitor<'de> for TaskMapVisitor {
      type Value = TaskMap;

      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of task name to task")
      }

      fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TaskMap, A::Error> {
        let mut map = TaskMap::default();
        while let Some((key, task)) = access.next_entry::<String, TaskJson>()? {
          map.insert(key, task);
        }
        Ok(map)
      }
    }

    deserializer.deserialize_map(TaskMapVisitor)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn task(name: &str, status: TaskStatus) -> TaskJson {
    TaskJson {
      name: name.to_string(),
      status,
      working_dir: None,
      command: format!("echo {name}"),
      kind: "batch".to_string(),
      nexts: vec![],
      prevs: vec![],
    }
  }

  #[test]
  fn test_shape_matches_projection_contract() {
    let mut wf = WorkflowJson::new("demo", 7);
    let mut b = task("B", TaskStatus::Finished);
    b.prevs.push("A".to_string());
    b.working_dir = Some("/tmp/skein/1-B".to_string());
    wf.tasks.insert("B", b);

    let value = serde_json::to_value(&wf).unwrap();
    assert_eq!(value["name"], "demo");
    assert_eq!(value["id"], 7);
    assert_eq!(value["tasks"]["B"]["status"], "FINISHED");
    assert_eq!(value["tasks"]["B"]["type"], "batch");
    assert_eq!(value["tasks"]["B"]["prevs"][0], "A");
    assert_eq!(value["tasks"]["B"]["working_dir"], "/tmp/skein/1-B");
  }

  #[test]
  fn test_insertion_order_is_preserved() {
    let mut wf = WorkflowJson::new("ordered", 0);
    for name in ["zeta", "alpha", "mid"] {
      wf.tasks.insert(name, task(name, TaskStatus::Ready));
    }

    let text = serde_json::to_string(&wf).unwrap();
    let zeta = text.find("\"zeta\"").unwrap();
    let alpha = text.find("\"alpha\"").unwrap();
    let mid = text.find("\"mid\"").unwrap();
    assert!(zeta < alpha && alpha < mid);

    let back: WorkflowJson = serde_json::from_str(&text).unwrap();
    assert_eq!(back.tasks.keys().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
    assert_eq!(back, wf);
  }

  #[test]
  fn test_insert_replaces_in_place() {
    let mut map = TaskMap::default();
    map.insert("A", task("A", TaskStatus::Ready));
    map.insert("B", task("B", TaskStatus::Ready));
    map.insert("A", task("A", TaskStatus::Failed));

    assert_eq!(map.len(), 2);
    assert_eq!(map.keys().next(), Some("A"));
    assert_eq!(map.get("A").unwrap().status, TaskStatus::Failed);
  }

  #[test]
  fn test_null_working_dir_and_missing_edges() {
    let json = r#"{"name":"w","id":1,"tasks":{"A":{"name":"A","status":"READY","working_dir":null,"command":"ls","type":"slurm"}}}"#;
    let wf: WorkflowJson = serde_json::from_str(json).unwrap();
    let a = wf.tasks.get("A").unwrap();
    assert_eq!(a.working_dir, None);
    assert!(a.nexts.is_empty());
    assert_eq!(a.kind, "slurm");
  }
}
