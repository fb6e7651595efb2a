use std::collections::{HashMap, HashSet, VecDeque};

/// Directed dependency graph keyed by qualified task id (`<workflow>/<task>`).
///
/// Edges point from producer to consumer.
#[derive(Debug, Clone, Default)]
pub struct Graph {
  /// Nodes in insertion order, for deterministic traversal.
  nodes: Vec<String>,
  /// Adjacency list: node_id -> list of downstream node_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node_id -> list of upstream node_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
}

impl Graph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_node(&mut self, node_id: impl Into<String>) {
    let node_id = node_id.into();
    if self.adjacency.contains_key(&node_id) {
      return;
    }
    self.adjacency.insert(node_id.clone(), Vec::new());
    self.reverse_adjacency.insert(node_id.clone(), Vec::new());
    self.nodes.push(node_id);
  }

  /// Add a producer -> consumer edge, registering unknown nodes.
  pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
    let from = from.into();
    let to = to.into();
    self.add_node(from.clone());
    self.add_node(to.clone());

    let downstream = self.adjacency.entry(from.clone()).or_default();
    if !downstream.contains(&to) {
      downstream.push(to.clone());
      self.reverse_adjacency.entry(to).or_default().push(from);
    }
  }

  pub fn nodes(&self) -> &[String] {
    &self.nodes
  }

  pub fn contains(&self, node_id: &str) -> bool {
    self.adjacency.contains_key(node_id)
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Nodes with no incoming edges.
  pub fn entry_points(&self) -> Vec<&str> {
    self
      .nodes
      .iter()
      .filter(|id| self.upstream(id).is_empty())
      .map(|id| id.as_str())
      .collect()
  }

  /// The node itself plus everything downstream of it, breadth first.
  pub fn reachable_from(&self, node_id: &str) -> Vec<String> {
    if !self.contains(node_id) {
      return Vec::new();
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::from([node_id]);

    while let Some(current) = queue.pop_front() {
      if !seen.insert(current) {
        continue;
      }
      order.push(current.to_string());
      for next in self.downstream(current) {
        queue.push_back(next.as_str());
      }
    }

    order
  }

  /// Search for a directed cycle.
  ///
  /// Returns the nodes along the cycle with the first node repeated at the
  /// end, e.g. `["a", "b", "a"]`.
  pub fn find_cycle(&self) -> Option<Vec<String>> {
    // DFS with coloring: 0 = white (unvisited), 1 = gray (in progress), 2 = black (done)
    let mut color: HashMap<&str, u8> = self.nodes.iter().map(|id| (id.as_str(), 0u8)).collect();
    let mut stack: Vec<&str> = Vec::new();

    fn dfs<'a>(
      node: &'a str,
      graph: &'a Graph,
      color: &mut HashMap<&'a str, u8>,
      stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
      color.insert(node, 1);
      stack.push(node);

      for neighbor in graph.downstream(node) {
        match color.get(neighbor.as_str()) {
          Some(1) => {
            // Back edge: the cycle is the stack suffix starting at neighbor
            let start = stack.iter().position(|n| *n == neighbor.as_str()).unwrap_or(0);
            let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(neighbor.clone());
            return Some(cycle);
          }
          Some(0) => {
            if let Some(cycle) = dfs(neighbor.as_str(), graph, color, stack) {
              return Some(cycle);
            }
          }
          _ => {}
        }
      }

      stack.pop();
      color.insert(node, 2);
      None
    }

    for node_id in &self.nodes {
      if color.get(node_id.as_str()) == Some(&0) {
        if let Some(cycle) = dfs(node_id.as_str(), self, &mut color, &mut stack) {
          return Some(cycle);
        }
      }
    }

    None
  }
}
