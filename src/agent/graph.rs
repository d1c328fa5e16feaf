//! Communication topology between agents.

use super::node::AgentNode;
use crate::error::{AgencyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// How a source agent reaches a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Nested call: the source waits for the target's answer and resumes.
    #[default]
    Delegate,
    /// The target takes over the conversation; the source does not resume.
    Handoff,
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingMode::Delegate => write!(f, "delegate"),
            RoutingMode::Handoff => write!(f, "handoff"),
        }
    }
}

/// Directed edge from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub mode: RoutingMode,
}

impl Edge {
    pub fn delegate(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            mode: RoutingMode::Delegate,
        }
    }

    pub fn handoff(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            mode: RoutingMode::Handoff,
        }
    }
}

/// Agents plus the edges that say who may address whom.
///
/// Built once and read-only afterwards. Construction rejects edges to
/// unknown agents and any cycle made only of delegate edges, since such a
/// chain of nested calls could never unwind.
#[derive(Debug)]
pub struct CommunicationGraph {
    nodes: Vec<AgentNode>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
    entry: usize,
    /// Agents a caller may address without going through another agent.
    entry_points: Vec<usize>,
}

impl CommunicationGraph {
    pub fn new(nodes: Vec<AgentNode>, edges: Vec<Edge>, entry: &str) -> Result<Self> {
        let mut index = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            if node.name.trim().is_empty() {
                return Err(AgencyError::InvalidGraph("agent with empty name".to_string()));
            }
            if index.insert(node.name.clone(), i).is_some() {
                return Err(AgencyError::InvalidGraph(format!(
                    "duplicate agent '{}'",
                    node.name
                )));
            }
        }

        let entry = *index.get(entry).ok_or_else(|| {
            AgencyError::InvalidGraph(format!("entry agent '{}' is not defined", entry))
        })?;

        let mut seen = HashSet::new();
        for edge in &edges {
            for endpoint in [&edge.source, &edge.target] {
                if !index.contains_key(endpoint) {
                    return Err(AgencyError::InvalidGraph(format!(
                        "edge {} -> {} references unknown agent '{}'",
                        edge.source, edge.target, endpoint
                    )));
                }
            }
            if !seen.insert((edge.source.as_str(), edge.target.as_str())) {
                return Err(AgencyError::InvalidGraph(format!(
                    "duplicate edge {} -> {}",
                    edge.source, edge.target
                )));
            }
            if edge.mode == RoutingMode::Handoff && edge.source == edge.target {
                return Err(AgencyError::InvalidGraph(format!(
                    "agent '{}' cannot hand off to itself",
                    edge.source
                )));
            }
        }

        if let Some(cycle) = delegate_cycle(&nodes, &edges) {
            return Err(AgencyError::InvalidGraph(format!(
                "delegate cycle without a handoff: {}",
                cycle.join(" -> ")
            )));
        }

        let graph = Self {
            nodes,
            index,
            edges,
            entry,
            entry_points: vec![entry],
        };

        for name in graph.unreachable() {
            warn!("Agent '{}' is not reachable from the entry agent", name);
        }
        debug!(
            "Communication graph: {} agents, {} edges",
            graph.nodes.len(),
            graph.edges.len()
        );

        Ok(graph)
    }

    /// Let callers address `names` directly, in addition to the entry agent.
    pub fn with_entry_points(mut self, names: &[String]) -> Result<Self> {
        for name in names {
            let i = *self.index.get(name).ok_or_else(|| {
                AgencyError::InvalidGraph(format!("entry point '{}' is not defined", name))
            })?;
            if !self.entry_points.contains(&i) {
                self.entry_points.push(i);
            }
        }
        Ok(self)
    }

    pub fn node(&self, name: &str) -> Option<&AgentNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Look up an agent, failing with `UnknownAgent`.
    pub fn require(&self, name: &str) -> Result<&AgentNode> {
        self.node(name)
            .ok_or_else(|| AgencyError::UnknownAgent(name.to_string()))
    }

    pub fn entry(&self) -> &AgentNode {
        &self.nodes[self.entry]
    }

    /// Agents a new conversation may start with, entry agent first.
    pub fn entry_points(&self) -> Vec<&str> {
        self.entry_points
            .iter()
            .map(|&i| self.nodes[i].name.as_str())
            .collect()
    }

    pub fn is_entry_point(&self, name: &str) -> bool {
        self.index
            .get(name)
            .is_some_and(|i| self.entry_points.contains(i))
    }

    pub fn nodes(&self) -> &[AgentNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn outgoing<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == source)
    }

    /// Agents `source` may reach with `mode`, in edge order.
    pub fn targets(&self, source: &str, mode: RoutingMode) -> Vec<&AgentNode> {
        self.outgoing(source)
            .filter(|e| e.mode == mode)
            .filter_map(|e| self.node(&e.target))
            .collect()
    }

    /// The mode of the edge `source -> target`, if one exists.
    pub fn route(&self, source: &str, target: &str) -> Option<RoutingMode> {
        self.outgoing(source)
            .find(|e| e.target == target)
            .map(|e| e.mode)
    }

    /// Agents that no path from an entry point reaches.
    pub fn unreachable(&self) -> Vec<&str> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<&str> = self.entry_points().into_iter().collect();

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name) {
                continue;
            }
            for edge in self.outgoing(name) {
                queue.push_back(edge.target.as_str());
            }
        }

        self.nodes
            .iter()
            .map(|n| n.name.as_str())
            .filter(|name| !visited.contains(name))
            .collect()
    }
}

/// Find a cycle that uses delegate edges only. Returns the path, closing node repeated.
fn delegate_cycle(nodes: &[AgentNode], edges: &[Edge]) -> Option<Vec<String>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges.iter().filter(|e| e.mode == RoutingMode::Delegate) {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let mut visited = HashSet::new();
    let mut on_stack = Vec::new();

    for node in nodes {
        if dfs_cycle(&node.name, &adjacency, &mut visited, &mut on_stack) {
            return Some(on_stack.into_iter().map(str::to_string).collect());
        }
    }
    None
}

fn dfs_cycle<'a>(
    node: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    on_stack: &mut Vec<&'a str>,
) -> bool {
    if let Some(pos) = on_stack.iter().position(|n| *n == node) {
        on_stack.drain(..pos);
        on_stack.push(node);
        return true;
    }
    if !visited.insert(node) {
        return false;
    }

    on_stack.push(node);
    if let Some(targets) = adjacency.get(node) {
        for &target in targets {
            if dfs_cycle(target, adjacency, visited, on_stack) {
                return true;
            }
        }
    }
    on_stack.pop();
    false
}
