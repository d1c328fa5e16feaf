//! Tools offered to an agent during its turn.
//!
//! A node sees its own local tools, the filtered tools of its servers and
//! one routing tool per way it may reach another agent: `send_message` for
//! delegate targets and `transfer_to_<agent>` for each handoff target.

use super::graph::{CommunicationGraph, RoutingMode};
use super::node::AgentNode;
use crate::error::{AgencyError, Result};
use crate::mcp::{Tool, ToolCapabilityFilter};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Name of the delegation tool.
pub const SEND_MESSAGE: &str = "send_message";

/// A tool implemented in-process.
///
/// Failures are reported in the returned text so the agent can carry on.
#[async_trait]
pub trait LocalTool: Send + Sync {
    fn definition(&self) -> Tool;

    async fn invoke(&self, arguments: &Value) -> String;
}

static WORD_BOUNDARY: OnceLock<Regex> = OnceLock::new();

fn word_boundary() -> &'static Regex {
    WORD_BOUNDARY.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("Invalid regex"))
}

/// `YouTubeContentStrategyAgent` -> `you_tube_content_strategy_agent`.
pub fn snake_case(name: &str) -> String {
    word_boundary()
        .replace_all(name.trim(), "${1}_${2}")
        .replace([' ', '-'], "_")
        .to_lowercase()
}

pub fn transfer_tool_name(agent: &str) -> String {
    format!("transfer_to_{}", snake_case(agent))
}

fn send_message_tool(recipients: &[&AgentNode]) -> Tool {
    let names: Vec<&str> = recipients.iter().map(|n| n.name.as_str()).collect();
    let roster = recipients
        .iter()
        .map(|n| format!("- {}: {}", n.name, n.description))
        .collect::<Vec<_>>()
        .join("\n");

    Tool {
        name: SEND_MESSAGE.to_string(),
        description: format!(
            "Delegate a task to another agent and wait for its answer. \
            The recipient works on the message on its own and replies to you.\n\
            Available recipients:\n{}",
            roster
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "recipient": {
                    "type": "string",
                    "enum": names,
                    "description": "Agent to send the message to"
                },
                "message": {
                    "type": "string",
                    "description": "Task for the recipient, with all context it needs"
                }
            },
            "required": ["recipient", "message"]
        }),
    }
}

fn transfer_tool(target: &AgentNode) -> Tool {
    Tool {
        name: transfer_tool_name(&target.name),
        description: format!(
            "Hand the conversation over to {}. {} \
            Use this when the user should continue with that agent.",
            target.name, target.description
        ),
        input_schema: json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
    }
}

/// Arguments of a `send_message` call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SendMessage {
    pub recipient: String,
    pub message: String,
}

pub fn parse_send_message(arguments: &str) -> Result<SendMessage> {
    serde_json::from_str(arguments)
        .map_err(|e| AgencyError::Agent(format!("Invalid send_message arguments: {}", e)))
}

/// Parse tool arguments, treating an empty string as an empty object.
pub fn parse_arguments(arguments: &str) -> Result<Value> {
    if arguments.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(arguments)
        .map_err(|e| AgencyError::Agent(format!("Invalid tool arguments: {}", e)))
}

/// Where a tool call is dispatched.
#[derive(Clone)]
pub enum ToolRoute {
    Local(Arc<dyn LocalTool>),
    Server(Arc<ToolCapabilityFilter>),
    Delegate,
    Handoff(String),
}

/// The tools a node may call during one turn.
#[derive(Default)]
pub struct Toolbox {
    definitions: Vec<Tool>,
    routes: HashMap<String, ToolRoute>,
}

impl Toolbox {
    /// Collect a node's tools. A server that fails to list contributes nothing.
    ///
    /// Routing tools win name clashes: a local or server tool named like one
    /// is hidden.
    pub async fn assemble(node: &AgentNode, graph: &CommunicationGraph) -> Self {
        let mut routing = Vec::new();
        let delegates = graph.targets(&node.name, RoutingMode::Delegate);
        if !delegates.is_empty() {
            routing.push((send_message_tool(&delegates), ToolRoute::Delegate));
        }
        for target in graph.targets(&node.name, RoutingMode::Handoff) {
            routing.push((transfer_tool(target), ToolRoute::Handoff(target.name.clone())));
        }
        let reserved: HashSet<String> = routing.iter().map(|(t, _)| t.name.clone()).collect();

        let mut toolbox = Self::default();

        for tool in &node.local_tools {
            toolbox.add_owned(&reserved, &node.name, tool.definition(), ToolRoute::Local(tool.clone()));
        }

        for server in &node.servers {
            match server.list_tools().await {
                Ok(tools) => {
                    for tool in tools {
                        toolbox.add_owned(&reserved, &node.name, tool, ToolRoute::Server(server.clone()));
                    }
                }
                Err(e) => warn!(
                    "{}: tools of {} unavailable this turn: {}",
                    node.name,
                    server.server_name(),
                    e
                ),
            }
        }

        for (tool, route) in routing {
            toolbox.add(tool, route);
        }

        toolbox
    }

    /// Add a local or server tool unless a routing tool owns its name.
    fn add_owned(&mut self, reserved: &HashSet<String>, agent: &str, tool: Tool, route: ToolRoute) {
        if reserved.contains(&tool.name) {
            warn!("{}: tool '{}' clashes with a routing tool and is hidden", agent, tool.name);
            return;
        }
        self.add(tool, route);
    }

    fn add(&mut self, tool: Tool, route: ToolRoute) {
        if self.routes.contains_key(&tool.name) {
            warn!("Duplicate tool name '{}' ignored", tool.name);
            return;
        }
        self.routes.insert(tool.name.clone(), route);
        self.definitions.push(tool);
    }

    pub fn definitions(&self) -> &[Tool] {
        &self.definitions
    }

    pub fn route(&self, name: &str) -> Option<&ToolRoute> {
        self.routes.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions.iter().map(|t| t.name.as_str()).collect()
    }
}
