//! A named agent and the capabilities it owns.

use super::tools::LocalTool;
use crate::mcp::ToolCapabilityFilter;
use std::sync::Arc;

/// One agent in the agency.
#[derive(Clone)]
pub struct AgentNode {
    /// Unique name, also used to address the agent.
    pub name: String,
    /// Short description shown to agents that may route to this one.
    pub description: String,
    /// System instructions for the agent's turns.
    pub instructions: String,
    /// Model override; the agency default is used when unset.
    pub model: Option<String>,
    pub local_tools: Vec<Arc<dyn LocalTool>>,
    pub servers: Vec<Arc<ToolCapabilityFilter>>,
}

impl AgentNode {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            instructions: String::new(),
            model: None,
            local_tools: Vec::new(),
            servers: Vec::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.instructions = instructions.to_string();
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn LocalTool>) -> Self {
        self.local_tools.push(tool);
        self
    }

    pub fn with_server(mut self, server: Arc<ToolCapabilityFilter>) -> Self {
        self.servers.push(server);
        self
    }

    pub fn local_tool_names(&self) -> Vec<String> {
        self.local_tools
            .iter()
            .map(|t| t.definition().name)
            .collect()
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.server_name()).collect()
    }
}

impl std::fmt::Debug for AgentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentNode")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("local_tools", &self.local_tool_names())
            .field("servers", &self.server_names())
            .finish()
    }
}
