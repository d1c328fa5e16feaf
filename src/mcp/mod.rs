//! MCP (Model Context Protocol) tool servers.
//!
//! Agents reach external capabilities through tool servers spoken to over
//! JSON-RPC 2.0 on a child process's stdio. Every server is wrapped in a
//! [`ToolCapabilityFilter`] that decides which of its tools are visible.

mod client;
mod filter;
mod protocol;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use client::StdioToolServer;
pub use filter::{ToolCapabilityFilter, ToolPolicy};
pub use protocol::{Tool, ToolOutput};

/// A remote provider of tools.
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Every tool the server exposes.
    async fn list_tools(&self) -> Result<Vec<Tool>>;

    /// Invoke a tool by name.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput>;
}
