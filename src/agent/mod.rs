//! Agents, the graph that connects them and the runtime that routes between them.
//!
//! Each agent gets its own tools plus routing tools derived from its
//! outgoing edges. Delegation runs the target as a nested call whose
//! answer returns to the caller; a handoff makes the target the active
//! agent of the conversation.

mod graph;
mod model;
mod node;
mod runner;
mod tools;

pub use graph::{CommunicationGraph, Edge, RoutingMode};
pub use model::{ChatMessage, ChatModel, ModelReply, OpenAiChatModel, ToolCallRequest};
pub use node::AgentNode;
pub use runner::{Agency, AgencyLimits, AgentResponse, Conversation, ToolCallRecord};
pub use tools::{
    parse_send_message, snake_case, transfer_tool_name, LocalTool, SendMessage, Toolbox,
    ToolRoute, SEND_MESSAGE,
};
