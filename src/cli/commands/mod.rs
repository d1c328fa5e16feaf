//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod fetch;
mod graph;
mod init;
mod serve;
mod tools;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use fetch::run_fetch;
pub use graph::run_graph;
pub use init::run_init;
pub use serve::run_serve;
pub use tools::run_tools;

use crate::agent::Conversation;

/// A fresh conversation, optionally starting with a given agent.
fn conversation_for(agent: Option<&str>) -> Conversation {
    match agent {
        Some(agent) => Conversation::starting_with(agent),
        None => Conversation::new(),
    }
}
