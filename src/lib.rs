//! ytagency - a multi-agent YouTube content agency
//!
//! Specialized agents produce video ideas, titles and scripts by drawing on
//! reference material in Notion, YouTube data and newsletters, and by routing
//! work to each other along a fixed communication graph.
//!
//! # Overview
//!
//! ytagency allows you to:
//! - Ask a strategy agent for video ideas backed by research
//! - Generate titles from your own proven title frameworks
//! - Write scripts modelled on your past scripts
//! - Serve the agency over HTTP for other systems
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management and agent instructions
//! - `notion` - Document store abstraction and the Notion client
//! - `extraction` - Pagination, record filtering and markdown rendering
//! - `mcp` - Tool servers and per-server tool filtering
//! - `agent` - Agents, the communication graph and request routing
//! - `orchestrator` - Assembly of the agency from settings
//!
//! # Example
//!
//! ```rust,no_run
//! use ytagency::config::Settings;
//! use ytagency::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let answer = orchestrator
//!         .agency()
//!         .handle("Give me three video ideas about MCP servers")
//!         .await?;
//!     println!("{}", answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod mcp;
pub mod notion;
pub mod openai;
pub mod orchestrator;

pub use error::{AgencyError, Result};
