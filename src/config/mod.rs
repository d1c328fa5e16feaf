//! Configuration module for the agency.
//!
//! Handles loading and managing application settings and agent instructions.

mod prompts;
mod settings;

pub use prompts::Prompts;
pub use settings::{
    AgencySettings, AgentSettings, ExtractionSettings, ExtractionToolSettings, GeneralSettings,
    LlmSettings, NotionSettings, PromptSettings, ServerSettings, Settings, BUILDER_AGENT,
    GROK_AGENT, NEWSLETTER_AGENT, SCRIPT_AGENT, SCRIPT_EXAMPLES_TOOL, STRATEGY_AGENT, TITLE_AGENT,
    TITLE_FRAMEWORKS_TOOL,
};
