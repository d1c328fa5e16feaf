//! Configuration settings for the agency.

use crate::agent::{Edge, RoutingMode};
use crate::error::{AgencyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Name of the agent that receives requests by default.
pub const STRATEGY_AGENT: &str = "YouTubeContentStrategyAgent";
pub const TITLE_AGENT: &str = "TitleGenerationAgent";
pub const GROK_AGENT: &str = "GrokNewsAgent";
pub const NEWSLETTER_AGENT: &str = "NewsletterAgent";
pub const BUILDER_AGENT: &str = "BuilderTomAgent";
pub const SCRIPT_AGENT: &str = "ScriptWriter";

/// Local tool names agents can be given.
pub const TITLE_FRAMEWORKS_TOOL: &str = "fetch_title_frameworks";
pub const SCRIPT_EXAMPLES_TOOL: &str = "fetch_script_examples";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub notion: NotionSettings,
    pub extraction: ExtractionSettings,
    pub servers: Vec<ServerSettings>,
    pub agency: AgencySettings,
    pub prompts: PromptSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            llm: LlmSettings::default(),
            notion: NotionSettings::default(),
            extraction: ExtractionSettings::default(),
            servers: vec![ServerSettings::youtube_toolbox(), ServerSettings::readwise_reader()],
            agency: AgencySettings::default(),
            prompts: PromptSettings::default(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.ytagency".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Language model settings shared by all agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Default chat model; agents may override it.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Model calls allowed per agent turn.
    pub max_iterations: usize,
    /// Handoffs allowed while serving one request.
    pub max_handoffs: usize,
    /// Nesting allowed for delegated sub-tasks.
    pub max_delegation_depth: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            timeout_secs: crate::openai::DEFAULT_TIMEOUT_SECS,
            max_iterations: 15,
            max_handoffs: 4,
            max_delegation_depth: 3,
        }
    }
}

/// Notion API access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionSettings {
    /// Environment variable holding the integration token.
    pub api_key_env: String,
    pub base_url: String,
    /// Value of the `Notion-Version` header.
    pub api_version: String,
    pub timeout_secs: u64,
}

impl Default for NotionSettings {
    fn default() -> Self {
        Self {
            api_key_env: "NOTION_API_KEY".to_string(),
            base_url: "https://api.notion.com/v1".to_string(),
            api_version: "2025-09-03".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Settings of the two reference material tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub title_frameworks: ExtractionToolSettings,
    pub script_examples: ExtractionToolSettings,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            title_frameworks: ExtractionToolSettings {
                database_id: "2065bd4b16a680dfb365ed6f0e3fbd79".to_string(),
                title_property: "Title Framework".to_string(),
                page_size: 100,
                title_contains: None,
                exclude_keywords: Vec::new(),
                max_records: 0,
                newest_first: false,
            },
            script_examples: ExtractionToolSettings {
                database_id: "fa2a7c11-17aa-4366-bdca-049568653c14".to_string(),
                title_property: "Name".to_string(),
                page_size: 50,
                title_contains: Some("script".to_string()),
                exclude_keywords: ["description", "thumbnail", "idea", "tags"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                max_records: 10,
                newest_first: true,
            },
        }
    }
}

/// One extraction tool's collection and selection rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionToolSettings {
    /// Notion database id.
    pub database_id: String,
    /// Property holding each record's title.
    pub title_property: String,
    /// Records requested per page (the store caps this at 100).
    pub page_size: usize,
    /// Case-insensitive substring the title must contain.
    pub title_contains: Option<String>,
    /// Case-insensitive substrings that exclude a record.
    pub exclude_keywords: Vec<String>,
    /// Records kept after filtering; 0 keeps all.
    pub max_records: usize,
    /// Most recently edited records first.
    pub newest_first: bool,
}

impl Default for ExtractionToolSettings {
    fn default() -> Self {
        Self {
            database_id: String::new(),
            title_property: "Name".to_string(),
            page_size: 100,
            title_contains: None,
            exclude_keywords: Vec::new(),
            max_records: 0,
            newest_first: false,
        }
    }
}

/// An MCP tool server started as a child process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub name: String,
    pub command: String,
    /// Arguments; `~` and `$VAR` are expanded.
    pub args: Vec<String>,
    /// Extra environment; values are expanded like args.
    pub env: BTreeMap<String, String>,
    /// Fetch the tool list once and reuse it.
    pub cache_tools_list: bool,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Only these tools are visible. Exclusive with `blocked_tools`.
    pub allowed_tools: Option<Vec<String>>,
    /// These tools are hidden. Exclusive with `allowed_tools`.
    pub blocked_tools: Option<Vec<String>>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            command: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cache_tools_list: false,
            timeout_secs: 30,
            allowed_tools: None,
            blocked_tools: None,
        }
    }
}

impl ServerSettings {
    pub fn youtube_toolbox() -> Self {
        Self {
            name: "youtube_toolbox".to_string(),
            command: "uv".to_string(),
            args: vec![
                "--directory".to_string(),
                "~/mcp/py-mcp-youtube-toolbox".to_string(),
                "run".to_string(),
                "server.py".to_string(),
            ],
            env: BTreeMap::from([("YOUTUBE_API_KEY".to_string(), "$YOUTUBE_API_KEY".to_string())]),
            cache_tools_list: true,
            timeout_secs: 10,
            allowed_tools: None,
            blocked_tools: Some(vec![
                "get_video_transcript".to_string(),
                "get_video_enhanced_transcript".to_string(),
            ]),
        }
    }

    pub fn readwise_reader() -> Self {
        Self {
            name: "readwise_reader".to_string(),
            command: "node".to_string(),
            args: vec!["~/mcp/readwise-reader-mcp/dist/index.js".to_string()],
            env: BTreeMap::from([("READWISE_TOKEN".to_string(), "$READWISE_TOKEN".to_string())]),
            cache_tools_list: true,
            timeout_secs: 30,
            allowed_tools: Some(vec!["readwise_list_documents".to_string()]),
            blocked_tools: None,
        }
    }
}

/// Agents and the flows between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgencySettings {
    pub name: String,
    /// Agent that takes new conversations.
    pub entry: String,
    /// Other agents a caller may start a conversation with.
    pub entry_points: Vec<String>,
    pub agents: Vec<AgentSettings>,
    /// Directed flows; `mode` defaults to delegate.
    pub flows: Vec<Edge>,
}

impl Default for AgencySettings {
    fn default() -> Self {
        Self {
            name: "YouTubeContentAgency".to_string(),
            entry: STRATEGY_AGENT.to_string(),
            entry_points: [STRATEGY_AGENT, TITLE_AGENT, BUILDER_AGENT, SCRIPT_AGENT]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            agents: vec![
                AgentSettings::new(
                    STRATEGY_AGENT,
                    "A specialized agent for developing YouTube content strategies, optimizing \
                    video, channel, and trend performance, and analyzing audience engagement to \
                    maximize channel growth.",
                )
                .with_servers(&["youtube_toolbox"]),
                AgentSettings::new(
                    TITLE_AGENT,
                    "A specialized agent focused on creating compelling, high-converting YouTube \
                    video titles and thumbnail text based on video content, trends, and \
                    performance data. Has access to Notion database with proven title frameworks.",
                )
                .with_tools(&[TITLE_FRAMEWORKS_TOOL]),
                AgentSettings::new(
                    GROK_AGENT,
                    "A specialized news research agent that fetches the most recent AI news and \
                    viral tweets, providing trend analysis and content opportunities for YouTube \
                    content strategy.",
                ),
                AgentSettings::new(
                    NEWSLETTER_AGENT,
                    "A specialized agent for fetching and summarizing news from Readwise Reader, \
                    identifying significant releases, updates, and recurring topics relevant for \
                    video content.",
                )
                .with_servers(&["readwise_reader"]),
                AgentSettings::new(
                    BUILDER_AGENT,
                    "An ICP (Ideal Customer Profile) persona agent representing the target \
                    audience of the channel. Provides authentic feedback on video titles, content \
                    ideas, and strategies from the perspective of the ideal viewer.",
                ),
                AgentSettings::new(SCRIPT_AGENT, "Expert script writer for YouTube content.")
                    .with_tools(&[SCRIPT_EXAMPLES_TOOL]),
            ],
            flows: vec![
                Edge::handoff(STRATEGY_AGENT, TITLE_AGENT),
                Edge::delegate(STRATEGY_AGENT, GROK_AGENT),
                Edge::handoff(STRATEGY_AGENT, SCRIPT_AGENT),
                Edge::delegate(STRATEGY_AGENT, NEWSLETTER_AGENT),
                Edge::delegate(STRATEGY_AGENT, BUILDER_AGENT),
                Edge::delegate(TITLE_AGENT, BUILDER_AGENT),
            ],
        }
    }
}

impl AgencySettings {
    pub fn flows_with(&self, mode: RoutingMode) -> impl Iterator<Item = &Edge> {
        self.flows.iter().filter(move |f| f.mode == mode)
    }
}

/// One agent's identity and capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub name: String,
    pub description: String,
    /// Model override.
    pub model: Option<String>,
    /// Local tools by name.
    pub tools: Vec<String>,
    /// Tool servers by name.
    pub servers: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            model: None,
            tools: Vec::new(),
            servers: Vec::new(),
        }
    }
}

impl AgentSettings {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            ..Self::default()
        }
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_servers(mut self, servers: &[&str]) -> Self {
        self.servers = servers.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom instructions (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all instructions as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AgencyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ytagency")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    pub fn server(&self, name: &str) -> Option<&ServerSettings> {
        self.servers.iter().find(|s| s.name == name)
    }
}
