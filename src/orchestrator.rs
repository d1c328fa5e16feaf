//! Agency assembly.
//!
//! Builds the document store, extraction tools, tool servers, agents and
//! communication graph described by the settings.

use crate::agent::{
    Agency, AgencyLimits, AgentNode, ChatModel, CommunicationGraph, LocalTool, OpenAiChatModel,
};
use crate::config::{
    Prompts, ServerSettings, Settings, SCRIPT_EXAMPLES_TOOL, TITLE_FRAMEWORKS_TOOL,
};
use crate::error::{AgencyError, Result};
use crate::extraction::ContentExtractionTool;
use crate::mcp::{StdioToolServer, ToolCapabilityFilter, ToolServer};
use crate::notion::{DocumentStore, NotionClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// The assembled agency and the components it was built from.
pub struct Orchestrator {
    settings: Settings,
    title_frameworks: Arc<ContentExtractionTool>,
    script_examples: Arc<ContentExtractionTool>,
    servers: Vec<Arc<ToolCapabilityFilter>>,
    agency: Agency,
}

impl Orchestrator {
    /// Create the agency with the Notion store, stdio tool servers and the OpenAI model.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Self::load_prompts(&settings)?;

        let store: Arc<dyn DocumentStore> = Arc::new(NotionClient::from_settings(&settings.notion)?);
        let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(
            &settings.llm.model,
            Duration::from_secs(settings.llm.timeout_secs),
        )?);

        Self::with_components(settings, prompts, store, model, |server| {
            Arc::new(StdioToolServer::from_settings(server)) as Arc<dyn ToolServer>
        })
    }

    /// Load instructions for the configured agents.
    pub fn load_prompts(settings: &Settings) -> Result<Prompts> {
        let names: Vec<&str> = settings
            .agency
            .agents
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
            &names,
        )
    }

    /// Create the agency with custom components.
    ///
    /// `connect` creates the transport for each configured tool server.
    #[instrument(skip_all)]
    pub fn with_components<F>(
        settings: Settings,
        prompts: Prompts,
        store: Arc<dyn DocumentStore>,
        model: Arc<dyn ChatModel>,
        connect: F,
    ) -> Result<Self>
    where
        F: Fn(&ServerSettings) -> Arc<dyn ToolServer>,
    {
        let title_frameworks = Arc::new(ContentExtractionTool::title_frameworks(
            store.clone(),
            &settings.extraction.title_frameworks,
        ));
        let script_examples = Arc::new(ContentExtractionTool::script_examples(
            store.clone(),
            &settings.extraction.script_examples,
        ));

        // Contradictory filters stop startup here rather than at call time
        let servers = settings
            .servers
            .iter()
            .map(|s| ToolCapabilityFilter::from_settings(connect(s), s).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        let mut nodes = Vec::with_capacity(settings.agency.agents.len());
        for agent in &settings.agency.agents {
            let mut node = AgentNode::new(&agent.name, &agent.description)
                .with_instructions(&prompts.instructions_for(&agent.name, &agent.description))
                .with_model(agent.model.clone());

            for tool in &agent.tools {
                let tool: Arc<dyn LocalTool> = match tool.as_str() {
                    TITLE_FRAMEWORKS_TOOL => title_frameworks.clone(),
                    SCRIPT_EXAMPLES_TOOL => script_examples.clone(),
                    other => {
                        return Err(AgencyError::Config(format!(
                            "agent '{}' uses unknown tool '{}'",
                            agent.name, other
                        )))
                    }
                };
                node = node.with_tool(tool);
            }

            for name in &agent.servers {
                let server = servers
                    .iter()
                    .find(|s| s.server_name() == name)
                    .ok_or_else(|| {
                        AgencyError::Config(format!(
                            "agent '{}' uses unknown server '{}'",
                            agent.name, name
                        ))
                    })?;
                node = node.with_server(server.clone());
            }

            nodes.push(node);
        }

        let graph = CommunicationGraph::new(
            nodes,
            settings.agency.flows.clone(),
            &settings.agency.entry,
        )?
        .with_entry_points(&settings.agency.entry_points)?;

        let limits = AgencyLimits {
            max_iterations: settings.llm.max_iterations,
            max_handoffs: settings.llm.max_handoffs,
            max_delegation_depth: settings.llm.max_delegation_depth,
        };

        info!(
            "Agency '{}' ready: {} agents, {} flows, entry {}",
            settings.agency.name,
            graph.nodes().len(),
            graph.edges().len(),
            graph.entry().name
        );

        let agency = Agency::new(graph, model).with_limits(limits);

        Ok(Self {
            settings,
            title_frameworks,
            script_examples,
            servers,
            agency,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn agency(&self) -> &Agency {
        &self.agency
    }

    /// An extraction tool by its tool name.
    pub fn extraction_tool(&self, name: &str) -> Option<Arc<ContentExtractionTool>> {
        match name {
            TITLE_FRAMEWORKS_TOOL => Some(self.title_frameworks.clone()),
            SCRIPT_EXAMPLES_TOOL => Some(self.script_examples.clone()),
            _ => None,
        }
    }

    pub fn server(&self, name: &str) -> Option<Arc<ToolCapabilityFilter>> {
        self.servers
            .iter()
            .find(|s| s.server_name() == name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ChatMessage, Conversation, ModelReply, ToolCallRequest};
    use crate::config::{GROK_AGENT, SCRIPT_AGENT, STRATEGY_AGENT, TITLE_AGENT};
    use crate::mcp::{Tool, ToolOutput};
    use crate::notion::{Block, BlockKind, MemoryDocumentStore, PropertyValue, Record, TextSpan};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use tokio_util::sync::CancellationToken;

    struct OfflineServer {
        name: String,
    }

    #[async_trait]
    impl ToolServer for OfflineServer {
        fn name(&self) -> &str {
            &self.name
        }

        async fn list_tools(&self) -> Result<Vec<Tool>> {
            Ok(vec![
                Tool {
                    name: "search_videos".to_string(),
                    description: String::new(),
                    input_schema: json!({"type": "object"}),
                },
                Tool {
                    name: "get_video_transcript".to_string(),
                    description: String::new(),
                    input_schema: json!({"type": "object"}),
                },
            ])
        }

        async fn call_tool(&self, name: &str, _arguments: Value) -> Result<ToolOutput> {
            Ok(ToolOutput {
                text: format!("{} ok", name),
                is_error: false,
            })
        }
    }

    struct Replay(std::sync::Mutex<VecDeque<ModelReply>>);

    #[async_trait]
    impl ChatModel for Replay {
        async fn complete(
            &self,
            _model: Option<&str>,
            _messages: &[ChatMessage],
            _tools: &[Tool],
        ) -> Result<ModelReply> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgencyError::Agent("no more replies".to_string()))
        }
    }

    fn build(settings: Settings, replies: Vec<ModelReply>) -> Result<Orchestrator> {
        let store = MemoryDocumentStore::new();
        store.insert_collection(
            &settings.extraction.script_examples.database_id,
            "scripts",
            vec![Record::new("s1", Utc::now()).with_property(
                "Name",
                PropertyValue::Title(vec![TextSpan::plain("Agents script")]),
            )],
        );
        store.insert_blocks("s1", vec![Block::text(BlockKind::Paragraph, "Hook first.")]);

        let prompts = Orchestrator::load_prompts(&settings)?;
        Orchestrator::with_components(
            settings,
            prompts,
            Arc::new(store),
            Arc::new(Replay(std::sync::Mutex::new(replies.into()))),
            |s| Arc::new(OfflineServer { name: s.name.clone() }) as Arc<dyn ToolServer>,
        )
    }

    #[test]
    fn test_default_agency_wiring() {
        let orchestrator = build(Settings::default(), Vec::new()).unwrap();
        let graph = orchestrator.agency().graph();

        assert_eq!(graph.nodes().len(), 6);
        assert_eq!(graph.entry().name, STRATEGY_AGENT);
        assert_eq!(
            graph.require(TITLE_AGENT).unwrap().local_tool_names(),
            vec![TITLE_FRAMEWORKS_TOOL]
        );
        assert_eq!(
            graph.require(STRATEGY_AGENT).unwrap().server_names(),
            vec!["youtube_toolbox"]
        );
        assert!(graph
            .require(SCRIPT_AGENT)
            .unwrap()
            .instructions
            .contains("fetch_script_examples"));
        assert!(orchestrator.extraction_tool("fetch_script_examples").is_some());
        assert!(orchestrator.extraction_tool("nope").is_none());
    }

    #[test]
    fn test_contradictory_filter_is_fatal() {
        let mut settings = Settings::default();
        settings.servers[0].allowed_tools = Some(vec!["search_videos".to_string()]);

        let err = build(settings, Vec::new()).err().unwrap();
        assert!(matches!(err, AgencyError::InvalidFilterConfig(_)));
    }

    #[test]
    fn test_unknown_tool_or_server_rejected() {
        let mut settings = Settings::default();
        settings.agency.agents[0].tools.push("fetch_everything".to_string());
        assert!(matches!(build(settings, Vec::new()), Err(AgencyError::Config(_))));

        let mut settings = Settings::default();
        settings.agency.agents[0].servers.push("missing".to_string());
        assert!(matches!(build(settings, Vec::new()), Err(AgencyError::Config(_))));
    }

    #[tokio::test]
    async fn test_blocked_server_tool_hidden() {
        let orchestrator = build(Settings::default(), Vec::new()).unwrap();
        let youtube = orchestrator.server("youtube_toolbox").unwrap();

        let names: Vec<String> = youtube
            .list_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["search_videos"]);
    }

    #[tokio::test]
    async fn test_handoff_to_script_writer_uses_examples() {
        let replies = vec![
            ModelReply::ToolCalls {
                content: None,
                calls: vec![ToolCallRequest {
                    id: "c1".to_string(),
                    name: "transfer_to_script_writer".to_string(),
                    arguments: "{}".to_string(),
                }],
            },
            ModelReply::ToolCalls {
                content: None,
                calls: vec![ToolCallRequest {
                    id: "c2".to_string(),
                    name: "fetch_script_examples".to_string(),
                    arguments: "{}".to_string(),
                }],
            },
            ModelReply::Final("Here is your script".to_string()),
        ];
        let orchestrator = build(Settings::default(), replies).unwrap();

        let mut conversation = Conversation::new();
        let response = orchestrator
            .agency()
            .respond(&mut conversation, "write a script", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.agent, SCRIPT_AGENT);
        assert_eq!(response.tool_calls.len(), 2);
        let report = &response.tool_calls[1].result;
        assert!(report.starts_with("# 📜 Script Examples"), "{}", report);
        assert!(report.contains("## 1. Agents script"));
        assert!(report.contains("Hook first."));
    }

    #[tokio::test]
    async fn test_only_entry_points_start_conversations() {
        let replies = vec![ModelReply::Final("Scene one".to_string())];
        let orchestrator = build(Settings::default(), replies).unwrap();
        let agency = orchestrator.agency();

        let mut conversation = Conversation::starting_with(GROK_AGENT);
        let err = agency
            .respond(&mut conversation, "any news?", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgencyError::NotAddressable(_)));

        let mut conversation = Conversation::starting_with(SCRIPT_AGENT);
        let response = agency
            .respond(&mut conversation, "draft a script", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.agent, SCRIPT_AGENT);
    }

    #[test]
    fn test_unknown_entry_point_rejected() {
        let mut settings = Settings::default();
        settings.agency.entry_points.push("Ghost".to_string());
        assert!(matches!(
            build(settings, Vec::new()),
            Err(AgencyError::InvalidGraph(_))
        ));
    }
}
