//! Agency runtime: drives agent turns and routes between agents.

use super::graph::{CommunicationGraph, RoutingMode};
use super::model::{ChatMessage, ChatModel, ModelReply, ToolCallRequest};
use super::node::AgentNode;
use super::tools::{parse_arguments, parse_send_message, ToolRoute, Toolbox};
use crate::error::{AgencyError, Result};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bounds on a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgencyLimits {
    /// Model calls per agent turn.
    pub max_iterations: usize,
    /// Handoffs while serving one request.
    pub max_handoffs: usize,
    /// Nesting of delegated sub-tasks.
    pub max_delegation_depth: usize,
}

impl Default for AgencyLimits {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_handoffs: 4,
            max_delegation_depth: 3,
        }
    }
}

/// One conversation with the agency.
///
/// Holds the shared transcript and the agent currently in charge, which
/// changes only through a handoff.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Uuid,
    active: Option<String>,
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            active: None,
            messages: Vec::new(),
        }
    }

    /// A conversation whose first request goes to `agent` instead of the entry agent.
    pub fn starting_with(agent: &str) -> Self {
        Self {
            active: Some(agent.to_string()),
            ..Self::new()
        }
    }

    /// The agent that answers the next request, if one has been set.
    pub fn active_agent(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

enum TurnOutcome {
    Final(String),
    Handoff(String),
}

#[derive(Default)]
struct Trace {
    tool_calls: Vec<ToolCallRecord>,
    iterations: usize,
}

/// Agents wired by a communication graph, answering requests through a chat model.
pub struct Agency {
    graph: CommunicationGraph,
    model: Arc<dyn ChatModel>,
    limits: AgencyLimits,
    default_conversation: Mutex<Conversation>,
}

impl Agency {
    pub fn new(graph: CommunicationGraph, model: Arc<dyn ChatModel>) -> Self {
        Self {
            graph,
            model,
            limits: AgencyLimits::default(),
            default_conversation: Mutex::new(Conversation::new()),
        }
    }

    pub fn with_limits(mut self, limits: AgencyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn graph(&self) -> &CommunicationGraph {
        &self.graph
    }

    /// Answer a request within the agency's default conversation.
    ///
    /// Callers of `handle` share that one conversation, so their requests are
    /// answered one after another. Independent callers should each keep a
    /// [`Conversation`] and use [`Agency::respond`], which runs concurrently.
    pub async fn handle(&self, request: &str) -> Result<String> {
        let mut conversation = self.default_conversation.lock().await;
        let response = self
            .respond(&mut conversation, request, &CancellationToken::new())
            .await?;
        Ok(response.content)
    }

    /// Answer a request within `conversation`.
    ///
    /// The active agent (the entry agent at first) takes the request. A
    /// conversation may only start with an entry point. On failure or
    /// cancellation the conversation is left as it was before the call.
    pub async fn respond(
        &self,
        conversation: &mut Conversation,
        request: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse> {
        if conversation.messages.is_empty() {
            if let Some(agent) = conversation.active.as_deref() {
                self.graph.require(agent)?;
                if !self.graph.is_entry_point(agent) {
                    return Err(AgencyError::NotAddressable(agent.to_string()));
                }
            }
        }

        let start = conversation
            .active
            .clone()
            .unwrap_or_else(|| self.graph.entry().name.clone());
        let checkpoint = conversation.messages.len();

        info!(
            "Conversation {}: request routed to {}",
            conversation.id, start
        );

        conversation
            .messages
            .push(ChatMessage::User(request.to_string()));

        let mut trace = Trace::default();
        let outcome = self
            .converse(start, &mut conversation.messages, 0, cancel, &mut trace)
            .await;

        match outcome {
            Ok((agent, content)) => {
                conversation.active = Some(agent.clone());
                Ok(AgentResponse {
                    content,
                    agent,
                    tool_calls: trace.tool_calls,
                    iterations: trace.iterations,
                })
            }
            Err(e) => {
                conversation.messages.truncate(checkpoint);
                Err(e)
            }
        }
    }

    /// Run agents over `messages` until one gives a final answer, following handoffs.
    fn converse<'a>(
        &'a self,
        start: String,
        messages: &'a mut Vec<ChatMessage>,
        depth: usize,
        cancel: &'a CancellationToken,
        trace: &'a mut Trace,
    ) -> BoxFuture<'a, Result<(String, String)>> {
        async move {
            let mut agent = start;
            let mut handoffs = 0;

            loop {
                match self.run_turn(&agent, messages, depth, cancel, trace).await? {
                    TurnOutcome::Final(content) => return Ok((agent, content)),
                    TurnOutcome::Handoff(target) => {
                        handoffs += 1;
                        if handoffs > self.limits.max_handoffs {
                            return Err(AgencyError::Agent(format!(
                                "Exceeded maximum handoffs ({})",
                                self.limits.max_handoffs
                            )));
                        }
                        info!("{} handed off to {}", agent, target);
                        agent = target;
                    }
                }
            }
        }
        .boxed()
    }

    /// One agent's turn: call the model until it answers or hands off.
    async fn run_turn(
        &self,
        agent: &str,
        messages: &mut Vec<ChatMessage>,
        depth: usize,
        cancel: &CancellationToken,
        trace: &mut Trace,
    ) -> Result<TurnOutcome> {
        let node = self.graph.require(agent)?;
        let toolbox = Toolbox::assemble(node, &self.graph).await;
        let system = ChatMessage::System(node.instructions.clone());
        let mut iterations = 0;

        loop {
            iterations += 1;
            if iterations > self.limits.max_iterations {
                return Err(AgencyError::Agent(format!(
                    "{} exceeded maximum iterations ({})",
                    node.name, self.limits.max_iterations
                )));
            }
            check_cancelled(cancel)?;

            debug!("{} iteration {}", node.name, iterations);
            trace.iterations += 1;

            let history: Vec<ChatMessage> = std::iter::once(system.clone())
                .chain(messages.iter().cloned())
                .collect();
            let reply = self
                .model
                .complete(node.model.as_deref(), &history, toolbox.definitions())
                .await?;

            let (content, calls) = match reply {
                ModelReply::Final(content) => {
                    messages.push(ChatMessage::assistant(&content));
                    return Ok(TurnOutcome::Final(content));
                }
                ModelReply::ToolCalls { content, calls } => (content, calls),
            };

            messages.push(ChatMessage::Assistant {
                content,
                tool_calls: calls.clone(),
            });

            let mut handoff: Option<String> = None;
            for call in &calls {
                if let Some(target) = &handoff {
                    messages.push(ChatMessage::tool(
                        &call.id,
                        &format!("Not executed: the conversation was transferred to {}.", target),
                    ));
                    continue;
                }
                check_cancelled(cancel)?;

                info!("{} calling tool: {} with args: {}", node.name, call.name, call.arguments);

                let result = match toolbox.route(&call.name) {
                    None => format!("Unknown tool: {}", call.name),
                    Some(ToolRoute::Handoff(target)) => {
                        handoff = Some(target.clone());
                        format!("Transferred to {}. {} continues the conversation.", target, target)
                    }
                    Some(ToolRoute::Delegate) => {
                        self.delegate(node, call, depth, cancel, trace).await?
                    }
                    Some(ToolRoute::Local(tool)) => match parse_arguments(&call.arguments) {
                        Ok(args) => tool.invoke(&args).await,
                        Err(e) => format!("Failed to parse tool call: {}", e),
                    },
                    Some(ToolRoute::Server(server)) => match parse_arguments(&call.arguments) {
                        Ok(args) => match server.call(&call.name, args).await {
                            Ok(output) if output.is_error => format!("Tool error: {}", output.text),
                            Ok(output) => output.text,
                            Err(e) => format!("Tool error: {}", e),
                        },
                        Err(e) => format!("Failed to parse tool call: {}", e),
                    },
                };

                trace.tool_calls.push(ToolCallRecord {
                    agent: node.name.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: result.clone(),
                });
                messages.push(ChatMessage::tool(&call.id, &result));
            }

            if let Some(target) = handoff {
                return Ok(TurnOutcome::Handoff(target));
            }
        }
    }

    /// Run a `send_message` call as a nested conversation and return its answer.
    ///
    /// Only cancellation escapes; every other failure becomes the tool result.
    async fn delegate(
        &self,
        node: &AgentNode,
        call: &ToolCallRequest,
        depth: usize,
        cancel: &CancellationToken,
        trace: &mut Trace,
    ) -> Result<String> {
        let request = match parse_send_message(&call.arguments) {
            Ok(request) => request,
            Err(e) => return Ok(format!("Failed to parse tool call: {}", e)),
        };

        if self.graph.route(&node.name, &request.recipient) != Some(RoutingMode::Delegate) {
            let recipients: Vec<&str> = self
                .graph
                .targets(&node.name, RoutingMode::Delegate)
                .iter()
                .map(|n| n.name.as_str())
                .collect();
            warn!("{} tried to message {}", node.name, request.recipient);
            return Ok(format!(
                "{} cannot send messages to {}. Available recipients: {}",
                node.name,
                request.recipient,
                recipients.join(", ")
            ));
        }

        if depth >= self.limits.max_delegation_depth {
            warn!(
                "{} reached the delegation depth limit ({})",
                node.name, self.limits.max_delegation_depth
            );
            return Ok(format!(
                "Delegation depth limit ({}) reached. Answer without contacting {}.",
                self.limits.max_delegation_depth, request.recipient
            ));
        }

        info!("{} delegating to {}", node.name, request.recipient);

        let mut sub_conversation = vec![ChatMessage::User(request.message)];
        match self
            .converse(
                request.recipient.clone(),
                &mut sub_conversation,
                depth + 1,
                cancel,
                trace,
            )
            .await
        {
            Ok((_, content)) => Ok(content),
            Err(AgencyError::Cancelled) => Err(AgencyError::Cancelled),
            Err(e) => Ok(format!(
                "{} could not complete the task: {}",
                request.recipient, e
            )),
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(AgencyError::Cancelled);
    }
    Ok(())
}

/// Response from an agency request.
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    /// The final response content.
    pub content: String,
    /// Agent that produced the answer and now holds the conversation.
    pub agent: String,
    /// Record of all tool calls made during execution, nested delegations included.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of model calls used.
    pub iterations: usize,
}

/// Record of a tool call made by an agent.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    /// Agent that made the call.
    pub agent: String,
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::graph::Edge;
    use crate::mcp::Tool;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct ScriptedModel {
        replies: std::sync::Mutex<VecDeque<ModelReply>>,
        seen: std::sync::Mutex<Vec<Vec<ChatMessage>>>,
        cancel_on_call: Option<(usize, CancellationToken)>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<ModelReply>) -> Self {
            Self {
                replies: std::sync::Mutex::new(replies.into()),
                seen: std::sync::Mutex::new(Vec::new()),
                cancel_on_call: None,
            }
        }

        fn cancelling_on(mut self, call: usize, token: CancellationToken) -> Self {
            self.cancel_on_call = Some((call, token));
            self
        }

        /// System prompt of each model call, in order.
        fn callers(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|history| match history.first() {
                    Some(ChatMessage::System(s)) => s.clone(),
                    _ => String::new(),
                })
                .collect()
        }

        fn history(&self, call: usize) -> Vec<ChatMessage> {
            self.seen.lock().unwrap()[call].clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            _model: Option<&str>,
            messages: &[ChatMessage],
            _tools: &[Tool],
        ) -> Result<ModelReply> {
            let n = {
                let mut seen = self.seen.lock().unwrap();
                seen.push(messages.to_vec());
                seen.len()
            };
            if let Some((at, token)) = &self.cancel_on_call {
                if *at == n {
                    token.cancel();
                }
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgencyError::Agent("script exhausted".to_string()))
        }
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn calls(calls: Vec<ToolCallRequest>) -> ModelReply {
        ModelReply::ToolCalls {
            content: None,
            calls,
        }
    }

    fn say(text: &str) -> ModelReply {
        ModelReply::Final(text.to_string())
    }

    fn node(name: &str) -> AgentNode {
        AgentNode::new(name, &format!("{} agent", name)).with_instructions(name)
    }

    /// Strategy hands off to Title, delegates to Grok; Title delegates to Builder.
    fn agency_graph() -> CommunicationGraph {
        CommunicationGraph::new(
            vec![node("Strategy"), node("Title"), node("Grok"), node("Builder")],
            vec![
                Edge::handoff("Strategy", "Title"),
                Edge::delegate("Strategy", "Grok"),
                Edge::delegate("Title", "Builder"),
            ],
            "Strategy",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_final_answer_from_entry() {
        let model = Arc::new(ScriptedModel::new(vec![say("hello")]));
        let agency = Agency::new(agency_graph(), model.clone());

        assert_eq!(agency.handle("hi").await.unwrap(), "hello");
        assert_eq!(model.callers(), vec!["Strategy"]);
    }

    #[tokio::test]
    async fn test_conversation_starting_with_agent() {
        let model = Arc::new(ScriptedModel::new(vec![say("titles")]));
        let graph = agency_graph()
            .with_entry_points(&["Title".to_string()])
            .unwrap();
        let agency = Agency::new(graph, model.clone());

        let mut conversation = Conversation::starting_with("Title");
        let response = agency
            .respond(&mut conversation, "titles please", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.agent, "Title");
        assert_eq!(model.callers(), vec!["Title"]);

        let mut conversation = Conversation::starting_with("Ghost");
        let err = agency
            .respond(&mut conversation, "hello", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgencyError::UnknownAgent(_)));
        assert!(conversation.messages().is_empty());
    }

    #[tokio::test]
    async fn test_agent_without_entry_point_cannot_start_conversation() {
        let model = Arc::new(ScriptedModel::new(vec![say("news")]));
        let agency = Agency::new(agency_graph(), model.clone());

        let mut conversation = Conversation::starting_with("Grok");
        let err = agency
            .respond(&mut conversation, "what's new?", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgencyError::NotAddressable(ref name) if name == "Grok"));
        assert!(conversation.messages().is_empty());
        assert!(model.callers().is_empty());
    }

    #[tokio::test]
    async fn test_delegate_resumes_caller() {
        let model = Arc::new(ScriptedModel::new(vec![
            calls(vec![call(
                "c1",
                "send_message",
                r#"{"recipient": "Grok", "message": "latest AI news?"}"#,
            )]),
            say("A new model shipped"),
            say("Video idea based on: A new model shipped"),
        ]));
        let agency = Agency::new(agency_graph(), model.clone());
        let mut conversation = Conversation::new();

        let response = agency
            .respond(&mut conversation, "ideas please", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.content, "Video idea based on: A new model shipped");
        assert_eq!(response.agent, "Strategy");
        assert_eq!(response.iterations, 3);
        assert_eq!(model.callers(), vec!["Strategy", "Grok", "Strategy"]);
        assert_eq!(conversation.active_agent(), Some("Strategy"));

        // Grok sees only the delegated message
        assert_eq!(
            model.history(1),
            vec![
                ChatMessage::System("Grok".to_string()),
                ChatMessage::User("latest AI news?".to_string())
            ]
        );
        // Strategy resumes with Grok's answer as the tool result
        assert_eq!(
            model.history(2).last(),
            Some(&ChatMessage::tool("c1", "A new model shipped"))
        );
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].agent, "Strategy");
    }

    #[tokio::test]
    async fn test_handoff_persists_across_requests() {
        let model = Arc::new(ScriptedModel::new(vec![
            calls(vec![call("c1", "transfer_to_title", "{}")]),
            say("Here are 5 titles"),
            say("Here are 5 more"),
        ]));
        let agency = Agency::new(agency_graph(), model.clone());
        let mut conversation = Conversation::new();
        let cancel = CancellationToken::new();

        let first = agency
            .respond(&mut conversation, "titles for my video", &cancel)
            .await
            .unwrap();
        assert_eq!(first.agent, "Title");
        assert_eq!(first.content, "Here are 5 titles");
        assert_eq!(conversation.active_agent(), Some("Title"));

        let second = agency
            .respond(&mut conversation, "more", &cancel)
            .await
            .unwrap();
        assert_eq!(second.agent, "Title");
        assert_eq!(model.callers(), vec!["Strategy", "Title", "Title"]);

        // Title inherits the transcript, including the original request
        assert!(model
            .history(1)
            .contains(&ChatMessage::User("titles for my video".to_string())));
    }

    #[tokio::test]
    async fn test_calls_after_handoff_are_not_executed() {
        let model = Arc::new(ScriptedModel::new(vec![
            calls(vec![
                call("c1", "transfer_to_title", "{}"),
                call(
                    "c2",
                    "send_message",
                    r#"{"recipient": "Grok", "message": "news"}"#,
                ),
            ]),
            say("titles"),
        ]));
        let agency = Agency::new(agency_graph(), model.clone());

        assert_eq!(agency.handle("go").await.unwrap(), "titles");
        assert_eq!(model.callers(), vec!["Strategy", "Title"]);

        let history = model.history(1);
        assert!(matches!(
            history.last(),
            Some(ChatMessage::Tool { call_id, content })
                if call_id == "c2" && content.starts_with("Not executed")
        ));
    }

    #[tokio::test]
    async fn test_unreachable_recipient_is_reported_to_caller() {
        let model = Arc::new(ScriptedModel::new(vec![
            calls(vec![call(
                "c1",
                "send_message",
                r#"{"recipient": "Builder", "message": "hi"}"#,
            )]),
            say("ok"),
        ]));
        let agency = Agency::new(agency_graph(), model.clone());

        let mut conversation = Conversation::new();
        let response = agency
            .respond(&mut conversation, "x", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(model.callers(), vec!["Strategy", "Strategy"]);
        assert_eq!(
            response.tool_calls[0].result,
            "Strategy cannot send messages to Builder. Available recipients: Grok"
        );
    }

    #[tokio::test]
    async fn test_delegation_depth_limit() {
        let graph = CommunicationGraph::new(
            vec![node("A"), node("B"), node("C")],
            vec![Edge::delegate("A", "B"), Edge::delegate("B", "C")],
            "A",
        )
        .unwrap();
        let model = Arc::new(ScriptedModel::new(vec![
            calls(vec![call("a1", "send_message", r#"{"recipient": "B", "message": "m"}"#)]),
            calls(vec![call("b1", "send_message", r#"{"recipient": "C", "message": "m"}"#)]),
            say("B alone"),
            say("A done"),
        ]));
        let agency = Agency::new(graph, model.clone()).with_limits(AgencyLimits {
            max_delegation_depth: 1,
            ..AgencyLimits::default()
        });

        let mut conversation = Conversation::new();
        let response = agency
            .respond(&mut conversation, "go", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.content, "A done");
        assert_eq!(model.callers(), vec!["A", "B", "B", "A"]);
        assert!(response.tool_calls[0]
            .result
            .starts_with("Delegation depth limit (1) reached"));
        assert_eq!(response.tool_calls[0].agent, "B");
        assert_eq!(response.tool_calls[1].result, "B alone");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let model = Arc::new(ScriptedModel::new(vec![say("never")]));
        let agency = Agency::new(agency_graph(), model.clone());
        let mut conversation = Conversation::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = agency
            .respond(&mut conversation, "hi", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AgencyError::Cancelled));
        assert!(model.callers().is_empty());
        assert!(conversation.messages().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_abandons_delegate_chain() {
        let cancel = CancellationToken::new();
        let model = Arc::new(
            ScriptedModel::new(vec![
                calls(vec![call(
                    "c1",
                    "send_message",
                    r#"{"recipient": "Grok", "message": "news"}"#,
                )]),
                say("news"),
                say("never reached"),
            ])
            .cancelling_on(2, cancel.clone()),
        );
        let agency = Agency::new(agency_graph(), model.clone());
        let mut conversation = Conversation::new();

        let err = agency
            .respond(&mut conversation, "go", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AgencyError::Cancelled));
        assert_eq!(model.callers(), vec!["Strategy", "Grok"]);
        assert!(conversation.messages().is_empty());
        assert_eq!(conversation.active_agent(), None);
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let replies = (0..10)
            .map(|i| calls(vec![call(&format!("c{}", i), "missing_tool", "{}")]))
            .collect();
        let model = Arc::new(ScriptedModel::new(replies));
        let agency = Agency::new(agency_graph(), model.clone()).with_limits(AgencyLimits {
            max_iterations: 3,
            ..AgencyLimits::default()
        });

        let err = agency.handle("loop").await.unwrap_err();
        assert!(matches!(err, AgencyError::Agent(_)));
        assert_eq!(model.callers().len(), 3);
    }

    #[tokio::test]
    async fn test_handoff_limit() {
        let graph = CommunicationGraph::new(
            vec![node("A"), node("B")],
            vec![Edge::handoff("A", "B"), Edge::handoff("B", "A")],
            "A",
        )
        .unwrap();
        let replies = (0..10)
            .map(|i| {
                let target = if i % 2 == 0 { "transfer_to_b" } else { "transfer_to_a" };
                calls(vec![call(&format!("c{}", i), target, "{}")])
            })
            .collect();
        let model = Arc::new(ScriptedModel::new(replies));
        let agency = Agency::new(graph, model.clone()).with_limits(AgencyLimits {
            max_handoffs: 2,
            ..AgencyLimits::default()
        });

        let err = agency.handle("ping").await.unwrap_err();
        assert!(matches!(err, AgencyError::Agent(msg) if msg.contains("handoffs")));
        assert_eq!(model.callers(), vec!["A", "B", "A"]);
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            agent: "Strategy".to_string(),
            name: "send_message".to_string(),
            arguments: r#"{"recipient": "Grok"}"#.to_string(),
            result: "ok".to_string(),
        };
        assert_eq!(format!("{}", record), r#"send_message({"recipient": "Grok"})"#);
    }

    /// Answers only once two calls are waiting at the same time.
    struct Rendezvous(tokio::sync::Barrier);

    #[async_trait]
    impl ChatModel for Rendezvous {
        async fn complete(
            &self,
            _model: Option<&str>,
            _messages: &[ChatMessage],
            _tools: &[Tool],
        ) -> Result<ModelReply> {
            self.0.wait().await;
            Ok(say("met"))
        }
    }

    #[tokio::test]
    async fn test_independent_conversations_run_concurrently() {
        let model = Arc::new(Rendezvous(tokio::sync::Barrier::new(2)));
        let agency = Agency::new(agency_graph(), model);
        let cancel = CancellationToken::new();

        let mut first = Conversation::new();
        let mut second = Conversation::new();
        let both = futures::future::join(
            agency.respond(&mut first, "one", &cancel),
            agency.respond(&mut second, "two", &cancel),
        );
        let (a, b) = tokio::time::timeout(std::time::Duration::from_secs(5), both)
            .await
            .expect("conversations blocked each other");

        assert_eq!(a.unwrap().content, "met");
        assert_eq!(b.unwrap().content, "met");
    }
}
