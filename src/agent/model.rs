//! Chat model seam between the routing runtime and the LLM provider.

use crate::error::{AgencyError, Result};
use crate::mcp::Tool;
use crate::openai::create_client_with_timeout;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObject,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// A message in an agent's history.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn assistant(content: &str) -> Self {
        ChatMessage::Assistant {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool(call_id: &str, content: &str) -> Self {
        ChatMessage::Tool {
            call_id: call_id.to_string(),
            content: content.to_string(),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

/// What the model answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Final(String),
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCallRequest>,
    },
}

/// Produces the next assistant step from a history and a tool list.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// `model` overrides the implementation's default model when set.
    async fn complete(
        &self,
        model: Option<&str>,
        messages: &[ChatMessage],
        tools: &[Tool],
    ) -> Result<ModelReply>;
}

/// Chat completions with tool calling on the OpenAI API.
pub struct OpenAiChatModel {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(timeout)?,
            model: model.to_string(),
        })
    }
}

fn build_err(e: impl std::fmt::Display) -> AgencyError {
    AgencyError::Agent(e.to_string())
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let message = match message {
        ChatMessage::System(content) => ChatCompletionRequestSystemMessageArgs::default()
            .content(content.clone())
            .build()
            .map_err(build_err)?
            .into(),
        ChatMessage::User(content) => ChatCompletionRequestUserMessageArgs::default()
            .content(content.clone())
            .build()
            .map_err(build_err)?
            .into(),
        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if let Some(content) = content {
                args.content(content.clone());
            }
            if !tool_calls.is_empty() {
                args.tool_calls(
                    tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            args.build().map_err(build_err)?.into()
        }
        ChatMessage::Tool { call_id, content } => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(call_id.clone())
            .content(content.clone())
            .build()
            .map_err(build_err)?
            .into(),
    };
    Ok(message)
}

fn to_completion_tool(tool: &Tool) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: tool.name.clone(),
            description: Some(tool.description.clone()),
            parameters: Some(tool.input_schema.clone()),
            strict: None,
        },
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(
        &self,
        model: Option<&str>,
        messages: &[ChatMessage],
        tools: &[Tool],
    ) -> Result<ModelReply> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(model.unwrap_or(&self.model)).messages(messages);
        if !tools.is_empty() {
            args.tools(tools.iter().map(to_completion_tool).collect::<Vec<_>>());
        }
        let request = args.build().map_err(build_err)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AgencyError::OpenAI(format!("Agent API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgencyError::Agent("No response from model".to_string()))?;

        let calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        debug!("Model returned {} tool call(s)", calls.len());

        if calls.is_empty() {
            Ok(ModelReply::Final(choice.message.content.unwrap_or_default()))
        } else {
            Ok(ModelReply::ToolCalls {
                content: choice.message.content,
                calls,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definition_conversion() {
        let tool = Tool {
            name: "fetch_title_frameworks".to_string(),
            description: "Fetch frameworks".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        };
        let converted = to_completion_tool(&tool);
        assert_eq!(converted.function.name, "fetch_title_frameworks");
        assert_eq!(converted.function.parameters, Some(tool.input_schema));
    }

    #[test]
    fn test_history_conversion() {
        let history = vec![
            ChatMessage::System("be brief".to_string()),
            ChatMessage::User("hi".to_string()),
            ChatMessage::Assistant {
                content: None,
                tool_calls: vec![ToolCallRequest {
                    id: "call_1".to_string(),
                    name: "send_message".to_string(),
                    arguments: "{}".to_string(),
                }],
            },
            ChatMessage::tool("call_1", "done"),
            ChatMessage::assistant("bye"),
        ];
        let converted: Vec<_> = history.iter().map(to_request_message).collect::<Result<_>>().unwrap();
        assert_eq!(converted.len(), 5);
        assert!(matches!(converted[3], ChatCompletionRequestMessage::Tool(_)));
    }
}
