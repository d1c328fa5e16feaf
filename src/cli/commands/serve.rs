//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for talking to the agency and inspecting its wiring.

use super::conversation_for;
use crate::agent::{Conversation, Edge, ToolCallRecord};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::AgencyError;
use crate::mcp::Tool;
use crate::orchestrator::Orchestrator;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    conversations: Mutex<HashMap<Uuid, Arc<Mutex<Conversation>>>>,
    /// Cancelled on shutdown so in-flight requests stop at their next step.
    shutdown: CancellationToken,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Converse, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let shutdown = CancellationToken::new();

    let state = Arc::new(AppState {
        orchestrator,
        conversations: Mutex::new(HashMap::new()),
        shutdown: shutdown.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/graph", get(graph))
        .route("/handle", post(handle))
        .route("/conversations/{id}", delete(end_conversation))
        .route("/tools/{server}", get(list_tools))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("ytagency API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Graph", "GET    /graph");
    Output::kv("Handle request", "POST   /handle");
    Output::kv("End conversation", "DELETE /conversations/:id");
    Output::kv("Server tools", "GET    /tools/:server");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct HandleRequest {
    request: String,
    /// Continue an earlier conversation; a new one is started when absent.
    #[serde(default)]
    conversation_id: Option<Uuid>,
    /// Entry point that takes the first request of a new conversation.
    #[serde(default)]
    agent: Option<String>,
}

#[derive(Serialize)]
struct HandleResponse {
    conversation_id: Uuid,
    content: String,
    agent: String,
    tool_calls: Vec<ToolCallRecord>,
    iterations: usize,
}

#[derive(Serialize)]
struct GraphResponse {
    name: String,
    entry: String,
    entry_points: Vec<String>,
    agents: Vec<AgentInfo>,
    flows: Vec<Edge>,
    unreachable: Vec<String>,
}

#[derive(Serialize)]
struct AgentInfo {
    name: String,
    description: String,
    model: Option<String>,
    tools: Vec<String>,
    servers: Vec<String>,
}

#[derive(Serialize)]
struct ToolsResponse {
    server: String,
    tools: Vec<Tool>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// HTTP status for an agency failure.
fn status_for(err: &AgencyError) -> StatusCode {
    match err {
        AgencyError::UnknownAgent(_) => StatusCode::NOT_FOUND,
        AgencyError::NotAddressable(_) => StatusCode::FORBIDDEN,
        AgencyError::RemoteTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        AgencyError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        e if e.is_remote() => StatusCode::BAD_GATEWAY,
        AgencyError::ToolNotPermitted { .. } => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn graph(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let graph = state.orchestrator.agency().graph();

    Json(GraphResponse {
        name: state.orchestrator.settings().agency.name.clone(),
        entry: graph.entry().name.clone(),
        entry_points: graph.entry_points().into_iter().map(String::from).collect(),
        agents: graph
            .nodes()
            .iter()
            .map(|n| AgentInfo {
                name: n.name.clone(),
                description: n.description.clone(),
                model: n.model.clone(),
                tools: n.local_tool_names(),
                servers: n.server_names().into_iter().map(String::from).collect(),
            })
            .collect(),
        flows: graph.edges().to_vec(),
        unreachable: graph.unreachable().into_iter().map(String::from).collect(),
    })
}

async fn handle(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HandleRequest>,
) -> Response {
    let conversation = {
        let mut conversations = state.conversations.lock().await;
        match req.conversation_id {
            Some(id) => match conversations.get(&id) {
                Some(c) => c.clone(),
                None => {
                    return error_response(
                        StatusCode::NOT_FOUND,
                        format!("Conversation not found: {}", id),
                    )
                }
            },
            None => {
                let conversation = conversation_for(req.agent.as_deref());
                let id = conversation.id;
                let entry = Arc::new(Mutex::new(conversation));
                conversations.insert(id, entry.clone());
                entry
            }
        }
    };

    // Requests within one conversation are answered one at a time
    let mut conversation = conversation.lock().await;
    let cancel = state.shutdown.child_token();

    match state
        .orchestrator
        .agency()
        .respond(&mut conversation, &req.request, &cancel)
        .await
    {
        Ok(response) => Json(HandleResponse {
            conversation_id: conversation.id,
            content: response.content,
            agent: response.agent,
            tool_calls: response.tool_calls,
            iterations: response.iterations,
        })
        .into_response(),
        Err(e) => error_response(status_for(&e), e.to_string()),
    }
}

async fn end_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.conversations.lock().await.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Conversation not found: {}", id),
        ),
    }
}

async fn list_tools(
    State(state): State<Arc<AppState>>,
    Path(server): Path<String>,
) -> Response {
    let Some(filter) = state.orchestrator.server(&server) else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Server not found: {}", server),
        );
    };

    match filter.list_tools().await {
        Ok(tools) => Json(ToolsResponse { server, tools }).into_response(),
        Err(e) => error_response(status_for(&e), e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_for_errors() {
        assert_eq!(
            status_for(&AgencyError::UnknownAgent("X".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&AgencyError::NotAddressable("GrokNewsAgent".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&AgencyError::RemoteTimeout {
                operation: "tools/list".to_string(),
                seconds: 10
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&AgencyError::RemoteUnavailable("down".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&AgencyError::Agent("loop".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_handle_request_defaults() {
        let req: HandleRequest = serde_json::from_str(r#"{"request": "ideas?"}"#).unwrap();
        assert_eq!(req.request, "ideas?");
        assert!(req.conversation_id.is_none());
        assert!(req.agent.is_none());
    }
}
