//! MCP client over a child process's stdio.

use super::protocol::*;
use super::ToolServer;
use crate::config::ServerSettings;
use crate::error::{AgencyError, Result};
use crate::extraction::drain_pages;
use crate::notion::Page;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";
const CLIENT_NAME: &str = "ytagency";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

struct Session {
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// A tool server reached by spawning a process and speaking JSON-RPC on its stdio.
///
/// The process is started on first use. Requests are serialized: one request
/// is in flight per connection. A timed-out or broken connection is dropped
/// and re-established by the next request.
pub struct StdioToolServer {
    name: String,
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    timeout: Duration,
    session: Mutex<Option<Session>>,
    next_id: AtomicU64,
}

impl StdioToolServer {
    pub fn new(
        name: &str,
        command: &str,
        args: Vec<String>,
        env: BTreeMap<String, String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            args,
            env,
            timeout,
            session: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Build from settings, expanding `~` and `$VAR` in the command, args and env values.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        let args = settings.args.iter().map(|a| expand(a)).collect();
        let env = settings
            .env
            .iter()
            .map(|(k, v)| (k.clone(), expand(v)))
            .collect();

        Self::new(
            &settings.name,
            &expand(&settings.command),
            args,
            env,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn connect(&self) -> Result<Session> {
        info!("Starting tool server {}: {}", self.name, self.command_line());

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AgencyError::RemoteUnavailable(format!(
                    "failed to start {} ({}): {}",
                    self.name, self.command, e
                ))
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            AgencyError::RemoteUnavailable(format!("{}: stdin not captured", self.name))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            AgencyError::RemoteUnavailable(format!("{}: stdout not captured", self.name))
        })?;

        let mut session = Session {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({}),
            client_info: ClientInfo {
                name: CLIENT_NAME.to_string(),
                version: CLIENT_VERSION.to_string(),
            },
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::call(id, "initialize", Some(serde_json::to_value(params)?));
        let response = self.exchange(&mut session, &request).await?;
        into_result(&self.name, "initialize", response)?;

        self.write(&mut session, &JsonRpcRequest::notification("notifications/initialized"))
            .await?;

        debug!("Tool server {} initialized", self.name);
        Ok(session)
    }

    async fn write(&self, session: &mut Session, request: &JsonRpcRequest) -> Result<()> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        session
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| self.transport_error(e))?;
        session.stdin.flush().await.map_err(|e| self.transport_error(e))
    }

    /// Send a request and read lines until its response arrives.
    async fn exchange(&self, session: &mut Session, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.write(session, request).await?;
        let id = request.id.unwrap_or_default();

        loop {
            let line = session
                .stdout
                .next_line()
                .await
                .map_err(|e| self.transport_error(e))?
                .ok_or_else(|| {
                    AgencyError::RemoteUnavailable(format!("{} closed the connection", self.name))
                })?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcResponse>(&line) {
                Ok(response) if response.answers(id) => return Ok(response),
                Ok(_) => debug!("{}: skipping unrelated message", self.name),
                Err(e) => debug!("{}: skipping unparseable line: {}", self.name, e),
            }
        }
    }

    fn transport_error(&self, e: std::io::Error) -> AgencyError {
        AgencyError::RemoteUnavailable(format!("{} transport error: {}", self.name, e))
    }

    async fn round_trip(
        &self,
        slot: &mut Option<Session>,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse> {
        if slot.is_none() {
            *slot = Some(self.connect().await?);
        }
        let session = slot.as_mut().ok_or_else(|| {
            AgencyError::RemoteUnavailable(format!("{} has no session", self.name))
        })?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.exchange(session, &JsonRpcRequest::call(id, method, params))
            .await
    }

    /// Issue one request under the per-call timeout and decode its result.
    ///
    /// A result of the wrong shape drops the connection like a transport failure.
    async fn request<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T> {
        let mut slot = self.session.lock().await;

        let outcome =
            tokio::time::timeout(self.timeout, self.round_trip(&mut slot, method, params)).await;

        match outcome {
            Ok(Ok(response)) => {
                let value = into_result(&self.name, method, response)?;
                serde_json::from_value(value).map_err(|e| {
                    warn!("{}: malformed {} result, resetting connection", self.name, method);
                    *slot = None;
                    AgencyError::malformed_response(&format!("{} {}", self.name, method), e)
                })
            }
            Ok(Err(e)) => {
                warn!("{}: {} failed, resetting connection: {}", self.name, method, e);
                *slot = None;
                Err(e)
            }
            Err(_) => {
                warn!("{}: {} timed out, resetting connection", self.name, method);
                *slot = None;
                Err(AgencyError::RemoteTimeout {
                    operation: format!("{} {}", self.name, method),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

fn into_result(server: &str, method: &str, response: JsonRpcResponse) -> Result<Value> {
    if let Some(error) = response.error {
        let detail = match error.data {
            Some(data) => format!(" ({})", data),
            None => String::new(),
        };
        return Err(AgencyError::RemoteUnavailable(format!(
            "{} {} failed ({}): {}{}",
            server, method, error.code, error.message, detail
        )));
    }
    Ok(response.result.unwrap_or(Value::Null))
}

fn expand(value: &str) -> String {
    match shellexpand::full(value) {
        Ok(expanded) => expanded.into_owned(),
        Err(e) => {
            warn!("Could not expand '{}': {}", value, e);
            value.to_string()
        }
    }
}

#[async_trait]
impl ToolServer for StdioToolServer {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(server = %self.name))]
    async fn list_tools(&self) -> Result<Vec<Tool>> {
        drain_pages(|cursor| async move {
            let params = cursor.map(|c| json!({ "cursor": c }));
            let result: ToolsListResult = self.request("tools/list", params).await?;
            let has_more = result.next_cursor.is_some();
            Ok(Page::from_parts(result.tools, has_more, result.next_cursor))
        })
        .await
    }

    #[instrument(skip(self, arguments), fields(server = %self.name))]
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        let params = serde_json::to_value(ToolCallParams {
            name: name.to_string(),
            arguments,
        })?;
        let result: ToolCallResult = self.request("tools/call", Some(params)).await?;
        Ok(result.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_keeps_unknown_variables() {
        assert_eq!(expand("plain"), "plain");
        assert_eq!(
            expand("$YTAGENCY_TEST_SURELY_UNSET_VAR"),
            "$YTAGENCY_TEST_SURELY_UNSET_VAR"
        );
    }

    #[test]
    fn test_command_line() {
        let server = StdioToolServer::new(
            "youtube",
            "uv",
            vec!["run".to_string(), "server.py".to_string()],
            BTreeMap::new(),
            Duration::from_secs(10),
        );
        assert_eq!(server.command_line(), "uv run server.py");
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        let server = StdioToolServer::new(
            "ghost",
            "/nonexistent/ytagency-mcp-server",
            Vec::new(),
            BTreeMap::new(),
            Duration::from_secs(5),
        );
        let err = server.list_tools().await.unwrap_err();
        assert!(matches!(err, AgencyError::RemoteUnavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_server_times_out() {
        // Never answers the initialize request
        let server = StdioToolServer::new(
            "echo",
            "sh",
            vec!["-c".to_string(), "sleep 5".to_string()],
            BTreeMap::new(),
            Duration::from_millis(200),
        );
        let err = server.call_tool("anything", json!({})).await.unwrap_err();
        assert!(matches!(err, AgencyError::RemoteTimeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scripted_server_round_trip() {
        // Answers initialize (id 1), then tools/list (id 2), ignoring the notification
        let script = r#"
read init
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
read notified
read list
echo '{"jsonrpc":"2.0","method":"notifications/progress"}'
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"search_videos","description":"Search","inputSchema":{"type":"object"}}]}}'
"#;
        let server = StdioToolServer::new(
            "scripted",
            "sh",
            vec!["-c".to_string(), script.to_string()],
            BTreeMap::new(),
            Duration::from_secs(5),
        );
        let tools = server.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "search_videos");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wrong_result_shape_is_unavailable_and_resets() {
        let script = r#"
read init
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
read notified
read list
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":"not-a-list"}}'
sleep 5
"#;
        let server = StdioToolServer::new(
            "scripted",
            "sh",
            vec!["-c".to_string(), script.to_string()],
            BTreeMap::new(),
            Duration::from_secs(5),
        );
        let err = server.list_tools().await.unwrap_err();
        assert!(matches!(err, AgencyError::RemoteUnavailable(_)), "{:?}", err);
        assert!(err.to_string().contains("tools/list: malformed response"), "{}", err);
        assert!(server.session.lock().await.is_none());
    }

    #[test]
    fn test_error_data_is_reported() {
        let response: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32602,"message":"Invalid params","data":"missing query"}}"#,
        )
        .unwrap();
        let err = into_result("youtube", "tools/call", response).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Remote service unavailable: youtube tools/call failed (-32602): Invalid params (\"missing query\")"
        );
    }
}
