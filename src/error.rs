//! Error types for the agency.

use thiserror::Error;

/// Library-level error type for agency operations.
#[derive(Error, Debug)]
pub enum AgencyError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required credential or identifier is absent.
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote call timed out after {seconds}s: {operation}")]
    RemoteTimeout { operation: String, seconds: u64 },

    #[error("Tool '{tool}' is not permitted on server '{server}'")]
    ToolNotPermitted { server: String, tool: String },

    #[error("Invalid tool filter configuration: {0}")]
    InvalidFilterConfig(String),

    /// A record property is absent or has an unexpected shape.
    #[error("Malformed record {record}: {detail}")]
    MalformedRecord { record: String, detail: String },

    #[error("Invalid communication graph: {0}")]
    InvalidGraph(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// The agent exists but only other agents may reach it.
    #[error("Agent '{0}' cannot be addressed directly")]
    NotAddressable(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl AgencyError {
    /// Classify an HTTP client error, keeping timeouts distinct from other failures.
    pub fn from_http(operation: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgencyError::RemoteTimeout {
                operation: operation.to_string(),
                seconds: timeout_secs,
            }
        } else {
            AgencyError::RemoteUnavailable(format!("{}: {}", operation, err))
        }
    }

    /// A remote answered with a body that does not have the expected shape.
    pub fn malformed_response(operation: &str, err: impl std::fmt::Display) -> Self {
        AgencyError::RemoteUnavailable(format!("{}: malformed response: {}", operation, err))
    }

    /// Whether the error came from talking to a remote service.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AgencyError::RemoteUnavailable(_) | AgencyError::RemoteTimeout { .. }
        )
    }
}

/// Result type alias for agency operations.
pub type Result<T> = std::result::Result<T, AgencyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinct_from_unavailable() {
        let timeout = AgencyError::RemoteTimeout {
            operation: "tools/call".to_string(),
            seconds: 10,
        };
        assert!(timeout.is_remote());
        assert_eq!(
            timeout.to_string(),
            "Remote call timed out after 10s: tools/call"
        );
        assert!(!matches!(timeout, AgencyError::RemoteUnavailable(_)));
    }

    #[test]
    fn test_tool_not_permitted_message() {
        let err = AgencyError::ToolNotPermitted {
            server: "youtube_toolbox".to_string(),
            tool: "get_video_transcript".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Tool 'get_video_transcript' is not permitted on server 'youtube_toolbox'"
        );
        assert!(!err.is_remote());
    }

    #[test]
    fn test_malformed_response_is_remote() {
        let decode = serde_json::from_str::<Vec<String>>("\"not-a-list\"").unwrap_err();
        let err = AgencyError::malformed_response("data_sources.query", decode);
        assert!(err.is_remote());
        assert!(err
            .to_string()
            .starts_with("Remote service unavailable: data_sources.query: malformed response:"));
    }
}
