//! Allow/block filtering of a tool server's capabilities.

use super::{Tool, ToolOutput, ToolServer};
use crate::config::ServerSettings;
use crate::error::{AgencyError, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Which tools of a server are visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolPolicy {
    AllowAll,
    /// Only these names.
    Allow(HashSet<String>),
    /// Everything except these names.
    Block(HashSet<String>),
}

impl ToolPolicy {
    /// Build a policy from optional allow and block lists.
    ///
    /// Supplying both lists is a configuration error.
    pub fn from_lists(allowed: Option<Vec<String>>, blocked: Option<Vec<String>>) -> Result<Self> {
        match (allowed, blocked) {
            (Some(_), Some(_)) => Err(AgencyError::InvalidFilterConfig(
                "allowed_tools and blocked_tools are mutually exclusive".to_string(),
            )),
            (Some(allowed), None) => Ok(Self::Allow(allowed.into_iter().collect())),
            (None, Some(blocked)) => Ok(Self::Block(blocked.into_iter().collect())),
            (None, None) => Ok(Self::AllowAll),
        }
    }

    pub fn permits(&self, name: &str) -> bool {
        match self {
            Self::AllowAll => true,
            Self::Allow(names) => names.contains(name),
            Self::Block(names) => !names.contains(name),
        }
    }
}

/// A tool server seen through a policy.
///
/// With caching on, the upstream list is fetched at most once for the
/// filter's lifetime, even under concurrent first access. A failed fetch
/// is not cached.
pub struct ToolCapabilityFilter {
    server: Arc<dyn ToolServer>,
    policy: ToolPolicy,
    cache_tools_list: bool,
    cached: OnceCell<Vec<Tool>>,
}

impl ToolCapabilityFilter {
    pub fn new(server: Arc<dyn ToolServer>, policy: ToolPolicy, cache_tools_list: bool) -> Self {
        Self {
            server,
            policy,
            cache_tools_list,
            cached: OnceCell::new(),
        }
    }

    /// Wrap a server with the policy and caching described by its settings.
    pub fn from_settings(server: Arc<dyn ToolServer>, settings: &ServerSettings) -> Result<Self> {
        let policy = ToolPolicy::from_lists(
            settings.allowed_tools.clone(),
            settings.blocked_tools.clone(),
        )
        .map_err(|e| match e {
            AgencyError::InvalidFilterConfig(detail) => {
                AgencyError::InvalidFilterConfig(format!("server '{}': {}", settings.name, detail))
            }
            other => other,
        })?;

        Ok(Self::new(server, policy, settings.cache_tools_list))
    }

    pub fn server_name(&self) -> &str {
        self.server.name()
    }

    pub fn policy(&self) -> &ToolPolicy {
        &self.policy
    }

    pub fn permits(&self, name: &str) -> bool {
        self.policy.permits(name)
    }

    async fn upstream_tools(&self) -> Result<Vec<Tool>> {
        if !self.cache_tools_list {
            return self.server.list_tools().await;
        }

        let tools = self
            .cached
            .get_or_try_init(|| async {
                let tools = self.server.list_tools().await?;
                info!("Cached {} tool(s) from {}", tools.len(), self.server.name());
                Ok::<_, AgencyError>(tools)
            })
            .await?;
        Ok(tools.clone())
    }

    /// The permitted subset of the server's tools, in upstream order.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let tools = self.upstream_tools().await?;
        let total = tools.len();
        let visible: Vec<Tool> = tools
            .into_iter()
            .filter(|tool| self.policy.permits(&tool.name))
            .collect();

        debug!(
            "{}: {} of {} tool(s) visible",
            self.server.name(),
            visible.len(),
            total
        );
        Ok(visible)
    }

    /// Invoke a permitted tool.
    ///
    /// A name outside the policy fails with `ToolNotPermitted` and never
    /// reaches the server.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        if !self.policy.permits(name) {
            warn!("{}: rejected call to {}", self.server.name(), name);
            return Err(AgencyError::ToolNotPermitted {
                server: self.server.name().to_string(),
                tool: name.to_string(),
            });
        }
        self.server.call_tool(name, arguments).await
    }
}
