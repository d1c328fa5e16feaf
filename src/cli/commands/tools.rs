//! Tools command - show what each tool server exposes to the agents.

use crate::cli::Output;
use crate::config::Settings;
use crate::mcp::{StdioToolServer, ToolCapabilityFilter, ToolPolicy};
use anyhow::Result;
use std::sync::Arc;

/// Run the tools command.
pub async fn run_tools(server: Option<String>, settings: Settings) -> Result<()> {
    let selected: Vec<_> = match &server {
        Some(name) => match settings.server(name) {
            Some(s) => vec![s.clone()],
            None => {
                let known: Vec<&str> = settings.servers.iter().map(|s| s.name.as_str()).collect();
                Output::error(&format!("Unknown server '{}'", name));
                Output::info(&format!("Configured servers: {}", known.join(", ")));
                anyhow::bail!("unknown server '{}'", name);
            }
        },
        None => settings.servers.clone(),
    };

    if selected.is_empty() {
        Output::info("No tool servers configured.");
        return Ok(());
    }

    let mut failures = 0;
    for server in &selected {
        let transport = Arc::new(StdioToolServer::from_settings(server));
        let filter = ToolCapabilityFilter::from_settings(transport.clone(), server)?;

        Output::header(&server.name);
        Output::kv("Command", &transport.command_line());
        Output::kv("Policy", &describe_policy(filter.policy()));

        let spinner = Output::spinner("Listing tools...");
        let listed = filter.list_tools().await;
        spinner.finish_and_clear();

        match listed {
            Ok(tools) if tools.is_empty() => Output::warning("No tools exposed."),
            Ok(tools) => {
                for tool in &tools {
                    Output::tool(&tool.name, &tool.description);
                }
            }
            Err(e) => {
                failures += 1;
                Output::error(&format!("{}", e));
            }
        }
    }

    println!();
    if failures > 0 {
        anyhow::bail!("{} of {} servers could not be reached", failures, selected.len());
    }
    Ok(())
}

fn describe_policy(policy: &ToolPolicy) -> String {
    fn sorted(names: &std::collections::HashSet<String>) -> String {
        let mut names: Vec<&str> = names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.join(", ")
    }

    match policy {
        ToolPolicy::AllowAll => "all tools".to_string(),
        ToolPolicy::Allow(names) => format!("only {}", sorted(names)),
        ToolPolicy::Block(names) => format!("all except {}", sorted(names)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_policy() {
        assert_eq!(describe_policy(&ToolPolicy::AllowAll), "all tools");

        let policy = ToolPolicy::from_lists(
            None,
            Some(vec!["b_tool".to_string(), "a_tool".to_string()]),
        )
        .unwrap();
        assert_eq!(describe_policy(&policy), "all except a_tool, b_tool");
    }
}
