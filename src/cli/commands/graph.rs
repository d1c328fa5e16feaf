//! Graph command - show the agents and how they route work to each other.

use crate::agent::{CommunicationGraph, RoutingMode};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use console::style;

/// Run the graph command.
pub fn run_graph(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let graph = orchestrator.agency().graph();

    Output::header(&orchestrator.settings().agency.name);
    Output::kv("Entry agent", &graph.entry().name);
    Output::kv("Entry points", &graph.entry_points().join(", "));
    Output::kv("Default model", &orchestrator.settings().llm.model);

    Output::header("Agents");
    for node in graph.nodes() {
        println!("  {} {}", style("*").cyan(), style(&node.name).bold());
        println!("    {}", style(&node.description).dim());
        if let Some(model) = &node.model {
            Output::kv("  Model", model);
        }
        let tools = node.local_tool_names();
        if !tools.is_empty() {
            Output::kv("  Tools", &tools.join(", "));
        }
        let servers = node.server_names();
        if !servers.is_empty() {
            Output::kv("  Servers", &servers.join(", "));
        }
    }

    Output::header("Flows");
    for line in flow_lines(graph) {
        Output::list_item(&line);
    }

    let unreachable = graph.unreachable();
    if !unreachable.is_empty() {
        println!();
        Output::warning(&format!(
            "Not reachable from any entry point: {}",
            unreachable.join(", ")
        ));
    }

    Ok(())
}

/// One line per edge, delegations first.
fn flow_lines(graph: &CommunicationGraph) -> Vec<String> {
    let mut lines = Vec::with_capacity(graph.edges().len());
    for mode in [RoutingMode::Delegate, RoutingMode::Handoff] {
        let arrow = match mode {
            RoutingMode::Delegate => "->",
            RoutingMode::Handoff => "=>",
        };
        lines.extend(
            graph
                .edges()
                .iter()
                .filter(|e| e.mode == mode)
                .map(|e| format!("{} {} {} ({})", e.source, arrow, e.target, mode)),
        );
    }
    lines
}
