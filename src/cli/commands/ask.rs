//! Ask command implementation.

use super::conversation_for;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Run the ask command.
pub async fn run_ask(
    request: &str,
    agent: Option<String>,
    trace: bool,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Converse, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'ytagency doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let mut conversation = conversation_for(agent.as_deref());
    let cancel = cancel_on_ctrl_c();

    let spinner = Output::spinner("The agency is working on it...");

    match orchestrator
        .agency()
        .respond(&mut conversation, request, &cancel)
        .await
    {
        Ok(response) => {
            spinner.finish_and_clear();

            if trace && !response.tool_calls.is_empty() {
                Output::header("Tool calls");
                for record in &response.tool_calls {
                    Output::tool_call(record);
                }
                println!();
            }

            println!("\n{}\n", response.content);
            Output::kv("Answered by", &response.agent);
            Output::kv("Model calls", &response.iterations.to_string());
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

/// A token that is cancelled when the user presses Ctrl+C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}
