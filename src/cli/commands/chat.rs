//! Interactive chat with the agency.

use super::conversation_for;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Run the interactive chat command.
pub async fn run_chat(agent: Option<String>, settings: Settings) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Converse, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'ytagency doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let agency = orchestrator.agency();
    let mut conversation = conversation_for(agent.as_deref());

    println!(
        "\n{}",
        style(&orchestrator.settings().agency.name).bold().cyan()
    );
    println!(
        "{}\n",
        style("Type your requests, or 'exit' to quit. Use 'clear' to start over, Ctrl+C to cancel a request.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            conversation = conversation_for(agent.as_deref());
            Output::info("Conversation cleared.");
            continue;
        }

        let cancel = CancellationToken::new();
        let respond = agency.respond(&mut conversation, input, &cancel);
        tokio::pin!(respond);

        let result = tokio::select! {
            result = &mut respond => result,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                Output::warning("Cancelling request...");
                respond.await
            }
        };

        match result {
            Ok(response) => {
                for record in &response.tool_calls {
                    debug!("{} called {}", record.agent, record);
                    Output::tool_call(record);
                }
                println!(
                    "\n{} {}\n",
                    style(format!("{}:", response.agent)).cyan().bold(),
                    response.content
                );
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}
