//! Init command - interactive first-run setup.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::io::{self, Write};

/// Simple check result for init command.
struct CheckIssue {
    name: String,
    detail: String,
}

/// Run the init command for first-time setup.
pub fn run_init(settings: &Settings) -> anyhow::Result<()> {
    Output::header("ytagency Setup");
    println!();
    println!("Welcome! Let's make sure the agency is configured correctly.\n");

    // Step 1: Check API keys
    println!("{}", style("Step 1: Checking API configuration").bold().cyan());
    println!();

    if std::env::var("OPENAI_API_KEY").is_err() {
        Output::warning("OPENAI_API_KEY environment variable is not set.");
        println!();
        println!("  Every agent runs on an OpenAI model.");
        println!("  Get your API key from: {}", style("https://platform.openai.com/api-keys").underlined());
        println!();
        println!("  Set it in your shell configuration (~/.bashrc, ~/.zshrc, etc.):");
        println!("  {}", style("export OPENAI_API_KEY='sk-...'").green());
        println!();

        if !prompt_continue("Continue without API key?")? {
            println!();
            Output::info("Setup cancelled. Set your API key and run 'ytagency init' again.");
            return Ok(());
        }
    } else {
        Output::success("OpenAI API key is configured!");
    }

    let notion_env = &settings.notion.api_key_env;
    if std::env::var(notion_env).is_err() {
        Output::warning(&format!("{} environment variable is not set.", notion_env));
        println!();
        println!("  The title and script agents read reference material from Notion.");
        println!("  Create an integration at: {}", style("https://www.notion.so/my-integrations").underlined());
        println!("  and share the title frameworks and script databases with it.");
        println!();
        println!("  {}", style(format!("export {}='secret_...'", notion_env)).green());
    } else {
        Output::success("Notion integration token is configured!");
    }

    println!();

    // Step 2: Check tool servers
    println!("{}", style("Step 2: Checking tool servers").bold().cyan());
    println!();

    let server_issues = check_servers(settings);
    if server_issues.is_empty() {
        Output::success("All tool server commands are available!");
    } else {
        Output::warning("Some tool servers cannot be started. Agents using them will work without their tools:");
        println!();
        for issue in &server_issues {
            println!("  {} {} - {}", style("✗").red(), style(&issue.name).bold(), issue.detail);
        }
    }

    println!();

    // Step 3: Create directories
    println!("{}", style("Step 3: Setting up directories").bold().cyan());
    println!();

    let data_dir = settings.data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        Output::success(&format!("Created data directory: {}", data_dir.display()));
    } else {
        Output::info(&format!("Data directory exists: {}", data_dir.display()));
    }

    println!();

    // Step 4: Create config file
    println!("{}", style("Step 4: Configuration file").bold().cyan());
    println!();

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::info(&format!("Config file exists: {}", config_path.display()));
    } else if prompt_continue("Create default configuration file?")? {
        settings.save_to(&config_path)?;
        Output::success(&format!("Created config file: {}", config_path.display()));
        println!();
        println!("  Edit your config with: {}", style("ytagency config edit").green());
    } else {
        Output::info("Skipped config file creation. Using defaults.");
    }

    println!();

    // Summary
    println!("{}", style("Setup Complete!").bold().green());
    println!();
    println!("Next steps:");
    println!("  {} Check system status", style("ytagency doctor").cyan());
    println!("  {} See how the agents work together", style("ytagency graph").cyan());
    println!("  {} Ask for video ideas", style("ytagency ask \"<request>\"").cyan());
    println!("  {} Talk to the agency", style("ytagency chat").cyan());
    println!();
    println!("For more help: {}", style("ytagency --help").cyan());

    Ok(())
}

/// Check every configured tool server and return the ones that cannot start.
fn check_servers(settings: &Settings) -> Vec<CheckIssue> {
    settings
        .servers
        .iter()
        .filter_map(|server| {
            preflight::check_server_command(server)
                .err()
                .map(|e| CheckIssue {
                    name: server.name.clone(),
                    detail: e.to_string(),
                })
        })
        .collect()
}

/// Prompt user for yes/no confirmation.
fn prompt_continue(message: &str) -> io::Result<bool> {
    print!("{} {} ", style("?").cyan(), message);
    print!("{} ", style("[y/N]").dim());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let answer = input.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_servers_reports_missing_command() {
        let mut settings = Settings::default();
        settings.servers.truncate(1);
        settings.servers[0].command = "ytagency-missing-launcher".to_string();

        let issues = check_servers(&settings);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].name, "youtube_toolbox");
        assert!(issues[0].detail.contains("not found"));
    }
}
