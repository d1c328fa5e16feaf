//! Doctor command - verify system requirements and configuration.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::{ServerSettings, Settings};
use crate::orchestrator::Orchestrator;
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("ytagency Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    // Check tool server commands
    println!("{}", style("Tool Servers").bold());
    let server_checks: Vec<CheckResult> = settings.servers.iter().map(check_server).collect();
    for check in &server_checks {
        check.print();
    }
    checks.extend(server_checks);

    println!();

    // Check API keys
    println!("{}", style("API Configuration").bold());
    let api_checks = vec![
        check_openai_api_key(),
        check_notion_api_key(&settings.notion.api_key_env),
    ];
    for check in &api_checks {
        check.print();
    }
    checks.extend(api_checks);

    println!();

    // Check Notion databases
    println!("{}", style("Notion Databases").bold());
    let database_checks = check_databases(settings);
    for check in &database_checks {
        check.print();
    }
    checks.extend(database_checks);

    println!();

    // Check directories and configuration
    println!("{}", style("Configuration").bold());
    let config_checks = vec![check_data_dir(settings), check_config_file(), check_agency(settings)];
    for check in &config_checks {
        check.print();
    }
    checks.extend(config_checks);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using the agency.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!(
            "All checks passed with {} warning(s).",
            warnings
        ));
    } else {
        Output::success("All checks passed! The agency is ready to use.");
    }

    Ok(())
}

/// Check that a tool server's program is available.
///
/// A missing server only disables the agents' tools from it, so this is a warning.
fn check_server(server: &ServerSettings) -> CheckResult {
    match preflight::check_server_command(server) {
        Ok(()) => CheckResult::ok(&server.name, &truncate(&server.command, 50)),
        Err(e) => CheckResult::warning(&server.name, &e.to_string(), install_hint(&server.command)),
    }
}

/// Check if OpenAI API key is configured.
fn check_openai_api_key() -> CheckResult {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => {
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", mask(&key)))
        }
        Ok(key) if key.is_empty() => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

/// Check if the Notion integration token is configured.
///
/// Without it the extraction tools answer with an error, so this is a warning.
fn check_notion_api_key(env: &str) -> CheckResult {
    let hint = format!("Set with: export {}='secret_...' (or ntn_...)", env);
    match std::env::var(env) {
        Ok(key) if key.len() > 12 => {
            CheckResult::ok(env, &format!("configured ({})", mask(&key)))
        }
        Ok(key) if key.is_empty() => CheckResult::warning(env, "empty", &hint),
        Ok(_) => CheckResult::warning(env, "set but looks too short", &hint),
        Err(_) => CheckResult::warning(env, "not set", &hint),
    }
}

/// Check that each extraction tool has a database configured.
fn check_databases(settings: &Settings) -> Vec<CheckResult> {
    [
        ("Title frameworks", &settings.extraction.title_frameworks),
        ("Script examples", &settings.extraction.script_examples),
    ]
    .into_iter()
    .map(|(name, tool)| {
        if tool.database_id.trim().is_empty() {
            CheckResult::warning(
                name,
                "no database id",
                "Set the database_id under [extraction] in the config file",
            )
        } else {
            CheckResult::ok(name, &tool.database_id)
        }
    })
    .collect()
}

/// Check data directory.
fn check_data_dir(settings: &Settings) -> CheckResult {
    let data_dir = settings.data_dir();
    if data_dir.exists() {
        CheckResult::ok("Data directory", &format!("{}", data_dir.display()))
    } else {
        CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        )
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: ytagency init (or ytagency config edit)",
        )
    }
}

/// Check that the configured agents form a valid agency.
fn check_agency(settings: &Settings) -> CheckResult {
    match Orchestrator::new(settings.clone()) {
        Ok(orchestrator) => {
            let graph = orchestrator.agency().graph();
            let unreachable = graph.unreachable();
            let summary = format!(
                "{} agents, {} flows, entry {}",
                graph.nodes().len(),
                graph.edges().len(),
                graph.entry().name
            );
            if unreachable.is_empty() {
                CheckResult::ok("Agency", &summary)
            } else {
                CheckResult::warning(
                    "Agency",
                    &summary,
                    &format!("Not reachable from any entry point: {}", unreachable.join(", ")),
                )
            }
        }
        Err(e) => CheckResult::error(
            "Agency",
            &e.to_string(),
            "Check [agency], [[servers]] and [llm] in the config file",
        ),
    }
}

/// Show the first and last characters of a secret.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 11 {
        return "***".to_string();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Platform-specific install hint for a server launcher.
fn install_hint(command: &str) -> &'static str {
    match command {
        "uv" | "uvx" => {
            if cfg!(target_os = "macos") {
                "Install with: brew install uv"
            } else {
                "Install from: https://docs.astral.sh/uv/getting-started/installation/"
            }
        }
        "node" | "npx" => {
            if cfg!(target_os = "macos") {
                "Install with: brew install node"
            } else if cfg!(target_os = "linux") {
                "Install with: sudo apt install nodejs (or your package manager)"
            } else {
                "Install from: https://nodejs.org/"
            }
        }
        _ => "Check the server's documentation for installation instructions",
    }
}
