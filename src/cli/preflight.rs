//! Pre-flight checks before expensive operations.
//!
//! Validates that required credentials and programs are available
//! before starting operations that would otherwise fail midway.

use crate::config::{ServerSettings, Settings};
use crate::error::{AgencyError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Talking to the agency requires the OpenAI key.
    Converse,
    /// Extraction reports require the Notion key.
    Fetch,
    /// Listing server tools requires nothing up front.
    ListTools,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Converse => {
            check_env("OPENAI_API_KEY", "sk-...")?;
        }
        Operation::Fetch => {
            check_env(&settings.notion.api_key_env, "secret_...")?;
        }
        Operation::ListTools => {
            // Server failures are reported per server
        }
    }
    Ok(())
}

/// Check that an environment variable holds a non-empty value.
fn check_env(name: &str, example: &str) -> Result<()> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(()),
        Ok(_) => Err(AgencyError::ConfigurationMissing(format!(
            "{} is empty. Set it with: export {}='{}'",
            name, name, example
        ))),
        Err(_) => Err(AgencyError::ConfigurationMissing(format!(
            "{} not set. Set it with: export {}='{}'",
            name, name, example
        ))),
    }
}

/// Check that the program a tool server is launched with can be found.
pub fn check_server_command(server: &ServerSettings) -> Result<()> {
    let program = shellexpand::tilde(&server.command).to_string();
    match Command::new(&program).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(AgencyError::RemoteUnavailable(format!(
            "{}: {} is installed but not working correctly",
            server.name, program
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AgencyError::RemoteUnavailable(
            format!("{}: {} not found", server.name, program),
        )),
        Err(e) => Err(AgencyError::RemoteUnavailable(format!(
            "{}: {}: {}",
            server.name, program, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_tools_no_requirements() {
        assert!(check(Operation::ListTools, &Settings::default()).is_ok());
    }

    #[test]
    fn test_fetch_requires_configured_key_variable() {
        let mut settings = Settings::default();
        settings.notion.api_key_env = "YTAGENCY_TEST_UNSET_NOTION_KEY".to_string();

        let err = check(Operation::Fetch, &settings).unwrap_err();
        assert!(matches!(err, AgencyError::ConfigurationMissing(_)));
        assert!(err.to_string().contains("YTAGENCY_TEST_UNSET_NOTION_KEY not set"));
    }

    #[test]
    fn test_missing_server_command() {
        let mut server = ServerSettings::youtube_toolbox();
        server.command = "ytagency-no-such-program".to_string();

        let err = check_server_command(&server).unwrap_err();
        assert!(err.to_string().contains("ytagency-no-such-program not found"));
    }
}
