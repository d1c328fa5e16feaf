//! CLI module for ytagency.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand, ValueEnum};

/// ytagency - a multi-agent YouTube content agency
///
/// Strategy, title, research, newsletter, audience and script agents that
/// route work to each other and draw on Notion, YouTube and Readwise.
#[derive(Parser, Debug)]
#[command(name = "ytagency")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize ytagency and verify system requirements
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// Send a single request to the agency
    Ask {
        /// The request, e.g. "give me three video ideas about MCP"
        request: String,

        /// Entry point that takes the request instead of the entry agent
        #[arg(short, long)]
        agent: Option<String>,

        /// Show the tool calls made while answering
        #[arg(short, long)]
        trace: bool,
    },

    /// Interactive conversation with the agency
    Chat {
        /// Entry point that starts the conversation instead of the entry agent
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Run a Notion extraction tool and print its report
    Fetch {
        /// Which report to build
        #[arg(value_enum)]
        source: FetchSource,
    },

    /// List the tools a server exposes after filtering
    Tools {
        /// Server name from the config (all servers when omitted)
        server: Option<String>,
    },

    /// Show agents and communication flows
    Graph,

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchSource {
    /// Title frameworks database
    Frameworks,
    /// Script examples database
    Scripts,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open config file in editor
    Edit,

    /// Show config file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask_with_agent() {
        let cli = Cli::parse_from(["ytagency", "-v", "ask", "ideas?", "--agent", "ScriptWriter"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Ask {
                request,
                agent,
                trace,
            } => {
                assert_eq!(request, "ideas?");
                assert_eq!(agent.as_deref(), Some("ScriptWriter"));
                assert!(!trace);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_fetch_source() {
        let cli = Cli::parse_from(["ytagency", "fetch", "scripts"]);
        assert!(matches!(
            cli.command,
            Commands::Fetch {
                source: FetchSource::Scripts
            }
        ));
        assert!(Cli::try_parse_from(["ytagency", "fetch", "videos"]).is_err());
    }
}
