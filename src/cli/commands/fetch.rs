//! Fetch command - run a Notion extraction tool from the command line.

use crate::cli::preflight::{self, Operation};
use crate::cli::{FetchSource, Output};
use crate::config::Settings;
use crate::extraction::ContentExtractionTool;
use crate::notion::{DocumentStore, NotionClient};
use anyhow::Result;
use std::sync::Arc;

/// Run the fetch command.
pub async fn run_fetch(source: FetchSource, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Fetch, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'ytagency doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let store: Arc<dyn DocumentStore> = Arc::new(NotionClient::from_settings(&settings.notion)?);
    let tool = match source {
        FetchSource::Frameworks => {
            ContentExtractionTool::title_frameworks(store, &settings.extraction.title_frameworks)
        }
        FetchSource::Scripts => {
            ContentExtractionTool::script_examples(store, &settings.extraction.script_examples)
        }
    };

    let spinner = Output::spinner(&format!("Fetching {}...", tool.profile().subject));

    match tool.extract().await {
        Ok(report) => {
            spinner.finish_and_clear();
            println!("{}", report.render(tool.profile()));
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to fetch {}: {}", tool.profile().subject, e));
            return Err(e.into());
        }
    }

    Ok(())
}
