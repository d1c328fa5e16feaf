//! Content extraction tools: fetch → filter → render → report.

use super::fetcher::PaginatedRecordFetcher;
use super::filter::{RecordFilter, TitlePredicate};
use super::markdown::blocks_to_markdown;
use crate::agent::LocalTool;
use crate::config::{ExtractionToolSettings, Prompts, SCRIPT_EXAMPLES_TOOL, TITLE_FRAMEWORKS_TOOL};
use crate::error::{AgencyError, Result};
use crate::mcp::Tool;
use crate::notion::{CollectionQuery, DocumentStore, Record, SortOrder, StoreFilter};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A labelled property shown under a catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyField {
    pub property: String,
    pub label: String,
}

impl PropertyField {
    pub fn new(property: &str, label: &str) -> Self {
        Self {
            property: property.to_string(),
            label: label.to_string(),
        }
    }
}

/// What goes under each section heading.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionBody {
    /// Selected record properties, one per line, skipping empty ones.
    Properties(Vec<PropertyField>),
    /// The record's body blocks rendered as markdown.
    PageContent,
}

/// Fixed text and layout of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportProfile {
    pub heading: String,
    pub heading_rule: usize,
    pub section_rule: usize,
    pub title_property: String,
    /// Section title used when the record has none; `{{index}}` is substituted.
    pub fallback_title: String,
    pub body: SectionBody,
    pub guidance_heading: String,
    pub guidance: Vec<String>,
    pub count_label: String,
    pub empty_message: String,
    /// Noun used in error messages, e.g. "title frameworks".
    pub subject: String,
}

impl ReportProfile {
    /// Catalog of proven title frameworks.
    pub fn title_frameworks(title_property: &str) -> Self {
        Self {
            heading: "🎯 **YouTube Title Frameworks from Notion Database**\n".to_string(),
            heading_rule: 60,
            section_rule: 50,
            title_property: title_property.to_string(),
            fallback_title: "Framework #{{index}}".to_string(),
            body: SectionBody::Properties(vec![
                PropertyField::new("OG title", "Original Title"),
                PropertyField::new("Example Title 1", "Example 1"),
                PropertyField::new("Example Title 2", "Example 2"),
                PropertyField::new("Outlier", "Outlier Score"),
                PropertyField::new("YT video link", "Video Link"),
            ]),
            guidance_heading: "Usage Guidelines:".to_string(),
            guidance: vec![
                "Select frameworks that naturally fit your video content".to_string(),
                "Adapt frameworks to match your specific topic and keywords".to_string(),
                "Don't force frameworks that don't suit the video".to_string(),
                "Combine multiple frameworks for creative variations".to_string(),
            ],
            count_label: "Total frameworks fetched".to_string(),
            empty_message: "📝 No title frameworks found in the database.".to_string(),
            subject: "title frameworks".to_string(),
        }
    }

    /// Past scripts, with their full bodies, as style references.
    pub fn script_examples(title_property: &str) -> Self {
        Self {
            heading: "# 📜 Script Examples\n".to_string(),
            heading_rule: 80,
            section_rule: 80,
            title_property: title_property.to_string(),
            fallback_title: "Script {{index}}".to_string(),
            body: SectionBody::PageContent,
            guidance_heading: "How to Use These Examples:".to_string(),
            guidance: vec![
                "Study the tone, pacing, and structure of the scripts".to_string(),
                "Notice how concepts are introduced and engagement is built".to_string(),
                "Pay attention to the conversational style and technical explanations".to_string(),
                "Adapt these patterns while maintaining authenticity".to_string(),
            ],
            count_label: "Total script examples fetched".to_string(),
            empty_message: "📝 No script examples found in the database matching the title filter."
                .to_string(),
            subject: "script examples".to_string(),
        }
    }

    fn section_title(&self, record: &Record, index: usize) -> String {
        let title = record.text(&self.title_property);
        let title = title.trim();
        if title.is_empty() {
            let mut vars = HashMap::new();
            vars.insert("index".to_string(), index.to_string());
            Prompts::render(&self.fallback_title, &vars)
        } else {
            title.to_string()
        }
    }
}

/// One rendered record.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub index: usize,
    pub record_id: String,
    pub title: String,
    pub lines: Vec<String>,
}

/// An assembled extraction report.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub sections: Vec<ReportSection>,
}

impl Report {
    /// Render the report text: heading, sections, guidance and count.
    pub fn render(&self, profile: &ReportProfile) -> String {
        if self.sections.is_empty() {
            return profile.empty_message.clone();
        }

        let mut parts = vec![profile.heading.clone(), "=".repeat(profile.heading_rule)];

        for section in &self.sections {
            match profile.body {
                SectionBody::Properties(_) => {
                    parts.push(format!("\n📌 **{}. {}**", section.index, section.title))
                }
                SectionBody::PageContent => {
                    parts.push(format!("\n## {}. {}\n", section.index, section.title))
                }
            }
            parts.extend(section.lines.iter().cloned());
            parts.push("-".repeat(profile.section_rule));
        }

        parts.push(format!("\n💡 **{}**", profile.guidance_heading));
        parts.extend(profile.guidance.iter().map(|line| format!("• {}", line)));
        parts.push(format!(
            "• {}: {}",
            profile.count_label,
            self.sections.len()
        ));

        parts.join("\n")
    }
}

/// Fetches reference records from a collection and renders them as a report.
pub struct ContentExtractionTool {
    name: String,
    description: String,
    store: Arc<dyn DocumentStore>,
    database_id: String,
    page_size: usize,
    pushdown: Option<StoreFilter>,
    sort: Option<SortOrder>,
    filter: RecordFilter,
    profile: ReportProfile,
}

impl ContentExtractionTool {
    /// Create a tool that reports every record of `database_id`.
    pub fn new(
        name: &str,
        description: &str,
        store: Arc<dyn DocumentStore>,
        database_id: &str,
        profile: ReportProfile,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            store,
            database_id: database_id.to_string(),
            page_size: crate::notion::MAX_PAGE_SIZE,
            pushdown: None,
            sort: None,
            filter: RecordFilter::default(),
            profile,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Push a title substring filter down to the store.
    pub fn with_store_filter(mut self, filter: StoreFilter) -> Self {
        self.pushdown = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Build a tool from its settings.
    pub fn from_settings(
        name: &str,
        description: &str,
        store: Arc<dyn DocumentStore>,
        settings: &ExtractionToolSettings,
        profile: ReportProfile,
    ) -> Self {
        let mut tool = Self::new(name, description, store, &settings.database_id, profile)
            .with_page_size(settings.page_size);

        let mut predicate = TitlePredicate::new(&settings.title_property)
            .excluding(settings.exclude_keywords.iter());
        let has_rule = settings.title_contains.is_some() || !settings.exclude_keywords.is_empty();

        if let Some(required) = &settings.title_contains {
            predicate = predicate.requiring(required);
            tool = tool.with_store_filter(StoreFilter::TitleContains {
                property: settings.title_property.clone(),
                value: required.clone(),
            });
        }

        let mut filter = RecordFilter::new(settings.max_records);
        if has_rule {
            filter = filter.with_title(predicate);
        }
        tool = tool.with_filter(filter);

        if settings.newest_first {
            tool = tool.with_sort(SortOrder::LastEditedDescending);
        }

        tool
    }

    /// Title frameworks catalog tool.
    pub fn title_frameworks(store: Arc<dyn DocumentStore>, settings: &ExtractionToolSettings) -> Self {
        Self::from_settings(
            TITLE_FRAMEWORKS_TOOL,
            "Fetches proven high-performing YouTube title frameworks from the Notion database \
            and returns them as a formatted list with examples and outlier scores.",
            store,
            settings,
            ReportProfile::title_frameworks(&settings.title_property),
        )
    }

    /// Script examples tool.
    pub fn script_examples(store: Arc<dyn DocumentStore>, settings: &ExtractionToolSettings) -> Self {
        Self::from_settings(
            SCRIPT_EXAMPLES_TOOL,
            "Fetches recent script examples from the Notion database in markdown format. \
            Use this before writing scripts to learn the channel's writing style and structure.",
            store,
            settings,
            ReportProfile::script_examples(&settings.title_property),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &ReportProfile {
        &self.profile
    }

    fn query(&self, collection_id: &str) -> CollectionQuery {
        let mut query = CollectionQuery::new(collection_id).with_page_size(self.page_size);
        if let Some(filter) = &self.pushdown {
            query = query.with_filter(filter.clone());
        }
        if let Some(sort) = self.sort {
            query = query.with_sort(sort);
        }
        query
    }

    /// Fetch, filter and assemble the report sections.
    #[instrument(skip(self), fields(tool = %self.name))]
    pub async fn extract(&self) -> Result<Report> {
        if self.database_id.trim().is_empty() {
            return Err(AgencyError::ConfigurationMissing(format!(
                "no database id configured for {}",
                self.name
            )));
        }

        let collection_id = self.store.resolve_collection(&self.database_id).await?;
        let fetcher = PaginatedRecordFetcher::new(self.store.as_ref());
        let records = fetcher.fetch_all(&self.query(&collection_id)).await?;
        let fetched = records.len();
        let selected = self.filter.select(records);

        info!("Selected {} of {} records", selected.len(), fetched);

        let mut sections = Vec::with_capacity(selected.len());
        for (i, record) in selected.iter().enumerate() {
            let index = i + 1;
            let lines = match &self.profile.body {
                SectionBody::Properties(fields) => fields
                    .iter()
                    .filter_map(|field| {
                        let value = record.text(&field.property);
                        let value = value.trim();
                        (!value.is_empty()).then(|| format!("   {}: {}", field.label, value))
                    })
                    .collect(),
                SectionBody::PageContent => match fetcher.fetch_blocks(&record.id).await {
                    Ok(blocks) => vec![blocks_to_markdown(&blocks)],
                    Err(e) => {
                        warn!("Could not fetch content for {}: {}", record.id, e);
                        vec![format!("⚠️ Could not fetch content for this page: {}\n", e)]
                    }
                },
            };

            sections.push(ReportSection {
                index,
                record_id: record.id.clone(),
                title: self.profile.section_title(record, index),
                lines,
            });
        }

        Ok(Report { sections })
    }

    /// Run the tool, always producing text for the agent.
    pub async fn run(&self) -> String {
        match self.extract().await {
            Ok(report) => report.render(&self.profile),
            Err(AgencyError::ConfigurationMissing(detail)) => format!("❌ Error: {}", detail),
            Err(e) => format!(
                "❌ Error fetching {}: {}\n\nPlease check:\n1. The Notion API key is set correctly\n\
                2. Database is shared with your integration\n3. Database ID is correct: {}",
                self.profile.subject, e, self.database_id
            ),
        }
    }
}

#[async_trait]
impl LocalTool for ContentExtractionTool {
    fn definition(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn invoke(&self, _arguments: &Value) -> String {
        self.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notion::{Block, BlockKind, MemoryDocumentStore, PropertyValue, TextSpan};
    use chrono::{Duration, TimeZone, Utc};

    fn script_settings(max_records: usize) -> ExtractionToolSettings {
        ExtractionToolSettings {
            database_id: "scripts-db".to_string(),
            title_property: "Name".to_string(),
            page_size: 50,
            title_contains: Some("script".to_string()),
            exclude_keywords: vec![
                "description".to_string(),
                "thumbnail".to_string(),
                "idea".to_string(),
                "tags".to_string(),
            ],
            max_records,
            newest_first: true,
        }
    }

    fn titled(id: &str, title: &str, minutes: i64) -> Record {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        Record::new(id, base + Duration::minutes(minutes))
            .with_property("Name", PropertyValue::Title(vec![TextSpan::plain(title)]))
    }

    /// 50 records; 12 mention "script", 3 of those carry an excluded keyword.
    fn script_store() -> Arc<MemoryDocumentStore> {
        let excluded = ["Script description", "Script thumbnail", "Script tags"];
        let mut records = Vec::new();
        let mut scripts = 0;
        for i in 0..50 {
            let title = if i % 4 == 0 && scripts < 12 {
                scripts += 1;
                if scripts <= 3 {
                    format!("{} {}", excluded[scripts - 1], i)
                } else {
                    format!("Script {}", i)
                }
            } else {
                format!("Notes {}", i)
            };
            records.push(titled(&format!("rec-{:02}", i), &title, i as i64));
        }

        let store = MemoryDocumentStore::new().with_max_page_size(7);
        store.insert_collection("scripts-db", "scripts-ds", records);
        store.insert_blocks(
            "rec-44",
            vec![
                Block::text(BlockKind::Heading { level: 2 }, "Hook"),
                Block::text(BlockKind::Paragraph, "Agents are here."),
            ],
        );
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_script_examples_end_to_end() {
        let store = script_store();
        let tool = ContentExtractionTool::script_examples(store, &script_settings(10));

        let report = tool.extract().await.unwrap();
        assert_eq!(report.sections.len(), 9);

        // Newest first: matching records sit at i = 12, 16, ..., 44
        let ids: Vec<&str> = report.sections.iter().map(|s| s.record_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "rec-44", "rec-40", "rec-36", "rec-32", "rec-28", "rec-24", "rec-20", "rec-16",
                "rec-12"
            ]
        );

        let text = report.render(tool.profile());
        assert!(text.starts_with("# 📜 Script Examples\n"));
        assert!(text.contains("## 1. Script 44\n\n## Hook\n\nAgents are here.\n"));
        assert!(text.contains("## 9. Script 12\n"));
        assert!(text.ends_with("• Total script examples fetched: 9"));
    }

    #[tokio::test]
    async fn test_cap_limits_sections() {
        let tool = ContentExtractionTool::script_examples(script_store(), &script_settings(4));
        let report = tool.extract().await.unwrap();
        assert_eq!(report.sections.len(), 4);
        assert_eq!(report.sections[3].record_id, "rec-32");
    }

    #[tokio::test]
    async fn test_title_frameworks_catalog() {
        let store = MemoryDocumentStore::new();
        store.insert_collection(
            "frameworks-db",
            "frameworks-ds",
            vec![
                Record::new("f1", Utc::now())
                    .with_property(
                        "Title Framework",
                        PropertyValue::Title(vec![TextSpan::plain("I Tried X for Y Days")]),
                    )
                    .with_property(
                        "OG title",
                        PropertyValue::RichText(vec![TextSpan::plain("I Tried Rust for 30 Days")]),
                    )
                    .with_property("Outlier", PropertyValue::Number(12.5)),
                Record::new("f2", Utc::now()),
            ],
        );

        let settings = ExtractionToolSettings {
            database_id: "frameworks-db".to_string(),
            title_property: "Title Framework".to_string(),
            page_size: 100,
            title_contains: None,
            exclude_keywords: Vec::new(),
            max_records: 0,
            newest_first: false,
        };
        let tool = ContentExtractionTool::title_frameworks(Arc::new(store), &settings);
        let text = tool.run().await;

        let heading_rule = "=".repeat(60);
        let section_rule = "-".repeat(50);
        let expected = [
            "🎯 **YouTube Title Frameworks from Notion Database**\n",
            heading_rule.as_str(),
            "\n📌 **1. I Tried X for Y Days**",
            "   Original Title: I Tried Rust for 30 Days",
            "   Outlier Score: 12.5",
            section_rule.as_str(),
            "\n📌 **2. Framework #2**",
            section_rule.as_str(),
            "\n💡 **Usage Guidelines:**",
            "• Select frameworks that naturally fit your video content",
            "• Adapt frameworks to match your specific topic and keywords",
            "• Don't force frameworks that don't suit the video",
            "• Combine multiple frameworks for creative variations",
            "• Total frameworks fetched: 2",
        ]
        .join("\n");
        assert_eq!(text, expected);
    }

    #[tokio::test]
    async fn test_failures_become_descriptive_text() {
        let store = MemoryDocumentStore::new();
        let tool = ContentExtractionTool::script_examples(Arc::new(store), &script_settings(10));
        let text = tool.run().await;
        assert!(text.starts_with("❌ Error fetching script examples:"));
        assert!(text.contains("scripts-db"));

        let mut settings = script_settings(10);
        settings.database_id = String::new();
        let tool = ContentExtractionTool::script_examples(
            Arc::new(MemoryDocumentStore::new()),
            &settings,
        );
        assert!(tool.run().await.starts_with("❌ Error: no database id configured"));
    }

    #[tokio::test]
    async fn test_empty_selection_uses_empty_message() {
        let store = MemoryDocumentStore::new();
        store.insert_collection("scripts-db", "ds", vec![titled("a", "Notes", 0)]);
        let tool = ContentExtractionTool::script_examples(Arc::new(store), &script_settings(10));
        assert_eq!(tool.run().await, tool.profile().empty_message);
    }

    #[tokio::test]
    async fn test_block_failure_is_local_to_section() {
        let store = MemoryDocumentStore::new().failing_after(2);
        store.insert_collection("scripts-db", "ds", vec![titled("a", "Script A", 0)]);
        let tool = ContentExtractionTool::script_examples(Arc::new(store), &script_settings(10));

        let report = tool.extract().await.unwrap();
        assert_eq!(report.sections.len(), 1);
        assert!(report.sections[0].lines[0].starts_with("⚠️ Could not fetch content"));
    }
}
