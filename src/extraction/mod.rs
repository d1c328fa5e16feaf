//! Reference material extraction.
//!
//! Pulls records out of the document store, keeps the relevant ones and
//! renders them into a single text report an agent can read.

mod fetcher;
mod filter;
mod markdown;
mod tool;

pub use fetcher::{drain_pages, PaginatedRecordFetcher};
pub use filter::{select, RecordFilter, TitlePredicate};
pub use markdown::{blocks_to_markdown, render_spans, CALLOUT_GLYPH};
pub use tool::{
    ContentExtractionTool, PropertyField, Report, ReportProfile, ReportSection, SectionBody,
};
