//! Typed records, blocks and rich text decoded from the document store's JSON.

use crate::error::{AgencyError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Formatting flags attached to a run of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strikethrough: bool,
}

/// A run of text with formatting flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub content: String,
    #[serde(default)]
    pub annotations: Annotations,
}

impl TextSpan {
    /// Create an unformatted span.
    pub fn plain(content: &str) -> Self {
        Self {
            content: content.to_string(),
            annotations: Annotations::default(),
        }
    }

    /// Create a span with the given flags.
    pub fn styled(content: &str, annotations: Annotations) -> Self {
        Self {
            content: content.to_string(),
            annotations,
        }
    }
}

#[derive(Deserialize)]
struct RawRichText {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<RawText>,
    #[serde(default)]
    annotations: Annotations,
}

#[derive(Deserialize)]
struct RawText {
    #[serde(default)]
    content: String,
}

/// Decode a rich text array. Only `text` spans carry content; mentions and
/// equations are dropped.
pub fn parse_rich_text(value: &Value) -> Result<Vec<TextSpan>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let raw: Vec<RawRichText> = serde_json::from_value(value.clone())?;
    Ok(raw
        .into_iter()
        .filter(|span| span.kind == "text")
        .filter_map(|span| {
            span.text.map(|text| TextSpan {
                content: text.content,
                annotations: span.annotations,
            })
        })
        .collect())
}

/// Join span contents the way record titles are read: one space between spans.
pub fn spans_to_plain(spans: &[TextSpan]) -> String {
    spans
        .iter()
        .filter(|s| !s.content.is_empty())
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A record property value, tagged by its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// The record's title property.
    Title(Vec<TextSpan>),
    RichText(Vec<TextSpan>),
    PlainText(String),
    Select(String),
    MultiSelect(Vec<String>),
    Number(f64),
    /// Missing, empty, unsupported or malformed.
    Absent,
}

impl PropertyValue {
    /// Decode a property object (`{"type": "...", "<type>": ...}`).
    pub fn parse(value: &Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("property without a type tag"))?;
        let body = value.get(kind).unwrap_or(&Value::Null);

        let parsed = match kind {
            "title" => PropertyValue::Title(parse_rich_text(body)?),
            "rich_text" => PropertyValue::RichText(parse_rich_text(body)?),
            "url" | "email" | "phone_number" => match body {
                Value::Null => PropertyValue::Absent,
                Value::String(s) => PropertyValue::PlainText(s.clone()),
                _ => return Err(malformed(&format!("{} is not a string", kind))),
            },
            "select" | "status" => match body {
                Value::Null => PropertyValue::Absent,
                other => PropertyValue::Select(choice_name(other)?),
            },
            "multi_select" => match body {
                Value::Null => PropertyValue::Absent,
                Value::Array(items) => PropertyValue::MultiSelect(
                    items.iter().map(choice_name).collect::<Result<Vec<_>>>()?,
                ),
                _ => return Err(malformed("multi_select is not an array")),
            },
            "number" => match body {
                Value::Null => PropertyValue::Absent,
                Value::Number(n) => PropertyValue::Number(
                    n.as_f64().ok_or_else(|| malformed("number out of range"))?,
                ),
                _ => return Err(malformed("number is not numeric")),
            },
            _ => PropertyValue::Absent,
        };

        Ok(parsed)
    }

    /// Flatten to display text. Absent values flatten to an empty string.
    pub fn as_text(&self) -> String {
        match self {
            PropertyValue::Title(spans) | PropertyValue::RichText(spans) => spans_to_plain(spans),
            PropertyValue::PlainText(s) | PropertyValue::Select(s) => s.clone(),
            PropertyValue::MultiSelect(labels) => labels.join(", "),
            PropertyValue::Number(n) => format!("{}", n),
            PropertyValue::Absent => String::new(),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, PropertyValue::Absent)
    }
}

fn choice_name(value: &Value) -> Result<String> {
    value
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed("choice without a name"))
}

fn malformed(detail: &str) -> AgencyError {
    AgencyError::MalformedRecord {
        record: String::new(),
        detail: detail.to_string(),
    }
}

/// A structured item in a remote collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub last_edited: DateTime<Utc>,
    pub properties: BTreeMap<String, PropertyValue>,
}

static ABSENT: PropertyValue = PropertyValue::Absent;

impl Record {
    pub fn new(id: &str, last_edited: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            last_edited,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, name: &str, value: PropertyValue) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    /// Look up a property; missing properties read as `Absent`.
    pub fn property(&self, name: &str) -> &PropertyValue {
        self.properties.get(name).unwrap_or(&ABSENT)
    }

    /// Display text of a property, empty when absent.
    pub fn text(&self, name: &str) -> String {
        self.property(name).as_text()
    }

    /// Decode a page object. Properties that fail to decode are kept as
    /// `Absent` so one bad field never drops the record.
    pub fn from_json(value: &Value) -> Result<Self> {
        #[derive(Deserialize)]
        struct RawRecord {
            id: String,
            last_edited_time: DateTime<Utc>,
            #[serde(default)]
            properties: BTreeMap<String, Value>,
        }

        let raw: RawRecord = serde_json::from_value(value.clone())?;
        let mut properties = BTreeMap::new();

        for (name, prop) in raw.properties {
            let parsed = match PropertyValue::parse(&prop) {
                Ok(parsed) => parsed,
                Err(AgencyError::MalformedRecord { detail, .. }) => {
                    let err = AgencyError::MalformedRecord {
                        record: raw.id.clone(),
                        detail: format!("{}: {}", name, detail),
                    };
                    warn!("{}", err);
                    PropertyValue::Absent
                }
                Err(e) => {
                    warn!("Record {} property {} unreadable: {}", raw.id, name, e);
                    PropertyValue::Absent
                }
            };
            properties.insert(name, parsed);
        }

        Ok(Record {
            id: raw.id,
            last_edited: raw.last_edited_time,
            properties,
        })
    }
}

/// Content block types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Heading { level: u8 },
    BulletedItem,
    NumberedItem,
    Code { language: Option<String> },
    Quote,
    Callout,
    Divider,
    /// A block type this crate does not render.
    Unsupported { name: String },
}

/// A typed node of a document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    #[serde(default)]
    pub spans: Vec<TextSpan>,
}

impl Block {
    pub fn new(kind: BlockKind, spans: Vec<TextSpan>) -> Self {
        Self { kind, spans }
    }

    /// Shorthand for a block holding a single unformatted span.
    pub fn text(kind: BlockKind, text: &str) -> Self {
        Self::new(kind, vec![TextSpan::plain(text)])
    }

    pub fn divider() -> Self {
        Self::new(BlockKind::Divider, Vec::new())
    }

    /// Decode a block object. Unknown types decode to `Unsupported`.
    pub fn from_json(value: &Value) -> Self {
        let name = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let body = value.get(&name).unwrap_or(&Value::Null);

        let kind = match name.as_str() {
            "paragraph" => BlockKind::Paragraph,
            "heading_1" => BlockKind::Heading { level: 1 },
            "heading_2" => BlockKind::Heading { level: 2 },
            "heading_3" => BlockKind::Heading { level: 3 },
            "bulleted_list_item" => BlockKind::BulletedItem,
            "numbered_list_item" => BlockKind::NumberedItem,
            "code" => BlockKind::Code {
                language: body
                    .get("language")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            "quote" => BlockKind::Quote,
            "callout" => BlockKind::Callout,
            "divider" => BlockKind::Divider,
            _ => BlockKind::Unsupported { name: name.clone() },
        };

        let spans = match kind {
            BlockKind::Divider | BlockKind::Unsupported { .. } => Vec::new(),
            _ => body
                .get("rich_text")
                .map(|rt| {
                    parse_rich_text(rt).unwrap_or_else(|e| {
                        warn!("Unreadable rich text in block: {}", e);
                        Vec::new()
                    })
                })
                .unwrap_or_default(),
        };

        Block { kind, spans }
    }
}

/// An ordered batch of items plus pagination state.
///
/// `next_cursor` is only ever set when more items remain.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// The final page of a listing.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }

    /// Build a page from the wire flags, dropping any cursor when `has_more` is false.
    pub fn from_parts(items: Vec<T>, has_more: bool, cursor: Option<String>) -> Self {
        if has_more && cursor.is_none() {
            warn!("Page reports more results but carries no cursor; treating as last page");
        }
        Self {
            items,
            next_cursor: if has_more { cursor } else { None },
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_title_property_joins_text_spans() {
        let prop = json!({
            "type": "title",
            "title": [
                {"type": "text", "text": {"content": "Agents"}, "annotations": {"bold": true}},
                {"type": "mention", "mention": {}, "plain_text": "@someone"},
                {"type": "text", "text": {"content": "Script"}}
            ]
        });
        let value = PropertyValue::parse(&prop).unwrap();
        assert_eq!(value.as_text(), "Agents Script");
        match value {
            PropertyValue::Title(spans) => {
                assert_eq!(spans.len(), 2);
                assert!(spans[0].annotations.bold);
            }
            other => panic!("Expected title, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_choice_and_number_properties() {
        let select = PropertyValue::parse(&json!({"type": "select", "select": {"name": "Hook"}}));
        assert_eq!(select.unwrap(), PropertyValue::Select("Hook".to_string()));

        let multi = PropertyValue::parse(&json!({
            "type": "multi_select",
            "multi_select": [{"name": "AI"}, {"name": "Agents"}]
        }))
        .unwrap();
        assert_eq!(multi.as_text(), "AI, Agents");

        let number = PropertyValue::parse(&json!({"type": "number", "number": 12})).unwrap();
        assert_eq!(number.as_text(), "12");

        let empty = PropertyValue::parse(&json!({"type": "number", "number": null})).unwrap();
        assert!(empty.is_absent());
    }

    #[test]
    fn test_malformed_property_is_recovered_as_absent() {
        let page = json!({
            "id": "rec-1",
            "last_edited_time": "2025-01-02T03:04:05.000Z",
            "properties": {
                "Outlier": {"type": "number", "number": "lots"},
                "Name": {"type": "title", "title": [{"type": "text", "text": {"content": "Ok"}}]}
            }
        });
        let record = Record::from_json(&page).unwrap();
        assert!(record.property("Outlier").is_absent());
        assert_eq!(record.text("Name"), "Ok");
        assert!(record.property("Missing").is_absent());
        assert_eq!(record.text("Missing"), "");
    }

    #[test]
    fn test_block_from_json() {
        let code = Block::from_json(&json!({
            "type": "code",
            "code": {"language": "rust", "rich_text": [{"type": "text", "text": {"content": "fn main() {}"}}]}
        }));
        assert_eq!(
            code.kind,
            BlockKind::Code {
                language: Some("rust".to_string())
            }
        );
        assert_eq!(code.spans[0].content, "fn main() {}");

        let unknown = Block::from_json(&json!({"type": "synced_block", "synced_block": {}}));
        assert_eq!(
            unknown.kind,
            BlockKind::Unsupported {
                name: "synced_block".to_string()
            }
        );
    }

    #[test]
    fn test_page_drops_cursor_without_more() {
        let page = Page::from_parts(vec![1, 2], false, Some("abc".to_string()));
        assert!(!page.has_more());

        let page = Page::from_parts(vec![1], true, Some("abc".to_string()));
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }
}
