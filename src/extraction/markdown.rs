//! Rich text and block rendering to flat markdown.

use crate::notion::{Block, BlockKind, TextSpan};

/// Glyph placed in front of callout text.
pub const CALLOUT_GLYPH: &str = "💡";

/// Render spans to a single string.
///
/// Content passes through unescaped. Flags wrap the content with bold
/// outermost, then italic, code and strikethrough innermost.
pub fn render_spans(spans: &[TextSpan]) -> String {
    spans.iter().map(render_span).collect()
}

fn render_span(span: &TextSpan) -> String {
    let flags = span.annotations;
    let mut out = span.content.clone();

    if flags.strikethrough {
        out = format!("~~{}~~", out);
    }
    if flags.code {
        out = format!("`{}`", out);
    }
    if flags.italic {
        out = format!("*{}*", out);
    }
    if flags.bold {
        out = format!("**{}**", out);
    }

    out
}

/// Render one block, or `None` when it has nothing to show.
fn render_block(block: &Block) -> Option<String> {
    if let BlockKind::Divider = block.kind {
        return Some("---\n".to_string());
    }

    let text = render_spans(&block.spans);
    if text.is_empty() {
        return None;
    }

    let line = match &block.kind {
        BlockKind::Paragraph => format!("{}\n", text),
        BlockKind::Heading { level } => {
            format!("{} {}\n", "#".repeat((*level).clamp(1, 3) as usize), text)
        }
        BlockKind::BulletedItem => format!("- {}\n", text),
        // Numbering is left to the markdown renderer
        BlockKind::NumberedItem => format!("1. {}\n", text),
        BlockKind::Code { language } => {
            format!("```{}\n{}\n```\n", language.as_deref().unwrap_or(""), text)
        }
        BlockKind::Quote => format!("> {}\n", text),
        BlockKind::Callout => format!("{} {}\n", CALLOUT_GLYPH, text),
        BlockKind::Divider | BlockKind::Unsupported { .. } => return None,
    };

    Some(line)
}

/// Convert blocks to markdown, one rendered block per line group.
///
/// Empty and unsupported blocks are skipped.
pub fn blocks_to_markdown(blocks: &[Block]) -> String {
    blocks
        .iter()
        .filter_map(render_block)
        .collect::<Vec<_>>()
        .join("\n")
}
