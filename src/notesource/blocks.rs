//! Block-to-markdown flattening, ported from
//! `notion_service.py::fetch_page_blocks`'s per-type conversion table.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RichTextSpan {
    #[serde(default)]
    pub plain_text: String,
}

/// Concatenates plain_text spans with no separator (matches the original's
/// `"".join(...)` behavior).
pub fn extract_rich_text(spans: &[RichTextSpan]) -> String {
    spans.iter().map(|s| s.plain_text.as_str()).collect()
}

#[derive(Debug, Clone)]
pub enum Block {
    Paragraph { text: String },
    Heading1 { text: String },
    Heading2 { text: String },
    Heading3 { text: String },
    BulletedListItem { text: String },
    NumberedListItem { text: String },
    Quote { text: String },
    Callout { text: String, emoji: Option<String> },
    Code { text: String, language: String },
    Toggle { text: String },
    Unsupported,
}

/// Converts one block to its markdown-ish line. `Unsupported` yields `None`
/// and contributes nothing (the original silently skips unknown types).
fn block_to_line(block: &Block) -> Option<String> {
    match block {
        Block::Paragraph { text } => Some(text.clone()),
        Block::Heading1 { text } => Some(format!("# {text}")),
        Block::Heading2 { text } => Some(format!("## {text}")),
        Block::Heading3 { text } => Some(format!("### {text}")),
        Block::BulletedListItem { text } => Some(format!("- {text}")),
        // The original never tracks a running counter; every item renders "1. ".
        Block::NumberedListItem { text } => Some(format!("1. {text}")),
        Block::Quote { text } => Some(format!("> {text}")),
        Block::Callout { text, emoji } => {
            let icon = emoji.clone().unwrap_or_else(|| "\u{1F4A1}".to_string());
            Some(format!("{icon} {text}"))
        }
        Block::Code { text, language } => Some(format!("```{language}\n{text}\n```")),
        Block::Toggle { text } => Some(format!("\u{25B6} {text}")),
        Block::Unsupported => None,
    }
}

/// Joins block lines with a blank line between each, matching the original's
/// `"\n\n".join(...)`.
pub fn blocks_to_markdown(blocks: &[Block]) -> String {
    blocks
        .iter()
        .filter_map(block_to_line)
        .collect::<Vec<_>>()
        .join("\n\n")
}
