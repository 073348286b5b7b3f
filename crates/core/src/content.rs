use crate::blocks::{to_blocks, ContentBlock};
use crate::models::ExtractionResult;

pub const EXTRACTED_CONTENT_HEADING: &str = "📄 Extracted Content";
pub const SUMMARY_HEADING: &str = "📊 Document Summary";

/// Ordered blocks for a bibliography page: an optional embed of the PDF, the
/// converted markdown, and a summary section.
pub fn build_page_blocks(link: Option<&str>, result: &ExtractionResult) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();

    if let Some(link) = link.map(str::trim).filter(|link| !link.is_empty()) {
        blocks.push(ContentBlock::embed(link));
        blocks.push(ContentBlock::Divider);
    }

    if !result.markdown_content.trim().is_empty() {
        blocks.push(ContentBlock::heading(2, EXTRACTED_CONTENT_HEADING));
        blocks.extend(to_blocks(&result.markdown_content));
    }

    if !result.text_summary.is_empty() {
        blocks.push(ContentBlock::Divider);
        blocks.push(ContentBlock::heading(2, SUMMARY_HEADING));
        blocks.extend(to_blocks(&summary_text(result)));
    }

    blocks
}

pub fn summary_text(result: &ExtractionResult) -> String {
    let mut text = format!(
        "**Pages**: {}\n**File Size**: {:.1} MB\n",
        result.total_pages,
        result.size_mb()
    );
    if !result.metadata.title.is_empty() {
        text.push_str(&format!("**PDF Title**: {}\n", result.metadata.title));
    }
    if !result.metadata.author.is_empty() {
        text.push_str(&format!("**PDF Author**: {}\n", result.metadata.author));
    }
    text.push('\n');
    text.push_str(&result.text_summary);
    text
}
