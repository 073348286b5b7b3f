//! Markdown to content-block conversion.
//!
//! The converter understands exactly the constructs the page reconstructor
//! emits: `#`/`##`/`###` headings, `---` dividers, fenced code and plain
//! paragraphs. Paragraph text is split into chunks the store accepts.

use serde::{Deserialize, Serialize};

pub const MAX_PARAGRAPH_CHARS: usize = 2_000;
const DEFAULT_CODE_LANGUAGE: &str = "text";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireBlock", from = "WireBlock")]
pub enum ContentBlock {
    Embed { url: String },
    Divider,
    Heading { level: u8, text: String },
    Paragraph { text: String },
    Code { text: String, language: String },
}

impl ContentBlock {
    pub fn embed(url: impl Into<String>) -> Self {
        ContentBlock::Embed { url: url.into() }
    }

    /// Levels outside 1..=3 are clamped.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        ContentBlock::Heading {
            level: level.clamp(1, 3),
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        ContentBlock::Paragraph { text: text.into() }
    }

    pub fn code(text: impl Into<String>, language: impl Into<String>) -> Self {
        ContentBlock::Code {
            text: text.into(),
            language: language.into(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ContentBlock::Embed { .. } => "embed",
            ContentBlock::Divider => "divider",
            ContentBlock::Heading { level: 1, .. } => "heading_1",
            ContentBlock::Heading { level: 2, .. } => "heading_2",
            ContentBlock::Heading { .. } => "heading_3",
            ContentBlock::Paragraph { .. } => "paragraph",
            ContentBlock::Code { .. } => "code",
        }
    }
}

/// Flat wire shape: `{"type": "heading_2", "text": ...}` and friends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Embed { url: String },
    Divider,
    #[serde(rename = "heading_1")]
    Heading1 { text: String },
    #[serde(rename = "heading_2")]
    Heading2 { text: String },
    #[serde(rename = "heading_3")]
    Heading3 { text: String },
    Paragraph { text: String },
    Code { text: String, language: String },
}

impl From<ContentBlock> for WireBlock {
    fn from(block: ContentBlock) -> Self {
        match block {
            ContentBlock::Embed { url } => WireBlock::Embed { url },
            ContentBlock::Divider => WireBlock::Divider,
            ContentBlock::Heading { level: 1, text } => WireBlock::Heading1 { text },
            ContentBlock::Heading { level: 2, text } => WireBlock::Heading2 { text },
            ContentBlock::Heading { text, .. } => WireBlock::Heading3 { text },
            ContentBlock::Paragraph { text } => WireBlock::Paragraph { text },
            ContentBlock::Code { text, language } => WireBlock::Code { text, language },
        }
    }
}

impl From<WireBlock> for ContentBlock {
    fn from(block: WireBlock) -> Self {
        match block {
            WireBlock::Embed { url } => ContentBlock::Embed { url },
            WireBlock::Divider => ContentBlock::Divider,
            WireBlock::Heading1 { text } => ContentBlock::Heading { level: 1, text },
            WireBlock::Heading2 { text } => ContentBlock::Heading { level: 2, text },
            WireBlock::Heading3 { text } => ContentBlock::Heading { level: 3, text },
            WireBlock::Paragraph { text } => ContentBlock::Paragraph { text },
            WireBlock::Code { text, language } => ContentBlock::Code { text, language },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConverterState {
    Normal,
    InCodeBlock,
}

pub fn to_blocks(markdown: &str) -> Vec<ContentBlock> {
    if markdown.trim().is_empty() {
        return Vec::new();
    }

    let mut blocks = Vec::new();
    let mut state = ConverterState::Normal;
    let mut paragraph = String::new();
    let mut code_lines: Vec<&str> = Vec::new();
    let mut language = DEFAULT_CODE_LANGUAGE.to_string();

    for line in markdown.split('\n') {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            match state {
                ConverterState::InCodeBlock => {
                    push_code(&mut blocks, &mut code_lines, &language);
                    state = ConverterState::Normal;
                }
                ConverterState::Normal => {
                    flush_paragraph(&mut blocks, &mut paragraph);
                    language = fence_language(trimmed);
                    state = ConverterState::InCodeBlock;
                }
            }
            continue;
        }

        if state == ConverterState::InCodeBlock {
            code_lines.push(line);
            continue;
        }

        if let Some((level, text)) = heading_marker(line) {
            flush_paragraph(&mut blocks, &mut paragraph);
            blocks.push(ContentBlock::heading(level, text.trim()));
        } else if trimmed == "---" {
            flush_paragraph(&mut blocks, &mut paragraph);
            blocks.push(ContentBlock::Divider);
        } else if trimmed.is_empty() {
            flush_paragraph(&mut blocks, &mut paragraph);
        } else {
            paragraph.push_str(line);
            paragraph.push('\n');
        }
    }

    if state == ConverterState::InCodeBlock {
        push_code(&mut blocks, &mut code_lines, &language);
    }
    flush_paragraph(&mut blocks, &mut paragraph);

    blocks
}

fn heading_marker(line: &str) -> Option<(u8, &str)> {
    if let Some(rest) = line.strip_prefix("# ") {
        Some((1, rest))
    } else if let Some(rest) = line.strip_prefix("## ") {
        Some((2, rest))
    } else {
        line.strip_prefix("### ").map(|rest| (3, rest))
    }
}

/// The word immediately after the opening backticks, or `text`.
fn fence_language(fence: &str) -> String {
    let language = fence
        .strip_prefix("```")
        .unwrap_or_default()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect::<String>();
    if language.is_empty() {
        DEFAULT_CODE_LANGUAGE.to_string()
    } else {
        language
    }
}

fn push_code(blocks: &mut Vec<ContentBlock>, code_lines: &mut Vec<&str>, language: &str) {
    if !code_lines.is_empty() {
        blocks.push(ContentBlock::code(code_lines.join("\n"), language));
    }
    code_lines.clear();
}

fn flush_paragraph(blocks: &mut Vec<ContentBlock>, paragraph: &mut String) {
    let text = paragraph.trim();
    if !text.is_empty() {
        blocks.extend(paragraph_blocks(text));
    }
    paragraph.clear();
}

pub fn paragraph_blocks(text: &str) -> Vec<ContentBlock> {
    split_long_text(text, MAX_PARAGRAPH_CHARS)
        .into_iter()
        .map(ContentBlock::paragraph)
        .collect()
}

/// Splits `text` into chunks of at most `max_chars` characters, cutting after
/// sentence ends where possible. A sentence longer than the limit is cut hard.
pub fn split_long_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();

        if current_len + sentence_len <= max_chars {
            current.push_str(sentence);
            current.push(' ');
            current_len += sentence_len + 1;
            continue;
        }

        push_chunk(&mut chunks, &current);
        current.clear();
        current_len = 0;

        if sentence_len <= max_chars {
            current.push_str(sentence);
            current.push(' ');
            current_len = sentence_len + 1;
            continue;
        }

        let chars: Vec<char> = sentence.chars().collect();
        let mut pieces = chars.chunks(max_chars).peekable();
        while let Some(piece) = pieces.next() {
            let piece: String = piece.iter().collect();
            if pieces.peek().is_some() {
                push_chunk(&mut chunks, &piece);
            } else {
                current_len = piece.chars().count() + 1;
                current = piece;
                current.push(' ');
            }
        }
    }

    push_chunk(&mut chunks, &current);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, chunk: &str) {
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
}

/// Sentences end after `.`, `!` or `?` followed by whitespace; the
/// whitespace itself is dropped.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((index, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }

        let end = index + ch.len_utf8();
        let mut next_start = end;
        while let Some(&(position, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            next_start = position + next.len_utf8();
            chars.next();
        }

        if next_start > end {
            sentences.push(&text[start..end]);
            start = next_start;
        }
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}
