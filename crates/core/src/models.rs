use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const SUMMARY_MAX_CHARS: usize = 500;

/// One contiguous run of uniformly styled text, as produced by the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedSpan {
    pub text: String,
    pub font_size: f32,
    pub is_bold: bool,
    pub is_italic: bool,
}

impl PositionedSpan {
    pub fn new(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_size,
            is_bold: false,
            is_italic: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.is_bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.is_italic = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceLine {
    pub spans: Vec<PositionedSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Text,
    Image,
}

/// A spatial block of the source page. Only [`BlockKind::Text`] blocks carry lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBlock {
    pub kind: BlockKind,
    pub lines: Vec<SourceLine>,
}

impl SourceBlock {
    pub fn text(lines: Vec<SourceLine>) -> Self {
        Self {
            kind: BlockKind::Text,
            lines,
        }
    }

    pub fn image() -> Self {
        Self {
            kind: BlockKind::Image,
            lines: Vec::new(),
        }
    }
}

/// A source line with its spans merged: text joined by single spaces, the
/// largest span size, and the OR of the style flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub font_size: f32,
    pub is_bold: bool,
    pub is_italic: bool,
}

impl Line {
    pub fn new(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_size,
            is_bold: false,
            is_italic: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.is_bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.is_italic = true;
        self
    }

    /// Merges spans into a line. Blank spans contribute neither text nor
    /// metrics; `None` when nothing visible remains.
    pub fn from_spans(spans: &[PositionedSpan]) -> Option<Self> {
        let mut pieces = Vec::new();
        let mut font_size = 0f32;
        let mut is_bold = false;
        let mut is_italic = false;

        for span in spans {
            let text = span.text.trim();
            if text.is_empty() {
                continue;
            }
            pieces.push(text);
            font_size = font_size.max(span.font_size);
            is_bold |= span.is_bold;
            is_italic |= span.is_italic;
        }

        let text = pieces.join(" ").trim().to_string();
        if text.is_empty() {
            return None;
        }

        Some(Self {
            text,
            font_size,
            is_bold,
            is_italic,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Heading1,
    Heading2,
    Heading3,
    FigureCaption,
    CitationOrFooter,
    Equation,
    Body,
}

impl Role {
    pub fn heading_level(self) -> Option<u8> {
        match self {
            Role::Heading1 => Some(1),
            Role::Heading2 => Some(2),
            Role::Heading3 => Some(3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedFragment {
    pub line: Line,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub page_count: usize,
    pub title: String,
    pub author: String,
    pub subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub metadata: PdfMetadata,
    pub markdown_content: String,
    pub text_summary: String,
    pub pages_extracted: usize,
    pub total_pages: usize,
    pub size_bytes: usize,
    pub content_length: usize,
    pub extraction_method: String,
    pub checksum: String,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn size_mb(&self) -> f64 {
        (self.size_bytes as f64 / 1_000_000.0 * 10.0).round() / 10.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOptions {
    pub page_limit: usize,
    pub include_page_numbers: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            include_page_numbers: false,
        }
    }
}

impl ExtractionOptions {
    /// Reads `PDF_MAX_PAGES` and `PDF_INCLUDE_PAGE_NUMBERS`.
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("PDF_MAX_PAGES").ok().as_deref(),
            std::env::var("PDF_INCLUDE_PAGE_NUMBERS").ok().as_deref(),
        )
    }

    pub fn from_values(page_limit: Option<&str>, include_page_numbers: Option<&str>) -> Self {
        let page_limit = page_limit
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        let include_page_numbers = include_page_numbers.is_some_and(parse_flag);

        Self {
            page_limit,
            include_page_numbers,
        }
    }
}

pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub first: String,
    pub last: String,
    #[serde(default)]
    pub full: String,
}

/// A normalized bibliography record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub uid: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub doi: String,
    #[serde(default)]
    pub url: String,
}

/// A PDF located by a [`crate::PdfSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfFile {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub link: Option<String>,
}
