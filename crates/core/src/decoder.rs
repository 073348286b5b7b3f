//! PDF decoding capability.
//!
//! The reconstructors never touch a PDF library directly; they receive a
//! [`PdfDecoder`] and work against the page structure it exposes. The lopdf
//! backed [`LopdfDecoder`] interprets each page's content stream into text
//! blocks, lines and styled spans.

use crate::error::ExtractError;
use crate::models::{PdfMetadata, PositionedSpan, SourceBlock, SourceLine};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap};

const DEFAULT_FONT_SIZE: f32 = 12.0;
/// `TJ` adjustments below this (in thousandths of an em) read as a word gap.
const TJ_WORD_GAP: f32 = -200.0;
const SAME_LINE_TOLERANCE: f32 = 0.5;

const FLAG_ITALIC: i64 = 1 << 6;
const FLAG_FORCE_BOLD: i64 = 1 << 18;
const BOLD_MARKERS: [&str; 5] = ["bold", "black", "heavy", "semibold", "demi"];
const ITALIC_MARKERS: [&str; 2] = ["italic", "oblique"];

pub trait PdfDecoder: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DecodedPdf>, ExtractError>;
}

/// An opened document. Page indexes are 0-based.
pub trait DecodedPdf {
    fn metadata(&self) -> PdfMetadata;

    fn page_count(&self) -> usize;

    /// Structured blocks with font metrics.
    fn page_blocks(&self, index: usize) -> Result<Vec<SourceBlock>, ExtractError>;

    /// Unstyled text laid out as markdown paragraphs, one per block.
    fn page_markdown(&self, index: usize) -> Result<String, ExtractError>;

    fn page_text(&self, index: usize) -> Result<String, ExtractError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfDecoder;

impl PdfDecoder for LopdfDecoder {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DecodedPdf>, ExtractError> {
        let document = Document::load_mem(bytes)?;
        let pages = document.get_pages().into_iter().collect::<Vec<_>>();
        Ok(Box::new(LopdfPdf { document, pages }))
    }
}

pub struct LopdfPdf {
    document: Document,
    pages: Vec<(u32, ObjectId)>,
}

impl LopdfPdf {
    fn page(&self, index: usize) -> Result<(u32, ObjectId), ExtractError> {
        self.pages
            .get(index)
            .copied()
            .ok_or_else(|| {
                page_error(index, format!("page index out of range ({})", self.pages.len()))
            })
    }

    fn info_dictionary(&self) -> Option<&Dictionary> {
        let info = self.document.trailer.get(b"Info").ok()?;
        self.resolve(info)?.as_dict().ok()
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.document.get_object(*id).ok(),
            other => Some(other),
        }
    }

    fn info_field(&self, info: Option<&Dictionary>, key: &[u8]) -> String {
        info.and_then(|dict| dict.get(key).ok())
            .and_then(|value| self.resolve(value))
            .and_then(|value| match value {
                Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
                _ => None,
            })
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    }

    fn font_styles(&self, fonts: &BTreeMap<Vec<u8>, &Dictionary>) -> HashMap<Vec<u8>, FontStyle> {
        fonts
            .iter()
            .map(|(name, font)| (name.clone(), self.font_style(font)))
            .collect()
    }

    fn font_style(&self, font: &Dictionary) -> FontStyle {
        let base_font = font
            .get(b"BaseFont")
            .ok()
            .and_then(|name| name.as_name().ok())
            .map(|name| String::from_utf8_lossy(name).to_lowercase())
            .unwrap_or_default();

        let flags = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|descriptor| self.resolve(descriptor))
            .and_then(|descriptor| descriptor.as_dict().ok())
            .and_then(|descriptor| descriptor.get(b"Flags").ok())
            .and_then(|flags| flags.as_i64().ok())
            .unwrap_or(0);

        FontStyle {
            bold: BOLD_MARKERS.iter().any(|marker| base_font.contains(marker))
                || flags & FLAG_FORCE_BOLD != 0,
            italic: ITALIC_MARKERS.iter().any(|marker| base_font.contains(marker))
                || flags & FLAG_ITALIC != 0,
        }
    }

    fn interpret_page(&self, index: usize, styled: bool) -> Result<Vec<SourceBlock>, ExtractError> {
        let (_, page_id) = self.page(index)?;

        let fonts = if styled {
            self.document
                .get_page_fonts(page_id)
                .map_err(|error| page_error(index, error.to_string()))?
        } else {
            BTreeMap::new()
        };
        let styles = self.font_styles(&fonts);

        let data = self
            .document
            .get_page_content(page_id)
            .map_err(|error| page_error(index, error.to_string()))?;
        let content =
            Content::decode(&data).map_err(|error| page_error(index, error.to_string()))?;

        let mut interpreter = TextInterpreter::default();
        for operation in &content.operations {
            let operands = &operation.operands;
            match operation.operator.as_str() {
                "q" => interpreter.save_state(),
                "Q" => interpreter.restore_state(),
                "cm" => {
                    let values = operands.iter().take(6).filter_map(number).collect::<Vec<_>>();
                    if let [a, b, c, d, e, f] = values[..] {
                        interpreter.concat_ctm([a, b, c, d, e, f]);
                    }
                }
                "BT" => interpreter.begin_text(),
                "ET" => interpreter.end_text(),
                "Tf" => {
                    if let (Some(name), Some(size)) = (
                        operands.first().and_then(|name| name.as_name().ok()),
                        operands.get(1).and_then(number),
                    ) {
                        let style = styles.get(name).copied().unwrap_or_default();
                        interpreter.set_font(name.to_vec(), size, style);
                    }
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(number) {
                        interpreter.leading = leading;
                    }
                }
                "Td" | "TD" => {
                    let tx = operands.first().and_then(number).unwrap_or(0.0);
                    let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                    if operation.operator == "TD" {
                        interpreter.leading = -ty;
                    }
                    interpreter.move_text(tx, ty);
                }
                "Tm" => {
                    let values = operands.iter().take(6).filter_map(number).collect::<Vec<_>>();
                    if let [a, b, c, d, e, f] = values[..] {
                        interpreter.set_matrix([a, b, c, d, e, f]);
                    }
                }
                "T*" => interpreter.next_line(),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        let text =
                            decode_with_font(&self.document, &fonts, &interpreter.font, bytes);
                        interpreter.show(&text);
                    }
                }
                "TJ" => {
                    if let Some(Ok(items)) = operands.first().map(Object::as_array) {
                        let mut text = String::new();
                        for item in items {
                            match item {
                                Object::String(bytes, _) => text.push_str(&decode_with_font(
                                    &self.document,
                                    &fonts,
                                    &interpreter.font,
                                    bytes,
                                )),
                                other => {
                                    let gap = number(other).unwrap_or(0.0);
                                    if gap < TJ_WORD_GAP && !text.ends_with(char::is_whitespace) {
                                        text.push(' ');
                                    }
                                }
                            }
                        }
                        interpreter.show(&text);
                    }
                }
                "'" => {
                    interpreter.next_line();
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        let text =
                            decode_with_font(&self.document, &fonts, &interpreter.font, bytes);
                        interpreter.show(&text);
                    }
                }
                "\"" => {
                    interpreter.next_line();
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        let text =
                            decode_with_font(&self.document, &fonts, &interpreter.font, bytes);
                        interpreter.show(&text);
                    }
                }
                "Do" => interpreter.graphic(),
                _ => {}
            }
        }

        Ok(interpreter.finish())
    }
}

impl DecodedPdf for LopdfPdf {
    fn metadata(&self) -> PdfMetadata {
        let info = self.info_dictionary();
        PdfMetadata {
            page_count: self.pages.len(),
            title: self.info_field(info, b"Title"),
            author: self.info_field(info, b"Author"),
            subject: self.info_field(info, b"Subject"),
        }
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_blocks(&self, index: usize) -> Result<Vec<SourceBlock>, ExtractError> {
        self.interpret_page(index, true)
    }

    fn page_markdown(&self, index: usize) -> Result<String, ExtractError> {
        let blocks = self.interpret_page(index, false)?;
        Ok(blocks_to_plain_markdown(&blocks))
    }

    fn page_text(&self, index: usize) -> Result<String, ExtractError> {
        let (page_number, _) = self.page(index)?;
        self.document
            .extract_text(&[page_number])
            .map_err(|error| page_error(index, error.to_string()))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct FontStyle {
    bold: bool,
    italic: bool,
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// A line continues the open block when it starts at most this many font
/// sizes below the previous line.
const BLOCK_LEADING_FACTOR: f32 = 1.5;
/// Allowed horizontal drift between line starts of one block, in font sizes.
const BLOCK_INDENT_FACTOR: f32 = 3.0;

/// Device-space origin and size of a line's first glyph.
#[derive(Debug, Clone, Copy)]
struct LineAnchor {
    x: f32,
    y: f32,
    size: f32,
}

impl LineAnchor {
    fn same_baseline(&self, other: &LineAnchor) -> bool {
        (self.y - other.y).abs() <= SAME_LINE_TOLERANCE
    }

    fn continued_by(&self, next: &LineAnchor) -> bool {
        let size = self.size.max(next.size);
        let drop = self.y - next.y;
        drop >= -SAME_LINE_TOLERANCE
            && drop <= size * BLOCK_LEADING_FACTOR
            && (self.x - next.x).abs() <= size * BLOCK_INDENT_FACTOR
    }
}

/// Text state for one content stream. Lines are grouped into blocks by
/// position: a line joins the open block when it starts about one leading
/// below the previous line at a similar x, regardless of `BT`/`ET`
/// boundaries. Larger gaps and XObjects close the block. Vertical moves
/// start a new line; horizontal moves start a new span.
struct TextInterpreter {
    blocks: Vec<SourceBlock>,
    lines: Vec<SourceLine>,
    spans: Vec<PositionedSpan>,
    span_open: bool,
    line_anchor: Option<LineAnchor>,
    previous_line: Option<LineAnchor>,
    font: Vec<u8>,
    font_size: f32,
    style: FontStyle,
    leading: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
}

impl Default for TextInterpreter {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            lines: Vec::new(),
            spans: Vec::new(),
            span_open: false,
            line_anchor: None,
            previous_line: None,
            font: Vec::new(),
            font_size: DEFAULT_FONT_SIZE,
            style: FontStyle::default(),
            leading: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
        }
    }
}

impl TextInterpreter {
    fn save_state(&mut self) {
        self.ctm_stack.push(self.ctm);
    }

    fn restore_state(&mut self) {
        if let Some(saved) = self.ctm_stack.pop() {
            self.ctm = saved;
        }
    }

    fn concat_ctm(&mut self, matrix: [f32; 6]) {
        self.ctm = multiply(&matrix, &self.ctm);
    }

    fn begin_text(&mut self) {
        self.span_open = false;
        self.text_matrix = IDENTITY;
        self.line_matrix = IDENTITY;
    }

    fn end_text(&mut self) {
        self.span_open = false;
    }

    fn set_font(&mut self, font: Vec<u8>, size: f32, style: FontStyle) {
        self.font = font;
        self.font_size = size;
        self.style = style;
        self.span_open = false;
    }

    fn move_text(&mut self, tx: f32, ty: f32) {
        self.line_matrix[4] += tx * self.line_matrix[0] + ty * self.line_matrix[2];
        self.line_matrix[5] += tx * self.line_matrix[1] + ty * self.line_matrix[3];
        self.text_matrix = self.line_matrix;
        if ty.abs() > SAME_LINE_TOLERANCE {
            self.close_line();
        } else {
            self.span_open = false;
        }
    }

    fn set_matrix(&mut self, matrix: [f32; 6]) {
        let same_line = (matrix[5] - self.text_matrix[5]).abs() <= SAME_LINE_TOLERANCE;
        self.text_matrix = matrix;
        self.line_matrix = matrix;
        if same_line {
            self.span_open = false;
        } else {
            self.close_line();
        }
    }

    fn next_line(&mut self) {
        let leading = if self.leading.abs() > f32::EPSILON {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.move_text(0.0, -leading);
        self.close_line();
    }

    /// Text space to device space: the text matrix followed by the CTM.
    fn rendering_matrix(&self) -> [f32; 6] {
        multiply(&self.text_matrix, &self.ctm)
    }

    fn effective_size(&self, rendering: &[f32; 6]) -> f32 {
        let scale = (rendering[2].powi(2) + rendering[3].powi(2)).sqrt();
        if scale > f32::EPSILON {
            self.font_size * scale
        } else {
            self.font_size
        }
    }

    fn show(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        let rendering = self.rendering_matrix();
        let size = self.effective_size(&rendering);
        let anchor = LineAnchor {
            x: rendering[4],
            y: rendering[5],
            size,
        };

        if let Some(open) = self.line_anchor {
            if !open.same_baseline(&anchor) {
                self.close_line();
            }
        }

        if self.spans.is_empty() {
            self.start_line(anchor);
        } else if self.span_open {
            if let Some(span) = self.spans.last_mut() {
                span.text.push_str(text);
                return;
            }
        }

        self.spans.push(PositionedSpan {
            text: text.to_string(),
            font_size: size,
            is_bold: self.style.bold,
            is_italic: self.style.italic,
        });
        self.span_open = true;
    }

    fn start_line(&mut self, anchor: LineAnchor) {
        let continues = self
            .previous_line
            .is_some_and(|previous| previous.continued_by(&anchor));
        if !continues {
            self.close_block();
        }
        self.line_anchor = Some(anchor);
    }

    fn graphic(&mut self) {
        self.close_block();
        self.blocks.push(SourceBlock::image());
    }

    fn close_line(&mut self) {
        self.span_open = false;
        if self.spans.is_empty() {
            return;
        }
        self.previous_line = self.line_anchor.take();
        self.lines.push(SourceLine {
            spans: std::mem::take(&mut self.spans),
        });
    }

    fn close_block(&mut self) {
        self.close_line();
        self.previous_line = None;
        if self.lines.is_empty() {
            return;
        }
        self.blocks
            .push(SourceBlock::text(std::mem::take(&mut self.lines)));
    }

    fn finish(mut self) -> Vec<SourceBlock> {
        self.close_block();
        self.blocks
    }
}

/// `lhs × rhs` for PDF affine matrices in `[a b c d e f]` form.
fn multiply(lhs: &[f32; 6], rhs: &[f32; 6]) -> [f32; 6] {
    [
        lhs[0] * rhs[0] + lhs[1] * rhs[2],
        lhs[0] * rhs[1] + lhs[1] * rhs[3],
        lhs[2] * rhs[0] + lhs[3] * rhs[2],
        lhs[2] * rhs[1] + lhs[3] * rhs[3],
        lhs[4] * rhs[0] + lhs[5] * rhs[2] + rhs[4],
        lhs[4] * rhs[1] + lhs[5] * rhs[3] + rhs[5],
    ]
}

/// Lines of each block on their own row, blocks separated by a blank line.
pub fn blocks_to_plain_markdown(blocks: &[SourceBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| {
            let lines = block
                .lines
                .iter()
                .filter_map(|line| crate::models::Line::from_spans(&line.spans))
                .map(|line| line.text)
                .collect::<Vec<_>>();
            if lines.is_empty() {
                None
            } else {
                Some(lines.join("\n"))
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn page_error(index: usize, details: String) -> ExtractError {
    ExtractError::PageExtraction {
        page: index + 1,
        details,
    }
}

fn decode_with_font(
    document: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    font: &[u8],
    bytes: &[u8],
) -> String {
    fonts
        .get(font)
        .and_then(|dict| dict.get_font_encoding(document).ok())
        .and_then(|encoding| Document::decode_text(&encoding, bytes).ok())
        .unwrap_or_else(|| decode_bytes(bytes))
}

/// Text strings outside content streams: UTF-16BE with BOM, else
/// PDFDocEncoding (treated as Latin-1).
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&byte| byte as char).collect()
}

/// Glyph bytes without a usable font encoding.
fn decode_bytes(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return decode_pdf_string(bytes);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&byte| byte as char).collect(),
    }
}
