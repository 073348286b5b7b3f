use crate::decoder::{DecodedPdf, LopdfDecoder, PdfDecoder};
use crate::error::ExtractError;
use crate::models::{ExtractionOptions, ExtractionResult, PdfMetadata, SUMMARY_MAX_CHARS};
use crate::reconstruct::{fallback_page, PageReconstructor};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const EXTRACTION_METHOD: &str = "structured_text";

/// Turns PDF bytes into markdown plus a plain-text summary.
///
/// The decoder is an explicit capability: a reconstructor built without one
/// reports [`ExtractError::DecoderUnavailable`] for every document.
#[derive(Clone)]
pub struct DocumentReconstructor {
    decoder: Option<Arc<dyn PdfDecoder>>,
    pages: PageReconstructor,
    options: ExtractionOptions,
}

impl DocumentReconstructor {
    pub fn new(
        decoder: Option<Arc<dyn PdfDecoder>>,
        options: ExtractionOptions,
    ) -> Result<Self, ExtractError> {
        let pages = PageReconstructor::new(options.include_page_numbers)?;
        Ok(Self {
            decoder,
            pages,
            options,
        })
    }

    pub fn with_lopdf(options: ExtractionOptions) -> Result<Self, ExtractError> {
        Self::new(Some(Arc::new(LopdfDecoder)), options)
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    pub fn is_available(&self) -> bool {
        self.decoder.is_some()
    }

    pub fn reconstruct_document(&self, pdf_bytes: &[u8]) -> Result<ExtractionResult, ExtractError> {
        let decoder = self
            .decoder
            .as_ref()
            .ok_or(ExtractError::DecoderUnavailable)?;
        let pdf = decoder.open(pdf_bytes)?;

        let metadata = pdf.metadata();
        let total_pages = pdf.page_count();
        let pages_extracted = self.options.page_limit.min(total_pages);
        info!(
            total_pages,
            pages_extracted,
            page_limit = self.options.page_limit,
            "extracting pdf content"
        );

        let mut markdown = String::new();
        let mut plain_text = String::new();

        for index in 0..pages_extracted {
            markdown.push_str(&self.render_page(pdf.as_ref(), index));

            match pdf.page_text(index) {
                Ok(text) if !text.trim().is_empty() => {
                    plain_text.push_str(&text);
                    plain_text.push('\n');
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(page = index + 1, %error, "plain text unavailable for summary")
                }
            }
        }

        let markdown_content = markdown.trim().to_string();
        let content_length = markdown_content.chars().count();
        debug!(content_length, "pdf content extracted");

        Ok(ExtractionResult {
            metadata: PdfMetadata {
                page_count: total_pages,
                ..metadata
            },
            markdown_content,
            text_summary: summarize(&plain_text),
            pages_extracted,
            total_pages,
            size_bytes: pdf_bytes.len(),
            content_length,
            extraction_method: EXTRACTION_METHOD.to_string(),
            checksum: digest_bytes(pdf_bytes),
            extracted_at: Utc::now(),
        })
    }

    /// Structured rendering, degrading to markdown text mode and then plain
    /// text when a page cannot be interpreted.
    fn render_page(&self, pdf: &dyn DecodedPdf, index: usize) -> String {
        let page_number = index + 1;
        let include_page_numbers = self.options.include_page_numbers;

        let structured_error = match pdf.page_blocks(index) {
            Ok(blocks) => {
                let page = self.pages.reconstruct_page(&blocks, page_number);
                return if page.trim().is_empty() {
                    String::new()
                } else {
                    page
                };
            }
            Err(error) => error,
        };
        warn!(
            page = page_number,
            error = %structured_error,
            mode = "markdown",
            "structured extraction failed, retrying in markdown mode"
        );

        let markdown_error = match pdf.page_markdown(index) {
            Ok(text) => return fallback_page(&text, page_number, include_page_numbers),
            Err(error) => error,
        };
        warn!(
            page = page_number,
            error = %markdown_error,
            mode = "text",
            "markdown extraction failed, retrying in text mode"
        );

        match pdf.page_text(index) {
            Ok(text) => fallback_page(&text, page_number, include_page_numbers),
            Err(error) => {
                warn!(page = page_number, %error, "page skipped");
                String::new()
            }
        }
    }
}

/// Whitespace-collapsed prefix of the document text, ellipsized past
/// [`SUMMARY_MAX_CHARS`].
pub fn summarize(text: &str) -> String {
    let collapsed = normalize_whitespace(text);
    if collapsed.chars().count() > SUMMARY_MAX_CHARS {
        let prefix: String = collapsed.chars().take(SUMMARY_MAX_CHARS).collect();
        format!("{prefix}...")
    } else {
        collapsed
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
