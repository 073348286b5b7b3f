use crate::{ContentBlock, ExtractError, PdfFile, StoreError};
use async_trait::async_trait;

/// Page-oriented document store that bibliography pages live in.
#[async_trait]
pub trait BlockStore {
    /// Appends blocks to the end of a page, preserving order.
    async fn append_blocks(&self, page_id: &str, blocks: &[ContentBlock])
        -> Result<(), StoreError>;

    async fn update_pdf_fields(
        &self,
        page_id: &str,
        file_id: &str,
        link: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn find_page_by_uid(
        &self,
        database_id: &str,
        uid: &str,
    ) -> Result<Option<String>, StoreError>;
}

/// Somewhere PDFs can be looked up by a filename fragment and downloaded.
#[async_trait]
pub trait PdfSource {
    async fn find_by_pattern(&self, pattern: &str) -> Result<Option<PdfFile>, ExtractError>;

    async fn fetch(&self, file: &PdfFile) -> Result<Vec<u8>, ExtractError>;
}
