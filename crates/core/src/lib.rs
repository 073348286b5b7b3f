pub mod blocks;
pub mod classifier;
pub mod content;
pub mod decoder;
pub mod document;
pub mod error;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod paragraph;
pub mod reconstruct;
pub mod search;
pub mod stores;
pub mod traits;

pub use blocks::{paragraph_blocks, split_long_text, to_blocks, ContentBlock, MAX_PARAGRAPH_CHARS};
pub use classifier::TextRoleClassifier;
pub use content::build_page_blocks;
pub use decoder::{DecodedPdf, LopdfDecoder, PdfDecoder};
pub use document::{summarize, DocumentReconstructor};
pub use error::{ExtractError, StoreError, SyncError};
pub use ingest::{
    discover_pdf_files, extract_file, extract_folder, extract_folder_best_effort, ScanReport,
    ScannedPdf, SkippedPdf,
};
pub use models::{
    Author, BlockKind, ClassifiedFragment, Entry, ExtractionOptions, ExtractionResult, Line,
    PdfFile, PdfMetadata, PositionedSpan, Role, SourceBlock, SourceLine, DEFAULT_PAGE_LIMIT,
};
pub use orchestrator::{AttachOutcome, FailedEntry, PdfSyncCoordinator, SyncReport, SyncTarget};
pub use paragraph::clean_paragraph;
pub use reconstruct::{PageReconstructor, ReconstructionState};
pub use search::{expected_pdf_name, find_pdf, normalize_title, search_patterns, LocalPdfLibrary};
pub use stores::{NotionStore, PropertyNames};
pub use traits::{BlockStore, PdfSource};
