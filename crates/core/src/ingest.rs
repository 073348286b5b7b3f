use crate::document::DocumentReconstructor;
use crate::{ExtractError, ExtractionResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn extract_file(
    path: &Path,
    reconstructor: &DocumentReconstructor,
) -> Result<ExtractionResult, ExtractError> {
    let bytes = fs::read(path)?;
    reconstructor.reconstruct_document(&bytes)
}

#[derive(Debug)]
pub struct ScannedPdf {
    pub path: PathBuf,
    pub result: ExtractionResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub documents: Vec<ScannedPdf>,
    pub skipped: Vec<SkippedPdf>,
}

pub fn extract_folder(
    folder: &Path,
    reconstructor: &DocumentReconstructor,
) -> Result<Vec<ScannedPdf>, ExtractError> {
    let report = extract_folder_best_effort(folder, reconstructor)?;
    Ok(report.documents)
}

/// Extracts every PDF under `folder`. Files that fail to read or decode are
/// listed in [`ScanReport::skipped`] and the scan carries on.
pub fn extract_folder_best_effort(
    folder: &Path,
    reconstructor: &DocumentReconstructor,
) -> Result<ScanReport, ExtractError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(ExtractError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    let mut report = ScanReport::default();

    for path in files {
        match extract_file(&path, reconstructor) {
            Ok(result) => report.documents.push(ScannedPdf { path, result }),
            Err(error) => {
                warn!(path = %path.display(), %error, "pdf skipped");
                report.skipped.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    info!(
        folder = %folder.display(),
        extracted = report.documents.len(),
        skipped = report.skipped.len(),
        "folder scan finished"
    );
    Ok(report)
}
