//! Filename heuristics for locating the PDF of a bibliography entry.
//!
//! Libraries name files `"<Last>[ et al.] <year> - <title>.pdf"` with varying
//! fidelity, so lookups walk from the most specific fragment down to bare
//! author/year and title prefixes. The first query that matches wins.

use crate::ingest::discover_pdf_files;
use crate::models::{Entry, PdfFile};
use crate::traits::PdfSource;
use crate::ExtractError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

pub const UNKNOWN_PDF_NAME: &str = "Unknown.pdf";
const EXPECTED_TITLE_CHARS: usize = 50;
const PATTERN_TITLE_WORDS: usize = 6;
const FALLBACK_TITLE_WORDS: usize = 4;
const MIN_PATTERN_TITLE_CHARS: usize = 10;
const MIN_TITLE_ONLY_CHARS: usize = 15;
const MIN_COMPONENT_NAME_CHARS: usize = 2;

/// Replaces punctuation other than `-` with spaces and collapses whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn expected_pdf_name(entry: &Entry) -> String {
    let title = normalize_title(&entry.title);
    let (Some(first), Some(year)) = (entry.authors.first(), entry.year) else {
        return UNKNOWN_PDF_NAME.to_string();
    };
    if title.is_empty() {
        return UNKNOWN_PDF_NAME.to_string();
    }

    let author = if entry.authors.len() > 1 {
        format!("{} et al.", first.last)
    } else {
        first.last.clone()
    };

    let title = if title.chars().count() > EXPECTED_TITLE_CHARS {
        let prefix: String = title.chars().take(EXPECTED_TITLE_CHARS).collect();
        format!("{prefix}...")
    } else {
        title
    };

    format!("{author} {year} - {title}.pdf")
}

/// Candidate filename fragments, most specific first. Empty without authors.
pub fn search_patterns(entry: &Entry) -> Vec<String> {
    let Some(first) = entry.authors.first() else {
        return Vec::new();
    };
    let last = first.last.as_str();
    let year = entry.year.map(|year| year.to_string()).unwrap_or_default();
    let title = normalize_title(&entry.title);
    let title_chars = title.chars().count();

    let mut patterns = Vec::new();

    if title_chars > MIN_PATTERN_TITLE_CHARS {
        let words = leading_words(&title, PATTERN_TITLE_WORDS);
        patterns.push(join_parts(&[last, &year, &words]));
    }
    if !title.is_empty() {
        patterns.push(join_parts(&[last, &year, "-", &title]));
    }
    patterns.push(join_parts(&[last, &year]));
    if entry.authors.len() > 1 {
        patterns.push(join_parts(&[last, "et al", &year]));
        patterns.push(join_parts(&[last, "et al.", &year]));
    }
    if title_chars > MIN_TITLE_ONLY_CHARS {
        patterns.push(title);
    }

    patterns
}

/// Every query tried for an entry: the filename patterns, then the
/// author/year components, then the first words of the title.
pub fn search_queries(entry: &Entry) -> Vec<String> {
    let mut queries = search_patterns(entry);

    let mut components = Vec::new();
    if let Some(first) = entry.authors.first() {
        if first.last.chars().count() > MIN_COMPONENT_NAME_CHARS {
            components.push(first.last.clone());
        }
    }
    if let Some(year) = entry.year {
        components.push(year.to_string());
    }
    if !components.is_empty() {
        queries.push(components.join(" "));
    }

    let title = normalize_title(&entry.title);
    if title.chars().count() > MIN_PATTERN_TITLE_CHARS {
        queries.push(leading_words(&title, FALLBACK_TITLE_WORDS));
    }

    let mut seen = std::collections::HashSet::new();
    queries.retain(|query| !query.is_empty() && seen.insert(query.clone()));
    queries
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfMatch {
    pub file: PdfFile,
    pub query: String,
}

pub async fn find_pdf<P>(source: &P, entry: &Entry) -> Result<Option<PdfMatch>, ExtractError>
where
    P: PdfSource + Sync + ?Sized,
{
    debug!(uid = %entry.uid, expected = %expected_pdf_name(entry), "searching for pdf");

    for query in search_queries(entry) {
        if let Some(file) = source.find_by_pattern(&query).await? {
            info!(uid = %entry.uid, file = %file.name, %query, "pdf found");
            return Ok(Some(PdfMatch { file, query }));
        }
    }

    info!(uid = %entry.uid, "no matching pdf found");
    Ok(None)
}

fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn leading_words(text: &str, count: usize) -> String {
    text.split_whitespace()
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}

/// PDFs stored under a local folder, matched by file name.
#[derive(Debug, Clone)]
pub struct LocalPdfLibrary {
    root: PathBuf,
    link_base: Option<Url>,
}

impl LocalPdfLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            link_base: None,
        }
    }

    /// Publishes matched files under `base`, keyed by their path relative to
    /// the library root.
    pub fn with_link_base(mut self, base: Url) -> Self {
        self.link_base = Some(base);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> Result<Vec<PdfFile>, ExtractError> {
        discover_pdf_files(&self.root)
            .into_iter()
            .map(|path| self.describe(path))
            .collect()
    }

    fn describe(&self, path: PathBuf) -> Result<PdfFile, ExtractError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ExtractError::MissingFileName(path.display().to_string()))?
            .to_string();
        let size_bytes = std::fs::metadata(&path)?.len();
        let relative = path
            .strip_prefix(&self.root)
            .unwrap_or(&path)
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let link = self
            .link_base
            .as_ref()
            .and_then(|base| base.join(&relative).ok())
            .map(String::from);

        Ok(PdfFile {
            id: relative,
            name,
            path,
            size_bytes,
            link,
        })
    }
}

#[async_trait]
impl PdfSource for LocalPdfLibrary {
    async fn find_by_pattern(&self, pattern: &str) -> Result<Option<PdfFile>, ExtractError> {
        let needle = pattern.to_lowercase();
        if needle.trim().is_empty() {
            return Ok(None);
        }

        let hit = discover_pdf_files(&self.root).into_iter().find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        });

        hit.map(|path| self.describe(path)).transpose()
    }

    async fn fetch(&self, file: &PdfFile) -> Result<Vec<u8>, ExtractError> {
        match tokio::fs::read(&file.path).await {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(ExtractError::NotFound(file.id.clone()))
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Author;
    use std::fs;
    use tempfile::tempdir;

    fn author(last: &str) -> Author {
        Author {
            first: "Ada".to_string(),
            last: last.to_string(),
            full: format!("Ada {last}"),
        }
    }

    fn entry(authors: &[&str], year: Option<i32>, title: &str) -> Entry {
        Entry {
            uid: "uid-1".to_string(),
            title: title.to_string(),
            authors: authors.iter().map(|last| author(last)).collect(),
            year,
            ..Entry::default()
        }
    }

    #[test]
    fn titles_are_normalized() {
        assert_eq!(
            normalize_title("  Taste: a neuro-symbolic   (re)view! "),
            "Taste a neuro-symbolic re view"
        );
        assert_eq!(normalize_title(""), "");
    }

    #[test]
    fn expected_name_follows_library_convention() {
        let single = entry(&["Obrist"], Some(2014), "Temporal, affective taste");
        assert_eq!(
            expected_pdf_name(&single),
            "Obrist 2014 - Temporal affective taste.pdf"
        );

        let long_title = "a".repeat(60);
        let many = entry(&["Obrist", "Ranasinghe"], Some(2014), &long_title);
        assert_eq!(
            expected_pdf_name(&many),
            format!("Obrist et al. 2014 - {}....pdf", "a".repeat(50))
        );

        assert_eq!(expected_pdf_name(&entry(&[], Some(2014), "t")), UNKNOWN_PDF_NAME);
        assert_eq!(expected_pdf_name(&entry(&["X"], None, "t")), UNKNOWN_PDF_NAME);
        assert_eq!(expected_pdf_name(&entry(&["X"], Some(1), "?!")), UNKNOWN_PDF_NAME);
    }

    #[test]
    fn patterns_run_from_specific_to_broad() {
        let entry = entry(
            &["Obrist", "Ranasinghe"],
            Some(2014),
            "Temporal, affective, and embodied characteristics of taste experiences",
        );

        assert_eq!(
            search_patterns(&entry),
            vec![
                "Obrist 2014 Temporal affective and embodied characteristics of",
                "Obrist 2014 - Temporal affective and embodied characteristics of taste experiences",
                "Obrist 2014",
                "Obrist et al 2014",
                "Obrist et al. 2014",
                "Temporal affective and embodied characteristics of taste experiences",
            ]
        );
    }

    #[test]
    fn short_titles_skip_title_patterns() {
        let entry = entry(&["Vi"], Some(2020), "Taste");
        assert_eq!(search_patterns(&entry), vec!["Vi 2020 - Taste", "Vi 2020"]);
        assert_eq!(search_queries(&entry), vec!["Vi 2020 - Taste", "Vi 2020", "2020"]);
    }

    #[test]
    fn no_authors_means_no_patterns() {
        let entry = entry(&[], Some(2020), "A sufficiently long title here");
        assert!(search_patterns(&entry).is_empty());
        assert_eq!(
            search_queries(&entry),
            vec!["2020", "A sufficiently long title"]
        );
    }

    #[tokio::test]
    async fn local_library_matches_case_insensitively() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("2014");
        fs::create_dir(&nested)?;
        fs::write(nested.join("Obrist et al. 2014 - Temporal.PDF"), b"%PDF-1.4")?;
        fs::write(dir.path().join("notes.txt"), b"obrist 2014")?;

        let library = LocalPdfLibrary::new(dir.path())
            .with_link_base(Url::parse("https://files.example.org/papers/")?);

        let file = library
            .find_by_pattern("obrist ET AL. 2014")
            .await?
            .ok_or("expected a match")?;
        assert_eq!(file.name, "Obrist et al. 2014 - Temporal.PDF");
        assert_eq!(file.id, "2014/Obrist et al. 2014 - Temporal.PDF");
        assert_eq!(file.size_bytes, 8);
        assert_eq!(
            file.link.as_deref(),
            Some("https://files.example.org/papers/2014/Obrist%20et%20al.%202014%20-%20Temporal.PDF")
        );
        assert_eq!(library.fetch(&file).await?, b"%PDF-1.4");

        assert!(library.find_by_pattern("Ranasinghe").await?.is_none());
        assert!(library.find_by_pattern("  ").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn later_strategies_are_tried_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("Temporal affective and embodied.pdf"), b"x")?;
        let library = LocalPdfLibrary::new(dir.path());

        let paper = entry(
            &["Obrist"],
            Some(2014),
            "Temporal affective and embodied characteristics",
        );
        let found = find_pdf(&library, &paper).await?.ok_or("expected a match")?;
        assert_eq!(found.query, "Temporal affective and embodied");
        assert_eq!(found.file.link, None);

        let missing = entry(&["Nobody"], Some(1999), "Nothing");
        assert!(find_pdf(&library, &missing).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn fetching_a_removed_file_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("Obrist 2014.pdf"), b"%PDF-1.4")?;
        let library = LocalPdfLibrary::new(dir.path());

        let file = library
            .find_by_pattern("obrist 2014")
            .await?
            .ok_or("expected a match")?;
        fs::remove_file(&file.path)?;

        let error = library.fetch(&file).await.expect_err("file was removed");
        assert!(matches!(error, ExtractError::NotFound(id) if id == "Obrist 2014.pdf"));
        Ok(())
    }
}
