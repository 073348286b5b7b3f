use crate::content::build_page_blocks;
use crate::document::DocumentReconstructor;
use crate::search::find_pdf;
use crate::traits::{BlockStore, PdfSource};
use crate::{Entry, PdfFile, SyncError};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached {
        file: PdfFile,
        blocks: usize,
        pages_extracted: usize,
        total_pages: usize,
    },
    NoPdfFound,
    PageNotFound,
}

/// An entry together with the store page it belongs to, when already known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SyncTarget {
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(flatten)]
    pub entry: Entry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub uid: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub attached: Vec<(String, AttachOutcome)>,
    pub missing: Vec<(String, AttachOutcome)>,
    pub failed: Vec<FailedEntry>,
}

pub struct PdfSyncCoordinator<S, P>
where
    S: BlockStore,
    P: PdfSource,
{
    store: S,
    source: P,
    reconstructor: DocumentReconstructor,
}

impl<S, P> PdfSyncCoordinator<S, P>
where
    S: BlockStore + Send + Sync,
    P: PdfSource + Send + Sync,
{
    pub fn new(store: S, source: P, reconstructor: DocumentReconstructor) -> Self {
        Self {
            store,
            source,
            reconstructor,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Finds the entry's PDF, extracts it and appends the content to `page_id`.
    ///
    /// A PDF that fails to decode is reported as an error and nothing is
    /// written to the page.
    pub async fn attach(&self, page_id: &str, entry: &Entry) -> Result<AttachOutcome, SyncError> {
        let Some(found) = find_pdf(&self.source, entry).await? else {
            return Ok(AttachOutcome::NoPdfFound);
        };

        let bytes = self.source.fetch(&found.file).await?;
        let reconstructor = self.reconstructor.clone();
        let result =
            tokio::task::spawn_blocking(move || reconstructor.reconstruct_document(&bytes))
                .await??;

        let link = found.file.link.as_deref();
        self.store
            .update_pdf_fields(page_id, &found.file.id, link)
            .await?;

        let blocks = build_page_blocks(link, &result);
        if !blocks.is_empty() {
            self.store.append_blocks(page_id, &blocks).await?;
        }

        info!(
            uid = %entry.uid,
            page_id,
            blocks = blocks.len(),
            pages_extracted = result.pages_extracted,
            total_pages = result.total_pages,
            "pdf content attached"
        );

        Ok(AttachOutcome::Attached {
            file: found.file,
            blocks: blocks.len(),
            pages_extracted: result.pages_extracted,
            total_pages: result.total_pages,
        })
    }

    /// Like [`Self::attach`], resolving the page through the database's uid column.
    pub async fn attach_by_uid(
        &self,
        database_id: &str,
        entry: &Entry,
    ) -> Result<AttachOutcome, SyncError> {
        match self.store.find_page_by_uid(database_id, &entry.uid).await? {
            Some(page_id) => self.attach(&page_id, entry).await,
            None => {
                warn!(uid = %entry.uid, "no page found for entry");
                Ok(AttachOutcome::PageNotFound)
            }
        }
    }

    /// Processes every target in order. Failures are collected per entry and
    /// never stop the run.
    pub async fn attach_all(
        &self,
        targets: &[SyncTarget],
        database_id: Option<&str>,
    ) -> SyncReport {
        let mut report = SyncReport::default();

        for target in targets {
            let uid = target.entry.uid.clone();
            let outcome = match (target.page_id.as_deref(), database_id) {
                (Some(page_id), _) => self.attach(page_id, &target.entry).await,
                (None, Some(database_id)) => self.attach_by_uid(database_id, &target.entry).await,
                (None, None) => Ok(AttachOutcome::PageNotFound),
            };

            match outcome {
                Ok(outcome @ AttachOutcome::Attached { .. }) => {
                    report.attached.push((uid, outcome))
                }
                Ok(outcome) => report.missing.push((uid, outcome)),
                Err(error) => {
                    warn!(%uid, %error, "entry skipped");
                    report.failed.push(FailedEntry {
                        uid,
                        reason: error.to_string(),
                    });
                }
            }
        }

        report
    }
}
