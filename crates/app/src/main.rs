use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use paperlink_core::stores::notion::NOTION_API_BASE;
use paperlink_core::{
    build_page_blocks, extract_file, extract_folder_best_effort, to_blocks, AttachOutcome,
    DocumentReconstructor, ExtractionOptions, ExtractionResult, LocalPdfLibrary, NotionStore,
    PdfSyncCoordinator, ScanReport, SyncTarget,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "paperlink", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Maximum number of pages extracted per PDF (default 10).
    #[arg(long, global = true, env = "PDF_MAX_PAGES")]
    page_limit: Option<String>,

    /// Emit `## Page N` markers (true/1/yes).
    #[arg(
        long,
        global = true,
        env = "PDF_INCLUDE_PAGE_NUMBERS",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    include_page_numbers: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract one PDF and print the result.
    Extract {
        /// PDF file to extract.
        file: PathBuf,
        /// Output shape.
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,
    },
    /// Extract every PDF under a folder, skipping the ones that fail.
    Scan {
        /// Folder searched recursively for PDFs.
        folder: PathBuf,
        /// Write `<name>.md` for each extracted PDF into this folder.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print one JSON line per document instead of plain text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Find the PDF for each bibliography entry and append its content to the entry's page.
    Attach {
        /// JSON array of entries; each may carry a `page_id`.
        entries: PathBuf,
        /// Folder holding the PDF library.
        #[arg(long)]
        library: PathBuf,
        /// Base URL the library is published under, used for embeds.
        #[arg(long)]
        link_base: Option<String>,
        /// Database used to resolve entries without a `page_id` by uid.
        #[arg(long)]
        database_id: Option<String>,
        /// Document store API token.
        #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
        notion_token: String,
        /// Document store API base URL.
        #[arg(long, default_value = NOTION_API_BASE)]
        notion_url: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Reconstructed markdown.
    Markdown,
    /// Content blocks in wire shape.
    Blocks,
    /// The full extraction result.
    Json,
    /// Page counts, metadata and the text summary.
    Summary,
}

#[derive(Serialize)]
struct ScanLine<'a> {
    path: String,
    title: &'a str,
    pages_extracted: usize,
    total_pages: usize,
    content_length: usize,
    checksum: &'a str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let options = ExtractionOptions::from_values(
        cli.page_limit.as_deref(),
        cli.include_page_numbers.as_deref(),
    );

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        page_limit = options.page_limit,
        include_page_numbers = options.include_page_numbers,
        "paperlink boot"
    );

    let reconstructor = DocumentReconstructor::with_lopdf(options)
        .context("failed to build the pdf reconstructor")?;

    match cli.command {
        Command::Extract { file, format } => {
            let result = extract_file(&file, &reconstructor)
                .with_context(|| format!("failed to extract {}", file.display()))?;
            print_extraction(&result, format)?;
        }
        Command::Scan {
            folder,
            output,
            json,
        } => {
            let report = scan_folder(&folder, &reconstructor)?;

            if let Some(output) = &output {
                tokio::fs::create_dir_all(output).await?;
            }

            for document in &report.documents {
                if json {
                    let line = ScanLine {
                        path: document.path.display().to_string(),
                        title: &document.result.metadata.title,
                        pages_extracted: document.result.pages_extracted,
                        total_pages: document.result.total_pages,
                        content_length: document.result.content_length,
                        checksum: &document.result.checksum,
                    };
                    println!("{}", serde_json::to_string(&line)?);
                } else {
                    println!(
                        "{} pages={}/{} chars={}",
                        document.path.display(),
                        document.result.pages_extracted,
                        document.result.total_pages,
                        document.result.content_length
                    );
                }

                if let Some(output) = &output {
                    let target = markdown_path(output, &document.path);
                    tokio::fs::write(&target, &document.result.markdown_content).await?;
                }
            }

            if !report.skipped.is_empty() {
                warn!(
                    "skipped_files={} for folder={}",
                    report.skipped.len(),
                    folder.display()
                );
                for skipped in &report.skipped {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                }
            }

            println!(
                "{} pdf(s) extracted, {} skipped at {}",
                report.documents.len(),
                report.skipped.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Attach {
            entries,
            library,
            link_base,
            database_id,
            notion_token,
            notion_url,
        } => {
            let raw = tokio::fs::read_to_string(&entries)
                .await
                .with_context(|| format!("failed to read {}", entries.display()))?;
            let targets: Vec<SyncTarget> = serde_json::from_str(&raw)
                .with_context(|| format!("invalid entries in {}", entries.display()))?;

            let mut source = LocalPdfLibrary::new(library);
            if let Some(link_base) = link_base {
                source = source.with_link_base(
                    link_base
                        .parse()
                        .with_context(|| format!("invalid link base {link_base}"))?,
                );
            }
            let store = NotionStore::with_endpoint(&notion_url, notion_token)
                .with_context(|| format!("invalid document store url {notion_url}"))?;

            let coordinator = PdfSyncCoordinator::new(store, source, reconstructor);
            info!(entries = targets.len(), "attaching pdf content");
            let report = coordinator
                .attach_all(&targets, database_id.as_deref())
                .await;

            for (uid, outcome) in &report.attached {
                if let AttachOutcome::Attached {
                    file,
                    blocks,
                    pages_extracted,
                    total_pages,
                } = outcome
                {
                    println!(
                        "attached uid={uid} file={} blocks={blocks} pages={pages_extracted}/{total_pages}",
                        file.name
                    );
                }
            }
            for (uid, outcome) in &report.missing {
                match outcome {
                    AttachOutcome::PageNotFound => println!("missing uid={uid} reason=no page"),
                    _ => println!("missing uid={uid} reason=no pdf"),
                }
            }
            for failed in &report.failed {
                println!("failed uid={} reason={}", failed.uid, failed.reason);
            }

            println!(
                "{} attached, {} without pdf or page, {} failed",
                report.attached.len(),
                report.missing.len(),
                report.failed.len()
            );
        }
    }

    Ok(())
}

fn scan_folder(folder: &Path, reconstructor: &DocumentReconstructor) -> anyhow::Result<ScanReport> {
    extract_folder_best_effort(folder, reconstructor)
        .with_context(|| format!("failed to scan {}", folder.display()))
}

fn print_extraction(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Markdown => println!("{}", result.markdown_content),
        OutputFormat::Blocks => {
            let blocks = to_blocks(&result.markdown_content);
            println!("{}", serde_json::to_string_pretty(&blocks)?);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Summary => {
            println!("pages: {}/{}", result.pages_extracted, result.total_pages);
            println!("size: {:.1} MB", result.size_mb());
            if !result.metadata.title.is_empty() {
                println!("title: {}", result.metadata.title);
            }
            if !result.metadata.author.is_empty() {
                println!("author: {}", result.metadata.author);
            }
            println!("blocks: {}", build_page_blocks(None, result).len());
            println!("checksum: {}", result.checksum);
            println!();
            println!("{}", result.text_summary);
        }
    }
    Ok(())
}

fn markdown_path(output: &Path, pdf: &Path) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    output.join(format!("{stem}.md"))
}
