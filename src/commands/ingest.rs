//! Directory ingestion
//!
//! Walks a directory for supported documents, extracts their text, chunks
//! and embeds it, and registers everything through the controller. The
//! content hash is blake3 over the source bytes, so re-ingesting an
//! unchanged file is a no-op.

use crate::chunk::split_text;
use crate::config::Config;
use crate::controller::DocumentController;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::models::NewDocument;
use crate::progress::file_progress;
use pulldown_cmark::{Event, Parser, TagEnd};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Outcome of a directory ingestion run
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct IngestStats {
    pub docs_ingested: usize,
    pub docs_skipped: usize,
    pub chunks_created: usize,
}

/// Ingest every supported file under `dir`
pub async fn cmd_ingest_dir(
    config: &Config,
    controller: &DocumentController,
    embedder: &dyn Embedder,
    dir: &Path,
    output_dir: &Path,
    tags: &[String],
) -> Result<IngestStats> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let files = collect_files(dir);
    info!("Found {} ingestable files under {}", files.len(), dir.display());

    let mut stats = IngestStats::default();
    let bar = file_progress(files.len() as u64);

    for path in files {
        bar.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        match ingest_file(config, controller, embedder, &path, output_dir, tags).await {
            Ok(Some(chunks)) => {
                stats.docs_ingested += 1;
                stats.chunks_created += chunks;
            }
            Ok(None) => stats.docs_skipped += 1,
            // Another ingester won the hash/title race; the row exists
            Err(Error::Conflict(detail)) => {
                debug!("Skipping {}: {}", path.display(), detail);
                stats.docs_skipped += 1;
            }
            Err(e) => {
                bar.finish_and_clear();
                return Err(e);
            }
        }
        bar.inc(1);
    }

    bar.finish_and_clear();
    Ok(stats)
}

/// Ingest one file; returns the number of chunks created, or None if the
/// file was already known.
async fn ingest_file(
    config: &Config,
    controller: &DocumentController,
    embedder: &dyn Embedder,
    path: &Path,
    output_dir: &Path,
    tags: &[String],
) -> Result<Option<usize>> {
    let bytes = std::fs::read(path)?;
    let doc_hash = blake3::hash(&bytes).to_hex().to_string();

    if controller.get_document_by_hash(&doc_hash).await?.is_some() {
        debug!("Skipping {}: hash already ingested", path.display());
        return Ok(None);
    }

    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| doc_hash.clone());

    if controller.get_document_by_title(&title).await?.is_some() {
        warn!(
            "Skipping {}: a different document already uses title '{}'",
            path.display(),
            title
        );
        return Ok(None);
    }

    let Some(text) = extract_text(path, &bytes)? else {
        debug!("Skipping {}: unsupported file type", path.display());
        return Ok(None);
    };

    // Derived artifacts live in a per-document directory
    let doc_output = output_dir.join(format!("{}_{}", title, Uuid::new_v4()));
    std::fs::create_dir_all(&doc_output)?;
    let markdown_path = doc_output.join(format!("{}.md", title));
    std::fs::write(&markdown_path, &text)?;

    let spans = split_text(&text, &config.chunk);
    let mut embeddings = Vec::with_capacity(spans.len());
    for batch in spans.chunks(config.embedding.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|s| s.text.clone()).collect();
        embeddings.extend(embedder.embed(texts).await?);
    }

    let mut new = NewDocument::new(
        Some(doc_hash),
        &title,
        &path.to_string_lossy(),
        &doc_output.to_string_lossy(),
    );
    new.markdown_path = Some(markdown_path.to_string_lossy().into_owned());
    new.tags = tags.to_vec();

    let doc = controller.create_document(new).await?;

    let chunk_count = spans.len();
    for (span, embedding) in spans.into_iter().zip(embeddings) {
        controller
            .create_chunk(doc.id, &span.text, Some(&embedding), None)
            .await?;
    }

    info!(
        "Ingested '{}' ({} chunks) from {}",
        title,
        chunk_count,
        path.display()
    );
    Ok(Some(chunk_count))
}

fn collect_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_supported(path))
        .collect()
}

fn is_supported(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some("md" | "markdown" | "txt") => true,
        #[cfg(feature = "pdf")]
        Some("pdf") => true,
        _ => false,
    }
}

/// Extract plain text from a supported file, or None if unsupported
fn extract_text(path: &Path, bytes: &[u8]) -> Result<Option<String>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("md" | "markdown") => {
            let content = String::from_utf8_lossy(bytes);
            Ok(Some(extract_markdown_text(&content)))
        }
        Some("txt") => Ok(Some(String::from_utf8_lossy(bytes).into_owned())),
        #[cfg(feature = "pdf")]
        Some("pdf") => {
            let text = pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| Error::Parse(format!("PDF extraction failed: {}", e)))?;
            Ok(Some(text))
        }
        _ => Ok(None),
    }
}

/// Flatten markdown to plain text, keeping paragraph structure
fn extract_markdown_text(content: &str) -> String {
    let mut text = String::new();

    for event in Parser::new(content) {
        match event {
            Event::Text(t) => text.push_str(&t),
            Event::Code(c) => text.push_str(&c),
            Event::SoftBreak => text.push(' '),
            Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock) => {
                text.push_str("\n\n");
            }
            _ => {}
        }
    }

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::testing::StubEmbedder;
    use tempfile::TempDir;

    async fn setup() -> (Config, DocumentController, TempDir) {
        let tmp = TempDir::new().unwrap();
        let controller = DocumentController::new(&tmp.path().join("ingest.db"))
            .await
            .unwrap();
        let mut config = Config::default();
        config.chunk.max_chars = 200;
        config.chunk.min_chars = 5;
        config.chunk.overlap_chars = 20;
        (config, controller, tmp)
    }

    #[test]
    fn test_extract_markdown_text_flattens_structure() {
        let markdown = "# Title\n\nFirst paragraph with `code`.\n\n- item one\n- item two\n";
        let text = extract_markdown_text(markdown);
        assert!(text.contains("Title"));
        assert!(text.contains("First paragraph with code."));
        assert!(text.contains("item one"));
        assert!(!text.contains('#'));
        assert!(!text.contains('-'));
    }

    #[test]
    fn test_is_supported_extensions() {
        assert!(is_supported(Path::new("notes.md")));
        assert!(is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("image.png")));
        assert!(!is_supported(Path::new("no_extension")));
    }

    #[tokio::test]
    async fn test_ingest_dir_registers_documents_and_chunks() {
        let (config, controller, tmp) = setup().await;
        let docs_dir = tmp.path().join("docs");
        std::fs::create_dir_all(&docs_dir).unwrap();
        std::fs::write(docs_dir.join("alpha.md"), "# Alpha\n\nSome alpha text here.").unwrap();
        std::fs::write(docs_dir.join("beta.txt"), "Plain beta text body.").unwrap();

        let embedder = StubEmbedder { dimension: 4 };
        let stats = cmd_ingest_dir(
            &config,
            &controller,
            &embedder,
            &docs_dir,
            &tmp.path().join("out"),
            &["imported".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(stats.docs_ingested, 2);
        assert_eq!(stats.docs_skipped, 0);
        assert!(stats.chunks_created >= 2);

        let alpha = controller
            .get_document_by_title("alpha")
            .await
            .unwrap()
            .unwrap();
        assert!(alpha.doc_hash.is_some());
        assert!(alpha.markdown_path.is_some());
        assert!(!alpha.is_uploaded);

        let chunks = controller.get_document_chunks(alpha.id).await.unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.has_embedding()));

        let tags = controller.get_document_tags(alpha.id).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "imported");
    }

    #[tokio::test]
    async fn test_reingest_skips_known_hashes() {
        let (config, controller, tmp) = setup().await;
        let docs_dir = tmp.path().join("docs");
        std::fs::create_dir_all(&docs_dir).unwrap();
        std::fs::write(docs_dir.join("alpha.md"), "Same content every run.").unwrap();

        let embedder = StubEmbedder { dimension: 4 };
        let out = tmp.path().join("out");

        let first = cmd_ingest_dir(&config, &controller, &embedder, &docs_dir, &out, &[])
            .await
            .unwrap();
        assert_eq!(first.docs_ingested, 1);

        let second = cmd_ingest_dir(&config, &controller, &embedder, &docs_dir, &out, &[])
            .await
            .unwrap();
        assert_eq!(second.docs_ingested, 0);
        assert_eq!(second.docs_skipped, 1);

        assert_eq!(controller.list_documents().await.unwrap().len(), 1);
    }
}
