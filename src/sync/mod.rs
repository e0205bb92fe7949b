//! Synchronization of local documents with the remote archive
//!
//! `push` drains the work queue (documents with `is_uploaded=0`), performs
//! one create-or-update remote call per document, and flips each
//! document's sync flags immediately on success. A crash mid-run
//! therefore leaves only the unfinished tail un-synced. Documents that
//! were pushed successfully and hold embedded chunks are then forwarded
//! to the vector index.
//!
//! Concurrent sync runs over the same documents are not safe; callers
//! must serialize them.

use crate::controller::DocumentController;
use crate::error::{Error, Result};
use crate::models::{Document, DocumentPayload, DocumentWithChunks};
use crate::remote::BackendClient;
use crate::vector::VectorIndex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// A per-document sync failure; the document's flags were left unchanged
#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub document_id: i64,
    pub doc_hash: Option<String>,
    pub error: String,
}

/// Outcome of one sync run
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: Vec<SyncFailure>,
    pub vectors_upserted: usize,
    pub vector_error: Option<String>,
}

impl SyncReport {
    /// Documents successfully created or updated on the remote
    pub fn pushed(&self) -> usize {
        self.created + self.updated
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.vector_error.is_none()
    }
}

/// Orchestrates local store, remote archive, and vector index
pub struct SyncService {
    controller: Arc<DocumentController>,
    remote: Arc<BackendClient>,
    vector: Option<Arc<VectorIndex>>,
    namespace: String,
}

impl SyncService {
    pub fn new(
        controller: Arc<DocumentController>,
        remote: Arc<BackendClient>,
        vector: Option<Arc<VectorIndex>>,
        namespace: &str,
    ) -> Self {
        Self {
            controller,
            remote,
            vector,
            namespace: namespace.to_string(),
        }
    }

    /// Push pending local documents to the remote archive.
    ///
    /// Documents flagged `local_update` are already on the remote: with
    /// `merge` they are pushed as updates, otherwise they are skipped.
    /// Everything else is created. Each success commits that document's
    /// flags before the next document is touched.
    pub async fn push(&self, merge: bool) -> Result<SyncReport> {
        let pending = self.controller.get_newest_documents().await?;
        let mut report = SyncReport::default();

        if pending.is_empty() {
            info!("No new documents to push");
            return Ok(report);
        }

        info!("Pushing {} pending documents (merge={})", pending.len(), merge);

        let mut synced: Vec<Document> = Vec::new();
        for doc in pending {
            let payload = DocumentPayload::from(&doc);

            if doc.local_update && doc.doc_hash.is_some() {
                if merge {
                    let hash = doc.doc_hash.as_deref().unwrap_or_default();
                    info!("Updating doc_hash='{}' on the remote archive", hash);
                    match self.remote.update_document_by_hash(hash, &payload).await {
                        Ok(_) => {
                            self.mark_uploaded(&doc).await?;
                            report.updated += 1;
                            synced.push(doc);
                        }
                        Err(e) => record_failure(&mut report, &doc, e),
                    }
                } else {
                    info!(
                        "Skipping doc_hash={:?}: merge=false and local_update=1",
                        doc.doc_hash
                    );
                    report.skipped += 1;
                }
            } else {
                info!("Creating doc_hash={:?} on the remote archive", doc.doc_hash);
                match self.remote.create_document(&payload).await {
                    Ok(_) => {
                        self.mark_uploaded(&doc).await?;
                        report.created += 1;
                        synced.push(doc);
                    }
                    Err(e) => record_failure(&mut report, &doc, e),
                }
            }
        }

        if let Some(vector) = &self.vector {
            let embedded = self.load_embedded(&synced).await?;
            if !embedded.is_empty() {
                match vector.upsert_documents(&embedded, &self.namespace).await {
                    Ok(count) => report.vectors_upserted = count,
                    Err(Error::VectorUpsert { committed, message }) => {
                        error!(
                            "Vector upsert aborted: {} ({} vectors committed before the failure)",
                            message, committed
                        );
                        report.vectors_upserted = committed;
                        report.vector_error = Some(message);
                    }
                    Err(e) => {
                        error!("Vector upsert failed: {}", e);
                        report.vector_error = Some(e.to_string());
                    }
                }
            }
        }

        info!(
            "Sync run complete: {} created, {} updated, {} skipped, {} failed",
            report.created,
            report.updated,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }

    /// Flip a document's flags; committed before the next document starts
    async fn mark_uploaded(&self, doc: &Document) -> Result<()> {
        self.controller.mark_uploaded(doc.id).await?;
        info!(
            "Document id={} (hash={:?}) marked as uploaded",
            doc.id, doc.doc_hash
        );
        Ok(())
    }

    /// Load chunks for the synced subset, keeping only documents that
    /// hold at least one embedded chunk
    async fn load_embedded(&self, synced: &[Document]) -> Result<Vec<DocumentWithChunks>> {
        let mut embedded = Vec::new();
        for doc in synced {
            let chunks = self.controller.get_document_chunks(doc.id).await?;
            let with_chunks = DocumentWithChunks {
                document: doc.clone(),
                chunks,
            };
            if with_chunks.has_embedded_chunks() {
                embedded.push(with_chunks);
            }
        }
        Ok(embedded)
    }
}

fn record_failure(report: &mut SyncReport, doc: &Document, err: Error) {
    error!(
        "Sync failed for document id={} (hash={:?}): {}",
        doc.id, doc.doc_hash, err
    );
    report.failed.push(SyncFailure {
        document_id: doc.id,
        doc_hash: doc.doc_hash.clone(),
        error: err.to_string(),
    });
}
