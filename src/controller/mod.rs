//! Local document store and its mutation/query boundary
//!
//! All reads and writes against the SQLite store go through
//! [`DocumentController`]. Every mutating call is a complete unit of work:
//! it either commits on success or leaves prior committed state untouched.
//! No transaction ever spans a network round trip; the pre-insert remote
//! check runs before the insert transaction opens.

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{Event, Observer};
use crate::models::{
    encode_embedding, Chunk, Document, DocumentWithChunks, NewDocument, Tag,
};
use crate::validate::PreInsertCheck;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Controller over the local document store
pub struct DocumentController {
    pool: SqlitePool,
    precheck: Option<PreInsertCheck>,
    observers: Vec<Arc<dyn Observer>>,
}

impl DocumentController {
    /// Connect to the store using config paths
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Open (and auto-initialize) the store at a database path
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            precheck: None,
            observers: Vec::new(),
        })
    }

    /// Enable the pre-insert remote existence check
    pub fn with_precheck(mut self, precheck: PreInsertCheck) -> Self {
        self.precheck = Some(precheck);
        self
    }

    /// Register an observer for notification events
    pub fn add_observer(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    fn notify(&self, event: &Event) {
        for observer in &self.observers {
            observer.notify(event);
        }
    }

    // ===== Document Operations =====

    /// Create a document with its tags and raw chunk texts.
    ///
    /// If the pre-insert check is enabled and the document carries a hash,
    /// the remote is consulted first so the very first commit already
    /// reflects whether this is an update of a known document.
    pub async fn create_document(&self, new: NewDocument) -> Result<Document> {
        let mut local_update = false;
        if let (Some(precheck), Some(hash)) = (&self.precheck, &new.doc_hash) {
            local_update = precheck.classify(hash).await;
            if local_update {
                self.notify(&Event::DocumentKnownRemote {
                    title: new.title.clone(),
                    doc_hash: hash.clone(),
                });
            }
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO documents (doc_hash, title, doc_path, output_dir, markdown_path, images_path, page_count, is_uploaded, local_update)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&new.doc_hash)
        .bind(&new.title)
        .bind(&new.doc_path)
        .bind(&new.output_dir)
        .bind(&new.markdown_path)
        .bind(&new.images_path)
        .bind(new.page_count)
        .bind(local_update)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_conflict(e, &new.title))?;

        let document_id = result.last_insert_rowid();

        for tag_name in &new.tags {
            let tag_id = get_or_create_tag_tx(&mut tx, tag_name).await?;
            sqlx::query(
                "INSERT INTO document_tags (document_id, tag_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
            )
            .bind(document_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        }

        for text in &new.chunks {
            sqlx::query("INSERT INTO chunks (document_id, text) VALUES (?, ?)")
                .bind(document_id)
                .bind(text)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!("Created document id={} title='{}'", document_id, new.title);

        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(doc)
    }

    /// Create a chunk for an existing document
    pub async fn create_chunk(
        &self,
        document_id: i64,
        text: &str,
        embedding: Option<&[f32]>,
        page_number: Option<i64>,
    ) -> Result<Chunk> {
        let raw = embedding.map(encode_embedding);

        let result = sqlx::query(
            "INSERT INTO chunks (document_id, text, embedding, page_number) VALUES (?, ?, ?, ?)",
        )
        .bind(document_id)
        .bind(text)
        .bind(&raw)
        .bind(page_number)
        .execute(&self.pool)
        .await?;

        let chunk = sqlx::query_as::<_, Chunk>("SELECT * FROM chunks WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(chunk)
    }

    /// Get document by primary key
    pub async fn get_document_by_id(&self, id: i64) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    /// Get document by content hash
    pub async fn get_document_by_hash(&self, doc_hash: &str) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE doc_hash = ?")
            .bind(doc_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    /// Get document by unique title
    pub async fn get_document_by_title(&self, title: &str) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE title = ?")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    /// List all documents
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let docs = sqlx::query_as::<_, Document>("SELECT * FROM documents ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(docs)
    }

    /// The synchronization work queue: documents with is_uploaded=0
    pub async fn get_newest_documents(&self) -> Result<Vec<Document>> {
        let docs =
            sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE is_uploaded = 0 ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(docs)
    }

    /// Get the chunks of a document, in insertion order
    pub async fn get_document_chunks(&self, document_id: i64) -> Result<Vec<Chunk>> {
        let chunks =
            sqlx::query_as::<_, Chunk>("SELECT * FROM chunks WHERE document_id = ? ORDER BY id")
                .bind(document_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(chunks)
    }

    /// Get a document together with its chunks
    pub async fn get_document_with_chunks(&self, document_id: i64) -> Result<Option<DocumentWithChunks>> {
        let Some(document) = self.get_document_by_id(document_id).await? else {
            return Ok(None);
        };
        let chunks = self.get_document_chunks(document_id).await?;
        Ok(Some(DocumentWithChunks { document, chunks }))
    }

    // ===== Tag Operations =====

    /// Get a tag by name, or create it if absent.
    ///
    /// Safe under concurrent callers targeting the same name: the insert
    /// defers to the unique constraint, and the follow-up lookup observes
    /// whichever row won.
    pub async fn get_or_create_tag(&self, name: &str) -> Result<Tag> {
        sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;

        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(tag)
    }

    /// List all tags
    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    /// Get the tags attached to a document
    pub async fn get_document_tags(&self, document_id: i64) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name FROM tags t
            JOIN document_tags dt ON dt.tag_id = t.id
            WHERE dt.document_id = ?
            ORDER BY t.name
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    /// Attach a tag to a document; no-op if already attached
    pub async fn add_tag_to_document(&self, document: &Document, tag_name: &str) -> Result<()> {
        let tag = self.get_or_create_tag(tag_name).await?;
        sqlx::query(
            "INSERT INTO document_tags (document_id, tag_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(document.id)
        .bind(tag.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Attach a tag to the document with the given hash.
    ///
    /// Unlike plain lookups, an unknown hash here is a caller error and
    /// fails loudly.
    pub async fn add_tag_to_document_by_hash(&self, doc_hash: &str, tag_name: &str) -> Result<Document> {
        let document = self
            .get_document_by_hash(doc_hash)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(doc_hash.to_string()))?;
        self.add_tag_to_document(&document, tag_name).await?;
        Ok(document)
    }

    // ===== Sync-flag transitions =====

    /// Mark a document as synchronized with the remote
    pub async fn mark_uploaded(&self, document_id: i64) -> Result<()> {
        sqlx::query("UPDATE documents SET is_uploaded = 1, local_update = 0 WHERE id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reset both sync flags on every document, forcing a full re-sync.
    ///
    /// Emits a notification per document touched. Returns the number of
    /// documents reset.
    pub async fn mark_all_documents_not_uploaded(&self) -> Result<usize> {
        let docs = self.list_documents().await?;

        sqlx::query("UPDATE documents SET is_uploaded = 0, local_update = 0")
            .execute(&self.pool)
            .await?;

        for doc in &docs {
            self.notify(&Event::UploadFlagsReset {
                id: doc.id,
                title: doc.title.clone(),
            });
        }

        info!("Reset upload flags on {} documents", docs.len());
        Ok(docs.len())
    }

    /// Delete all documents; cascades to chunks and tag links.
    ///
    /// Tags are independent reference data and survive.
    pub async fn delete_all_documents(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM document_tags").execute(&mut *tx).await?;
        let result = sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;

        tx.commit().await?;

        info!("Deleted {} documents", result.rows_affected());
        Ok(result.rows_affected())
    }

    // ===== Statistics =====

    /// Global store counts
    pub async fn get_stats(&self) -> Result<StoreStats> {
        let document_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let pending_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE is_uploaded = 0")
                .fetch_one(&self.pool)
                .await?;
        let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let embedded_chunk_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL AND length(embedding) > 0",
        )
        .fetch_one(&self.pool)
        .await?;
        let tag_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            document_count: document_count as usize,
            pending_count: pending_count as usize,
            chunk_count: chunk_count as usize,
            embedded_chunk_count: embedded_chunk_count as usize,
            tag_count: tag_count as usize,
        })
    }
}

/// Get-or-create a tag inside an open transaction
async fn get_or_create_tag_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    name: &str,
) -> Result<i64> {
    sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(&mut **tx)
        .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;
    Ok(id)
}

/// Map unique-constraint violations to the conflict taxonomy
fn map_conflict(err: sqlx::Error, detail: &str) -> Error {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return Error::Conflict(format!("document '{}' already exists", detail));
        }
    }
    Error::Database(err)
}

/// Global store counts
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoreStats {
    pub document_count: usize,
    pub pending_count: usize,
    pub chunk_count: usize,
    pub embedded_chunk_count: usize,
    pub tag_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use std::sync::Mutex;
    use tempfile::TempDir;

    async fn setup_test_db() -> (DocumentController, TempDir) {
        let tmp = TempDir::new().unwrap();
        let controller = DocumentController::new(&tmp.path().join("test.db"))
            .await
            .unwrap();
        (controller, tmp)
    }

    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl Observer for RecordingObserver {
        fn notify(&self, event: &Event) {
            self.events.lock().unwrap().push(event.to_string());
        }
    }

    #[tokio::test]
    async fn test_create_document_with_tags_and_chunks() {
        let (controller, _tmp) = setup_test_db().await;

        let mut new = NewDocument::new(Some("h1".to_string()), "Doc1", "/in/doc1.pdf", "/out/doc1");
        new.markdown_path = Some("/out/doc1/doc1.md".to_string());
        new.page_count = Some(3);
        new.tags = vec!["history".to_string(), "science".to_string()];
        new.chunks = vec!["first span".to_string(), "second span".to_string()];

        let doc = controller.create_document(new).await.unwrap();
        assert_eq!(doc.doc_hash.as_deref(), Some("h1"));
        assert!(!doc.is_uploaded);
        assert!(!doc.local_update);

        let chunks = controller.get_document_chunks(doc.id).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| !c.has_embedding()));

        let tags = controller.get_document_tags(doc.id).await.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["history", "science"]);
    }

    #[tokio::test]
    async fn test_duplicate_title_is_conflict() {
        let (controller, _tmp) = setup_test_db().await;

        let new = NewDocument::new(Some("h1".to_string()), "Doc1", "/in/a.pdf", "/out/a");
        controller.create_document(new).await.unwrap();

        let dup = NewDocument::new(Some("h2".to_string()), "Doc1", "/in/b.pdf", "/out/b");
        let err = controller.create_document(dup).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Failed insert left nothing behind
        assert_eq!(controller.list_documents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_hash_is_conflict() {
        let (controller, _tmp) = setup_test_db().await;

        controller
            .create_document(NewDocument::new(Some("h1".to_string()), "Doc1", "/a", "/oa"))
            .await
            .unwrap();
        let err = controller
            .create_document(NewDocument::new(Some("h1".to_string()), "Doc2", "/b", "/ob"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_get_or_create_tag_reuses_row() {
        let (controller, _tmp) = setup_test_db().await;

        let first = controller.get_or_create_tag("rust").await.unwrap();
        let second = controller.get_or_create_tag("rust").await.unwrap();
        assert_eq!(first.id, second.id);

        let tags = controller.list_tags().await.unwrap();
        assert_eq!(tags.len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_tag_concurrent_callers() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("race.db");
        let a = DocumentController::new(&db_path).await.unwrap();
        let b = DocumentController::new(&db_path).await.unwrap();

        let (ra, rb) = tokio::join!(a.get_or_create_tag("shared"), b.get_or_create_tag("shared"));
        let (ta, tb) = (ra.unwrap(), rb.unwrap());
        assert_eq!(ta.id, tb.id);

        let tags = a.list_tags().await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "shared");
    }

    #[tokio::test]
    async fn test_add_tag_is_idempotent() {
        let (controller, _tmp) = setup_test_db().await;

        let doc = controller
            .create_document(NewDocument::new(Some("h1".to_string()), "Doc1", "/a", "/oa"))
            .await
            .unwrap();

        controller.add_tag_to_document(&doc, "dup").await.unwrap();
        controller.add_tag_to_document(&doc, "dup").await.unwrap();

        let tags = controller.get_document_tags(doc.id).await.unwrap();
        assert_eq!(tags.len(), 1);
    }

    #[tokio::test]
    async fn test_add_tag_by_hash_unknown_hash_fails() {
        let (controller, _tmp) = setup_test_db().await;

        let err = controller
            .add_tag_to_document_by_hash("missing", "any")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn test_work_queue_and_mark_uploaded() {
        let (controller, _tmp) = setup_test_db().await;

        let d1 = controller
            .create_document(NewDocument::new(Some("h1".to_string()), "Doc1", "/a", "/oa"))
            .await
            .unwrap();
        let d2 = controller
            .create_document(NewDocument::new(Some("h2".to_string()), "Doc2", "/b", "/ob"))
            .await
            .unwrap();

        let pending = controller.get_newest_documents().await.unwrap();
        assert_eq!(pending.len(), 2);

        controller.mark_uploaded(d1.id).await.unwrap();

        let pending = controller.get_newest_documents().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, d2.id);

        let d1 = controller.get_document_by_id(d1.id).await.unwrap().unwrap();
        assert!(d1.is_uploaded);
        assert!(!d1.local_update);
    }

    #[tokio::test]
    async fn test_mark_all_not_uploaded_notifies_per_document() {
        let (mut controller, _tmp) = setup_test_db().await;
        let observer = Arc::new(RecordingObserver {
            events: Mutex::new(Vec::new()),
        });
        controller.add_observer(observer.clone());

        for (hash, title) in [("h1", "Doc1"), ("h2", "Doc2")] {
            let doc = controller
                .create_document(NewDocument::new(
                    Some(hash.to_string()),
                    title,
                    "/in",
                    "/out",
                ))
                .await
                .unwrap();
            controller.mark_uploaded(doc.id).await.unwrap();
        }

        let reset = controller.mark_all_documents_not_uploaded().await.unwrap();
        assert_eq!(reset, 2);
        assert_eq!(controller.get_newest_documents().await.unwrap().len(), 2);
        assert_eq!(observer.events.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_all_documents_cascades_but_keeps_tags() {
        let (controller, _tmp) = setup_test_db().await;

        let mut new = NewDocument::new(Some("h1".to_string()), "Doc1", "/a", "/oa");
        new.tags = vec!["keep-me".to_string()];
        new.chunks = vec!["span".to_string()];
        let doc = controller.create_document(new).await.unwrap();
        controller
            .create_chunk(doc.id, "embedded", Some(&[0.1, 0.2]), Some(1))
            .await
            .unwrap();

        let deleted = controller.delete_all_documents().await.unwrap();
        assert_eq!(deleted, 1);

        let stats = controller.get_stats().await.unwrap();
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.chunk_count, 0);
        assert_eq!(stats.tag_count, 1);
    }

    #[tokio::test]
    async fn test_create_chunk_with_embedding() {
        let (controller, _tmp) = setup_test_db().await;

        let doc = controller
            .create_document(NewDocument::new(Some("h1".to_string()), "Doc1", "/a", "/oa"))
            .await
            .unwrap();

        let chunk = controller
            .create_chunk(doc.id, "embedded span", Some(&[0.5, -0.5]), Some(4))
            .await
            .unwrap();
        assert!(chunk.has_embedding());
        assert_eq!(chunk.embedding().unwrap(), vec![0.5, -0.5]);
        assert_eq!(chunk.page_number, Some(4));

        let bare = controller
            .create_chunk(doc.id, "bare span", None, None)
            .await
            .unwrap();
        assert!(!bare.has_embedding());
    }

    #[tokio::test]
    async fn test_lookups_return_absence_not_error() {
        let (controller, _tmp) = setup_test_db().await;

        assert!(controller.get_document_by_id(42).await.unwrap().is_none());
        assert!(controller.get_document_by_hash("nope").await.unwrap().is_none());
        assert!(controller.get_document_by_title("nope").await.unwrap().is_none());
    }
}
