//! Data model for the local document store
//!
//! Rows map 1:1 onto the SQLite schema in `controller::schema`. Embeddings
//! are stored as little-endian f32 blobs so chunks survive round trips
//! without a lossy text encoding.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tracked document and its synchronization state
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    /// Content hash of the source bytes; unique when present
    pub doc_hash: Option<String>,
    pub title: String,
    pub doc_path: String,
    pub output_dir: String,
    pub markdown_path: Option<String>,
    pub images_path: Option<String>,
    pub page_count: Option<i64>,
    /// The remote copy exists and reflects current local state
    pub is_uploaded: bool,
    /// Local content diverged from a remote copy known to exist
    pub local_update: bool,
}

/// A text chunk belonging to a document
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub document_id: i64,
    pub text: String,
    /// Raw embedding bytes; use [`Chunk::embedding`] to decode
    pub embedding: Option<Vec<u8>>,
    pub page_number: Option<i64>,
}

impl Chunk {
    /// Decode the stored embedding, if any
    pub fn embedding(&self) -> Option<Vec<f32>> {
        self.embedding.as_deref().map(decode_embedding)
    }

    /// Whether this chunk carries a non-empty embedding
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_deref().is_some_and(|raw| !raw.is_empty())
    }
}

/// A tag; independent reference data shared across documents
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Parameters for creating a document through the controller.
///
/// This is the in-memory stage of document creation: callers build and
/// enrich a `NewDocument`, then hand it to
/// `DocumentController::create_document` to make it durable.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub doc_hash: Option<String>,
    pub title: String,
    pub doc_path: String,
    pub output_dir: String,
    pub markdown_path: Option<String>,
    pub images_path: Option<String>,
    pub page_count: Option<i64>,
    /// Tag names attached via get-or-create
    pub tags: Vec<String>,
    /// Raw chunk texts attached as un-embedded chunks
    pub chunks: Vec<String>,
}

impl NewDocument {
    pub fn new(doc_hash: Option<String>, title: &str, doc_path: &str, output_dir: &str) -> Self {
        Self {
            doc_hash,
            title: title.to_string(),
            doc_path: doc_path.to_string(),
            output_dir: output_dir.to_string(),
            ..Default::default()
        }
    }
}

/// Wire representation of a document sent to the remote archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub doc_hash: Option<String>,
    pub title: String,
    pub doc_path: String,
    pub output_dir: String,
    pub markdown_path: Option<String>,
    pub images_path: Option<String>,
    pub page_count: Option<i64>,
}

impl From<&Document> for DocumentPayload {
    fn from(doc: &Document) -> Self {
        Self {
            doc_hash: doc.doc_hash.clone(),
            title: doc.title.clone(),
            doc_path: doc.doc_path.clone(),
            output_dir: doc.output_dir.clone(),
            markdown_path: doc.markdown_path.clone(),
            images_path: doc.images_path.clone(),
            page_count: doc.page_count,
        }
    }
}

/// A document together with its chunks, as handed to the vector index
#[derive(Debug, Clone)]
pub struct DocumentWithChunks {
    pub document: Document,
    pub chunks: Vec<Chunk>,
}

impl DocumentWithChunks {
    /// Whether any chunk carries a non-empty embedding
    pub fn has_embedded_chunks(&self) -> bool {
        self.chunks.iter().any(Chunk::has_embedding)
    }
}

/// Encode an embedding as little-endian f32 bytes
pub fn encode_embedding(values: &[f32]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(values.len() * 4);
    for v in values {
        raw.extend_from_slice(&v.to_le_bytes());
    }
    raw
}

/// Decode little-endian f32 bytes into an embedding
pub fn decode_embedding(raw: &[u8]) -> Vec<f32> {
    raw.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_codec_roundtrip() {
        let values = vec![0.25_f32, -1.5, 3.0, f32::MIN_POSITIVE];
        let raw = encode_embedding(&values);
        assert_eq!(raw.len(), 16);
        assert_eq!(decode_embedding(&raw), values);
    }

    #[test]
    fn test_chunk_has_embedding() {
        let mut chunk = Chunk {
            id: 1,
            document_id: 1,
            text: "text".to_string(),
            embedding: None,
            page_number: None,
        };
        assert!(!chunk.has_embedding());
        assert_eq!(chunk.embedding(), None);

        chunk.embedding = Some(Vec::new());
        assert!(!chunk.has_embedding());

        chunk.embedding = Some(encode_embedding(&[0.1, 0.2]));
        assert!(chunk.has_embedding());
        assert_eq!(chunk.embedding().unwrap().len(), 2);
    }

    #[test]
    fn test_payload_from_document() {
        let doc = Document {
            id: 7,
            doc_hash: Some("abc".to_string()),
            title: "Doc".to_string(),
            doc_path: "/in/doc.pdf".to_string(),
            output_dir: "/out/doc".to_string(),
            markdown_path: Some("/out/doc/doc.md".to_string()),
            images_path: None,
            page_count: Some(12),
            is_uploaded: false,
            local_update: false,
        };

        let payload = DocumentPayload::from(&doc);
        assert_eq!(payload.doc_hash.as_deref(), Some("abc"));
        assert_eq!(payload.page_count, Some(12));
        assert_eq!(payload.images_path, None);
    }
}
