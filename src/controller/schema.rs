//! SQLite schema definition

/// SQL schema for the local document store
pub const SCHEMA_SQL: &str = r#"
-- Documents: tracked source documents and their sync state
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_hash TEXT UNIQUE,
    title TEXT NOT NULL UNIQUE,
    doc_path TEXT NOT NULL,
    output_dir TEXT NOT NULL,
    markdown_path TEXT,
    images_path TEXT,
    page_count INTEGER,
    is_uploaded INTEGER NOT NULL DEFAULT 0,
    local_update INTEGER NOT NULL DEFAULT 0
);

-- Chunks: text spans with optional embeddings
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    embedding BLOB,
    page_number INTEGER
);

-- Tags: independent reference data
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Join table for Document <-> Tag
CREATE TABLE IF NOT EXISTS document_tags (
    document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (document_id, tag_id)
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(doc_hash);
CREATE INDEX IF NOT EXISTS idx_documents_pending ON documents(is_uploaded);
CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
"#;
