//! Namespaced vector index client
//!
//! Projects documents and their embedded chunks into a serverless vector
//! index over its REST surface: list/create on the control plane, then
//! upsert/query/delete against the index host. Index provisioning is
//! idempotent and tolerates losing a creation race to another process.

use crate::config::VectorConfig;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::models::DocumentWithChunks;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "Api-Key";

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Debug, Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

/// One vector record as stored in the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// Metadata carried alongside each chunk vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub document_id: i64,
    pub document_title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    namespace: String,
    include_values: bool,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

/// A single query match, ordered by the index's declared metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    pub metadata: Option<VectorMetadata>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    delete_all: bool,
    namespace: &'a str,
}

/// Client for the namespaced vector index
pub struct VectorIndex {
    http: Client,
    api_key: String,
    host: String,
    index_name: String,
    batch_size: usize,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("host", &self.host)
            .field("index_name", &self.index_name)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Connect to the index, provisioning it if absent.
    ///
    /// Listing and creation run against the control plane; a creation
    /// request that loses a race falls back to describing the index, so
    /// concurrent construction is safe.
    pub async fn connect(config: &VectorConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let api_key = config.api_key()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let host = match &config.index_host {
            Some(host) => normalize_host(host),
            None => ensure_index(&http, &api_key, config).await?,
        };

        debug!("Vector index '{}' available at {}", config.index_name, host);

        Ok(Self {
            http,
            api_key,
            host,
            index_name: config.index_name.clone(),
            batch_size: config.batch_size,
            embedder,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let response = self
            .http
            .post(format!("{}{}", self.host, path))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    /// Upsert every embedded chunk of the given documents.
    ///
    /// Chunks without an embedding are skipped. Record ids are stable
    /// composites of document and chunk ids, so re-upserting overwrites.
    /// Batches are sent sequentially; a failing batch aborts the rest and
    /// the error reports how many vectors were already committed.
    pub async fn upsert_documents(
        &self,
        documents: &[DocumentWithChunks],
        namespace: &str,
    ) -> Result<usize> {
        let records = flatten_records(documents);
        if records.is_empty() {
            debug!("No embedded chunks to upsert");
            return Ok(0);
        }

        let total = records.len();
        info!(
            "Upserting {} vectors into namespace '{}' in batches of {}",
            total, namespace, self.batch_size
        );

        let mut committed = 0;
        for (batch_no, batch) in records.chunks(self.batch_size.max(1)).enumerate() {
            let request = UpsertRequest {
                vectors: batch,
                namespace,
            };

            let response = match self.post_json("/vectors/upsert", &request).await {
                Ok(response) => response,
                Err(e) => {
                    return Err(Error::VectorUpsert {
                        committed,
                        message: e.to_string(),
                    })
                }
            };

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(Error::VectorUpsert {
                    committed,
                    message: format!("status {}: {}", status.as_u16(), message),
                });
            }

            committed += batch.len();
            debug!("Batch {} committed ({}/{} vectors)", batch_no + 1, committed, total);
        }

        info!("Upserted {} vectors into namespace '{}'", total, namespace);
        Ok(total)
    }

    /// Embed the query text and return the top-k nearest matches
    pub async fn query_text(
        &self,
        text: &str,
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<QueryMatch>> {
        let vector = self.embedder.embed_one(text).await?;

        let request = QueryRequest {
            vector,
            top_k,
            namespace: namespace.to_string(),
            include_values: true,
            include_metadata: true,
        };

        let response = self.post_json("/query", &request).await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::VectorStore(format!(
                "query failed with status {}: {}",
                status.as_u16(),
                message
            )));
        }

        let parsed: QueryResponse = response.json().await?;
        Ok(parsed.matches)
    }

    /// Delete every vector in the namespace. Irreversible.
    pub async fn purge_namespace(&self, namespace: &str) -> Result<()> {
        let request = DeleteRequest {
            delete_all: true,
            namespace,
        };

        let response = self.post_json("/vectors/delete", &request).await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::VectorStore(format!(
                "namespace purge failed with status {}: {}",
                status.as_u16(),
                message
            )));
        }

        info!("Purged all vectors in namespace '{}'", namespace);
        Ok(())
    }
}

/// Flatten documents into one record per embedded chunk
fn flatten_records(documents: &[DocumentWithChunks]) -> Vec<VectorRecord> {
    let mut records = Vec::new();
    for doc in documents {
        for chunk in &doc.chunks {
            let Some(values) = chunk.embedding() else {
                continue;
            };
            if values.is_empty() {
                continue;
            }
            records.push(VectorRecord {
                id: format!("doc_{}_chunk_{}", doc.document.id, chunk.id),
                values,
                metadata: VectorMetadata {
                    document_id: doc.document.id,
                    document_title: doc.document.title.clone(),
                    text: chunk.text.clone(),
                    markdown_path: doc.document.markdown_path.clone(),
                },
            });
        }
    }
    records
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// List existing indexes, creating the target one only if absent
async fn ensure_index(http: &Client, api_key: &str, config: &VectorConfig) -> Result<String> {
    let control = config.control_url.trim_end_matches('/');

    let response = http
        .get(format!("{}/indexes", control))
        .header(API_KEY_HEADER, api_key)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::VectorStore(format!(
            "listing indexes failed with status {}",
            status.as_u16()
        )));
    }

    let list: IndexList = response.json().await?;
    if let Some(existing) = list.indexes.iter().find(|i| i.name == config.index_name) {
        if let Some(dimension) = existing.dimension {
            if dimension != config.dimension {
                return Err(Error::VectorStore(format!(
                    "index '{}' has dimension {}, config expects {}",
                    config.index_name, dimension, config.dimension
                )));
            }
        }
        if let Some(host) = &existing.host {
            debug!("Index '{}' already exists", config.index_name);
            return Ok(normalize_host(host));
        }
    }

    info!(
        "Creating index '{}' (dimension {}, metric {}, {}/{})",
        config.index_name, config.dimension, config.metric, config.cloud, config.region
    );

    let request = CreateIndexRequest {
        name: &config.index_name,
        dimension: config.dimension,
        metric: &config.metric,
        spec: IndexSpec {
            serverless: ServerlessSpec {
                cloud: &config.cloud,
                region: &config.region,
            },
        },
    };

    let response = http
        .post(format!("{}/indexes", control))
        .header(API_KEY_HEADER, api_key)
        .json(&request)
        .send()
        .await?;
    let status = response.status();

    if status.is_success() {
        let created: IndexDescription = response.json().await?;
        if let Some(host) = created.host {
            return Ok(normalize_host(&host));
        }
    } else if status.as_u16() != 409 {
        let message = response.text().await.unwrap_or_default();
        return Err(Error::VectorStore(format!(
            "index creation failed with status {}: {}",
            status.as_u16(),
            message
        )));
    } else {
        // Lost a creation race to a concurrent process; the index is there
        warn!(
            "Index '{}' was created concurrently; describing it instead",
            config.index_name
        );
    }

    let response = http
        .get(format!("{}/indexes/{}", control, config.index_name))
        .header(API_KEY_HEADER, api_key)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::VectorStore(format!(
            "describing index '{}' failed with status {}",
            config.index_name,
            status.as_u16()
        )));
    }

    let described: IndexDescription = response.json().await?;
    described
        .host
        .map(|h| normalize_host(&h))
        .ok_or_else(|| {
            Error::VectorStore(format!(
                "index '{}' has no data-plane host",
                config.index_name
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::testing::StubEmbedder;
    use crate::models::{encode_embedding, Chunk, Document};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer, batch_size: usize) -> VectorConfig {
        std::env::set_var("ARCHIVIST_TEST_VECTOR_KEY", "vk-test");
        VectorConfig {
            enabled: true,
            api_key_env: "ARCHIVIST_TEST_VECTOR_KEY".to_string(),
            control_url: server.uri(),
            index_host: Some(server.uri()),
            index_name: "archivist-index".to_string(),
            dimension: 2,
            metric: "cosine".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            namespace: "archivist-chunks".to_string(),
            batch_size,
        }
    }

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(StubEmbedder { dimension: 2 })
    }

    fn doc_with_chunks(doc_id: i64, chunks: Vec<Chunk>) -> DocumentWithChunks {
        DocumentWithChunks {
            document: Document {
                id: doc_id,
                doc_hash: Some(format!("hash{}", doc_id)),
                title: format!("Doc{}", doc_id),
                doc_path: "/in".to_string(),
                output_dir: "/out".to_string(),
                markdown_path: Some("/out/doc.md".to_string()),
                images_path: None,
                page_count: None,
                is_uploaded: true,
                local_update: false,
            },
            chunks,
        }
    }

    fn chunk(id: i64, doc_id: i64, embedded: bool) -> Chunk {
        Chunk {
            id,
            document_id: doc_id,
            text: format!("chunk {}", id),
            embedding: embedded.then(|| encode_embedding(&[0.1, 0.2])),
            page_number: None,
        }
    }

    #[test]
    fn test_flatten_skips_unembedded_chunks() {
        let docs = vec![doc_with_chunks(1, vec![chunk(1, 1, false), chunk(2, 1, true)])];
        let records = flatten_records(&docs);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "doc_1_chunk_2");
        assert_eq!(records[0].metadata.document_title, "Doc1");
        assert_eq!(records[0].metadata.markdown_path.as_deref(), Some("/out/doc.md"));
    }

    #[test]
    fn test_record_ids_are_stable() {
        let docs = vec![doc_with_chunks(3, vec![chunk(7, 3, true)])];
        let first = flatten_records(&docs);
        let second = flatten_records(&docs);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].id, "doc_3_chunk_7");
    }

    #[tokio::test]
    async fn test_connect_creates_missing_index() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indexes": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .and(header(API_KEY_HEADER, "vk-test"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "name": "archivist-index",
                "host": server.uri(),
                "dimension": 2,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config(&server, 200);
        config.index_host = None;
        let index = VectorIndex::connect(&config, embedder()).await.unwrap();
        assert_eq!(index.index_name(), "archivist-index");
    }

    #[tokio::test]
    async fn test_connect_reuses_existing_index() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "indexes": [{"name": "archivist-index", "host": server.uri(), "dimension": 2}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config(&server, 200);
        config.index_host = None;
        VectorIndex::connect(&config, embedder()).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_survives_creation_race() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indexes": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/indexes/archivist-index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "archivist-index",
                "host": server.uri(),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config(&server, 200);
        config.index_host = None;
        VectorIndex::connect(&config, embedder()).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_rejects_dimension_mismatch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "indexes": [{"name": "archivist-index", "host": server.uri(), "dimension": 1536}]
            })))
            .mount(&server)
            .await;

        let mut config = test_config(&server, 200);
        config.index_host = None;
        let err = VectorIndex::connect(&config, embedder()).await.unwrap_err();
        assert!(matches!(err, Error::VectorStore(_)));
    }

    #[tokio::test]
    async fn test_upsert_batches_sequentially() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 2})))
            .expect(3)
            .mount(&server)
            .await;

        let config = test_config(&server, 2);
        let index = VectorIndex::connect(&config, embedder()).await.unwrap();

        let chunks = (1..=5).map(|i| chunk(i, 1, true)).collect();
        let docs = vec![doc_with_chunks(1, chunks)];
        let upserted = index
            .upsert_documents(&docs, "archivist-chunks")
            .await
            .unwrap();
        assert_eq!(upserted, 5);
    }

    #[tokio::test]
    async fn test_upsert_sends_only_embedded_chunks() {
        let server = MockServer::start().await;

        let guard = Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
            .expect(1)
            .mount_as_scoped(&server)
            .await;

        let config = test_config(&server, 200);
        let index = VectorIndex::connect(&config, embedder()).await.unwrap();

        let docs = vec![doc_with_chunks(1, vec![chunk(1, 1, true), chunk(2, 1, false)])];
        let upserted = index.upsert_documents(&docs, "ns").await.unwrap();
        assert_eq!(upserted, 1);

        let requests = guard.received_requests().await;
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["namespace"], "ns");
        let vectors = body["vectors"].as_array().unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0]["id"], "doc_1_chunk_1");
    }

    #[tokio::test]
    async fn test_upsert_with_no_embeddings_is_a_noop() {
        let server = MockServer::start().await;
        // No upsert mock mounted: any request would fail the test
        let config = test_config(&server, 200);
        let index = VectorIndex::connect(&config, embedder()).await.unwrap();

        let docs = vec![doc_with_chunks(1, vec![chunk(1, 1, false)])];
        assert_eq!(index.upsert_documents(&docs, "ns").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_batch_reports_committed_count() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 2})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(500).set_body_string("quota"))
            .mount(&server)
            .await;

        let config = test_config(&server, 2);
        let index = VectorIndex::connect(&config, embedder()).await.unwrap();

        let chunks = (1..=5).map(|i| chunk(i, 1, true)).collect();
        let docs = vec![doc_with_chunks(1, chunks)];
        let err = index.upsert_documents(&docs, "ns").await.unwrap_err();
        match err {
            Error::VectorUpsert { committed, message } => {
                assert_eq!(committed, 2);
                assert!(message.contains("500"));
            }
            other => panic!("expected upsert error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_query_text_embeds_and_parses_matches() {
        let server = MockServer::start().await;

        let guard = Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    {"id": "doc_1_chunk_1", "score": 0.9, "metadata": {
                        "document_id": 1, "document_title": "Doc1", "text": "chunk 1"
                    }},
                    {"id": "doc_1_chunk_2", "score": 0.4, "metadata": {
                        "document_id": 1, "document_title": "Doc1", "text": "chunk 2"
                    }},
                ]
            })))
            .expect(1)
            .mount_as_scoped(&server)
            .await;

        let config = test_config(&server, 200);
        let index = VectorIndex::connect(&config, embedder()).await.unwrap();

        let matches = index.query_text("what is rust", 2, "ns").await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "doc_1_chunk_1");
        assert_eq!(matches[0].metadata.as_ref().unwrap().text, "chunk 1");

        let requests = guard.received_requests().await;
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["topK"], 2);
        assert_eq!(body["includeMetadata"], true);
        assert_eq!(body["vector"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_purge_namespace_sends_delete_all() {
        let server = MockServer::start().await;

        let guard = Mock::given(method("POST"))
            .and(path("/vectors/delete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount_as_scoped(&server)
            .await;

        let config = test_config(&server, 200);
        let index = VectorIndex::connect(&config, embedder()).await.unwrap();
        index.purge_namespace("stale").await.unwrap();

        let requests = guard.received_requests().await;
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["deleteAll"], true);
        assert_eq!(body["namespace"], "stale");
    }
}
