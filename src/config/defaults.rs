//! Default values for configuration

/// Default remote archive API base URL
pub fn default_remote_base_url() -> String {
    std::env::var("ARCHIVE_API_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8000/api/v1".to_string())
}

/// Default remote auth endpoint URL
pub fn default_remote_auth_url() -> String {
    std::env::var("ARCHIVE_API_AUTH_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8000/api/token".to_string())
}

/// Default environment variable name for the remote API username
pub fn default_remote_username_env() -> String {
    "ARCHIVE_API_USERNAME".to_string()
}

/// Default environment variable name for the remote API password
pub fn default_remote_password_env() -> String {
    "ARCHIVE_API_PASSWORD".to_string()
}

/// Default lead time (seconds) before token expiry triggers a re-auth
pub fn default_refresh_threshold_secs() -> u64 {
    30
}

/// Default remote request timeout in seconds
pub fn default_remote_timeout_secs() -> u64 {
    30
}

/// Default environment variable name for the vector index API key
pub fn default_vector_api_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

/// Default vector index control-plane URL
pub fn default_vector_control_url() -> String {
    "https://api.pinecone.io".to_string()
}

/// Default vector index name
pub fn default_index_name() -> String {
    "archivist-index".to_string()
}

/// Default vector dimension (text-embedding-3-small)
pub fn default_vector_dimension() -> usize {
    1536
}

/// Default distance metric
pub fn default_vector_metric() -> String {
    "cosine".to_string()
}

/// Default serverless cloud provider
pub fn default_vector_cloud() -> String {
    "aws".to_string()
}

/// Default serverless region
pub fn default_vector_region() -> String {
    "us-east-1".to_string()
}

/// Default namespace for chunk vectors
pub fn default_vector_namespace() -> String {
    "archivist-chunks".to_string()
}

/// Default batch size for vector upserts
pub fn default_vector_batch_size() -> usize {
    200
}

/// Default embedding API base URL (OpenAI-compatible)
pub fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Default environment variable name for the embedding API key
pub fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Default embedding dimension for text-embedding-3-small
pub fn default_embedding_dimension() -> usize {
    1536
}

/// Default batch size for embedding requests
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default maximum characters per chunk
pub fn default_chunk_max_chars() -> usize {
    1500
}

/// Default minimum characters per chunk
pub fn default_chunk_min_chars() -> usize {
    100
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    200
}

/// Default: run the remote existence check before inserting a document
pub fn default_check_remote_on_create() -> bool {
    true
}
