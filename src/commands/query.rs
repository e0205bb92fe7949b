//! Query the vector index

use crate::error::Result;
use crate::vector::{QueryMatch, VectorIndex};

/// Embed the query text and fetch the top-k nearest chunks
pub async fn cmd_query(
    index: &VectorIndex,
    text: &str,
    top_k: usize,
    namespace: &str,
) -> Result<Vec<QueryMatch>> {
    index.query_text(text, top_k, namespace).await
}

/// Human-readable query results
pub fn print_query_results(matches: &[QueryMatch]) {
    if matches.is_empty() {
        println!("No matches.");
        return;
    }

    for (rank, m) in matches.iter().enumerate() {
        println!("{}. {} (score {:.4})", rank + 1, m.id, m.score);
        if let Some(metadata) = &m.metadata {
            println!("   {}", metadata.document_title);
            let snippet: String = metadata.text.chars().take(160).collect();
            println!("   {}", snippet);
        }
        println!();
    }
}
