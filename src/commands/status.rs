//! Show local store status

use crate::controller::{DocumentController, StoreStats};
use crate::error::Result;

/// Collect local store counts
pub async fn cmd_status(controller: &DocumentController) -> Result<StoreStats> {
    controller.get_stats().await
}

/// Human-readable status summary
pub fn print_status(stats: &StoreStats) {
    println!("Local store");
    println!("  Documents: {}", stats.document_count);
    println!("  Pending sync: {}", stats.pending_count);
    println!("  Chunks: {}", stats.chunk_count);
    println!("  Embedded chunks: {}", stats.embedded_chunk_count);
    println!("  Tags: {}", stats.tag_count);
}
