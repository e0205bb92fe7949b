//! Push pending documents to the remote archive

use crate::error::Result;
use crate::sync::{SyncReport, SyncService};

/// Run one sync pass over the work queue
pub async fn cmd_push(service: &SyncService, merge: bool) -> Result<SyncReport> {
    service.push(merge).await
}

/// Human-readable sync summary
pub fn print_sync_report(report: &SyncReport) {
    println!("Sync run complete");
    println!("  Created on remote: {}", report.created);
    println!("  Updated on remote: {}", report.updated);
    println!("  Skipped (merge=false): {}", report.skipped);
    println!("  Vectors upserted: {}", report.vectors_upserted);

    if !report.failed.is_empty() {
        println!("  Failed ({}):", report.failed.len());
        for failure in &report.failed {
            println!(
                "    id={} hash={}: {}",
                failure.document_id,
                failure.doc_hash.as_deref().unwrap_or("-"),
                failure.error
            );
        }
    }

    if let Some(err) = &report.vector_error {
        println!("  Vector index error: {}", err);
        println!(
            "  ({} vectors were committed before the failure; re-run push to resume)",
            report.vectors_upserted
        );
    }
}
