//! CLI command implementations

mod ingest;
mod init;
mod push;
mod query;
mod status;

pub use ingest::{cmd_ingest_dir, IngestStats};
pub use init::cmd_init;
pub use push::{cmd_push, print_sync_report};
pub use query::{cmd_query, print_query_results};
pub use status::{cmd_status, print_status};
