//! Pre-insert validation against the remote archive
//!
//! Before a document row becomes durable, its content hash is checked
//! against the remote system of record. A hash the remote already knows
//! means the insert is really an update, so `local_update` must be set
//! before the first commit. The check itself never blocks the local
//! insert: when it cannot be completed, the configured policy decides
//! the classification.

use crate::config::CheckFailurePolicy;
use crate::remote::BackendClient;
use std::sync::Arc;
use tracing::{debug, warn};

/// Explicit pre-create step consulted by the controller's insert path
pub struct PreInsertCheck {
    client: Arc<BackendClient>,
    policy: CheckFailurePolicy,
}

impl PreInsertCheck {
    pub fn new(client: Arc<BackendClient>, policy: CheckFailurePolicy) -> Self {
        Self { client, policy }
    }

    /// Classify a document hash: `true` means the remote already holds it
    /// and the in-flight row must carry `local_update=1`.
    ///
    /// Does not retry on transient failure; the policy supplies the answer
    /// when the remote cannot be reached.
    pub async fn classify(&self, doc_hash: &str) -> bool {
        match self.client.check_document_hash(doc_hash).await {
            Ok(check) => {
                debug!("Remote hash check for {}: exists={}", doc_hash, check.exists);
                check.exists
            }
            Err(e) => {
                warn!(
                    "Remote hash check for {} failed ({}); applying {:?} policy",
                    doc_hash, e, self.policy
                );
                matches!(self.policy, CheckFailurePolicy::AssumeUpdate)
            }
        }
    }
}
