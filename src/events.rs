//! Notification events emitted by the controller
//!
//! Observers receive a copy of every event; logging through an observer is
//! a side channel and never a substitute for the sync-flag state itself.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Events raised by document-store mutations
#[derive(Debug, Clone)]
pub enum Event {
    /// The pre-insert check found the document hash on the remote
    DocumentKnownRemote { title: String, doc_hash: String },
    /// Both sync flags were reset to force a full re-sync
    UploadFlagsReset { id: i64, title: String },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::DocumentKnownRemote { title, doc_hash } => write!(
                f,
                "Document '{}' (hash {}) already on the remote archive; marked local_update=1",
                title, doc_hash
            ),
            Event::UploadFlagsReset { id, title } => {
                write!(f, "Document id={} ('{}') reset to not-uploaded", id, title)
            }
        }
    }
}

/// Receives controller notification events
pub trait Observer: Send + Sync {
    fn notify(&self, event: &Event);
}

/// Observer that forwards events to the tracing subscriber
#[derive(Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn notify(&self, event: &Event) {
        info!("{}", event);
    }
}

/// Observer that appends events to a plain-text log file
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
}

impl FileObserver {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Observer for FileObserver {
    fn notify(&self, event: &Event) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{} {}", chrono::Utc::now().to_rfc3339(), event));

        if let Err(e) = result {
            warn!("Failed to append event to {:?}: {}", self.path, e);
        }
    }
}
