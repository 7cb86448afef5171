#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use thiserror::Error;

/// Lifecycle notifications emitted while packing and extracting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PackStart {
        source: PathBuf,
        dest: PathBuf,
        data: PathBuf,
    },
    PackFileAttached {
        name: String,
        size: u64,
    },
    PackFileSkipped {
        path: PathBuf,
        reason: String,
    },
    PackSuccess {
        files: usize,
        bytes: u64,
    },
    ExtractStart {
        source: PathBuf,
        dest: PathBuf,
        files: usize,
    },
    ExtractFileStart {
        name: String,
    },
    ExtractFileDone {
        name: String,
    },
    ExtractFileFailed {
        name: String,
        failure: FileFailure,
    },
    ExtractCancelled {
        remaining: usize,
    },
    ExtractSuccess {
        files: usize,
    },
    /// Terminal event of an operation that returned an error.
    Failure(String),
}

/// Why a single file could not be extracted (or verified).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileFailure {
    #[error("copy failed: {0}")]
    Copy(String),

    #[error("sha256 {actual} != expected {expected}")]
    HashMismatch { expected: String, actual: String },

    #[error("name escapes the destination")]
    UnsafeName,
}

/// Receiver of lifecycle events. Implementations must not block.
pub trait EventSink {
    fn emit(&self, event: Event);
}

impl EventSink for mpsc::Sender<Event> {
    fn emit(&self, event: Event) {
        // a dropped receiver just means nobody is listening anymore
        let _ = self.send(event);
    }
}

/// Discards everything.
impl EventSink for () {
    fn emit(&self, _event: Event) {}
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: Event) {
        log_event(&event);
    }
}

pub fn log_event(event: &Event) {
    match event {
        Event::PackStart { source, dest, data } => tracing::info!(
            source = %source.display(),
            dest = %dest.display(),
            data = %data.display(),
            "pack started"
        ),
        Event::PackFileAttached { name, size } => tracing::info!(%name, size, "attached"),
        Event::PackFileSkipped { path, reason } => {
            tracing::warn!(path = %path.display(), %reason, "skipped")
        }
        Event::PackSuccess { files, bytes } => tracing::info!(files, bytes, "pack finished"),
        Event::ExtractStart {
            source,
            dest,
            files,
        } => tracing::info!(
            source = %source.display(),
            dest = %dest.display(),
            files,
            "extract started"
        ),
        Event::ExtractFileStart { name } => tracing::debug!(%name, "extracting"),
        Event::ExtractFileDone { name } => tracing::info!(%name, "extracted"),
        Event::ExtractFileFailed { name, failure } => {
            tracing::warn!(%name, %failure, "extract failed")
        }
        Event::ExtractCancelled { remaining } => {
            tracing::warn!(remaining, "extract cancelled")
        }
        Event::ExtractSuccess { files } => tracing::info!(files, "extract finished"),
        Event::Failure(e) => tracing::error!(error = %e, "failed"),
    }
}

/// Cooperative cancellation flag, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
