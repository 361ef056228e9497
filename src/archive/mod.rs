//! Streaming archive pipeline.
//!
//! A request for an archive flows through three stages:
//!
//! - [`validator`]: maps a client supplied identifier to a sub-directory of the
//!   configured root, rejecting anything that is not a single plain path segment
//! - [`producer`]: runs the external archiver inside that directory and owns the
//!   child process until it has been reaped
//! - [`throttle`]: pulls fixed-size chunks from the archiver's stdout and paces them
//!
//! Every stage is owned by exactly one request. Dropping the pipeline at any point
//! kills and reaps the archiver.

use std::time::Duration;

pub mod producer;
pub mod throttle;
pub mod validator;

pub use producer::ArchiveProducer;
pub use throttle::ThrottledReader;
pub use validator::{directory_exists, is_safe_identifier, loggable_identifier, resolve_source_dir};

/// Default number of bytes read from the archiver per chunk (500 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 500 * 1024;

/// Chunk size and inter-chunk delay, fixed at startup and shared by all requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    pub chunk_size: usize,
    pub delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, delay: Duration::ZERO }
    }
}

/// Failures of the archive pipeline itself.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to enumerate archive root {root}: {source}")]
    DirectoryEnumeration {
        root: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start archiver `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read archiver output: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to reap archiver: {0}")]
    Wait(#[source] std::io::Error),
    #[error("archive stream cancelled")]
    Cancelled,
}

impl ArchiveError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ArchiveError::Cancelled)
    }
}
