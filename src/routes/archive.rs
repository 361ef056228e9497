use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::stream::{BoxStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::{
    archive::{loggable_identifier, resolve_source_dir, ArchiveError, ArchiveProducer, ThrottledReader},
    error::{AppError, AppResult, ARCHIVE_NOT_FOUND},
    metrics::Metrics,
    state::AppState,
};

pub const ARCHIVE_FILENAME: &str = "archive.zip";
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// `GET /archive/{id}/`: streams a ZIP of `<root>/<id>` chunk by chunk.
///
/// Everything that can turn into a 404 or 500 happens before the response head is
/// built, so a missing directory or a failed spawn never yields a half-committed 200.
pub async fn download_archive(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    state.metrics.inc_requests();

    if id.is_empty() {
        state.metrics.inc_not_found();
        return Err(AppError::NotFound("No archive hash".to_string()));
    }

    let source_dir = match resolve_source_dir(&state.root, &id).await? {
        Some(dir) => dir,
        None => {
            state.metrics.inc_not_found();
            tracing::info!(identifier = %loggable_identifier(&id), "Archive not found");
            return Err(AppError::NotFound(ARCHIVE_NOT_FOUND.to_string()));
        }
    };

    let producer = ArchiveProducer::spawn(&source_dir, &state.config.archive.archiver)?;
    state.metrics.stream_started();
    tracing::info!(identifier = %loggable_identifier(&id), pid = ?producer.pid(), "Streaming archive");

    let cancel = CancellationToken::new();
    if let Some(timeout) = state.config.archive.request_timeout() {
        let token = cancel.clone();
        let id = id.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    tracing::warn!(identifier = %loggable_identifier(&id), ?timeout, "Archive request timed out");
                    token.cancel();
                }
            }
        });
    }

    let reader = ThrottledReader::new(producer, state.pacing, cancel);
    let body = TrackedStream {
        inner: reader.into_stream().boxed(),
        outcome: StreamOutcome::new(id, state.metrics.clone()),
    };

    let disposition = format!("attachment; filename=\"{}\"", ARCHIVE_FILENAME);
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE), (header::CONTENT_DISPOSITION, disposition.as_str())],
        Body::from_stream(body),
    )
        .into_response())
}

/// Records how one archive stream ended. A stream dropped before it finished was
/// abandoned by the client.
struct StreamOutcome {
    id: String,
    metrics: Metrics,
    started: Instant,
    chunks: u64,
    bytes: u64,
    done: bool,
}

impl StreamOutcome {
    fn new(id: String, metrics: Metrics) -> Self {
        Self { id, metrics, started: Instant::now(), chunks: 0, bytes: 0, done: false }
    }

    fn chunk(&mut self, len: usize) {
        self.chunks += 1;
        self.bytes += len as u64;
        self.metrics.add_chunk(len as u64);
    }

    fn completed(&mut self) {
        if std::mem::replace(&mut self.done, true) {
            return;
        }
        self.metrics.stream_completed();
        tracing::info!(
            identifier = %loggable_identifier(&self.id),
            chunks = self.chunks,
            bytes = self.bytes,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Archive sent"
        );
    }

    fn cancelled(&mut self) {
        if std::mem::replace(&mut self.done, true) {
            return;
        }
        self.metrics.stream_cancelled();
        tracing::info!(identifier = %loggable_identifier(&self.id), bytes = self.bytes, "Download was interrupted");
    }

    fn failed(&mut self, err: &ArchiveError) {
        if std::mem::replace(&mut self.done, true) {
            return;
        }
        self.metrics.stream_failed();
        tracing::error!(identifier = %loggable_identifier(&self.id), bytes = self.bytes, "Archive stream failed: {}", err);
    }
}

impl Drop for StreamOutcome {
    fn drop(&mut self) {
        self.cancelled();
    }
}

/// The response body: archive chunks plus outcome bookkeeping.
struct TrackedStream {
    inner: BoxStream<'static, Result<Bytes, ArchiveError>>,
    outcome: StreamOutcome,
}

impl Stream for TrackedStream {
    type Item = Result<Bytes, ArchiveError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let item = futures::ready!(self.inner.poll_next_unpin(cx));
        match &item {
            Some(Ok(chunk)) => self.outcome.chunk(chunk.len()),
            Some(Err(e)) if e.is_cancelled() => self.outcome.cancelled(),
            Some(Err(e)) => self.outcome.failed(e),
            None => self.outcome.completed(),
        }
        Poll::Ready(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn empty_identifier_skips_the_validator() {
        let mut config = AppConfig::default();
        // Any directory lookup against this root would fail with a 500.
        config.archive.root = "/nonexistent/zipstream-root".to_string();
        let state = AppState::new(config);

        let Err(err) = download_archive(State(state.clone()), Path(String::new())).await else {
            panic!("empty identifier must not stream");
        };
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(state.metrics.get_snapshot().archives_started, 0);
    }

    #[tokio::test]
    async fn unreadable_root_is_a_server_error_not_a_404() {
        let mut config = AppConfig::default();
        config.archive.root = "/nonexistent/zipstream-root".to_string();
        let state = AppState::new(config);

        let Err(err) = download_archive(State(state.clone()), Path("abc123".to_string())).await else {
            panic!("unreadable root must not stream");
        };
        assert!(matches!(err, AppError::DirectoryEnumeration(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.metrics.get_snapshot().archives_started, 0);
    }

    #[tokio::test]
    async fn spawn_failure_happens_before_headers() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("abc123")).unwrap();
        let mut config = AppConfig::default();
        config.archive.root = dir.path().to_string_lossy().to_string();
        config.archive.archiver.program = "/nonexistent/archiver".to_string();
        let state = AppState::new(config);

        let Err(err) = download_archive(State(state.clone()), Path("abc123".to_string())).await else {
            panic!("missing archiver must not stream");
        };
        assert!(matches!(err, AppError::ProcessSpawn(_)));
        assert_eq!(state.metrics.get_snapshot().active_streams, 0);
    }
}
