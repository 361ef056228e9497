use axum::body::Bytes;
use futures::Stream;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use super::{ArchiveError, ArchiveProducer, Pacing};

/// Reads an archiver's output in fixed-size chunks with a pause after every chunk.
///
/// Every chunk except the last one is exactly `pacing.chunk_size` bytes long. The read
/// and the pause both race against `cancel`; a cancelled reader kills and reaps its
/// producer before reporting [`ArchiveError::Cancelled`], so callers can tell a
/// cancelled stream from one that ended normally (`Ok(None)`).
///
/// Not restartable: once it has ended, every further call returns `Ok(None)`.
pub struct ThrottledReader {
    producer: Option<ArchiveProducer>,
    pacing: Pacing,
    cancel: CancellationToken,
}

impl ThrottledReader {
    pub fn new(producer: ArchiveProducer, pacing: Pacing, cancel: CancellationToken) -> Self {
        Self { producer: Some(producer), pacing, cancel }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn pid(&self) -> Option<u32> {
        self.producer.as_ref().and_then(ArchiveProducer::pid)
    }

    pub fn is_finished(&self) -> bool {
        self.producer.is_none()
    }

    /// Fetches the next chunk, then sleeps for the configured delay before yielding it.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, ArchiveError> {
        let Some(producer) = self.producer.as_mut() else {
            return Ok(None);
        };

        let chunk_size = self.pacing.chunk_size;
        let read = async {
            let mut buf = Vec::with_capacity(chunk_size);
            if let Some(stdout) = producer.stdout() {
                stdout.take(chunk_size as u64).read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };
        let read = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(self.abort(ArchiveError::Cancelled).await),
            read = read => read,
        };

        let buf = match read {
            Ok(buf) => buf,
            Err(e) => return Err(self.abort(ArchiveError::Read(e)).await),
        };

        if buf.is_empty() {
            if let Some(producer) = self.producer.take() {
                producer.finish().await?;
            }
            return Ok(None);
        }

        tracing::debug!(bytes = buf.len(), "Sending archive chunk");

        if !self.pacing.delay.is_zero() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(self.abort(ArchiveError::Cancelled).await),
                _ = tokio::time::sleep(self.pacing.delay) => {}
            }
        }

        Ok(Some(Bytes::from(buf)))
    }

    /// Tears the producer down and hands back `reason`.
    async fn abort(&mut self, reason: ArchiveError) -> ArchiveError {
        if reason.is_cancelled() {
            tracing::debug!("Download was interrupted");
        }
        if let Some(producer) = self.producer.take() {
            if let Err(e) = producer.shutdown().await {
                tracing::warn!("Archiver teardown failed: {}", e);
            }
        }
        reason
    }

    /// Turns the reader into a stream of chunks. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, ArchiveError>> + Send + 'static {
        futures::stream::unfold(Some(self), |reader| async move {
            let mut reader = reader?;
            match reader.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(reader))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

impl Drop for ThrottledReader {
    fn drop(&mut self) {
        // Stops any timer tied to this request; the producer's own Drop kills the archiver.
        self.cancel.cancel();
    }
}
