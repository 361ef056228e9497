use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStdout, Command};

use super::ArchiveError;
use crate::config::ArchiverConfig;

/// An archiver process compressing one source directory to its stdout.
///
/// The process is owned exclusively by this value. It is torn down by exactly one of
/// [`finish`](Self::finish) (after end of stream), [`shutdown`](Self::shutdown)
/// (cancellation or read error) or `Drop`, which kills the process and reaps it on a
/// background task.
#[derive(Debug)]
pub struct ArchiveProducer {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    pid: Option<u32>,
}

impl ArchiveProducer {
    /// Starts the archiver with `source_dir` as its working directory.
    pub fn spawn(source_dir: &Path, archiver: &ArchiverConfig) -> Result<Self, ArchiveError> {
        let mut child = Command::new(&archiver.program)
            .args(&archiver.args)
            .current_dir(source_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ArchiveError::Spawn { program: archiver.program.clone(), source })?;

        let stdout = child.stdout.take().ok_or_else(|| ArchiveError::Spawn {
            program: archiver.program.clone(),
            source: std::io::Error::other("archiver stdout was not captured"),
        })?;
        let pid = child.id();
        tracing::debug!(?pid, dir = %source_dir.display(), "Spawned archiver");

        Ok(Self { child: Some(child), stdout: Some(stdout), pid })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The archiver's standard output. `None` once the producer has been torn down.
    pub fn stdout(&mut self) -> Option<&mut ChildStdout> {
        self.stdout.as_mut()
    }

    /// Reaps the archiver after its output reached end of stream.
    ///
    /// A nonzero exit is only logged: bytes already handed to the client cannot be
    /// taken back.
    pub async fn finish(mut self) -> Result<ExitStatus, ArchiveError> {
        self.stdout.take();
        let Some(mut child) = self.child.take() else {
            return Err(ArchiveError::Wait(std::io::Error::other("archiver already reaped")));
        };
        let status = child.wait().await.map_err(ArchiveError::Wait)?;
        if status.success() {
            tracing::debug!(pid = ?self.pid, "Archiver exited cleanly");
        } else {
            tracing::warn!(pid = ?self.pid, %status, "Archiver exited with failure, archive may be truncated");
        }
        Ok(status)
    }

    /// Kills the archiver if it is still running and waits until it has been reaped,
    /// then releases the pipe.
    pub async fn shutdown(mut self) -> Result<(), ArchiveError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = ?self.pid, %status, "Archiver had already exited");
            }
            _ => {
                if let Err(e) = child.start_kill() {
                    // InvalidInput means it exited between try_wait and kill
                    if e.kind() != std::io::ErrorKind::InvalidInput {
                        tracing::warn!(pid = ?self.pid, "Failed to kill archiver: {}", e);
                    }
                }
                let status = child.wait().await.map_err(ArchiveError::Wait)?;
                tracing::debug!(pid = ?self.pid, %status, "Archiver killed and reaped");
            }
        }
        self.stdout.take();
        Ok(())
    }
}

impl Drop for ArchiveProducer {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        let _ = child.start_kill();
        let pid = self.pid;
        // The pipe goes with the reaper so it is released only after the reap
        let stdout = self.stdout.take();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match child.wait().await {
                        Ok(status) => tracing::debug!(?pid, %status, "Reaped dropped archiver"),
                        Err(e) => tracing::warn!(?pid, "Failed to reap dropped archiver: {}", e),
                    }
                    drop(stdout);
                });
            }
            // Without a runtime, tokio's orphan queue reaps the killed child later
            Err(_) => tracing::warn!(?pid, "Archiver dropped outside of a runtime"),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn command(program: &str, args: &[&str]) -> ArchiverConfig {
        ArchiverConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn streams_stdout_and_reaps_on_finish() {
        let dir = TempDir::new().unwrap();
        let mut producer = ArchiveProducer::spawn(dir.path(), &command("head", &["-c", "2048", "/dev/zero"])).unwrap();
        let mut out = Vec::new();
        producer.stdout().unwrap().read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), 2048);
        assert!(producer.finish().await.unwrap().success());
    }

    #[tokio::test]
    async fn runs_in_source_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), b"x").unwrap();
        let mut producer = ArchiveProducer::spawn(dir.path(), &command("ls", &[])).unwrap();
        let mut out = String::new();
        producer.stdout().unwrap().read_to_string(&mut out).await.unwrap();
        assert!(out.contains("marker.txt"));
        producer.finish().await.unwrap();
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let mut producer = ArchiveProducer::spawn(dir.path(), &command("false", &[])).unwrap();
        let mut out = Vec::new();
        producer.stdout().unwrap().read_to_end(&mut out).await.unwrap();
        assert!(!producer.finish().await.unwrap().success());
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = TempDir::new().unwrap();
        let err = ArchiveProducer::spawn(dir.path(), &command("/nonexistent/archiver", &[])).unwrap_err();
        assert!(matches!(err, ArchiveError::Spawn { .. }));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn shutdown_kills_and_reaps() {
        let dir = TempDir::new().unwrap();
        let producer = ArchiveProducer::spawn(dir.path(), &command("yes", &[])).unwrap();
        let pid = producer.pid().unwrap();
        assert!(crate::tests::process_exists(pid));
        producer.shutdown().await.unwrap();
        assert!(!crate::tests::process_exists(pid));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn drop_kills_and_reaps_in_background() {
        let dir = TempDir::new().unwrap();
        let producer = ArchiveProducer::spawn(dir.path(), &command("yes", &[])).unwrap();
        let pid = producer.pid().unwrap();
        drop(producer);
        assert!(crate::tests::wait_for_exit(pid).await, "archiver {} still alive after drop", pid);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn drop_hands_the_pipe_to_the_reaper() {
        let dir = TempDir::new().unwrap();
        let mut producer = ArchiveProducer::spawn(dir.path(), &command("yes", &[])).unwrap();
        let pid = producer.pid().unwrap();
        let mut buf = [0u8; 16];
        producer.stdout().unwrap().read_exact(&mut buf).await.unwrap();
        drop(producer);
        // Output was still flowing when the producer went away
        assert!(crate::tests::wait_for_exit(pid).await);
    }
}
