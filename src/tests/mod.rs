//! Integration tests for the HTTP surface and configuration.
//!
//! - **api_tests**: router level tests (404 handling, streaming, disconnects, timeouts)
//! - **zip_tests**: end-to-end downloads through the real `zip` binary
//! - **config_tests**: configuration loading and validation
//! - **error_tests**: error to response mapping
//!
//! Shared helpers for inspecting archiver processes live here.

pub mod config_tests;

/// True while the kernel still has an entry for `pid` (zombies included).
#[cfg(target_os = "linux")]
pub(crate) fn process_exists(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{}", pid)).exists()
}

/// Polls until `pid` is gone, for teardown that happens on a background task.
#[cfg(target_os = "linux")]
pub(crate) async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..150 {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    false
}

/// Pid of a live process that was started with `arg` among its arguments.
///
/// Tests pass a unique argument (a temp dir path) so concurrent tests never collide.
#[cfg(target_os = "linux")]
pub(crate) fn find_process_with_arg(arg: &str) -> Option<u32> {
    std::fs::read_dir("/proc").ok()?.flatten().find_map(|entry| {
        let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
        let cmdline = std::fs::read(entry.path().join("cmdline")).ok()?;
        cmdline.split(|b| *b == 0).any(|a| a == arg.as_bytes()).then_some(pid)
    })
}

pub(crate) fn zip_available() -> bool {
    std::process::Command::new("zip")
        .arg("-v")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
