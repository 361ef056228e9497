use std::path::{Component, Path, PathBuf};

use super::ArchiveError;

/// Returns true when `id` is exactly one normal path component.
///
/// Rejects empty ids, `.`/`..`, separators of either platform and NUL bytes, so an
/// identifier can never address anything outside the archive root.
pub fn is_safe_identifier(id: &str) -> bool {
    if id.is_empty() || id.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(first)), None) if first == id
    )
}

/// Identifier as it should appear in logs: control characters and quotes escaped.
pub fn loggable_identifier(id: &str) -> impl std::fmt::Display + '_ {
    id.escape_debug()
}

/// Checks whether `root` directly contains a directory named exactly `id`.
///
/// The root is enumerated instead of probing `root/id`, so the lookup is exact
/// (no case folding on case-insensitive filesystems). Symlinks to directories count.
pub async fn directory_exists(root: &Path, id: &str) -> Result<bool, ArchiveError> {
    let enumeration_error = |source| ArchiveError::DirectoryEnumeration {
        root: root.display().to_string(),
        source,
    };

    let mut entries = tokio::fs::read_dir(root).await.map_err(enumeration_error)?;
    while let Some(entry) = entries.next_entry().await.map_err(enumeration_error)? {
        if entry.file_name().to_str() != Some(id) {
            continue;
        }
        // metadata() follows symlinks, file_type() would not
        return match tokio::fs::metadata(entry.path()).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(enumeration_error(e)),
        };
    }
    Ok(false)
}

/// Resolves `id` to its source directory, or `None` if it is unsafe or missing.
pub async fn resolve_source_dir(root: &Path, id: &str) -> Result<Option<PathBuf>, ArchiveError> {
    if !is_safe_identifier(id) {
        tracing::warn!(identifier = %loggable_identifier(id), "Rejected unsafe archive identifier");
        return Ok(None);
    }
    if directory_exists(root, id).await? {
        Ok(Some(root.join(id)))
    } else {
        Ok(None)
    }
}
