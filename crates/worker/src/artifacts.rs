use std::io::ErrorKind;
use std::path::Path;

/// Delete an artifact file, logging instead of failing.
///
/// Returns `true` when a file was actually removed.
pub(crate) async fn remove_best_effort(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed artifact");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove artifact");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removes_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song-1234abcd.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        assert!(remove_best_effort(&path).await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!remove_best_effort(&dir.path().join("gone.mp3")).await);
    }
}
