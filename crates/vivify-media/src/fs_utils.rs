//! Filesystem utilities: collision-avoiding artifact names and atomic
//! temp-file-then-rename persistence.

use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};

/// Build a collision-avoiding output path `{stem}-{uuid}.{ext}` inside `dir`.
pub fn unique_output_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    dir.join(format!("{stem}-{}.{ext}", Uuid::new_v4().simple()))
}

/// Atomically move a finished temp file to its final path.
///
/// Falls back to copy-and-delete when the rename crosses filesystems (EXDEV),
/// copying via a sibling temp file so the destination never holds a partial
/// artifact.
pub async fn persist(tmp: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let tmp = tmp.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(tmp, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                tmp.display(),
                dst.display()
            );
            copy_and_delete(tmp, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

/// Copy to a sibling temp file on the destination filesystem, rename, then
/// delete the source.
async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let staging = dst.with_extension("staging");

    fs::copy(src, &staging).await.map_err(|e| {
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            staging.display(),
            e
        );
        MediaError::from(e)
    })?;

    fs::rename(&staging, dst).await.map_err(|e| {
        let _ = std::fs::remove_file(&staging);
        tracing::error!(
            "Failed to rename temp file during cross-device move: {} -> {}: {}",
            staging.display(),
            dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    // Best effort; the artifact is already in place.
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_paths_do_not_collide() {
        let dir = Path::new("/out");
        let a = unique_output_path(dir, "animated", "mp4");
        let b = unique_output_path(dir, "animated", "mp4");
        assert_ne!(a, b);
        assert!(a.file_name().unwrap().to_str().unwrap().starts_with("animated-"));
        assert_eq!(a.extension().unwrap(), "mp4");
    }

    #[tokio::test]
    async fn persist_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("artifact.tmp");
        let dst = dir.path().join("final").join("artifact.mp4");
        fs::write(&tmp, b"payload").await.unwrap();

        persist(&tmp, &dst).await.unwrap();

        assert!(!tmp.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"payload");
    }
}
