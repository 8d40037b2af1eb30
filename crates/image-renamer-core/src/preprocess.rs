//! Preprocessing handoff and temporary-artifact tracking.
//!
//! The resize/re-encode step itself lives outside this crate; the
//! pipeline only defines the seam it hands image bytes through, plus a
//! registry that guarantees temporary copies are removed on every exit
//! path.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;

use crate::discovery::mime_for_path;
use crate::error::Result;

/// Image bytes ready for upload
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

/// Seam for the external resize/re-encode step
///
/// Implementations that downscale should honor
/// `Config::max_image_dimension` and register any intermediate file
/// with the orchestrator's [`TempFileRegistry`].
pub trait ImagePreprocessor {
    fn prepare(&self, path: &Path) -> Result<PreparedImage>;
}

/// Default preprocessor: reads the file as-is, no resizing
pub struct PassthroughPreprocessor;

impl ImagePreprocessor for PassthroughPreprocessor {
    fn prepare(&self, path: &Path) -> Result<PreparedImage> {
        Ok(PreparedImage {
            bytes: std::fs::read(path)?,
            mime: mime_for_path(path),
        })
    }
}

/// Tracks temporary preprocessing artifacts for guaranteed cleanup
///
/// Files registered here are deleted on `cleanup` or when the registry
/// is dropped, whichever comes first, even if the pipeline bailed out
/// with an error in between.
#[derive(Default)]
pub struct TempFileRegistry {
    files: Mutex<Vec<PathBuf>>,
}

impl TempFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: PathBuf) {
        if let Ok(mut files) = self.files.lock() {
            files.push(path);
        }
    }

    /// Delete every registered artifact; safe to call more than once
    pub fn cleanup(&self) {
        let paths: Vec<PathBuf> = match self.files.lock() {
            Ok(mut files) => files.drain(..).collect(),
            Err(_) => return,
        };
        for path in paths {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to remove temp file {}: {}", path.display(), e);
                }
            }
        }
    }
}

impl Drop for TempFileRegistry {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_passthrough_reads_bytes_and_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"png bytes")
            .unwrap();

        let prepared = PassthroughPreprocessor.prepare(&path).unwrap();
        assert_eq!(prepared.bytes, b"png bytes");
        assert_eq!(prepared.mime, "image/png");
    }

    #[test]
    fn test_registry_cleans_up_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resized.jpg");
        std::fs::File::create(&path).unwrap();

        {
            let registry = TempFileRegistry::new();
            registry.register(path.clone());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resized.jpg");
        std::fs::File::create(&path).unwrap();

        let registry = TempFileRegistry::new();
        registry.register(path.clone());
        registry.cleanup();
        registry.cleanup();
        assert!(!path.exists());
    }
}
