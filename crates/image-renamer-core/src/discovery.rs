use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Extensions the pipeline will consider, matched case-insensitively
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];

/// Enumerate candidate images under a root directory
///
/// Entries with an OS-level hidden or system attribute are skipped, as
/// are directories the process cannot read. The result is
/// lexicographically sorted and contains no duplicates.
pub fn enumerate_images(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(Error::FileNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(Error::Configuration(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut paths = Vec::new();

    for entry in WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();

        if has_image_extension(path) {
            paths.push(path.to_path_buf());
        }
    }

    paths.sort();
    paths.dedup();

    Ok(paths)
}

/// Returns if the given path has an allow-listed image extension
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}

/// MIME type for an allow-listed image path
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    }
}

#[cfg(windows)]
fn is_hidden(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

    match std::fs::metadata(path) {
        Ok(metadata) => {
            metadata.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0
        }
        Err(_) => false,
    }
}

#[cfg(not(windows))]
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn create_file(dir: &Path, name: &str) -> PathBuf {
        let file_path = dir.join(name);
        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"DUMMY IMAGE DATA").unwrap();
        file_path
    }

    #[test]
    fn test_has_image_extension() {
        assert!(has_image_extension(Path::new("test.jpg")));
        assert!(has_image_extension(Path::new("test.JPG")));
        assert!(has_image_extension(Path::new("test.jpeg")));
        assert!(has_image_extension(Path::new("test.png")));
        assert!(has_image_extension(Path::new("test.webp")));
        assert!(!has_image_extension(Path::new("test.txt")));
        assert!(!has_image_extension(Path::new("test")));
    }

    #[test]
    fn test_enumerate_skips_hidden_and_subdirs_when_not_recursive() {
        let dir = tempdir().unwrap();
        create_file(dir.path(), "photo.JPG");
        create_file(dir.path(), "photo.txt");
        create_file(dir.path(), ".hidden.png");
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        create_file(&sub, "photo2.png");

        let found = enumerate_images(dir.path(), false).unwrap();

        assert_eq!(found, vec![dir.path().join("photo.JPG")]);
    }

    #[test]
    fn test_enumerate_recursive_descends_but_still_skips_hidden() {
        let dir = tempdir().unwrap();
        create_file(dir.path(), "a.jpg");
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        create_file(&sub, "b.png");
        let hidden_dir = dir.path().join(".cache");
        fs::create_dir(&hidden_dir).unwrap();
        create_file(&hidden_dir, "thumb.png");

        let found = enumerate_images(dir.path(), true).unwrap();

        assert_eq!(
            found,
            vec![dir.path().join("a.jpg"), sub.join("b.png")]
        );
    }

    #[test]
    fn test_enumerate_is_sorted() {
        let dir = tempdir().unwrap();
        create_file(dir.path(), "zebra.jpg");
        create_file(dir.path(), "apple.jpg");
        create_file(dir.path(), "mango.png");

        let found = enumerate_images(dir.path(), false).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();

        assert_eq!(names, vec!["apple.jpg", "mango.png", "zebra.jpg"]);
    }

    #[test]
    fn test_enumerate_nonexistent_directory() {
        let result = enumerate_images(Path::new("/path/that/does/not/exist"), false);
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }
}
