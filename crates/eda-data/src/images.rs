//! Copies the most-shared images out of the dataset's image folder.
//!
//! Image files are matched to ranked cluster image names by file name, at any
//! depth under the image directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eda_core::error::{EdaError, Result};
use tracing::{debug, warn};

use crate::writer::OutputDir;

/// Sub-directory of the output directory receiving the copies.
pub const TOP_IMAGES_DIR: &str = "top_images";

/// Map every regular file under `image_dir` from file name to path.
///
/// When a name occurs more than once the lexicographically first path wins.
/// A missing directory yields an empty index.
pub fn index_images(image_dir: &Path) -> HashMap<String, PathBuf> {
    if !image_dir.exists() {
        warn!("Image directory does not exist: {}", image_dir.display());
        return HashMap::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(image_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    let mut index = HashMap::new();
    for path in files {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            index.entry(name.to_string()).or_insert(path);
        }
    }
    index
}

/// Copy each of `names` found under `image_dir` into `dest`.
///
/// Names with no matching file are skipped with a warning. Returns the number
/// of files copied.
pub fn collect_top_images(image_dir: &Path, names: &[&str], dest: &OutputDir) -> Result<usize> {
    let index = index_images(image_dir);
    let mut copied = 0usize;

    for name in names {
        let Some(source) = index.get(*name) else {
            warn!("Image {} not found under {}", name, image_dir.display());
            continue;
        };
        let target = dest.path().join(name);
        std::fs::copy(source, &target).map_err(|e| EdaError::write(&target, e))?;
        copied += 1;
    }

    debug!(
        "Copied {} of {} images into {}",
        copied,
        names.len(),
        dest.path().display()
    );
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, contents: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_index_images_recursive() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.jpg", "a");
        touch(&tmp.path().join("nested").join("deeper"), "b.png", "b");

        let index = index_images(tmp.path());
        assert_eq!(index.len(), 2);
        assert!(index["b.png"].ends_with("nested/deeper/b.png"));
    }

    #[test]
    fn test_index_images_duplicate_names_first_path_wins() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a_dir"), "same.jpg", "first");
        touch(&tmp.path().join("b_dir"), "same.jpg", "second");

        let index = index_images(tmp.path());
        assert!(index["same.jpg"].starts_with(tmp.path().join("a_dir")));
    }

    #[test]
    fn test_index_images_missing_directory() {
        let index = index_images(Path::new("/tmp/does-not-exist-eda-images-xyz"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_collect_top_images_copies_found_and_skips_missing() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("misinfo");
        touch(&images, "a.jpg", "alpha");
        touch(&images, "c.jpg", "gamma");

        let dest = OutputDir::ensure(tmp.path().join("out").join(TOP_IMAGES_DIR)).unwrap();
        let copied = collect_top_images(&images, &["a.jpg", "b.jpg", "c.jpg"], &dest).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            std::fs::read_to_string(dest.path().join("a.jpg")).unwrap(),
            "alpha"
        );
        assert!(!dest.path().join("b.jpg").exists());
    }

    #[test]
    fn test_collect_top_images_into_removed_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("misinfo");
        touch(&images, "a.jpg", "alpha");

        let dest_path = tmp.path().join("gone");
        let dest = OutputDir::ensure(&dest_path).unwrap();
        std::fs::remove_dir(&dest_path).unwrap();

        let err = collect_top_images(&images, &["a.jpg"], &dest).unwrap_err();
        assert!(matches!(err, EdaError::Write { .. }));
    }
}
