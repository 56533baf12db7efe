use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SUPPORTED_EXTENSIONS: [&str; 8] =
    ["jpg", "jpeg", "png", "bmp", "gif", "tiff", "tif", "webp"];

pub fn is_supported_format(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Recursively walk `dir`, returning image file paths in sorted order.
pub fn find_images(dir: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_supported_format(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    images.sort();
    log::info!("Found {} image files in {}", images.len(), dir.display());
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_supported_format_detection() {
        assert!(is_supported_format(Path::new("test.jpg")));
        assert!(is_supported_format(Path::new("test.JPEG")));
        assert!(is_supported_format(Path::new("test.png")));
        assert!(is_supported_format(Path::new("test.WebP")));
        assert!(!is_supported_format(Path::new("test.txt")));
        assert!(!is_supported_format(Path::new("test")));
    }

    #[test]
    fn test_find_images_recurses_and_filters() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        fs::write(temp_dir.path().join("one.JPG"), b"x").unwrap();
        fs::write(nested.join("two.png"), b"x").unwrap();
        fs::write(nested.join("notes.txt"), b"x").unwrap();
        fs::create_dir_all(temp_dir.path().join("dir.png")).unwrap();

        let found = find_images(temp_dir.path());
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(found.len(), 2);
        assert!(names.contains(&"one.JPG".to_string()));
        assert!(names.contains(&"two.png".to_string()));
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(find_images(temp_dir.path()).is_empty());
    }
}
