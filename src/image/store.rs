//! Persistence of accepted photos under sequential filenames

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::info;

use super::ImageError;

/// Writes accepted photos as `image_<n>.jpg`.
///
/// The count-then-write pair runs under a mutex so two photos arriving at
/// once cannot be assigned the same index.
pub struct ImageStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ImageStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Persist the original photo bytes, returning the path written
    pub fn save(&self, data: &[u8]) -> Result<PathBuf, ImageError> {
        let _guard = self.write_lock.lock().map_err(|_| ImageError::LockError)?;

        fs::create_dir_all(&self.dir)?;
        let index = self.count_files()?;
        let path = self.dir.join(format!("image_{index}.jpg"));
        fs::write(&path, data)?;

        info!("Saved photo to {:?}", path);
        Ok(path)
    }

    /// Number of files currently in the image directory
    fn count_files(&self) -> Result<usize, ImageError> {
        let count = fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_file())
            .count();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_sequential_filenames() {
        let temp = tempdir().unwrap();
        let store = ImageStore::new(temp.path());

        let first = store.save(b"jpg bytes").unwrap();
        let second = store.save(b"more jpg bytes").unwrap();

        assert_eq!(first.file_name().unwrap(), "image_0.jpg");
        assert_eq!(second.file_name().unwrap(), "image_1.jpg");
        assert_eq!(fs::read(&first).unwrap(), b"jpg bytes");
    }

    #[test]
    fn test_creates_directory_if_missing() {
        let temp = tempdir().unwrap();
        let store = ImageStore::new(temp.path().join("nested").join("images"));
        let path = store.save(b"data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_concurrent_saves_get_distinct_names() {
        let temp = tempdir().unwrap();
        let store = Arc::new(ImageStore::new(temp.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.save(b"x").unwrap())
            })
            .collect();

        let mut paths: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8);
    }
}
