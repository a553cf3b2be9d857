use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A JPEG written to the cache directory, deleted when dropped
#[derive(Debug)]
pub struct TempJpeg {
    path: PathBuf,
}

impl TempJpeg {
    /// Write `jpeg` as `injury_detection_<millis>.jpg` under `dir`, creating `dir` if needed
    pub async fn write(dir: &Path, millis: i64, jpeg: &[u8]) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("injury_detection_{}.jpg", millis));
        tokio::fs::write(&path, jpeg).await?;
        debug!("Wrote {} bytes to {}", jpeg.len(), path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "capture.jpg".to_string())
    }
}

impl Drop for TempJpeg {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temporary image {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove temporary image {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("cache");

        let temp = TempJpeg::write(&cache, 1700000000123, &[0xFF, 0xD8, 0xFF, 0xD9])
            .await
            .unwrap();
        let path = temp.path().to_path_buf();
        assert_eq!(temp.file_name(), "injury_detection_1700000000123.jpg");
        assert!(path.exists());

        drop(temp);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let temp = TempJpeg::write(dir.path(), 1, &[0]).await.unwrap();
        std::fs::remove_file(temp.path()).unwrap();
        drop(temp);
    }
}
