use std::io::ErrorKind;
use std::path::PathBuf;

pub const UPLOAD_URL_PREFIX: &str = "/static/uploads";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid filename")]
    InvalidFilename,
    #[error("File too large: {0} bytes (max: {1} bytes)")]
    FileTooLarge(usize, usize),
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// An uploaded image kept on local disk until someone deletes it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub file_name: String,
    pub path: PathBuf,
    pub url: String,
}

/// Flat directory of uploads keyed by sanitized filename.
///
/// Two uploads with the same name overwrite each other; there is no
/// versioning and no locking between concurrent writers.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub async fn ensure_dir(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn validate_size(&self, size: usize) -> Result<(), StorageError> {
        if size > self.max_bytes {
            return Err(StorageError::FileTooLarge(size, self.max_bytes));
        }
        Ok(())
    }

    pub fn url_for(file_name: &str) -> String {
        format!("{}/{}", UPLOAD_URL_PREFIX, file_name)
    }

    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<StoredImage, StorageError> {
        self.validate_size(data.len())?;
        let file_name = sanitize_filename(original_name);
        if file_name.is_empty() {
            return Err(StorageError::InvalidFilename);
        }

        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, data).await?;
        log::info!("Saved upload {} ({} bytes)", path.display(), data.len());

        Ok(StoredImage {
            url: Self::url_for(&file_name),
            file_name,
            path,
        })
    }

    /// Maps a `/static/uploads/<name>` reference back to a file in this store.
    pub fn resolve(&self, image_path: &str) -> Option<PathBuf> {
        let prefix = UPLOAD_URL_PREFIX.trim_start_matches('/');
        let name = image_path
            .trim_start_matches('/')
            .strip_prefix(prefix)?
            .strip_prefix('/')?;
        if name.is_empty() || sanitize_filename(name) != name {
            return None;
        }
        Some(self.dir.join(name))
    }

    /// Best effort: returns whether a file was actually removed.
    pub async fn delete(&self, image_path: &str) -> Result<bool, StorageError> {
        let Some(path) = self.resolve(image_path) else {
            log::debug!("Ignoring delete for foreign path {}", image_path);
            return Ok(false);
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                log::info!("Deleted upload {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// ASCII-only port of werkzeug's `secure_filename`.
pub fn sanitize_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_matches_werkzeug_examples() {
        assert_eq!(sanitize_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(sanitize_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("leaf photo (1).jpg"), "leaf_photo_1.jpg");
        assert_eq!(sanitize_filename("daun_bawang.png"), "daun_bawang.png");
    }

    #[test]
    fn sanitize_drops_non_ascii_and_can_end_empty() {
        assert_eq!(sanitize_filename("bawang\u{e9}.jpg"), "bawang.jpg");
        assert_eq!(sanitize_filename("..."), "");
        assert_eq!(sanitize_filename("\u{1f9c5}"), "");
    }

    #[test]
    fn resolve_only_accepts_upload_urls() {
        let store = UploadStore::new("/srv/uploads", 1024);
        assert_eq!(
            store.resolve("/static/uploads/leaf.jpg"),
            Some(PathBuf::from("/srv/uploads/leaf.jpg"))
        );
        assert_eq!(
            store.resolve("static/uploads/leaf.jpg"),
            Some(PathBuf::from("/srv/uploads/leaf.jpg"))
        );
        assert_eq!(store.resolve("/static/uploads/../app.py"), None);
        assert_eq!(store.resolve("/static/style.css"), None);
        assert_eq!(store.resolve("/static/uploads/"), None);
        assert_eq!(store.resolve("/static/uploadsleaf.jpg"), None);
    }

    #[actix_web::test]
    async fn save_then_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"), 1024);
        store.ensure_dir().await.unwrap();

        let stored = store.save("my leaf.jpg", b"jpeg bytes").await.unwrap();
        assert_eq!(stored.file_name, "my_leaf.jpg");
        assert_eq!(stored.url, "/static/uploads/my_leaf.jpg");
        assert!(stored.path.exists());

        assert!(store.delete(&stored.url).await.unwrap());
        assert!(!stored.path.exists());
        assert!(!store.delete(&stored.url).await.unwrap());
    }

    #[actix_web::test]
    async fn same_name_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), 1024);

        store.save("leaf.png", b"first").await.unwrap();
        let second = store.save("leaf.png", b"second").await.unwrap();
        assert_eq!(std::fs::read(&second.path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[actix_web::test]
    async fn oversized_and_unnamed_uploads_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), 4);

        assert!(matches!(
            store.save("leaf.png", b"too many bytes").await,
            Err(StorageError::FileTooLarge(14, 4))
        ));
        assert!(matches!(
            store.save("../..", b"ok").await,
            Err(StorageError::InvalidFilename)
        ));
    }
}
