use crate::models::{StoredEntry, StoredFile};
use crate::utils::validation::{
    generate_stored_name, retrieval_url, validate_extension, validate_identifier,
};
use anyhow::Result;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

const WRITE_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("'{0}' does not have an .ifc extension")]
    InvalidExtension(String),

    #[error("file exceeds the maximum allowed size of {max} bytes")]
    TooLarge { max: u64 },

    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// An opened stored file ready to be streamed back
pub struct StoredObject {
    pub file: File,
    pub size_bytes: u64,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Persists one uploaded file under a freshly generated name.
    async fn store_stream<'a>(
        &self,
        original_name: &str,
        reader: Pin<Box<dyn AsyncRead + Send + 'a>>,
    ) -> Result<StoredFile, StoreError>;

    /// Opens a stored file by identifier. Unknown or malformed identifiers yield `None`.
    async fn open(&self, id: &str) -> Result<Option<StoredObject>>;

    async fn delete_file(&self, id: &str) -> Result<()>;

    async fn list_files(&self) -> Result<Vec<StoredEntry>>;
}

/// Upload store backed by a local directory; the directory listing is the index.
pub struct LocalStorageService {
    root: PathBuf,
    max_file_size: u64,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            root: root.into(),
            max_file_size,
        }
    }

    async fn write_body<'a>(
        &self,
        path: &Path,
        mut reader: Pin<Box<dyn AsyncRead + Send + 'a>>,
    ) -> Result<u64, StoreError> {
        let mut file = File::create(path).await?;
        let mut buffer = vec![0u8; WRITE_CHUNK_SIZE];
        let mut total: u64 = 0;

        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            total += read as u64;
            if total > self.max_file_size {
                return Err(StoreError::TooLarge {
                    max: self.max_file_size,
                });
            }
            file.write_all(&buffer[..read]).await?;
        }

        file.flush().await?;
        Ok(total)
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn store_stream<'a>(
        &self,
        original_name: &str,
        reader: Pin<Box<dyn AsyncRead + Send + 'a>>,
    ) -> Result<StoredFile, StoreError> {
        validate_extension(original_name)
            .map_err(|_| StoreError::InvalidExtension(original_name.to_string()))?;

        fs::create_dir_all(&self.root).await?;

        let generated_name = generate_stored_name(original_name);
        let path = self.root.join(&generated_name);

        let size_bytes = match self.write_body(&path, reader).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&path).await {
                    tracing::warn!("Failed to remove partial upload {:?}: {}", path, cleanup);
                }
                return Err(e);
            }
        };

        tracing::info!(
            "💾 Stored '{}' as {} ({} bytes)",
            original_name,
            generated_name,
            size_bytes
        );

        Ok(StoredFile {
            retrieval_url: retrieval_url(&generated_name),
            storage_path: path.to_string_lossy().into_owned(),
            generated_name,
            original_name: original_name.to_string(),
            size_bytes,
        })
    }

    async fn open(&self, id: &str) -> Result<Option<StoredObject>> {
        if let Err(e) = validate_identifier(id) {
            tracing::warn!("Rejected file identifier {:?}: {}", id, e);
            return Ok(None);
        }

        let path = self.root.join(id);
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_file() {
            return Ok(None);
        }

        let file = File::open(&path).await?;
        Ok(Some(StoredObject {
            file,
            size_bytes: metadata.len(),
        }))
    }

    async fn delete_file(&self, id: &str) -> Result<()> {
        validate_identifier(id)?;
        fs::remove_file(self.root.join(id)).await?;
        Ok(())
    }

    async fn list_files(&self) -> Result<Vec<StoredEntry>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            entries.push(StoredEntry {
                name,
                size_bytes: metadata.len(),
                modified: metadata.modified()?.into(),
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: &'static [u8]) -> Pin<Box<dyn AsyncRead + Send + 'static>> {
        Box::pin(data)
    }

    #[tokio::test]
    async fn test_store_creates_root_and_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nested").join("uploads");
        let storage = LocalStorageService::new(&root, 1024);

        let stored = storage
            .store_stream("model.ifc", reader(b"ISO-10303-21;"))
            .await
            .unwrap();

        assert!(root.is_dir());
        assert_eq!(stored.size_bytes, 13);
        assert_eq!(stored.original_name, "model.ifc");
        assert!(stored.generated_name.ends_with("-model.ifc"));
        assert_eq!(
            stored.retrieval_url,
            format!("/api/files/{}", stored.generated_name)
        );

        let mut object = storage.open(&stored.generated_name).await.unwrap().unwrap();
        assert_eq!(object.size_bytes, 13);
        let mut content = Vec::new();
        object.file.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"ISO-10303-21;");
    }

    #[tokio::test]
    async fn test_store_rejects_extension_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(tmp.path().join("uploads"), 1024);

        let err = storage
            .store_stream("model.txt", reader(b"hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidExtension(_)));
        assert!(storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_enforces_size_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(tmp.path(), 4);

        let err = storage
            .store_stream("big.ifc", reader(b"0123456789"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::TooLarge { max: 4 }));
        assert!(storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_upload_removes_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(tmp.path(), 1024);

        let chunks: Vec<std::io::Result<bytes::Bytes>> = vec![
            Ok(bytes::Bytes::from_static(b"ISO-10303-21;")),
            Err(std::io::Error::new(
                ErrorKind::ConnectionReset,
                "client went away",
            )),
        ];
        let body = tokio_util::io::StreamReader::new(futures::stream::iter(chunks));

        let err = storage
            .store_stream("cut.ifc", Box::pin(body))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Io(ref e) if e.kind() == ErrorKind::ConnectionReset));
        assert!(storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_uploads_get_distinct_names() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(tmp.path(), 1024);

        let (a, b) = tokio::join!(
            storage.store_stream("same.ifc", reader(b"a")),
            storage.store_stream("same.ifc", reader(b"b")),
        );

        assert_ne!(a.unwrap().generated_name, b.unwrap().generated_name);
        assert_eq!(storage.list_files().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_open_unknown_or_malicious_identifier() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("uploads");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(tmp.path().join("secret.ifc"), b"top secret").unwrap();

        let storage = LocalStorageService::new(&root, 1024);

        assert!(storage.open("doesnotexist").await.unwrap().is_none());
        assert!(storage.open("../secret.ifc").await.unwrap().is_none());
        assert!(storage.open("..").await.unwrap().is_none());
        assert!(storage.open("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(tmp.path().join("never-created"), 1024);
        assert!(storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_file() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(tmp.path(), 1024);

        let stored = storage
            .store_stream("gone.IFC", reader(b"x"))
            .await
            .unwrap();
        storage.delete_file(&stored.generated_name).await.unwrap();

        assert!(storage.open(&stored.generated_name).await.unwrap().is_none());
        assert!(storage.delete_file("../outside").await.is_err());
    }
}
