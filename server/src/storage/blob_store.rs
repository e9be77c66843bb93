//! Content-addressed upload storage
//!
//! Uploaded files are stored under their SHA-256 hash, keeping the original
//! extension: `uploads/{hash}.{ext}`. The value saved on a row is the public
//! path, e.g. `/uploads/abcd1234....png`. Identical bytes always resolve to
//! the same file.

use crate::config::UPLOADS_URL_PREFIX;
use crate::error::{AppError, Result};
use crate::validation::UploadedFile;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A file placed in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub hash: String,
    /// Public path to save on the owning row
    pub public_path: String,
    /// False when identical bytes were already present
    pub created: bool,
}

/// Content-addressed blob store
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the upload directory if needed
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("Upload store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Store an uploaded file, returning where it lives.
    pub async fn store(&self, file: &UploadedFile) -> Result<StoredBlob> {
        let hash = calculate_hash(&file.data);
        let file_name = match file.extension() {
            Some(ext) => format!("{}.{}", hash, ext),
            None => hash.clone(),
        };
        let path = self.root.join(&file_name);
        let public_path = format!("{}/{}", UPLOADS_URL_PREFIX, file_name);

        if fs::try_exists(&path).await? {
            tracing::debug!("Upload already exists: {}", file_name);
            return Ok(StoredBlob {
                hash,
                public_path,
                created: false,
            });
        }

        // Write to a uniquely named temp file, then rename into place
        let temp_path = self.root.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let mut out = fs::File::create(&temp_path).await?;
        out.write_all(&file.data).await?;
        out.sync_all().await?;
        drop(out);

        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Stored upload: {} ({} bytes)", file_name, file.data.len());

        Ok(StoredBlob {
            hash,
            public_path,
            created: true,
        })
    }

    /// Remove a stored file by its public path. Missing files are ignored.
    pub async fn remove(&self, public_path: &str) -> Result<()> {
        let path = self.resolve(public_path)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Removed upload: {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Map a public path back onto the upload directory.
    pub fn resolve(&self, public_path: &str) -> Result<PathBuf> {
        let file_name = public_path
            .strip_prefix(UPLOADS_URL_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| {
                !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '.')
                    && !name.starts_with('.')
            })
            .ok_or_else(|| AppError::BlobStore(format!("Not an upload path: {}", public_path)))?;

        Ok(self.root.join(file_name))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// SHA-256 of the data as lowercase hex
pub fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
