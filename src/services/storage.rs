use std::path::{Path, PathBuf};

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Blob storage for finished package artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload a local file under `name`. Returns the reference the artifact
    /// can later be downloaded with.
    async fn upload(&self, local_path: &Path, name: &str) -> Result<String, StorageError>;

    async fn download(&self, reference: &str) -> Result<Vec<u8>, StorageError>;
}

/// Make a name safe for use as an object key: whitespace and colons become
/// hyphens, anything else outside `[A-Za-z0-9._-]` is dropped.
pub fn blob_safe_name(name: &str) -> String {
    let mut safe = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                safe.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        match c {
            ':' => safe.push('-'),
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') => safe.push(c),
            _ => {}
        }
    }
    safe
}

/// Artifact store on Cloudflare R2 (S3-compatible).
pub struct R2ArtifactStore {
    bucket: Box<Bucket>,
}

impl R2ArtifactStore {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }
}

#[async_trait]
impl ArtifactStore for R2ArtifactStore {
    async fn upload(&self, local_path: &Path, name: &str) -> Result<String, StorageError> {
        let key = blob_safe_name(name);
        let data = tokio::fs::read(local_path).await?;
        tracing::info!(path = %local_path.display(), key = %key, bytes = data.len(), "Uploading artifact to R2");
        let response = self
            .bucket
            .put_object_with_content_type(&key, &data, ZIP_CONTENT_TYPE)
            .await
            .map_err(StorageError::S3)?;
        ensure_success(response.status_code(), response.as_slice())?;
        Ok(key)
    }

    async fn download(&self, reference: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.bucket.get_object(reference).await.map_err(StorageError::S3)?;
        if response.status_code() == 404 {
            return Err(StorageError::NotFound(reference.to_string()));
        }
        ensure_success(response.status_code(), response.as_slice())?;
        Ok(response.to_vec())
    }
}

/// `rust-s3` is built without `fail-on-err`, so error statuses come back as
/// `Ok` responses.
fn ensure_success(code: u16, body: &[u8]) -> Result<(), StorageError> {
    if (200..300).contains(&code) {
        Ok(())
    } else {
        Err(StorageError::Status {
            code,
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }
}

/// Artifact store that copies files into a local directory. Used in local
/// development when no R2 bucket is configured. References are file names
/// under the root, so any process sharing the directory can download them.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn upload(&self, local_path: &Path, name: &str) -> Result<String, StorageError> {
        let key = blob_safe_name(name);
        tokio::fs::create_dir_all(&self.root).await?;
        let destination = self.root.join(&key);
        tokio::fs::copy(local_path, &destination).await?;
        tracing::info!(path = %destination.display(), key = %key, "Stored artifact locally");
        Ok(key)
    }

    async fn download(&self, reference: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.root.join(blob_safe_name(reference));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("Storage responded with status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
