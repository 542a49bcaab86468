//! Object storage for artwork originals and issued certificates.
//!
//! Production uses S3; development and tests keep objects in a local directory.

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use aws_sdk_s3::{error::DisplayErrorContext, primitives::ByteStream};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object {0} not found")]
    NotFound(String),

    #[error("invalid object key {0}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("s3 error: {0}")]
    S3(String),
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

pub type SharedStorage = Arc<dyn ObjectStorage>;

pub async fn build_storage(config: &StorageConfig) -> Result<SharedStorage, StorageError> {
    match config {
        StorageConfig::Local { root } => {
            fs::create_dir_all(root).await?;
            tracing::info!(root = %root.display(), "using local object storage");
            Ok(Arc::new(LocalStorage::new(root.clone())))
        }
        StorageConfig::S3 { bucket, prefix } => {
            tracing::info!(bucket = %bucket, "using s3 object storage");
            Ok(Arc::new(S3Storage::from_env(bucket.clone(), prefix.clone()).await))
        }
    }
}

pub fn product_image_key(product_id: Uuid, extension: &str) -> String {
    format!("products/{product_id}/original.{extension}")
}

pub fn certificate_key(order_id: Uuid, detail_id: Uuid) -> String {
    format!("certificates/{order_id}/{detail_id}.pdf")
}

pub fn content_type_for_key(key: &str) -> &'static str {
    match Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        tracing::debug!(key = %key, "stored object on disk");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(StoredObject {
                bytes,
                content_type: content_type_for_key(key).to_string(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Storage {
    /// Credentials and region come from the standard AWS environment chain.
    pub async fn from_env(bucket: String, prefix: Option<String>) -> Self {
        let sdk_config = aws_config::load_from_env().await;
        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket,
            prefix,
        }
    }

    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::S3(DisplayErrorContext(e).to_string()))?;
        tracing::debug!(bucket = %self.bucket, key = %key, "uploaded object to s3");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::S3(DisplayErrorContext(e).to_string())
                }
            })?;

        let content_type = output
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for_key(key).to_string());
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(StoredObject {
            bytes,
            content_type,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|e| StorageError::S3(DisplayErrorContext(e).to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_storage_round_trips_and_reports_missing_objects() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let key = certificate_key(Uuid::new_v4(), Uuid::new_v4());

        storage
            .put(&key, b"%PDF-1.3".to_vec(), "application/pdf")
            .await
            .unwrap();
        let object = storage.get(&key).await.unwrap();
        assert_eq!(object.bytes, b"%PDF-1.3");
        assert_eq!(object.content_type, "application/pdf");

        storage.delete(&key).await.unwrap();
        assert!(matches!(
            storage.get(&key).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn local_storage_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        for key in ["../secrets", "/etc/passwd", ""] {
            assert!(matches!(
                storage.get(key).await,
                Err(StorageError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn content_types_follow_extension() {
        let id = Uuid::new_v4();
        assert_eq!(content_type_for_key(&product_image_key(id, "JPG")), "image/jpeg");
        assert_eq!(content_type_for_key(&product_image_key(id, "png")), "image/png");
        assert_eq!(content_type_for_key("blob"), "application/octet-stream");
    }
}
