//! Object storage access for delete files and metadata.
//!
//! Table-format paths are absolute URLs (`s3://bucket/warehouse/...`). The store
//! is already scoped to the bucket, so keys drop the `scheme://bucket/` prefix.

use crate::config::StorageConfig;
use crate::{Error, Result};
use bytes::Bytes;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use tracing::debug;

/// Object key for an absolute table-format path.
pub fn to_object_key(path: &str) -> &str {
    match path.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, key)| key).unwrap_or(""),
        None => path.trim_start_matches('/'),
    }
}

/// Build the object store described by configuration.
pub fn create_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    if let Some(ref path) = config.local_path {
        create_local_store(path)
    } else {
        create_s3_store(config)
    }
}

fn create_s3_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    use object_store::aws::AmazonS3Builder;

    let bucket = config
        .bucket
        .as_deref()
        .ok_or_else(|| Error::Config("Storage bucket is required".into()))?;

    let mut builder = AmazonS3Builder::new().with_bucket_name(bucket);

    if let Some(ref region) = config.region {
        builder = builder.with_region(region);
    }

    if let Some(ref access_key) = config.access_key_id {
        builder = builder.with_access_key_id(access_key);
    }

    if let Some(ref secret_key) = config.secret_access_key {
        builder = builder.with_secret_access_key(secret_key);
    }

    if let Some(ref endpoint) = config.endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }

    let store = builder
        .build()
        .map_err(|e| Error::Storage(format!("Failed to create S3 store: {}", e)))?;

    Ok(Arc::new(store))
}

fn create_local_store(path: &std::path::Path) -> Result<Arc<dyn ObjectStore>> {
    use object_store::local::LocalFileSystem;

    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| {
            Error::Storage(format!(
                "Failed to create local storage directory: {}",
                e
            ))
        })?;
    }

    let store = LocalFileSystem::new_with_prefix(path).map_err(|e| {
        Error::Storage(format!("Failed to create local file system store: {}", e))
    })?;

    Ok(Arc::new(store))
}

/// Write `data` at the key for `path`, replacing any existing object.
pub async fn put_file(store: &dyn ObjectStore, path: &str, data: Bytes) -> Result<()> {
    let key = ObjectPath::from(to_object_key(path));
    let size = data.len();

    store
        .put(&key, PutPayload::from_bytes(data))
        .await
        .map_err(|e| Error::Storage(format!("Failed to upload file to {}: {}", path, e)))?;

    debug!(path = %path, bytes = size, "Uploaded file");
    Ok(())
}

/// Read the object for `path`, `None` if it does not exist.
pub async fn get_file(store: &dyn ObjectStore, path: &str) -> Result<Option<Bytes>> {
    let key = ObjectPath::from(to_object_key(path));

    match store.get(&key).await {
        Ok(result) => Ok(Some(result.bytes().await?)),
        Err(object_store::Error::NotFound { .. }) => Ok(None),
        Err(e) => Err(Error::Storage(format!(
            "Failed to read file {}: {}",
            path, e
        ))),
    }
}
