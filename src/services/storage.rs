use anyhow::Result;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A document persisted in the object store. Created once per successful
/// write and never updated in place; a re-upload produces a new key.
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    pub key: String,
    pub location: String,
    pub bucket: String,
    pub size: i64,
    pub content_type: String,
}

/// Object storage seam of the gateway. The gateway only needs "put bytes,
/// get back a durable location"; everything else about the store is opaque.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist `data` under `key` with the given content type.
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str)
        -> Result<StoredObject>;

    /// Check whether an object exists under `key`.
    async fn object_exists(&self, key: &str) -> Result<bool>;
}

/// S3-backed store.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    location_base: String,
}

impl S3ObjectStore {
    /// `endpoint` is a custom path-style endpoint (MinIO); when absent,
    /// locations use the virtual-hosted AWS URL for `region`.
    pub fn new(client: Client, bucket: String, region: &str, endpoint: Option<&str>) -> Self {
        let location_base = match endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
        };
        Self {
            client,
            bucket,
            location_base,
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<StoredObject> {
        let size = data.len() as i64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await?;

        Ok(StoredObject {
            key: key.to_string(),
            location: format!("{}/{}", self.location_base, key),
            bucket: self.bucket.clone(),
            size,
            content_type: content_type.to_string(),
        })
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!(service_error))
                }
            }
        }
    }
}

/// In-process store for development and tests.
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<HashMap<String, (Bytes, String)>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: String) -> Self {
        Self {
            bucket,
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<StoredObject> {
        let size = data.len() as i64;
        self.objects
            .write()
            .await
            .insert(key.to_string(), (data, content_type.to_string()));

        Ok(StoredObject {
            key: key.to_string(),
            location: format!("memory://{}/{}", self.bucket, key),
            bucket: self.bucket.clone(),
            size,
            content_type: content_type.to_string(),
        })
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_put_and_exists() {
        let store = MemoryObjectStore::new("test-bucket".to_string());

        let stored = store
            .put_object(
                "uploads/report-1.pdf",
                Bytes::from_static(b"%PDF-1.4"),
                "application/pdf",
            )
            .await
            .unwrap();

        assert_eq!(stored.key, "uploads/report-1.pdf");
        assert_eq!(stored.bucket, "test-bucket");
        assert_eq!(stored.location, "memory://test-bucket/uploads/report-1.pdf");
        assert_eq!(stored.size, 8);
        assert_eq!(stored.content_type, "application/pdf");

        assert!(store.object_exists("uploads/report-1.pdf").await.unwrap());
        assert!(!store.object_exists("uploads/missing.pdf").await.unwrap());
        assert_eq!(store.object_count().await, 1);
    }
}
