use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::{error::DisplayErrorContext, primitives::ByteStream};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use thiserror::Error;

/// StorageError
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key is already taken and the write did not allow overwriting it.
    #[error("object {bucket}/{key} already exists")]
    Conflict { bucket: String, key: String },
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// PutOptions
///
/// Per-object write options. `upsert = false` makes the write fail instead of replacing an
/// existing object.
#[derive(Debug, Clone)]
pub struct PutOptions {
    pub content_type: String,
    pub cache_control: String,
    pub upsert: bool,
}

/// StorageService
///
/// Contract for the object store. The real S3 client and the in-memory mock are
/// interchangeable behind it.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates `bucket` if it does not exist. Used for the local MinIO setup only.
    async fn ensure_bucket_exists(&self, bucket: &str);

    /// Stores `body` under `bucket/key` and returns the stored path.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<String, StorageError>;

    /// Public, unsigned URL of `bucket/key`.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// StorageState
pub type StorageState = Arc<dyn StorageService>;

fn join_public_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
}

/// S3StorageClient
///
/// AWS SDK client pointed at an S3-compatible endpoint: MinIO locally, the Supabase Storage
/// S3 gateway in production. Both need path-style addressing.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    public_base: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        public_base: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            public_base: public_base.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self, bucket: &str) {
        if let Err(e) = self.client.create_bucket().bucket(bucket).send().await {
            // Already-owned buckets land here too.
            tracing::debug!("create_bucket {}: {}", bucket, DisplayErrorContext(&e));
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<String, StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(&options.content_type)
            .cache_control(&options.cache_control);

        if !options.upsert {
            // Conditional write: rejected with 412 if the key exists.
            request = request.if_none_match("*");
        }

        match request.send().await {
            Ok(_) => Ok(key.to_string()),
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                if matches!(status, Some(409) | Some(412)) {
                    Err(StorageError::Conflict {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    })
                } else {
                    Err(StorageError::Backend(DisplayErrorContext(&e).to_string()))
                }
            }
        }
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        join_public_url(&self.public_base, bucket, key)
    }
}

/// StoredObject
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

/// MockStorageService
///
/// In-memory object store for tests. Honors `upsert = false` and counts write attempts so
/// tests can assert that validation failures never reach storage.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every write fails with a backend error.
    pub should_fail: bool,
    objects: Arc<Mutex<HashMap<(String, String), StoredObject>>>,
    put_calls: Arc<AtomicUsize>,
}

pub const MOCK_PUBLIC_BASE: &str = "http://localhost:9000";

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .ok()?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    /// Pre-populates a key, e.g. to provoke a conflict.
    pub fn seed(&self, bucket: &str, key: &str, body: Vec<u8>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(
                (bucket.to_string(), key.to_string()),
                StoredObject {
                    body,
                    content_type: "application/octet-stream".to_string(),
                    cache_control: String::new(),
                },
            );
        }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self, _bucket: &str) {}

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<String, StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(StorageError::Backend(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Backend("mock store poisoned".to_string()))?;
        let id = (bucket.to_string(), key.to_string());
        if !options.upsert && objects.contains_key(&id) {
            return Err(StorageError::Conflict {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        objects.insert(
            id,
            StoredObject {
                body,
                content_type: options.content_type.clone(),
                cache_control: options.cache_control.clone(),
            },
        );
        Ok(key.to_string())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        join_public_url(MOCK_PUBLIC_BASE, bucket, key)
    }
}
