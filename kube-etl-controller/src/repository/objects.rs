//! Object store repository
//!
//! Handles communication with the bucket that receives ingest batches:
//! - Listing keys under a prefix
//! - Fetching object bodies (manifests)
//! - Reading storage-computed content hashes
//! - Deleting consumed batch files

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use tracing::debug;

/// Maximum number of keys S3 accepts in one DeleteObjects request
const MAX_DELETE_BATCH: usize = 1000;

/// Repository trait for object-store operations
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists every key starting with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Fetches the body of an object
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Returns the storage-computed hash of an object, if the store has one
    async fn content_hash(&self, key: &str) -> Result<Option<String>>;

    /// Deletes all `keys` in one batched call
    ///
    /// Fails if any key could not be deleted.
    async fn delete(&self, keys: &[String]) -> Result<()>;
}

/// S3 implementation of ObjectStore
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Creates a new S3 object store
    ///
    /// # Arguments
    /// * `client` - Configured S3 client
    /// * `bucket` - Bucket receiving ingest batches
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Creates a store using the default AWS credential and region chain
    pub async fn from_env(bucket: String) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&sdk_config), bucket)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .with_context(|| {
                    format!("Failed to list objects in s3://{}/{}", self.bucket, prefix)
                })?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            // S3 only hands out a continuation token for truncated listings
            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        debug!("Listed {} key(s) under {}", keys.len(), prefix);
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to get object {}", key))?;

        let body = response
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read body of {}", key))?;

        Ok(body.into_bytes().to_vec())
    }

    async fn content_hash(&self, key: &str) -> Result<Option<String>> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to head object {}", key))?;

        Ok(response
            .e_tag()
            .map(|tag| tag.trim_matches('"').to_string()))
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        for chunk in keys.chunks(MAX_DELETE_BATCH) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to build object identifiers")?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .context("Failed to build delete request")?;

            let response = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .context("Failed to delete objects")?;

            let errors = response.errors();
            if let Some(first) = errors.first() {
                anyhow::bail!(
                    "Failed to delete {} object(s), first: {} ({})",
                    errors.len(),
                    first.key().unwrap_or("<unknown>"),
                    first.message().unwrap_or("no message")
                );
            }
        }

        Ok(())
    }
}
