//! S3 (or S3-compatible, e.g. MinIO) object storage.

use super::{content_type_for, ObjectStorage, StorageError};
use crate::config::ObjectStorageConfig;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::{debug, info};

/// Build an S3 client from configuration.
///
/// Explicit credentials are used when both keys are set, otherwise the default AWS
/// credential chain applies.
pub async fn get_s3_client(config: &ObjectStorageConfig) -> Client {
    use aws_sdk_s3::config::Region;

    let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        use aws_sdk_s3::config::Credentials;

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "gallery_service_s3",
        );
        aws_config_builder = aws_config_builder.credentials_provider(credentials);
    }

    if let Some(endpoint) = &config.endpoint {
        aws_config_builder = aws_config_builder.endpoint_url(endpoint);
    }

    let aws_config = aws_config_builder.load().await;
    info!(bucket = %config.bucket, region = %config.region, "S3 client initialized");
    Client::new(&aws_config)
}

pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStorage {
    pub fn new(client: Client, config: &ObjectStorageConfig) -> Self {
        let public_base_url = config.public_base_url.clone().unwrap_or_else(|| {
            match &config.endpoint {
                Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), config.bucket),
                None => format!("https://{}.s3.{}.amazonaws.com", config.bucket, config.region),
            }
        });

        Self {
            client,
            bucket: config.bucket.clone(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, StorageError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::Provider(format!("Failed to read upload: {}", e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type_for(key))
            .send()
            .await
            .map_err(|e| StorageError::Provider(format!("Failed to upload to S3: {}", e)))?;

        debug!(bucket = %self.bucket, key = %key, "Object uploaded");
        Ok(self.url_for(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Provider(format!("Failed to delete from S3: {}", e)))?;

        debug!(bucket = %self.bucket, key = %key, "Object deleted");
        Ok(())
    }
}
