//! S3 compatible object storage backend.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::{debug, info};

use super::{validate_key, ObjectReader, StorageBackend, StoredObject};
use crate::config::S3Config;
use crate::{Result, ShelfError};

/// Stores renditions as objects in a single bucket.
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_url: String,
}

impl S3Storage {
    /// Create a client from the configuration and the SDK environment chain.
    pub async fn new(config: &S3Config) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if !config.region.is_empty() {
            loader = loader.region(aws_config::Region::new(config.region.clone()));
        }
        let aws_config = loader.load().await;

        let mut builder = S3ConfigBuilder::from(&aws_config);
        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        let client = S3Client::from_conf(builder.build());

        let region = aws_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "us-east-1".to_string());
        let public_url = match config.public_url {
            Some(ref url) => url.trim_end_matches('/').to_string(),
            None => default_public_url(&config.bucket, &region),
        };

        info!(bucket = %config.bucket, region = %region, "S3 storage initialized");

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            public_url,
        })
    }

    /// Public URL for a key.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

fn default_public_url(bucket: &str, region: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com")
}

#[async_trait]
impl StorageBackend for S3Storage {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<StoredObject> {
        validate_key(key)?;
        let size = data.len() as i64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ShelfError::Storage(format!("put {key}: {e}")))?;

        debug!(key, size, "Stored object in bucket");
        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            size,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        // DeleteObject succeeds for keys that do not exist.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ShelfError::Storage(format!("delete {key}: {e}")))?;
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<Option<ObjectReader>> {
        validate_key(key)?;
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(Box::pin(output.body.into_async_read()))),
            Err(e) => match e.into_service_error() {
                GetObjectError::NoSuchKey(_) => Ok(None),
                other => Err(ShelfError::Storage(format!("get {key}: {other}"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_public_url() {
        assert_eq!(
            default_public_url("shelf", "eu-west-1"),
            "https://shelf.s3.eu-west-1.amazonaws.com"
        );
    }
}
