use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;

use crate::{ObjectStore, S3Config, StoreError};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Attachments in an S3-compatible bucket, addressed path-style.
pub struct S3Store {
    bucket: Box<Bucket>,
    location: String,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    pub fn new(config: &S3Config) -> Result<Self, StoreError> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };
        let credentials = Credentials::new(
            Some(config.access_key_id.as_str()),
            Some(config.secret_access_key.as_str()),
            None,
            None,
            None,
        )
        .map_err(|e| StoreError::Config(format!("s3 credentials: {e}")))?;
        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StoreError::Config(format!("s3 bucket {}: {e}", config.bucket)))?
            .with_path_style();

        Ok(Self {
            bucket,
            location: format!("{}/{}", config.endpoint.trim_end_matches('/'), config.bucket),
        })
    }
}

/// Map an S3 status for `key` onto the store's error kinds.
fn check_status(action: &str, key: &str, status: u16) -> Result<(), StoreError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(StoreError::NotFound(key.to_string())),
        code => Err(StoreError::Internal(format!("s3 {action} {key}: status {code}"))),
    }
}

fn request_error(action: &str, key: &str, e: S3Error) -> StoreError {
    match e {
        S3Error::HttpFailWithBody(status, _) => check_status(action, key, status)
            .err()
            .unwrap_or_else(|| StoreError::Internal(format!("s3 {action} {key}: status {status}"))),
        other => StoreError::Internal(format!("s3 {action} {key}: {other}")),
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn describe(&self) -> String {
        format!("s3 ({})", self.location)
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        let content_type = match content_type.trim() {
            "" => FALLBACK_CONTENT_TYPE,
            ct => ct,
        };
        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| request_error("put", key, e))?;
        check_status("put", key, response.status_code())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let response = self
            .bucket
            .get_object(key)
            .await
            .map_err(|e| request_error("get", key, e))?;
        check_status("get", key, response.status_code())?;
        Ok(Bytes::from(response.to_vec()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let status = match self.bucket.delete_object(key).await {
            Ok(response) => response.status_code(),
            Err(S3Error::HttpFailWithBody(status, _)) => status,
            Err(e) => return Err(request_error("delete", key, e)),
        };
        match check_status("delete", key, status) {
            Err(StoreError::NotFound(_)) => Ok(()),
            other => other,
        }
    }
}
