// ABOUTME: Storage API operations with the status handling the bucket pipeline relies on
// ABOUTME: Bucket creation, listing pages, downloads and upserting uploads with PUT fallback

use crate::error::{MigrateError, Result};
use crate::storage::listing::ObjectListing;
use crate::storage::transport::{Method, StatusCode, StorageRequest, StorageResponse, Transport};
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;

const BUCKET_TIMEOUT: Duration = Duration::from_secs(30);
const LIST_TIMEOUT: Duration = Duration::from_secs(60);
const OBJECT_TIMEOUT: Duration = Duration::from_secs(120);

/// One entry of a bucket listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StorageObjectDescriptor {
    #[serde(default)]
    pub name: Option<String>,
}

impl StorageObjectDescriptor {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
        }
    }

    /// Names ending in `/` mark folders and carry no content
    pub fn is_folder_placeholder(&self) -> bool {
        self.name.as_deref().is_some_and(|n| n.ends_with('/'))
    }

    /// Name of an object that has content worth copying
    pub fn copyable_name(&self) -> Option<&str> {
        if self.is_folder_placeholder() {
            return None;
        }
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketCreation {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Accepted by the upserting POST
    Uploaded,
    /// POST was refused with 409/400 and the PUT fallback succeeded
    Overwritten,
}

/// Storage operations of one project
pub struct StorageApi<T> {
    transport: T,
}

impl<T: Transport> StorageApi<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Create a private bucket; an existing bucket is not an error
    pub async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation> {
        let request = StorageRequest::new(Method::POST, ["bucket"])
            .header("Content-Type", "application/json")
            .json(serde_json::json!({ "name": bucket, "public": false }))
            .timeout(BUCKET_TIMEOUT);
        let response = self.transport.send(request).await?;

        match response.status {
            StatusCode::OK | StatusCode::CREATED => Ok(BucketCreation::Created),
            StatusCode::CONFLICT => Ok(BucketCreation::AlreadyExists),
            _ => Err(failure(format!("Creating bucket '{}'", bucket), &response)),
        }
    }

    /// Fetch one page of the bucket listing
    pub async fn list_page(
        &self,
        bucket: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StorageObjectDescriptor>> {
        let request = StorageRequest::new(Method::GET, ["object", "list", bucket])
            .query("limit", limit)
            .query("offset", offset)
            .timeout(LIST_TIMEOUT);
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(failure(
                format!("Listing bucket '{}' at offset {}", bucket, offset),
                &response,
            ));
        }
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Lazily enumerate every object in `bucket`
    pub fn list(&self, bucket: &str, page_size: usize) -> ObjectListing<'_, T> {
        ObjectListing::new(self, bucket, page_size)
    }

    /// Download an object; `None` if the API reports it as not found
    pub async fn download(&self, bucket: &str, name: &str) -> Result<Option<Bytes>> {
        let request =
            StorageRequest::new(Method::GET, object_segments(bucket, name)).timeout(OBJECT_TIMEOUT);
        let response = self.transport.send(request).await?;

        if response.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(failure(format!("Download of '{}'", name), &response));
        }
        Ok(Some(response.body))
    }

    /// Upload an object with `x-upsert: true`
    ///
    /// A 409 or 400 answer to the POST is treated as a conflict with an
    /// existing object and the same request is sent once more as PUT.
    pub async fn upload(&self, bucket: &str, name: &str, content: Bytes) -> Result<UploadOutcome> {
        let request = StorageRequest::new(Method::POST, object_segments(bucket, name))
            .header("x-upsert", "true")
            .bytes(content)
            .timeout(OBJECT_TIMEOUT);
        let fallback = StorageRequest {
            method: Method::PUT,
            ..request.clone()
        };

        let response = self.transport.send(request).await?;
        if response.is_success() {
            return Ok(UploadOutcome::Uploaded);
        }
        if response.status != StatusCode::CONFLICT && response.status != StatusCode::BAD_REQUEST {
            return Err(failure(format!("Upload of '{}'", name), &response));
        }

        tracing::debug!(
            "Upload of '{}' answered {}, retrying with PUT",
            name,
            response.status
        );
        let response = self.transport.send(fallback).await?;
        if !response.is_success() {
            return Err(failure(format!("Overwrite of '{}'", name), &response));
        }
        Ok(UploadOutcome::Overwritten)
    }
}

fn object_segments(bucket: &str, name: &str) -> Vec<String> {
    let mut segments = vec!["object".to_string(), bucket.to_string()];
    segments.extend(name.split('/').map(String::from));
    segments
}

fn failure(operation: String, response: &StorageResponse) -> MigrateError {
    MigrateError::transport(operation, response.status.as_u16(), &response.body)
}
