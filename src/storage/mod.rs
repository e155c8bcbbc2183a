// ABOUTME: Storage bucket migration module
// ABOUTME: Exports the storage transport, API operations, lazy listing and bucket pipeline

pub mod api;
pub mod bucket;
pub mod listing;
pub mod transport;

pub use api::{BucketCreation, StorageApi, StorageObjectDescriptor, UploadOutcome};
pub use bucket::{migrate_bucket, BucketTransfer};
pub use listing::ObjectListing;
pub use transport::{
    Method, ReqwestTransport, RequestBody, StatusCode, StorageRequest, StorageResponse, Transport,
};
