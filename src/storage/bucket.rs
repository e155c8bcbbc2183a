// ABOUTME: Bucket transfer pipeline: ensure bucket, enumerate, download and upsert each object
// ABOUTME: Copies objects one at a time and aborts on the first unexpected response

use crate::error::Result;
use crate::storage::api::{BucketCreation, StorageApi, UploadOutcome};
use crate::storage::transport::Transport;
use crate::utils::sanitize_identifier;

/// Counters for one bucket run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketTransfer {
    pub bucket: String,
    pub bucket_created: bool,
    /// Listing entries seen, including skipped ones
    pub listed: usize,
    pub copied: usize,
    /// Subset of `copied` that needed the PUT fallback
    pub overwritten: usize,
    pub bytes_copied: u64,
    /// Folder placeholders and entries without a name
    pub skipped_placeholders: usize,
    /// Listed objects the source reported as not found
    pub skipped_missing: usize,
    /// Objects with no content
    pub skipped_empty: usize,
}

/// Copy every object of `bucket` from `source` to `target`
///
/// The destination bucket is created first (an existing one is fine).
/// Objects are enumerated lazily and copied strictly one after another;
/// uploads are upserts, so re-running after an interruption re-copies
/// objects without harm. `on_object` is called with each copied name.
pub async fn migrate_bucket<S, T, F>(
    source: &StorageApi<S>,
    target: &StorageApi<T>,
    bucket: &str,
    page_size: usize,
    mut on_object: F,
) -> Result<BucketTransfer>
where
    S: Transport,
    T: Transport,
    F: FnMut(&str),
{
    let mut transfer = BucketTransfer {
        bucket: bucket.to_string(),
        ..Default::default()
    };

    match target.create_bucket(bucket).await? {
        BucketCreation::Created => {
            tracing::info!("✓ Created bucket '{}' on target", bucket);
            transfer.bucket_created = true;
        }
        BucketCreation::AlreadyExists => {
            tracing::info!("✓ Bucket '{}' already exists on target", bucket);
        }
    }

    let mut listing = source.list(bucket, page_size);
    while let Some(descriptor) = listing.next().await? {
        transfer.listed += 1;

        let Some(name) = descriptor.copyable_name() else {
            transfer.skipped_placeholders += 1;
            continue;
        };

        let content = match source.download(bucket, name).await? {
            Some(content) => content,
            None => {
                tracing::debug!("Skipping '{}': not found on source", sanitize_identifier(name));
                transfer.skipped_missing += 1;
                continue;
            }
        };
        if content.is_empty() {
            tracing::debug!("Skipping '{}': no content", sanitize_identifier(name));
            transfer.skipped_empty += 1;
            continue;
        }

        let size = content.len() as u64;
        if target.upload(bucket, name, content).await? == UploadOutcome::Overwritten {
            transfer.overwritten += 1;
        }
        transfer.copied += 1;
        transfer.bytes_copied += size;
        on_object(name);
    }

    tracing::info!(
        "✓ Bucket '{}': {} object(s) copied, {} skipped",
        bucket,
        transfer.copied,
        transfer.skipped_placeholders + transfer.skipped_missing + transfer.skipped_empty
    );
    Ok(transfer)
}
