// ABOUTME: Lazy, offset-paginated enumeration of the objects in a bucket
// ABOUTME: Pulls pages on demand and stops for good at the first empty page

use crate::error::Result;
use crate::storage::api::{StorageApi, StorageObjectDescriptor};
use crate::storage::transport::Transport;
use std::collections::VecDeque;

/// Pull-based cursor over a bucket listing
///
/// Pages are requested only when the buffered entries run out. The offset
/// advances by the number of entries received. An empty page ends the
/// enumeration and later calls to [`ObjectListing::next`] return `None`
/// without issuing requests; enumerating again needs a new listing.
pub struct ObjectListing<'a, T> {
    api: &'a StorageApi<T>,
    bucket: String,
    page_size: usize,
    offset: usize,
    buffer: VecDeque<StorageObjectDescriptor>,
    pages_fetched: usize,
    exhausted: bool,
}

impl<'a, T: Transport> ObjectListing<'a, T> {
    pub(crate) fn new(api: &'a StorageApi<T>, bucket: &str, page_size: usize) -> Self {
        Self {
            api,
            bucket: bucket.to_string(),
            page_size: page_size.max(1),
            offset: 0,
            buffer: VecDeque::new(),
            pages_fetched: 0,
            exhausted: false,
        }
    }

    pub async fn next(&mut self) -> Result<Option<StorageObjectDescriptor>> {
        loop {
            if let Some(descriptor) = self.buffer.pop_front() {
                return Ok(Some(descriptor));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self
                .api
                .list_page(&self.bucket, self.page_size, self.offset)
                .await?;
            self.pages_fetched += 1;
            tracing::debug!(
                "Listed {} object(s) in '{}' at offset {}",
                page.len(),
                self.bucket,
                self.offset
            );

            if page.is_empty() {
                self.exhausted = true;
            } else {
                self.offset += page.len();
                self.buffer.extend(page);
            }
        }
    }

    /// Drain the remaining entries into a vector
    pub async fn collect_all(mut self) -> Result<Vec<StorageObjectDescriptor>> {
        let mut all = Vec::new();
        while let Some(descriptor) = self.next().await? {
            all.push(descriptor);
        }
        Ok(all)
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Number of entries received so far
    pub fn offset(&self) -> usize {
        self.offset
    }
}
