// ABOUTME: Bucket command - copy a storage bucket between two Supabase projects
// ABOUTME: Builds the two storage clients and runs the bucket pipeline with a spinner

use crate::config::BucketMigrationConfig;
use crate::storage::{self, ReqwestTransport, StorageApi};
use crate::utils::sanitize_identifier;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Copy every object of the configured bucket from source to target
///
/// Creates the bucket on target if needed, then downloads and uploads each
/// object in listing order. Uploads are upserts, so the command can simply
/// be re-run after an interruption.
pub async fn bucket(config: &BucketMigrationConfig) -> Result<()> {
    tracing::info!("Starting migration of bucket '{}'...", config.bucket);

    let http = reqwest::Client::new();
    let source = StorageApi::new(
        ReqwestTransport::with_client(http.clone(), &config.source)
            .context("Invalid source project URL")?,
    );
    let target = StorageApi::new(
        ReqwestTransport::with_client(http, &config.target)
            .context("Invalid target project URL")?,
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {pos} copied {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = storage::migrate_bucket(
        &source,
        &target,
        &config.bucket,
        config.page_size,
        |name| {
            spinner.set_message(sanitize_identifier(name));
            spinner.inc(1);
        },
    )
    .await;
    spinner.finish_and_clear();

    let transfer =
        result.with_context(|| format!("Failed to migrate bucket '{}'", config.bucket))?;

    tracing::info!(
        "✅ Bucket '{}' migrated: {} listed, {} copied ({} via overwrite, {} bytes)",
        transfer.bucket,
        transfer.listed,
        transfer.copied,
        transfer.overwritten,
        transfer.bytes_copied
    );
    if transfer.skipped_missing > 0 {
        tracing::warn!(
            "⚠ {} listed object(s) were not found on source and were skipped",
            transfer.skipped_missing
        );
    }
    Ok(())
}
