// ABOUTME: Table transfer pipeline: COPY out to a CSV staging file, truncate, COPY in
// ABOUTME: Processes tables strictly in order and stops at the first failure

use crate::error::Result;
use crate::migration::row_security::with_row_security_suspended;
use crate::migration::TableRef;
use crate::postgres::TableSession;
use std::path::{Path, PathBuf};

/// Outcome of migrating one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTransfer {
    pub table: TableRef,
    /// Size of the CSV staging artifact, header included
    pub staged_bytes: u64,
    pub rows_loaded: u64,
    /// Whether row level security had to be suspended for the load
    pub row_security_suspended: bool,
}

/// Stream the full contents of `table` on `source` into a CSV file in
/// `staging_dir`, returning the file path and its size
pub async fn extract_table<S>(
    source: &S,
    table: &TableRef,
    staging_dir: &Path,
) -> Result<(PathBuf, u64)>
where
    S: TableSession + ?Sized,
{
    let artifact = staging_dir.join(table.staging_file_name());
    let sql = format!(
        "COPY {} TO STDOUT WITH (FORMAT csv, HEADER true)",
        table.quoted()
    );
    let bytes = source.copy_out(&sql, &artifact).await?;
    Ok((artifact, bytes))
}

/// Replace the contents of `table` on `target` with the rows in `artifact`
///
/// Truncation restarts identity columns and cascades to dependent tables.
/// Truncate and import are not wrapped in a transaction: if the import
/// fails the table is left empty. Row level security is suspended around
/// both statements and restored on every return path.
pub async fn load_table<T>(target: &T, table: &TableRef, artifact: &Path) -> Result<(u64, bool)>
where
    T: TableSession + ?Sized,
{
    let truncate = format!(
        "TRUNCATE TABLE {} RESTART IDENTITY CASCADE",
        table.quoted()
    );
    let copy_in = format!(
        "COPY {} FROM STDIN WITH (FORMAT csv, HEADER true)",
        table.quoted()
    );

    with_row_security_suspended(target, table, move || async move {
        target.execute(&truncate).await?;
        target.copy_in(&copy_in, artifact).await
    })
    .await
}

/// Migrate one table from `source` to `target` through `staging_dir`
pub async fn migrate_table<S, T>(
    source: &S,
    target: &T,
    table: &TableRef,
    staging_dir: &Path,
) -> Result<TableTransfer>
where
    S: TableSession + ?Sized,
    T: TableSession + ?Sized,
{
    tracing::info!("  Exporting {} from source...", table);
    let (artifact, staged_bytes) = extract_table(source, table, staging_dir).await?;
    tracing::debug!("Staged {} bytes in {}", staged_bytes, artifact.display());

    tracing::info!("  Reloading {} on target...", table);
    let (rows_loaded, row_security_suspended) = load_table(target, table, &artifact).await?;

    Ok(TableTransfer {
        table: table.clone(),
        staged_bytes,
        rows_loaded,
        row_security_suspended,
    })
}

/// Migrate every table in `tables` in the given order
///
/// Each name is parsed just before its table is processed, so a malformed
/// name stops the run after the tables listed before it were migrated.
/// `on_table` is called after each table completes.
pub async fn migrate_tables<S, T, F>(
    source: &S,
    target: &T,
    tables: &[String],
    staging_dir: &Path,
    mut on_table: F,
) -> Result<Vec<TableTransfer>>
where
    S: TableSession + ?Sized,
    T: TableSession + ?Sized,
    F: FnMut(&TableTransfer),
{
    let mut transfers = Vec::with_capacity(tables.len());

    for (idx, qualified) in tables.iter().enumerate() {
        let table = TableRef::parse(qualified)?;
        tracing::info!("Migrating table {}/{}: {}", idx + 1, tables.len(), table);

        let transfer = migrate_table(source, target, &table, staging_dir).await?;
        tracing::info!(
            "✓ {} migrated ({} rows)",
            transfer.table,
            transfer.rows_loaded
        );

        on_table(&transfer);
        transfers.push(transfer);
    }

    Ok(transfers)
}
