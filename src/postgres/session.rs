// ABOUTME: Minimal database session interface used by the table pipeline
// ABOUTME: Implements SQL execution, COPY streaming to/from files and RLS lookup on tokio-postgres

use crate::error::Result;
use crate::migration::TableRef;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio_postgres::Client;

const COPY_CHUNK_SIZE: usize = 64 * 1024;

const ROW_SECURITY_QUERY: &str = "SELECT c.relrowsecurity
     FROM pg_catalog.pg_class c
     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
     WHERE n.nspname = $1 AND c.relname = $2";

/// The operations the table pipeline needs from one end of the migration
#[async_trait]
pub trait TableSession: Send + Sync {
    /// Run one or more statements that return no rows
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Run a `COPY ... TO STDOUT` statement, writing its output to `sink`.
    /// Returns the number of bytes written.
    async fn copy_out(&self, sql: &str, sink: &Path) -> Result<u64>;

    /// Run a `COPY ... FROM STDIN` statement fed from `source`.
    /// Returns the number of rows loaded.
    async fn copy_in(&self, sql: &str, source: &Path) -> Result<u64>;

    /// Whether row-level security is enabled on `table`; `false` if the
    /// table is not in the catalog
    async fn row_security_enabled(&self, table: &TableRef) -> Result<bool>;
}

#[async_trait]
impl TableSession for Client {
    async fn execute(&self, sql: &str) -> Result<()> {
        tracing::debug!("Executing: {}", sql);
        Client::batch_execute(self, sql).await?;
        Ok(())
    }

    async fn copy_out(&self, sql: &str, sink: &Path) -> Result<u64> {
        tracing::debug!("Streaming {} to {}", sql, sink.display());

        let stream = Client::copy_out(self, sql).await?;
        futures::pin_mut!(stream);

        let mut file = BufWriter::new(tokio::fs::File::create(sink).await?);
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn copy_in(&self, sql: &str, source: &Path) -> Result<u64> {
        tracing::debug!("Streaming {} into {}", source.display(), sql);

        let mut file = tokio::fs::File::open(source).await?;
        let sink = Client::copy_in::<_, Bytes>(self, sql).await?;
        futures::pin_mut!(sink);

        let mut buf = BytesMut::with_capacity(COPY_CHUNK_SIZE);
        loop {
            buf.reserve(COPY_CHUNK_SIZE);
            if file.read_buf(&mut buf).await? == 0 {
                break;
            }
            sink.send(buf.split().freeze()).await?;
        }

        let rows = sink.finish().await?;
        Ok(rows)
    }

    async fn row_security_enabled(&self, table: &TableRef) -> Result<bool> {
        let row = Client::query_opt(self, ROW_SECURITY_QUERY, &[&table.schema, &table.table])
            .await?;
        Ok(row.map(|r| r.get::<_, bool>(0)).unwrap_or(false))
    }
}
