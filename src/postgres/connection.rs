// ABOUTME: PostgreSQL connection utilities for Supabase projects
// ABOUTME: Handles TLS setup, friendly connection errors and the connection driver task

use crate::utils;
use anyhow::{Context, Result};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::time::Duration;
use tokio_postgres::Client;

/// Connect to a PostgreSQL database with TLS support
///
/// The returned client is driven by a background task that lives as long
/// as the client; one client is used per side for the whole run.
pub async fn connect(connection_string: &str) -> Result<Client> {
    connection_string
        .parse::<tokio_postgres::Config>()
        .context(
            "Invalid connection string format. Expected a postgresql:// URL or key=value pairs",
        )?;

    let tls_connector = TlsConnector::builder()
        .build()
        .context("Failed to build TLS connector")?;
    let tls = MakeTlsConnector::new(tls_connector);

    let (client, connection) = tokio_postgres::connect(connection_string, tls)
        .await
        .map_err(|e| describe_connect_error(&e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    Ok(client)
}

/// Connect with automatic retry for transient failures
pub async fn connect_with_retry(connection_string: &str) -> Result<Client> {
    utils::retry_with_backoff(
        || connect(connection_string),
        3,
        Duration::from_secs(1),
    )
    .await
    .context("Failed to connect after retries")
}

fn describe_connect_error(error_msg: &str) -> anyhow::Error {
    if error_msg.contains("password authentication failed") {
        anyhow::anyhow!(
            "Authentication failed: Invalid username or password.\n\
             Please verify the database password of the Supabase project."
        )
    } else if error_msg.contains("database") && error_msg.contains("does not exist") {
        anyhow::anyhow!("Database does not exist: {}", error_msg)
    } else if error_msg.contains("Connection refused") || error_msg.contains("could not connect") {
        anyhow::anyhow!(
            "Connection refused: Unable to reach database server.\n\
             Please check:\n\
             - The host and port are correct\n\
             - The project is not paused\n\
             - Network restrictions allow connections from this host\n\
             Error: {}",
            error_msg
        )
    } else if error_msg.contains("timeout") || error_msg.contains("timed out") {
        anyhow::anyhow!(
            "Connection timeout: Database server did not respond in time.\n\
             Error: {}",
            error_msg
        )
    } else if error_msg.contains("SSL") || error_msg.contains("TLS") {
        anyhow::anyhow!(
            "TLS/SSL error: Failed to establish secure connection.\n\
             Error: {}",
            error_msg
        )
    } else {
        anyhow::anyhow!("Failed to connect to database: {}", error_msg)
    }
}
