// ABOUTME: Run configuration assembled from CLI flags and environment variables
// ABOUTME: Validates that required credentials, endpoints and table lists are present

use crate::error::{MigrateError, Result};
use crate::utils::split_list;

pub const SRC_DB_CONNECTION: &str = "SRC_DB_CONNECTION";
pub const DEST_DB_CONNECTION: &str = "DEST_DB_CONNECTION";
pub const TABLES: &str = "TABLES";
pub const SRC_SUPABASE_URL: &str = "SRC_SUPABASE_URL";
pub const SRC_SUPABASE_SERVICE_KEY: &str = "SRC_SUPABASE_SERVICE_KEY";
pub const DEST_SUPABASE_URL: &str = "DEST_SUPABASE_URL";
pub const DEST_SUPABASE_SERVICE_KEY: &str = "DEST_SUPABASE_SERVICE_KEY";

/// Default number of objects requested per listing page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Load a `.env` file from the working directory if one exists
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to read .env file: {}", e),
    }
}

/// Settings for the `tables` command
#[derive(Debug, Clone, PartialEq)]
pub struct TableMigrationConfig {
    pub source_dsn: String,
    pub target_dsn: String,
    pub tables: Vec<String>,
}

impl TableMigrationConfig {
    /// Build from the `--tables` flag, falling back to the `TABLES` variable
    pub fn from_env(tables_flag: Option<&str>) -> Result<Self> {
        Self::resolve(tables_flag, |name| std::env::var(name).ok())
    }

    pub fn resolve<F>(tables_flag: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source_dsn = non_empty(&lookup, SRC_DB_CONNECTION);
        let target_dsn = non_empty(&lookup, DEST_DB_CONNECTION);
        let (source_dsn, target_dsn) = match (source_dsn, target_dsn) {
            (Some(s), Some(t)) => (s, t),
            _ => {
                return Err(MigrateError::missing(format!(
                    "{} or {}",
                    SRC_DB_CONNECTION, DEST_DB_CONNECTION
                )))
            }
        };

        let tables = match tables_flag.map(split_list).filter(|t| !t.is_empty()) {
            Some(tables) => tables,
            None => lookup(TABLES)
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
        };
        if tables.is_empty() {
            return Err(MigrateError::missing(format!(
                "no tables specified, use --tables or set {}",
                TABLES
            )));
        }

        Ok(Self {
            source_dsn,
            target_dsn,
            tables,
        })
    }
}

/// Base URL and service key of one storage project
#[derive(Clone, PartialEq)]
pub struct StorageEndpoint {
    pub url: String,
    pub service_key: String,
}

impl std::fmt::Debug for StorageEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEndpoint")
            .field("url", &self.url)
            .field("service_key", &"<redacted>")
            .finish()
    }
}

/// Settings for the `bucket` command
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMigrationConfig {
    pub source: StorageEndpoint,
    pub target: StorageEndpoint,
    pub bucket: String,
    pub page_size: usize,
}

impl BucketMigrationConfig {
    pub fn from_env(bucket: &str, page_size: usize) -> Result<Self> {
        Self::resolve(bucket, page_size, |name| std::env::var(name).ok())
    }

    pub fn resolve<F>(bucket: &str, page_size: usize, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| {
            non_empty(&lookup, name)
                .ok_or_else(|| MigrateError::missing(format!("required env {}", name)))
        };

        let source = StorageEndpoint {
            url: require(SRC_SUPABASE_URL)?,
            service_key: require(SRC_SUPABASE_SERVICE_KEY)?,
        };
        let target = StorageEndpoint {
            url: require(DEST_SUPABASE_URL)?,
            service_key: require(DEST_SUPABASE_SERVICE_KEY)?,
        };

        let bucket = bucket.trim();
        if bucket.is_empty() {
            return Err(MigrateError::missing("--bucket"));
        }
        if page_size == 0 {
            return Err(MigrateError::InvalidInput(
                "page size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            source,
            target,
            bucket: bucket.to_string(),
            page_size,
        })
    }
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
