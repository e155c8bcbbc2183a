// ABOUTME: CLI entry point for supabase-migrator
// ABOUTME: Loads .env, parses commands and routes to the tables or bucket pipeline

use clap::{Parser, Subcommand};
use supabase_migrator::commands;
use supabase_migrator::config::{self, BucketMigrationConfig, TableMigrationConfig};

#[derive(Parser)]
#[command(name = "supabase-migrator")]
#[command(about = "Copy table data and storage buckets between Supabase projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy table contents with COPY (reads SRC_DB_CONNECTION and DEST_DB_CONNECTION)
    Tables {
        /// Comma-separated schema-qualified tables; defaults to the TABLES variable
        #[arg(long)]
        tables: Option<String>,
    },
    /// Copy the objects of one storage bucket (reads SRC_/DEST_SUPABASE_URL and _SERVICE_KEY)
    Bucket {
        /// Bucket id, e.g. receipts
        #[arg(long)]
        bucket: String,
        /// Objects requested per listing page
        #[arg(long, default_value_t = config::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    config::load_dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Tables { tables } => {
            let config = TableMigrationConfig::from_env(tables.as_deref())?;
            commands::tables(&config).await?;
        }
        Commands::Bucket { bucket, page_size } => {
            let config = BucketMigrationConfig::from_env(&bucket, page_size)?;
            commands::bucket(&config).await?;
        }
    }

    println!("Done.");
    Ok(())
}
