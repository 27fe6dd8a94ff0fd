// =============================================================================
// IMPORT - Catalog spreadsheet import
// =============================================================================
// Usage:
//   import <path-to-csv> [--schema woocommerce|key-catalog] [--dry-run]
//                        [--batch-size N] [--pause-ms N]
//
// Exit code 0 when the file was processed (even if it held no rows or some
// rows failed), 1 on bad arguments, a missing file, or a configuration or
// connection failure.
// =============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info};

use catalog_service::config::Config;
use catalog_service::db::Database;
use catalog_service::importer::{persist_products, ImportOptions, ImportReport, ProductRows};
use catalog_service::init_tracing;
use catalog_service::store::{CatalogStore, MemoryStore};
use catalog_service::vendor::VendorSchema;

#[derive(Debug, Parser)]
#[command(name = "import", version, about = "Import a vendor CSV export into the product catalog")]
struct Cli {
    /// CSV export with a header row
    path: PathBuf,

    /// Column layout of the export
    #[arg(long, value_enum, default_value_t = VendorSchema::Woocommerce)]
    schema: VendorSchema,

    /// Parse and count rows without touching the database
    #[arg(long)]
    dry_run: bool,

    /// Rows per batch (default: IMPORT_BATCH_SIZE, or 10)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Pause between batches in milliseconds (default: IMPORT_BATCH_PAUSE_MS, or 1000)
    #[arg(long)]
    pause_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_tracing(false);

    match run(cli).await {
        Ok(report) => {
            info!(
                imported = report.imported,
                skipped = report.skipped,
                errors = report.errors,
                "Import finished"
            );
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = ?err, "Import failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ImportReport> {
    if !cli.path.is_file() {
        bail!("CSV file not found: {}", cli.path.display());
    }

    let rows = ProductRows::from_path(&cli.path, cli.schema)
        .with_context(|| format!("Failed to open {}", cli.path.display()))?;

    info!(
        path = %cli.path.display(),
        schema = ?cli.schema,
        dry_run = cli.dry_run,
        "Importing products"
    );

    if cli.dry_run {
        let store = MemoryStore::new();
        let options = ImportOptions {
            batch_size: cli.batch_size.unwrap_or(ImportOptions::default().batch_size),
            pause: Duration::ZERO,
        };
        return Ok(persist_products(&store, rows, &options).await);
    }

    let config = Config::from_env()?;
    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;
    if !db.health_check().await {
        bail!("Database is not reachable");
    }

    let options = ImportOptions {
        batch_size: cli.batch_size.unwrap_or(config.import_batch_size),
        pause: cli
            .pause_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.import_batch_pause()),
    };
    Ok(persist_products(&db, rows, &options).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("import").chain(args.iter().copied()))
    }

    #[test]
    fn path_is_required() {
        let err = cli(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_options() {
        let parsed = cli(&["items.csv", "--schema", "key-catalog", "--dry-run", "--batch-size", "25"]).unwrap();
        assert_eq!(parsed.schema, VendorSchema::KeyCatalog);
        assert!(parsed.dry_run);
        assert_eq!(parsed.batch_size, Some(25));
        assert_eq!(parsed.pause_ms, None);
    }

    #[test]
    fn rejects_unknown_schema() {
        assert!(cli(&["items.csv", "--schema", "shopify"]).is_err());
    }

    #[tokio::test]
    async fn missing_file_fails() {
        let parsed = cli(&["/definitely/not/here.csv", "--dry-run"]).unwrap();
        assert!(run(parsed).await.is_err());
    }

    #[tokio::test]
    async fn dry_run_counts_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SKU,Name,Regular price,In stock?,Stock").unwrap();
        writeln!(file, "A-1,Smart Key,99.00,1,4").unwrap();
        writeln!(file, "A-2,,10.00,1,4").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let report = run(cli(&[path.as_str(), "--dry-run"]).unwrap()).await.unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn empty_file_succeeds() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let report = run(cli(&[path.as_str(), "--dry-run"]).unwrap()).await.unwrap();
        assert_eq!(report, ImportReport::default());
    }
}
