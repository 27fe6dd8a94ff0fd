// =============================================================================
// IMPORTER MODULE
// =============================================================================
// Streams a vendor CSV export into the catalog.
//
//   ProductRows        lazy iterator: CSV record -> Product
//   persist_products   writes products in batches, pausing between batches
//
// Rows are parsed one at a time, so the whole file is never held in memory.
// A row that fails to parse or to save is counted and skipped; the run
// always continues to the end of the file.
// =============================================================================

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use crate::classify::{KeywordClassifier, VehicleClassifier};
use crate::models::Product;
use crate::store::CatalogStore;
use crate::vendor::{VendorRow, VendorSchema};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// =============================================================================
// ROW STREAM
// =============================================================================

/// Products parsed lazily from a CSV source with a header row.
pub struct ProductRows<R> {
    reader: csv::Reader<R>,
    headers: csv::StringRecord,
    record: csv::StringRecord,
    schema: VendorSchema,
    classifier: Box<dyn VehicleClassifier>,
    done: bool,
}

impl ProductRows<File> {
    pub fn from_path(path: impl AsRef<Path>, schema: VendorSchema) -> Result<Self, ImportError> {
        Self::new(reader_builder().from_path(path)?, schema)
    }
}

impl<R: Read> ProductRows<R> {
    pub fn from_reader(source: R, schema: VendorSchema) -> Result<Self, ImportError> {
        Self::new(reader_builder().from_reader(source), schema)
    }

    fn new(mut reader: csv::Reader<R>, schema: VendorSchema) -> Result<Self, ImportError> {
        let headers = reader.headers()?.clone();
        Ok(Self {
            reader,
            headers,
            record: csv::StringRecord::new(),
            schema,
            classifier: Box::new(KeywordClassifier),
            done: false,
        })
    }

    /// Replace the default keyword classifier.
    pub fn with_classifier(mut self, classifier: impl VehicleClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }
}

// LEARNING NOTE:
// `csv` refuses rows whose length differs from the header unless the reader
// is `flexible`. With it set, cells are paired with headers positionally and
// missing trailing cells read as empty.
fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.flexible(true).trim(csv::Trim::All);
    builder
}

impl<R: Read> Iterator for ProductRows<R> {
    type Item = Result<Product, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.read_record(&mut self.record) {
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => {
                let row: VendorRow = self.headers.iter().zip(self.record.iter()).collect();
                Some(Ok(self
                    .schema
                    .map_row(&row, self.classifier.as_ref(), Utc::now())))
            }
            Err(err) => {
                // A broken source cannot be resumed; a malformed record can.
                self.done = err.is_io_error();
                Some(Err(err.into()))
            }
        }
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Rows written before each pause (minimum 1)
    pub batch_size: usize,
    /// Sleep between batches, to stay under the store's write rate
    pub pause: Duration,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            pause: Duration::from_secs(1),
        }
    }
}

/// Counters for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Rows without a title or SKU
    pub skipped: usize,
    /// Rows that failed to parse or to save
    pub errors: usize,
}

impl ImportReport {
    pub fn rows(&self) -> usize {
        self.imported + self.skipped + self.errors
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows: {} imported, {} skipped, {} errors",
            self.rows(),
            self.imported,
            self.skipped,
            self.errors
        )
    }
}

/// Save every product from `rows`, `options.batch_size` at a time.
///
/// Per-row failures are logged and counted; they never abort the run.
pub async fn persist_products<I>(
    store: &dyn CatalogStore,
    rows: I,
    options: &ImportOptions,
) -> ImportReport
where
    I: IntoIterator<Item = Result<Product, ImportError>>,
{
    let batch_size = options.batch_size.max(1);
    let mut rows = rows.into_iter().peekable();
    let mut report = ImportReport::default();
    let mut line = 1usize; // header
    let mut batch_number = 0usize;

    loop {
        let batch: Vec<_> = rows.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }
        batch_number += 1;

        for row in batch {
            line += 1;
            let product = match row {
                Ok(product) => product,
                Err(err) => {
                    tracing::warn!(line, error = %err, "Unreadable row");
                    report.errors += 1;
                    continue;
                }
            };

            if product.title.is_empty() || product.sku.is_empty() {
                tracing::debug!(line, sku = %product.sku, "Skipping row without title or SKU");
                report.skipped += 1;
                continue;
            }

            match store.create_product(&product).await {
                Ok(()) => report.imported += 1,
                Err(err) => {
                    tracing::warn!(line, sku = %product.sku, error = %err, "Failed to save product");
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            batch = batch_number,
            imported = report.imported,
            skipped = report.skipped,
            errors = report.errors,
            "Batch written"
        );

        if rows.peek().is_some() && !options.pause.is_zero() {
            tokio::time::sleep(options.pause).await;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Availability, ProductStatus};
    use crate::store::MemoryStore;
    use std::io::Write;

    const HEADER: &str = "SKU,Name,Regular price,Sale price,Categories,Stock,In stock?,Published";

    fn options(batch_size: usize) -> ImportOptions {
        ImportOptions {
            batch_size,
            pause: Duration::ZERO,
        }
    }

    fn rows(body: &str) -> ProductRows<&[u8]> {
        ProductRows::from_reader(body.as_bytes(), VendorSchema::Woocommerce).unwrap()
    }

    #[test]
    fn parses_rows_lazily() {
        let csv = format!("{HEADER}\nA-1,Remote,10.00,,Car Remotes,3,1,1\nB-2,Blade,5,,Car Keys,0,0,1\n");
        let products: Vec<Product> = rows(&csv).collect::<Result<_, _>>().unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].sku, "A-1");
        assert_eq!(products[0].price, "10.00");
        assert_eq!(products[1].status, ProductStatus::OutOfStock);
    }

    #[test]
    fn tolerates_ragged_rows() {
        let csv = format!("{HEADER}\nA-1,Remote\n");
        let products: Vec<Product> = rows(&csv).collect::<Result<_, _>>().unwrap();
        assert_eq!(products[0].title, "Remote");
        assert_eq!(products[0].price, "0");
        assert_eq!(products[0].stock, 0);
    }

    #[tokio::test]
    async fn imports_and_counts_skips() {
        let store = MemoryStore::new();
        let csv = format!(
            "{HEADER}\n\
             A-1,Toyota Remote,10,,Car Remotes,3,1,1\n\
             ,No SKU,10,,Car Remotes,3,1,1\n\
             C-3,,10,,Car Remotes,3,1,1\n\
             D-4,Honda Fob,20,18,SUV Fobs,0,0,1\n"
        );

        let report = persist_products(&store, rows(&csv), &options(2)).await;

        assert_eq!(
            report,
            ImportReport {
                imported: 2,
                skipped: 2,
                errors: 0
            }
        );
        let products = store.products().await;
        assert_eq!(products.len(), 2);

        let fob = products.iter().find(|p| p.sku == "D-4").unwrap();
        assert_eq!(fob.sale_price, "18");
        assert_eq!(fob.status, ProductStatus::OutOfStock);
        assert_eq!(fob.availability, Availability::OutOfStock);
    }

    #[tokio::test]
    async fn empty_file_imports_nothing() {
        let store = MemoryStore::new();
        let report = persist_products(&store, rows(""), &options(10)).await;
        assert_eq!(report, ImportReport::default());
        assert!(store.products().await.is_empty());
    }

    #[tokio::test]
    async fn failed_rows_do_not_stop_the_run() {
        let store = MemoryStore::new();
        let good = |sku: &str| {
            let csv = format!("{HEADER}\n{sku},Remote,1,,Car,1,1,1\n");
            let mut parsed = rows(&csv);
            let product = parsed.next().unwrap();
            product
        };
        let first = good("A-1").unwrap();
        let duplicate = first.clone();

        let input = vec![
            Ok(first),
            Err(ImportError::Csv(csv::Error::from(std::io::Error::other("bad row")))),
            Ok(duplicate),
            good("B-2"),
        ];
        let report = persist_products(&store, input, &options(1)).await;

        assert_eq!(report.imported, 2);
        assert_eq!(report.errors, 2);
        assert_eq!(report.to_string(), "4 rows: 2 imported, 0 skipped, 2 errors");
    }

    #[tokio::test]
    async fn reads_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Item Number,Product Name,List Price,Qty,Available,Category").unwrap();
        writeln!(file, "KC-1,Ford Flip Key,35.00,7,1,Car Flip Keys").unwrap();

        let store = MemoryStore::new();
        let rows = ProductRows::from_path(file.path(), VendorSchema::KeyCatalog).unwrap();
        let report = persist_products(&store, rows, &options(10)).await;

        assert_eq!(report.imported, 1);
        let product = &store.products().await[0];
        assert_eq!(product.title, "Ford Flip Key");
        assert_eq!(product.stock, 7);
        assert_eq!(
            product.compatibility[0].key_types,
            vec!["flip-key".to_string()]
        );
    }

    /// Tags every row as a marine remote, whatever its categories say.
    struct MarineClassifier;

    impl VehicleClassifier for MarineClassifier {
        fn classify(
            &self,
            categories: &[String],
            _attributes: &[crate::classify::Attribute],
        ) -> Vec<crate::models::CompatibilityEntry> {
            vec![crate::models::CompatibilityEntry {
                vehicle_type: "boat".to_string(),
                brand: categories.first().cloned().unwrap_or_default(),
                ..Default::default()
            }]
        }
    }

    #[test]
    fn custom_classifier_replaces_keywords() {
        let csv = format!("{HEADER}\nM-1,Outboard Remote,40,,Yamaha,2,1,1\n");
        let products: Vec<Product> = rows(&csv)
            .with_classifier(MarineClassifier)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(products[0].compatibility.len(), 1);
        assert_eq!(products[0].compatibility[0].vehicle_type, "boat");
        assert_eq!(products[0].compatibility[0].brand, "Yamaha");
    }
}
