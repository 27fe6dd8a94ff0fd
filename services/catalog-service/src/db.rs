// =============================================================================
// DATABASE MODULE
// =============================================================================
// PostgreSQL-backed document store.
//
// Each collection is a table of (id UUID, doc JSONB, created_at, updated_at).
// The store enforces no schema on `doc`; the service's types do.
//
// LEARNING NOTES:
// - `sqlx::types::Json<T>` encodes and decodes the JSONB column through serde,
//   so a row comes back as a typed `Product` with no manual mapping
// - Field lookups use `doc->>'field'`, which yields text; numeric comparisons
//   cast explicitly
// - `commit` runs inside one transaction and checks `rows_affected` for each
//   update, so an id that vanished rolls the whole batch back
// =============================================================================

use std::time::Instant;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use crate::metrics;
use crate::models::{Discount, EmailSubscriber, MarketingEmail, Product};
use crate::store::{CatalogStore, WriteBatch};

// -----------------------------------------------------------------------------
// DATABASE WRAPPER
// -----------------------------------------------------------------------------
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    // -------------------------------------------------------------------------
    // CONNECTION
    // -------------------------------------------------------------------------
    /// Create a new database connection pool
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .idle_timeout(std::time::Duration::from_secs(300))
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool })
    }

    // -------------------------------------------------------------------------
    // MIGRATIONS
    // -------------------------------------------------------------------------
    /// Create the collection tables and their lookup indexes.
    ///
    /// Every statement is idempotent.
    pub async fn run_migrations(&self) -> Result<()> {
        for collection in ["products", "discounts", "email_subscribers", "marketing_emails"] {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {collection} (
                    id UUID PRIMARY KEY,
                    doc JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#
            ))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to create {collection} table"))?;
        }

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_products_sku ON products ((doc->>'sku'))",
            "CREATE INDEX IF NOT EXISTS idx_products_category ON products ((doc->>'category'))",
            "CREATE INDEX IF NOT EXISTS idx_products_discount ON products ((doc->'discountInfo'->>'discountId'))",
            "CREATE INDEX IF NOT EXISTS idx_subscribers_email ON email_subscribers ((doc->>'email'))",
        ];
        for statement in indexes {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to run: {statement}"))?;
        }

        Ok(())
    }
}

fn observe(operation: &str, start: Instant) {
    metrics::record_db_query(operation, start.elapsed().as_secs_f64());
}

// =============================================================================
// DOCUMENT STORE IMPLEMENTATION
// =============================================================================
#[async_trait]
impl CatalogStore for Database {
    // -------------------------------------------------------------------------
    // PRODUCTS
    // -------------------------------------------------------------------------
    async fn create_product(&self, product: &Product) -> Result<()> {
        let start = Instant::now();
        sqlx::query(
            r#"
            INSERT INTO products (id, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(product.id)
        .bind(Json(product))
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert product {}", product.sku))?;
        observe("insert", start);

        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        let start = Instant::now();
        let row: Option<(Json<Product>,)> = sqlx::query_as("SELECT doc FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch product")?;
        observe("select", start);

        Ok(row.map(|(Json(product),)| product))
    }

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let start = Instant::now();
        let row: Option<(Json<Product>,)> = sqlx::query_as(
            r#"
            SELECT doc FROM products
            WHERE doc->>'sku' = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up product by SKU")?;
        observe("select", start);

        Ok(row.map(|(Json(product),)| product))
    }

    async fn list_products(&self, page: i64, per_page: i64) -> Result<(Vec<Product>, i64)> {
        let start = Instant::now();
        let offset = (page.max(1) - 1).saturating_mul(per_page);

        let rows: Vec<(Json<Product>,)> = sqlx::query_as(
            r#"
            SELECT doc FROM products
            ORDER BY doc->>'sku' ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch products")?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count products")?;
        observe("select", start);

        Ok((rows.into_iter().map(|(Json(p),)| p).collect(), total.0))
    }

    async fn low_stock_products(&self) -> Result<Vec<Product>> {
        let start = Instant::now();
        let rows: Vec<(Json<Product>,)> = sqlx::query_as(
            r#"
            SELECT doc FROM products
            WHERE COALESCE((doc->>'stock')::bigint, 0)
                < COALESCE((doc->>'lowStockThreshold')::bigint, 0)
            ORDER BY COALESCE((doc->>'stock')::bigint, 0) ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch low stock products")?;
        observe("select", start);

        Ok(rows.into_iter().map(|(Json(p),)| p).collect())
    }

    async fn product_ids_in_categories(&self, categories: &[String]) -> Result<Vec<Uuid>> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM products WHERE doc->>'category' = ANY($1)")
                .bind(categories.to_vec())
                .fetch_all(&self.pool)
                .await
                .context("Failed to query products by category")?;
        observe("select", start);

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn products_with_discount(&self, discount_id: Uuid) -> Result<Vec<Product>> {
        let start = Instant::now();
        let rows: Vec<(Json<Product>,)> = sqlx::query_as(
            "SELECT doc FROM products WHERE doc->'discountInfo'->>'discountId' = $1",
        )
        .bind(discount_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to query discounted products")?;
        observe("select", start);

        Ok(rows.into_iter().map(|(Json(p),)| p).collect())
    }

    // -------------------------------------------------------------------------
    // DISCOUNTS
    // -------------------------------------------------------------------------
    async fn get_discount(&self, id: Uuid) -> Result<Option<Discount>> {
        let start = Instant::now();
        let row: Option<(Json<Discount>,)> =
            sqlx::query_as("SELECT doc FROM discounts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch discount")?;
        observe("select", start);

        Ok(row.map(|(Json(discount),)| discount))
    }

    async fn put_discount(&self, discount: &Discount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO discounts (id, doc) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc, updated_at = NOW()
            "#,
        )
        .bind(discount.id)
        .bind(Json(discount))
        .execute(&self.pool)
        .await
        .context("Failed to store discount")?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // ATOMIC BATCH
    // -------------------------------------------------------------------------
    /// Applies the batch inside one transaction.
    ///
    /// Any failing statement returns early; the transaction is rolled back
    /// when `tx` is dropped.
    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        for product in &batch.products {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET doc = $2, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(product.id)
            .bind(Json(product))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                bail!("batch references missing product {}", product.id);
            }
        }

        for discount_id in &batch.discount_usage {
            let result = sqlx::query(
                r#"
                UPDATE discounts
                SET doc = jsonb_set(
                        doc,
                        '{usedCount}',
                        to_jsonb(COALESCE((doc->>'usedCount')::bigint, 0) + 1)
                    ),
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(*discount_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                bail!("batch references missing discount {discount_id}");
            }
        }

        tx.commit().await.context("Failed to commit write batch")?;
        observe("update", start);

        Ok(())
    }

    // -------------------------------------------------------------------------
    // SUBSCRIBERS
    // -------------------------------------------------------------------------
    async fn find_subscriber_by_email(&self, email: &str) -> Result<Option<EmailSubscriber>> {
        let start = Instant::now();
        let row: Option<(Json<EmailSubscriber>,)> = sqlx::query_as(
            r#"
            SELECT doc FROM email_subscribers
            WHERE doc->>'email' = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up subscriber")?;
        observe("select", start);

        Ok(row.map(|(Json(subscriber),)| subscriber))
    }

    async fn insert_subscriber(
        &self,
        subscriber: &EmailSubscriber,
        marketing: &MarketingEmail,
    ) -> Result<()> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO email_subscribers (id, doc, created_at) VALUES ($1, $2, $3)")
            .bind(subscriber.id)
            .bind(Json(subscriber))
            .bind(subscriber.created_at)
            .execute(&mut *tx)
            .await
            .context("Failed to insert subscriber")?;

        sqlx::query("INSERT INTO marketing_emails (id, doc, created_at) VALUES ($1, $2, $3)")
            .bind(marketing.id)
            .bind(Json(marketing))
            .bind(marketing.subscribed_at)
            .execute(&mut *tx)
            .await
            .context("Failed to insert marketing email")?;

        tx.commit().await?;
        observe("insert", start);

        Ok(())
    }

    async fn delete_subscriber(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM email_subscribers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete subscriber")?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // HEALTH CHECK
    // -------------------------------------------------------------------------
    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
