// =============================================================================
// STORE MODULE
// =============================================================================
// The document store behind the catalog.
//
// `CatalogStore` is the seam between business logic and persistence:
// - `crate::db::Database` keeps documents in PostgreSQL (production)
// - `MemoryStore` keeps them in process (dry-run imports, tests)
//
// Collections: products, discounts, emailSubscribers (+ marketingEmails).
//
// LEARNING NOTES:
// - The trait is object safe; handlers hold an `Arc<dyn CatalogStore>` and
//   never know which backend they talk to
// - `#[async_trait]` boxes each returned future, which is what lets an
//   async trait be used as `dyn`
// - `commit` is the only multi-document write. Everything else touches one
//   document at a time
// =============================================================================

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Discount, EmailSubscriber, MarketingEmail, Product};

// -----------------------------------------------------------------------------
// WRITE BATCH
// -----------------------------------------------------------------------------
/// A multi-document write applied all-or-nothing.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    /// Full replacements of existing product documents
    pub products: Vec<Product>,
    /// Discounts whose `usedCount` is incremented by one
    pub discount_usage: Vec<Uuid>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_product(&mut self, product: Product) -> &mut Self {
        self.products.push(product);
        self
    }

    pub fn increment_usage(&mut self, discount_id: Uuid) -> &mut Self {
        self.discount_usage.push(discount_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.discount_usage.is_empty()
    }
}

// -----------------------------------------------------------------------------
// STORE TRAIT
// -----------------------------------------------------------------------------
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // ----- products -----
    async fn create_product(&self, product: &Product) -> Result<()>;
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<Product>>;
    /// Page is 1-indexed. Returns the page and the total number of products.
    async fn list_products(&self, page: i64, per_page: i64) -> Result<(Vec<Product>, i64)>;
    async fn low_stock_products(&self) -> Result<Vec<Product>>;
    /// Ids of products whose category is one of `categories`.
    async fn product_ids_in_categories(&self, categories: &[String]) -> Result<Vec<Uuid>>;
    /// Products currently carrying `discountInfo.discountId == discount_id`.
    async fn products_with_discount(&self, discount_id: Uuid) -> Result<Vec<Product>>;

    // ----- discounts -----
    async fn get_discount(&self, id: Uuid) -> Result<Option<Discount>>;
    /// Insert or replace a discount document.
    async fn put_discount(&self, discount: &Discount) -> Result<()>;

    /// Applies every write in `batch`, or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    // ----- subscribers -----
    async fn find_subscriber_by_email(&self, email: &str) -> Result<Option<EmailSubscriber>>;
    /// Inserts the primary record and its denormalized marketing copy together.
    async fn insert_subscriber(
        &self,
        subscriber: &EmailSubscriber,
        marketing: &MarketingEmail,
    ) -> Result<()>;
    /// Removes the primary record only. Returns false when it did not exist.
    async fn delete_subscriber(&self, id: Uuid) -> Result<bool>;

    async fn health_check(&self) -> bool;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================
#[derive(Debug, Default)]
struct Collections {
    products: HashMap<Uuid, Product>,
    discounts: HashMap<Uuid, Discount>,
    subscribers: HashMap<Uuid, EmailSubscriber>,
    marketing_emails: HashMap<Uuid, MarketingEmail>,
}

/// Process-local store with the same semantics as the database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All products, in no particular order.
    pub async fn products(&self) -> Vec<Product> {
        self.inner.read().await.products.values().cloned().collect()
    }

    pub async fn subscribers(&self) -> Vec<EmailSubscriber> {
        self.inner.read().await.subscribers.values().cloned().collect()
    }

    pub async fn marketing_emails(&self) -> Vec<MarketingEmail> {
        self.inner
            .read()
            .await
            .marketing_emails
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_product(&self, product: &Product) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.products.contains_key(&product.id) {
            bail!("product {} already exists", product.id);
        }
        inner.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let inner = self.inner.read().await;
        // oldest match, as in the SQL lookup
        Ok(inner
            .products
            .values()
            .filter(|p| p.sku == sku)
            .min_by_key(|p| p.created_at)
            .cloned())
    }

    async fn list_products(&self, page: i64, per_page: i64) -> Result<(Vec<Product>, i64)> {
        let inner = self.inner.read().await;
        let mut products: Vec<Product> = inner.products.values().cloned().collect();
        products.sort_by(|a, b| a.sku.cmp(&b.sku));

        let total = products.len() as i64;
        let offset = usize::try_from((page.max(1) - 1).saturating_mul(per_page)).unwrap_or(0);
        let items = products
            .into_iter()
            .skip(offset)
            .take(per_page.max(0) as usize)
            .collect();

        Ok((items, total))
    }

    async fn low_stock_products(&self) -> Result<Vec<Product>> {
        let inner = self.inner.read().await;
        let mut products: Vec<Product> = inner
            .products
            .values()
            .filter(|p| p.is_low_stock())
            .cloned()
            .collect();
        products.sort_by_key(|p| p.stock);
        Ok(products)
    }

    async fn product_ids_in_categories(&self, categories: &[String]) -> Result<Vec<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .products
            .values()
            .filter(|p| categories.contains(&p.category))
            .map(|p| p.id)
            .collect())
    }

    async fn products_with_discount(&self, discount_id: Uuid) -> Result<Vec<Product>> {
        let inner = self.inner.read().await;
        Ok(inner
            .products
            .values()
            .filter(|p| {
                p.discount_info
                    .as_ref()
                    .is_some_and(|info| info.discount_id == discount_id)
            })
            .cloned()
            .collect())
    }

    async fn get_discount(&self, id: Uuid) -> Result<Option<Discount>> {
        Ok(self.inner.read().await.discounts.get(&id).cloned())
    }

    async fn put_discount(&self, discount: &Discount) -> Result<()> {
        self.inner
            .write()
            .await
            .discounts
            .insert(discount.id, discount.clone());
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut inner = self.inner.write().await;

        // Validate the whole batch before touching anything
        for product in &batch.products {
            if !inner.products.contains_key(&product.id) {
                bail!("batch references missing product {}", product.id);
            }
        }
        for id in &batch.discount_usage {
            if !inner.discounts.contains_key(id) {
                bail!("batch references missing discount {id}");
            }
        }

        for product in batch.products {
            inner.products.insert(product.id, product);
        }
        for id in batch.discount_usage {
            if let Some(discount) = inner.discounts.get_mut(&id) {
                discount.used_count += 1;
            }
        }

        Ok(())
    }

    async fn find_subscriber_by_email(&self, email: &str) -> Result<Option<EmailSubscriber>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subscribers
            .values()
            .find(|s| s.email == email)
            .cloned())
    }

    async fn insert_subscriber(
        &self,
        subscriber: &EmailSubscriber,
        marketing: &MarketingEmail,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.subscribers.insert(subscriber.id, subscriber.clone());
        inner.marketing_emails.insert(marketing.id, marketing.clone());
        Ok(())
    }

    async fn delete_subscriber(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner.write().await.subscribers.remove(&id).is_some())
    }

    async fn health_check(&self) -> bool {
        true
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{discount, product};
    use super::*;
    use crate::models::DiscountType;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        let existing = product("KR-1", "remotes", "10.00");
        store.create_product(&existing).await.unwrap();

        let mut changed = existing.clone();
        changed.price = "5.00".to_string();
        let ghost = product("KR-404", "remotes", "1.00");

        let mut batch = WriteBatch::new();
        batch.update_product(changed).update_product(ghost);

        assert!(store.commit(batch).await.is_err());
        let stored = store.get_product(existing.id).await.unwrap().unwrap();
        assert_eq!(stored.price, "10.00");
    }

    #[tokio::test]
    async fn commit_increments_usage() {
        let store = MemoryStore::new();
        let discount = discount(DiscountType::Fixed, Decimal::TEN);
        store.put_discount(&discount).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.increment_usage(discount.id);
        store.commit(batch).await.unwrap();

        let stored = store.get_discount(discount.id).await.unwrap().unwrap();
        assert_eq!(stored.used_count, 1);
    }

    #[tokio::test]
    async fn category_lookup_uses_inclusion_list() {
        let store = MemoryStore::new();
        let remote = product("KR-1", "remotes", "10.00");
        let blade = product("KB-1", "blades", "4.00");
        let shell = product("KS-1", "shells", "6.00");
        for p in [&remote, &blade, &shell] {
            store.create_product(p).await.unwrap();
        }

        let mut ids = store
            .product_ids_in_categories(&["remotes".to_string(), "shells".to_string()])
            .await
            .unwrap();
        ids.sort();
        let mut expected = vec![remote.id, shell.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn lists_products_by_page() {
        let store = MemoryStore::new();
        for sku in ["A", "B", "C"] {
            store
                .create_product(&product(sku, "remotes", "1.00"))
                .await
                .unwrap();
        }

        let (page, total) = store.list_products(2, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].sku, "C");
    }

    #[tokio::test]
    async fn far_page_is_empty() {
        let store = MemoryStore::new();
        store
            .create_product(&product("A", "remotes", "1.00"))
            .await
            .unwrap();

        let (page, total) = store.list_products(i64::MAX, 100).await.unwrap();
        assert_eq!(total, 1);
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn duplicate_sku_resolves_to_oldest() {
        let store = MemoryStore::new();
        let newer = product("KR-9", "remotes", "20.00");
        let mut older = product("KR-9", "remotes", "10.00");
        older.created_at = newer.created_at - chrono::Duration::days(1);

        store.create_product(&newer).await.unwrap();
        store.create_product(&older).await.unwrap();

        let found = store.find_product_by_sku("KR-9").await.unwrap().unwrap();
        assert_eq!(found.id, older.id);
    }
}
