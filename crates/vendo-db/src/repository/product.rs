//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Stock Writes
//! Plain catalog edits go through [`ProductRepository::update`]. Stock
//! levels are only ever written by the ledger service inside its write
//! transactions, via the `pub(crate)` helpers at the bottom of this file;
//! nothing else touches `stock_quantity`.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::rows::ProductRow;
use vendo_core::Product;

const PRODUCT_COLUMNS: &str = "id, name, description, category, cost_cents, price_cents, \
     stock_quantity, low_stock_threshold, last_restocked, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists all products, sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ProductRow::into_domain).collect())
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        fetch_product(&self.pool, id).await
    }

    /// Lists products at or below their low-stock threshold, most depleted
    /// first.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE stock_quantity <= low_stock_threshold \
             ORDER BY stock_quantity, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ProductRow::into_domain).collect())
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            "INSERT INTO products ( \
                 id, name, description, category, cost_cents, price_cents, \
                 stock_quantity, low_stock_threshold, last_restocked, \
                 created_at, updated_at \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.stock_quantity)
        .bind(product.low_stock_threshold)
        .bind(product.last_restocked)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing product's catalog fields and stock.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET \
                 name = ?2, \
                 description = ?3, \
                 category = ?4, \
                 cost_cents = ?5, \
                 price_cents = ?6, \
                 stock_quantity = ?7, \
                 low_stock_threshold = ?8, \
                 last_restocked = ?9, \
                 updated_at = ?10 \
             WHERE id = ?1",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.stock_quantity)
        .bind(product.low_stock_threshold)
        .bind(product.last_restocked)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Deletes a product.
    ///
    /// Ledger rows referencing it survive: they carry a name snapshot and
    /// are deliberately not foreign-keyed to the catalog.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Executor-Generic Helpers (shared with the ledger service)
// =============================================================================

/// Fetches one product; callable on the pool or inside a write transaction.
pub(crate) async fn fetch_product<'e, E>(executor: E, id: &str) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(ProductRow::into_domain))
}

/// Writes an absolute stock level (sales, adjustments, undo).
pub(crate) async fn write_stock<'e, E>(
    executor: E,
    id: &str,
    stock: i64,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result =
        sqlx::query("UPDATE products SET stock_quantity = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(stock)
            .bind(now)
            .execute(executor)
            .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", id));
    }

    Ok(())
}

/// Writes an absolute stock level and the last_restocked stamp together
/// (restocks, and undo paths that must put the old stamp back).
pub(crate) async fn write_stock_and_restocked<'e, E>(
    executor: E,
    id: &str,
    stock: i64,
    last_restocked: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE products SET stock_quantity = ?2, last_restocked = ?3, updated_at = ?4 \
         WHERE id = ?1",
    )
    .bind(id)
    .bind(stock)
    .bind(last_restocked)
    .bind(now)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", id));
    }

    Ok(())
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn sample(id: &str, name: &str, stock: i64, threshold: i64) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            category: "Parts".to_string(),
            cost_cents: 500,
            price_cents: 900,
            stock_quantity: stock,
            low_stock_threshold: threshold,
            last_restocked: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_get_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = sample("p1", "Motor Oil 1L", 10, 5);
        repo.insert(&product).await.unwrap();

        let loaded = repo.get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Motor Oil 1L");
        assert_eq!(loaded.stock_quantity, 10);
        assert_eq!(loaded.last_restocked, None);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.products().get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let mut product = sample("p1", "Motor Oil 1L", 10, 5);
        repo.insert(&product).await.unwrap();

        product.price_cents = 1100;
        repo.update(&product).await.unwrap();
        assert_eq!(
            repo.get_by_id("p1").await.unwrap().unwrap().price_cents,
            1100
        );

        let ghost = sample("ghost", "Ghost", 0, 0);
        assert!(matches!(
            repo.update(&ghost).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_low_stock_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&sample("ok", "Plenty", 20, 5)).await.unwrap();
        repo.insert(&sample("low", "Scarce", 3, 5)).await.unwrap();
        repo.insert(&sample("out", "Gone", 0, 5)).await.unwrap();

        let low: Vec<String> = repo
            .list_low_stock()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(low, vec!["out", "low"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&sample("p1", "Motor Oil 1L", 10, 5))
            .await
            .unwrap();
        repo.delete("p1").await.unwrap();
        assert!(repo.get_by_id("p1").await.unwrap().is_none());
        assert!(matches!(
            repo.delete("p1").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
