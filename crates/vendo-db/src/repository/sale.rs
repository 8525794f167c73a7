//! # Sale Repository
//!
//! Database operations for sale headers.
//!
//! ## Header/Line Split
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales        one row per checkout (totals, user, payment method)      │
//! │  transactions one 'sale' row per line item, sale_id → header           │
//! │                                                                         │
//! │  list() re-joins them: headers come back with items populated.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::rows::{SaleRow, TransactionRow};
use vendo_core::{Sale, Transaction};

const SALE_COLUMNS: &str = "id, date, total_cents, user_id, user_name, payment_method, notes, \
     discount_cents, original_total_cents";

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Lists all sales, newest first, each with its line items attached.
    pub async fn list(&self) -> DbResult<Vec<Sale>> {
        let headers = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY date DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        // One query for every line, grouped in memory by sale_id.
        let line_rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, product_id, product_name, quantity, amount_cents, kind, \
                 date, user_id, user_name, sale_id, discount_cents, original_cents, parent_id \
             FROM transactions WHERE sale_id IS NOT NULL ORDER BY date",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_sale: HashMap<String, Vec<Transaction>> = HashMap::new();
        for row in line_rows {
            let tx = row.into_domain()?;
            if let Some(sale_id) = tx.sale_id() {
                by_sale.entry(sale_id.to_string()).or_default().push(tx);
            }
        }

        Ok(headers
            .into_iter()
            .map(|header| {
                let items = by_sale.remove(&header.id).unwrap_or_default();
                header.into_domain(items)
            })
            .collect())
    }

    /// Gets one sale with its line items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let header = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, product_id, product_name, quantity, amount_cents, kind, \
                 date, user_id, user_name, sale_id, discount_cents, original_cents, parent_id \
             FROM transactions WHERE sale_id = ?1 ORDER BY date",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(TransactionRow::into_domain)
        .collect::<DbResult<Vec<_>>>()?;

        Ok(Some(header.into_domain(items)))
    }

    /// Inserts a sale header (items are inserted as ledger rows).
    pub async fn insert(&self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, total = %sale.total_cents, "Inserting sale");
        insert_sale(&self.pool, sale).await
    }

    /// Deletes a sale header (undo path only).
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }
}

// =============================================================================
// Executor-Generic Helpers (shared with the ledger service)
// =============================================================================

/// Inserts a sale header; callable on the pool or inside a write
/// transaction.
pub(crate) async fn insert_sale<'e, E>(executor: E, sale: &Sale) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO sales ( \
             id, date, total_cents, user_id, user_name, payment_method, notes, \
             discount_cents, original_total_cents \
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&sale.id)
    .bind(sale.date)
    .bind(sale.total_cents)
    .bind(&sale.user_id)
    .bind(&sale.user_name)
    .bind(&sale.payment_method)
    .bind(&sale.notes)
    .bind(sale.discount_cents)
    .bind(sale.original_total_cents)
    .execute(executor)
    .await?;

    Ok(())
}

/// Deletes a sale header inside a write transaction (undo path).
pub(crate) async fn delete_sale<'e, E>(executor: E, id: &str) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Sale", id));
    }

    Ok(())
}

/// Helper to generate a new sale ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, Utc};
    use vendo_core::TransactionKind;

    fn sale(id: &str, total: i64, minutes_ago: i64) -> Sale {
        Sale {
            id: id.to_string(),
            date: Utc::now() - Duration::minutes(minutes_ago),
            total_cents: total,
            user_id: "u1".to_string(),
            user_name: "Ana".to_string(),
            payment_method: Some("cash".to_string()),
            notes: None,
            discount_cents: None,
            original_total_cents: None,
            items: vec![],
        }
    }

    fn line(id: &str, sale_id: &str, amount: i64) -> Transaction {
        Transaction {
            id: id.to_string(),
            product_id: Some("p1".to_string()),
            product_name: "Motor Oil 1L".to_string(),
            quantity: 1,
            amount_cents: amount,
            kind: TransactionKind::Sale {
                sale_id: Some(sale_id.to_string()),
                discount_cents: None,
                original_cents: None,
            },
            date: Utc::now(),
            user_id: "u1".to_string(),
            user_name: "Ana".to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_attaches_items_by_sale_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sales = db.sales();
        let txs = db.transactions();

        sales.insert(&sale("s1", 1800, 10)).await.unwrap();
        sales.insert(&sale("s2", 900, 1)).await.unwrap();
        txs.insert(&line("t1", "s1", 900)).await.unwrap();
        txs.insert(&line("t2", "s1", 900)).await.unwrap();
        txs.insert(&line("t3", "s2", 900)).await.unwrap();

        let listed = sales.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        // Newest header first, items grouped by id.
        assert_eq!(listed[0].id, "s2");
        assert_eq!(listed[0].items.len(), 1);
        assert_eq!(listed[1].items.len(), 2);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sales = db.sales();

        sales.insert(&sale("s1", 900, 0)).await.unwrap();
        db.transactions()
            .insert(&line("t1", "s1", 900))
            .await
            .unwrap();

        let loaded = sales.get_by_id("s1").await.unwrap().unwrap();
        assert_eq!(loaded.total_cents, 900);
        assert_eq!(loaded.items.len(), 1);

        assert!(sales.get_by_id("nope").await.unwrap().is_none());
    }
}
