//! # Finance Repository
//!
//! Database operations for income and expense records.
//!
//! The category column carries either a plain category name or a JSON
//! bundle descriptor; both directions go through the row mapper and
//! `FinanceCategory`, so this file never touches the JSON itself.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::rows::FinanceRow;
use vendo_core::FinanceRecord;

const FINANCE_COLUMNS: &str = "id, kind, date, amount_cents, customer_name, service_id, \
     payment_method, tip_cents, vendor, category";

/// Repository for finance database operations.
#[derive(Debug, Clone)]
pub struct FinanceRepository {
    pool: SqlitePool,
}

impl FinanceRepository {
    /// Creates a new FinanceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FinanceRepository { pool }
    }

    /// Lists all finance records, newest first.
    pub async fn list(&self) -> DbResult<Vec<FinanceRecord>> {
        let rows = sqlx::query_as::<_, FinanceRow>(&format!(
            "SELECT {FINANCE_COLUMNS} FROM finances ORDER BY date DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FinanceRow::into_domain).collect()
    }

    /// Lists income records only, newest first (the service income feed).
    pub async fn list_income(&self) -> DbResult<Vec<FinanceRecord>> {
        let rows = sqlx::query_as::<_, FinanceRow>(&format!(
            "SELECT {FINANCE_COLUMNS} FROM finances WHERE kind = 'income' ORDER BY date DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FinanceRow::into_domain).collect()
    }

    /// Inserts a finance record.
    pub async fn insert(&self, record: &FinanceRecord) -> DbResult<()> {
        debug!(id = %record.id, kind = %record.kind.label(), amount = %record.amount_cents, "Inserting finance record");

        sqlx::query(
            "INSERT INTO finances ( \
                 id, kind, date, amount_cents, customer_name, service_id, \
                 payment_method, tip_cents, vendor, category \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&record.id)
        .bind(record.kind.label())
        .bind(record.date)
        .bind(record.amount_cents)
        .bind(&record.customer_name)
        .bind(&record.service_id)
        .bind(&record.payment_method)
        .bind(record.tip_cents)
        .bind(&record.vendor)
        .bind(record.category.encode())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes a finance record.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM finances WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("FinanceRecord", id));
        }

        Ok(())
    }
}

/// Helper to generate a new finance record ID.
pub fn generate_finance_id() -> String {
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
    use vendo_core::{FinanceCategory, FinanceKind, ServiceBundle};

    fn record(id: &str, kind: FinanceKind, category: FinanceCategory) -> FinanceRecord {
        FinanceRecord {
            id: id.to_string(),
            kind,
            date: Utc::now() - Duration::minutes(1),
            amount_cents: 4500,
            customer_name: Some("Maria".to_string()),
            service_id: Some("s1".to_string()),
            payment_method: Some("cash".to_string()),
            tip_cents: Some(500),
            vendor: None,
            category,
        }
    }

    #[tokio::test]
    async fn test_bundle_category_roundtrips_through_storage() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.finances();

        let bundle = ServiceBundle {
            service_ids: vec!["s1".to_string(), "s2".to_string()],
            service_names: vec!["Wash".to_string(), "Wax".to_string()],
            service_prices_cents: vec![3000, 7000],
            discount_cents: 1000,
        };
        repo.insert(&record(
            "f1",
            FinanceKind::Income,
            FinanceCategory::Bundle { bundle },
        ))
        .await
        .unwrap();

        let loaded = repo.list().await.unwrap();
        let decoded = loaded[0].category.bundle().expect("bundle survived");
        assert_eq!(decoded.service_prices_cents, vec![3000, 7000]);
        assert_eq!(decoded.discount_cents, 1000);
    }

    #[tokio::test]
    async fn test_list_income_filters_expenses() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.finances();

        repo.insert(&record(
            "f1",
            FinanceKind::Income,
            FinanceCategory::Plain { name: None },
        ))
        .await
        .unwrap();
        repo.insert(&record(
            "f2",
            FinanceKind::Expense,
            FinanceCategory::Plain {
                name: Some("Supplies".to_string()),
            },
        ))
        .await
        .unwrap();

        let income = repo.list_income().await.unwrap();
        assert_eq!(income.len(), 1);
        assert_eq!(income[0].id, "f1");

        assert_eq!(repo.list().await.unwrap().len(), 2);
    }
}
