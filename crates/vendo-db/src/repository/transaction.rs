//! # Transaction Repository
//!
//! Read access and single-row writes for the append-only ledger.
//!
//! Rows are never updated. The only delete path is the single-slot undo,
//! driven by the ledger service inside a write transaction.

use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::rows::TransactionRow;
use vendo_core::Transaction;

const TRANSACTION_COLUMNS: &str = "id, product_id, product_name, quantity, amount_cents, kind, \
     date, user_id, user_name, sale_id, discount_cents, original_cents, parent_id";

/// Repository for ledger read operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Lists the whole ledger, newest first.
    pub async fn list(&self) -> DbResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY date DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    /// Lists ledger rows of one kind, newest first.
    pub async fn list_by_kind(&self, kind: &str) -> DbResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE kind = ?1 ORDER BY date DESC"
        ))
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    /// Lists the line transactions of one sale, oldest first.
    pub async fn list_by_sale(&self, sale_id: &str) -> DbResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE sale_id = ?1 ORDER BY date"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    /// Lists the child lines of an aggregate restock, newest first.
    pub async fn children_of(&self, parent_id: &str) -> DbResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE parent_id = ?1 \
             ORDER BY date DESC"
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    /// Appends one ledger row.
    pub async fn insert(&self, tx: &Transaction) -> DbResult<()> {
        insert_transaction(&self.pool, tx).await
    }

    /// Appends many ledger rows in one database transaction.
    ///
    /// Either every row lands or none does - this is the bulk path used for
    /// sale lines and restock children.
    pub async fn insert_many(&self, txs: &[Transaction]) -> DbResult<()> {
        debug!(count = txs.len(), "Bulk-inserting transactions");

        let mut db_tx = self.pool.begin().await?;
        for tx in txs {
            insert_transaction(&mut *db_tx, tx).await?;
        }
        db_tx.commit().await?;

        Ok(())
    }

    /// Deletes one ledger row (undo path only).
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Transaction", id));
        }

        Ok(())
    }

    /// Counts ledger rows (for diagnostics and tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Executor-Generic Helpers (shared with the ledger service)
// =============================================================================

/// Appends one ledger row; callable on the pool or inside a write
/// transaction.
pub(crate) async fn insert_transaction<'e, E>(executor: E, tx: &Transaction) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let TransactionRow {
        id,
        product_id,
        product_name,
        quantity,
        amount_cents,
        kind,
        date,
        user_id,
        user_name,
        sale_id,
        discount_cents,
        original_cents,
        parent_id,
    } = TransactionRow::from_domain(tx);

    sqlx::query(
        "INSERT INTO transactions ( \
             id, product_id, product_name, quantity, amount_cents, kind, \
             date, user_id, user_name, sale_id, discount_cents, original_cents, parent_id \
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )
    .bind(id)
    .bind(product_id)
    .bind(product_name)
    .bind(quantity)
    .bind(amount_cents)
    .bind(kind)
    .bind(date)
    .bind(user_id)
    .bind(user_name)
    .bind(sale_id)
    .bind(discount_cents)
    .bind(original_cents)
    .bind(parent_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// Fetches one ledger row; callable on the pool or inside a write
/// transaction.
pub(crate) async fn fetch_transaction<'e, E>(executor: E, id: &str) -> DbResult<Option<Transaction>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(TransactionRow::into_domain).transpose()
}

/// Deletes one ledger row inside a write transaction (undo path).
pub(crate) async fn delete_transaction<'e, E>(executor: E, id: &str) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM transactions WHERE id = ?1")
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Transaction", id));
    }

    Ok(())
}

/// Helper to generate a new transaction ID.
pub fn generate_transaction_id() -> String {
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

    fn tx(id: &str, kind: TransactionKind, minutes_ago: i64) -> Transaction {
        Transaction {
            id: id.to_string(),
            product_id: Some("p1".to_string()),
            product_name: "Motor Oil 1L".to_string(),
            quantity: 1,
            amount_cents: 900,
            kind,
            date: Utc::now() - Duration::minutes(minutes_ago),
            user_id: "u1".to_string(),
            user_name: "Ana".to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.transactions();

        repo.insert(&tx("old", TransactionKind::Restock, 60))
            .await
            .unwrap();
        repo.insert(&tx("new", TransactionKind::Adjustment, 1))
            .await
            .unwrap();

        let listed = repo.list().await.unwrap();
        assert_eq!(listed[0].id, "new");
        assert_eq!(listed[1].id, "old");
    }

    #[tokio::test]
    async fn test_insert_many_and_children_ordering() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.transactions();

        let parent = tx("parent", TransactionKind::RestockAggregate, 10);
        let child_old = tx(
            "child-old",
            TransactionKind::RestockLine {
                parent_id: "parent".to_string(),
            },
            9,
        );
        let child_new = tx(
            "child-new",
            TransactionKind::RestockLine {
                parent_id: "parent".to_string(),
            },
            2,
        );

        repo.insert_many(&[parent, child_old, child_new])
            .await
            .unwrap();

        let children = repo.children_of("parent").await.unwrap();
        assert_eq!(children.len(), 2);
        // Newest first.
        assert_eq!(children[0].id, "child-new");
        assert_eq!(children[1].id, "child-old");
    }

    #[tokio::test]
    async fn test_kind_filter_and_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.transactions();

        repo.insert(&tx("r1", TransactionKind::Restock, 5))
            .await
            .unwrap();
        repo.insert(&tx("a1", TransactionKind::Adjustment, 3))
            .await
            .unwrap();

        let restocks = repo.list_by_kind("restock").await.unwrap();
        assert_eq!(restocks.len(), 1);
        assert_eq!(restocks[0].id, "r1");

        repo.delete("r1").await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(matches!(
            repo.delete("r1").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
