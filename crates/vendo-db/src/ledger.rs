//! # Ledger Service
//!
//! Every write path that must keep `products.stock_quantity` and the
//! append-only transaction ledger mutually consistent.
//!
//! ## Write Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One Operation, One Transaction                      │
//! │                                                                         │
//! │  validate input                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN ── fetch product row(s)                                          │
//! │       │       │                                                         │
//! │       │       ▼                                                         │
//! │       │   check stock preconditions  ──── violated? ROLLBACK, nothing  │
//! │       │       │                           written anywhere             │
//! │       │       ▼                                                         │
//! │       │   insert header / ledger row(s)                                 │
//! │       │       │                                                         │
//! │       │       ▼                                                         │
//! │       │   update stock level(s)                                         │
//! │       ▼                                                                 │
//! │  COMMIT ── caller receives the updated entities                        │
//! │                                                                         │
//! │  The ledger and stock levels cannot diverge: either the whole          │
//! │  operation lands or none of it does.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::product::{fetch_product, write_stock, write_stock_and_restocked};
use crate::repository::sale::{delete_sale, insert_sale};
use crate::repository::transaction::{
    delete_transaction, fetch_transaction, insert_transaction, TransactionRepository,
};
use vendo_core::validation::{
    validate_non_negative_cents, validate_quantity, validate_stock_level,
};
use vendo_core::{
    Actor, CoreError, Money, Product, Sale, Transaction, TransactionKind, MAX_SALE_LINES,
};

// =============================================================================
// Errors
// =============================================================================

/// Errors returned by ledger operations: either a business precondition
/// violation or a database failure.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<vendo_core::ValidationError> for LedgerError {
    fn from(err: vendo_core::ValidationError) -> Self {
        LedgerError::Core(CoreError::Validation(err))
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Inputs
// =============================================================================

/// One line of a bulk sale: a product, a quantity, and an optional per-item
/// discount in cents.
#[derive(Debug, Clone)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
    pub discount_cents: i64,
}

/// One entry of a monthly restock: a product and the stock level it should
/// be brought up to (not a delta).
#[derive(Debug, Clone)]
pub struct RestockTarget {
    pub product_id: String,
    pub new_quantity: i64,
}

/// Everything needed to reverse the most recent stock-affecting ledger row.
/// Built by the store's undo slot at record time.
#[derive(Debug, Clone)]
pub struct StockReversal {
    pub transaction_id: String,
    /// Sale header to remove alongside the line, if the action created one.
    pub sale_id: Option<String>,
    pub product_id: String,
    pub prior_stock: i64,
    /// Restore the last_restocked stamp as well (restock undo).
    pub restore_last_restocked: bool,
    pub prior_last_restocked: Option<DateTime<Utc>>,
}

// =============================================================================
// Receipts
// =============================================================================

/// Result of a single-product sale.
#[derive(Debug, Clone)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub product: Product,
}

/// Result of a bulk sale: the header with its lines, and every product
/// whose stock changed.
#[derive(Debug, Clone)]
pub struct BulkSaleReceipt {
    pub sale: Sale,
    pub products: Vec<Product>,
}

/// Result of a restock or adjustment.
#[derive(Debug, Clone)]
pub struct StockChangeReceipt {
    pub transaction: Transaction,
    pub product: Product,
}

/// Result of a monthly restock. `parent` is `None` when no entry qualified
/// and nothing was written.
#[derive(Debug, Clone)]
pub struct MonthlyRestockReceipt {
    pub parent: Option<Transaction>,
    pub lines: Vec<Transaction>,
    pub products: Vec<Product>,
    pub total_cost_cents: i64,
    /// Product ids skipped because their target did not raise stock.
    pub skipped: Vec<String>,
}

// =============================================================================
// Ledger Service
// =============================================================================

/// Orchestrates multi-step ledger writes over a shared pool.
#[derive(Debug, Clone)]
pub struct LedgerService {
    pool: SqlitePool,
}

impl LedgerService {
    /// Creates a new LedgerService.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerService { pool }
    }

    /// Records a sale of one product.
    ///
    /// ## Preconditions
    /// - product exists
    /// - `stock_quantity >= quantity`
    ///
    /// ## Effect
    /// One sale header priced `sell price × quantity`, one `Sale` ledger
    /// row linked to it, one stock decrement - atomically.
    pub async fn record_sale(
        &self,
        product_id: &str,
        quantity: i64,
        actor: &Actor,
    ) -> LedgerResult<SaleReceipt> {
        validate_quantity(quantity)?;

        let mut db_tx = self.pool.begin().await.map_err(DbError::from)?;

        let mut product = fetch_product(&mut *db_tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        if !product.can_sell(quantity) {
            return Err(CoreError::InsufficientStock {
                name: product.name.clone(),
                available: product.stock_quantity,
                requested: quantity,
            }
            .into());
        }

        let now = Utc::now();
        let total = product.price().multiply_quantity(quantity);
        let sale_id = Uuid::new_v4().to_string();

        let mut sale = Sale {
            id: sale_id.clone(),
            date: now,
            total_cents: total.cents(),
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
            payment_method: None,
            notes: None,
            discount_cents: None,
            original_total_cents: None,
            items: vec![],
        };

        let line = Transaction {
            id: Uuid::new_v4().to_string(),
            product_id: Some(product.id.clone()),
            product_name: product.name.clone(),
            quantity,
            amount_cents: total.cents(),
            kind: TransactionKind::Sale {
                sale_id: Some(sale_id.clone()),
                discount_cents: None,
                original_cents: None,
            },
            date: now,
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
        };

        let new_stock = product.stock_quantity - quantity;

        insert_sale(&mut *db_tx, &sale).await?;
        insert_transaction(&mut *db_tx, &line).await?;
        write_stock(&mut *db_tx, &product.id, new_stock, now).await?;

        db_tx.commit().await.map_err(DbError::from)?;

        product.stock_quantity = new_stock;
        product.updated_at = now;
        sale.items.push(line);

        info!(
            sale_id = %sale.id,
            product = %product.name,
            quantity = %quantity,
            total = %total,
            "Sale recorded"
        );

        Ok(SaleReceipt { sale, product })
    }

    /// Records one checkout spanning multiple distinct products.
    ///
    /// ## Preconditions
    /// Every line's quantity must be covered by that product's stock -
    /// checked for all lines before the first write.
    ///
    /// ## Effect
    /// One header with `total = max(0, Σ(price×qty) − Σ(discounts))`, one
    /// `Sale` row per line (carrying its own discount and original price
    /// when discounted), one stock decrement per product - atomically.
    pub async fn record_bulk_sale(
        &self,
        lines: &[SaleLine],
        order_discount_cents: i64,
        payment_method: Option<String>,
        notes: Option<String>,
        actor: &Actor,
    ) -> LedgerResult<BulkSaleReceipt> {
        if lines.is_empty() {
            return Err(CoreError::EmptySale.into());
        }
        if lines.len() > MAX_SALE_LINES {
            return Err(CoreError::TooManyLines {
                max: MAX_SALE_LINES,
            }
            .into());
        }
        for line in lines {
            validate_quantity(line.quantity)?;
            validate_non_negative_cents("discount", line.discount_cents)?;
        }
        validate_non_negative_cents("discount", order_discount_cents)?;

        let mut db_tx = self.pool.begin().await.map_err(DbError::from)?;

        // Fetch every product once; a product may appear on several lines.
        let mut products: HashMap<String, Product> = HashMap::new();
        let mut required: HashMap<String, i64> = HashMap::new();
        for line in lines {
            if !products.contains_key(&line.product_id) {
                let product = fetch_product(&mut *db_tx, &line.product_id)
                    .await?
                    .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;
                products.insert(line.product_id.clone(), product);
            }
            *required.entry(line.product_id.clone()).or_insert(0) += line.quantity;
        }

        // All stock preconditions checked before any write.
        for (product_id, needed) in &required {
            let product = &products[product_id];
            if product.stock_quantity < *needed {
                return Err(CoreError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock_quantity,
                    requested: *needed,
                }
                .into());
            }
        }

        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();

        let subtotal: Money = lines
            .iter()
            .map(|line| products[&line.product_id].price().multiply_quantity(line.quantity))
            .sum();
        let item_discounts: Money = lines
            .iter()
            .map(|line| Money::from_cents(line.discount_cents))
            .sum();
        let total_discount = item_discounts + Money::from_cents(order_discount_cents);
        let total = subtotal.saturating_sub_to_zero(total_discount);

        let mut sale = Sale {
            id: sale_id.clone(),
            date: now,
            total_cents: total.cents(),
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
            payment_method,
            notes,
            discount_cents: total_discount.is_positive().then(|| total_discount.cents()),
            original_total_cents: total_discount.is_positive().then(|| subtotal.cents()),
            items: vec![],
        };

        insert_sale(&mut *db_tx, &sale).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = &products[&line.product_id];
            let gross = product.price().multiply_quantity(line.quantity);
            let discount = Money::from_cents(line.discount_cents);
            let net = gross.saturating_sub_to_zero(discount);

            let tx = Transaction {
                id: Uuid::new_v4().to_string(),
                product_id: Some(product.id.clone()),
                product_name: product.name.clone(),
                quantity: line.quantity,
                amount_cents: net.cents(),
                kind: TransactionKind::Sale {
                    sale_id: Some(sale_id.clone()),
                    discount_cents: discount.is_positive().then(|| discount.cents()),
                    original_cents: discount.is_positive().then(|| gross.cents()),
                },
                date: now,
                user_id: actor.user_id.clone(),
                user_name: actor.user_name.clone(),
            };
            insert_transaction(&mut *db_tx, &tx).await?;
            items.push(tx);
        }

        for (product_id, product) in products.iter_mut() {
            let Some(needed) = required.get(product_id) else {
                continue;
            };
            let new_stock = product.stock_quantity - needed;
            write_stock(&mut *db_tx, product_id, new_stock, now).await?;
            product.stock_quantity = new_stock;
            product.updated_at = now;
        }

        db_tx.commit().await.map_err(DbError::from)?;

        sale.items = items;

        info!(
            sale_id = %sale.id,
            lines = lines.len(),
            total = %total,
            discount = %total_discount,
            "Bulk sale recorded"
        );

        Ok(BulkSaleReceipt {
            sale,
            products: products.into_values().collect(),
        })
    }

    /// Restocks one product: stock increment, `last_restocked` stamp, one
    /// `Restock` ledger row priced `cost × quantity`.
    pub async fn record_restock(
        &self,
        product_id: &str,
        quantity: i64,
        actor: &Actor,
    ) -> LedgerResult<StockChangeReceipt> {
        validate_quantity(quantity)?;

        let mut db_tx = self.pool.begin().await.map_err(DbError::from)?;

        let mut product = fetch_product(&mut *db_tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let now = Utc::now();
        let cost = product.cost().multiply_quantity(quantity);
        let new_stock = product.stock_quantity + quantity;

        let tx = Transaction {
            id: Uuid::new_v4().to_string(),
            product_id: Some(product.id.clone()),
            product_name: product.name.clone(),
            quantity,
            amount_cents: cost.cents(),
            kind: TransactionKind::Restock,
            date: now,
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
        };

        insert_transaction(&mut *db_tx, &tx).await?;
        write_stock_and_restocked(&mut *db_tx, &product.id, new_stock, Some(now), now).await?;

        db_tx.commit().await.map_err(DbError::from)?;

        product.stock_quantity = new_stock;
        product.last_restocked = Some(now);
        product.updated_at = now;

        info!(
            product = %product.name,
            quantity = %quantity,
            cost = %cost,
            "Restock recorded"
        );

        Ok(StockChangeReceipt {
            transaction: tx,
            product,
        })
    }

    /// Sets stock directly to `new_quantity` (not a delta) and appends an
    /// `Adjustment` row with `quantity = |new − old|` and a zero amount.
    ///
    /// Adjustments carry no monetary value: they are corrections, not trade.
    pub async fn adjust_inventory(
        &self,
        product_id: &str,
        new_quantity: i64,
        actor: &Actor,
    ) -> LedgerResult<StockChangeReceipt> {
        validate_stock_level(new_quantity)?;

        let mut db_tx = self.pool.begin().await.map_err(DbError::from)?;

        let mut product = fetch_product(&mut *db_tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let now = Utc::now();
        let delta = new_quantity - product.stock_quantity;

        let tx = Transaction {
            id: Uuid::new_v4().to_string(),
            product_id: Some(product.id.clone()),
            product_name: product.name.clone(),
            quantity: delta.abs(),
            amount_cents: 0,
            kind: TransactionKind::Adjustment,
            date: now,
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
        };

        insert_transaction(&mut *db_tx, &tx).await?;
        write_stock(&mut *db_tx, &product.id, new_quantity, now).await?;

        db_tx.commit().await.map_err(DbError::from)?;

        product.stock_quantity = new_quantity;
        product.updated_at = now;

        info!(
            product = %product.name,
            delta = %delta,
            new_stock = %new_quantity,
            "Inventory adjusted"
        );

        Ok(StockChangeReceipt {
            transaction: tx,
            product,
        })
    }

    /// Records one monthly restock event spanning many products.
    ///
    /// Only entries where `new_quantity > current stock` are applied; the
    /// rest are skipped silently. When at least one entry qualifies, one
    /// `RestockAggregate` parent priced at the total cost is written plus
    /// one `RestockLine` child per product, and every affected product's
    /// stock and `last_restocked` are updated - atomically. When nothing
    /// qualifies: zero writes.
    pub async fn record_monthly_restock(
        &self,
        targets: &[RestockTarget],
        actor: &Actor,
    ) -> LedgerResult<MonthlyRestockReceipt> {
        let mut db_tx = self.pool.begin().await.map_err(DbError::from)?;

        let mut qualifying: Vec<(Product, i64)> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();

        for target in targets {
            let product = fetch_product(&mut *db_tx, &target.product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(target.product_id.clone()))?;

            if target.new_quantity > product.stock_quantity {
                qualifying.push((product, target.new_quantity));
            } else {
                skipped.push(target.product_id.clone());
            }
        }

        if qualifying.is_empty() {
            debug!(targets = targets.len(), "Monthly restock: nothing to apply");
            return Ok(MonthlyRestockReceipt {
                parent: None,
                lines: vec![],
                products: vec![],
                total_cost_cents: 0,
                skipped,
            });
        }

        let now = Utc::now();

        let total_cost: Money = qualifying
            .iter()
            .map(|(product, new_qty)| {
                product
                    .cost()
                    .multiply_quantity(new_qty - product.stock_quantity)
            })
            .sum();
        let total_units: i64 = qualifying
            .iter()
            .map(|(product, new_qty)| new_qty - product.stock_quantity)
            .sum();

        let parent = Transaction {
            id: Uuid::new_v4().to_string(),
            product_id: None,
            product_name: "Bulk restock".to_string(),
            quantity: total_units,
            amount_cents: total_cost.cents(),
            kind: TransactionKind::RestockAggregate,
            date: now,
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
        };
        insert_transaction(&mut *db_tx, &parent).await?;

        let mut lines = Vec::with_capacity(qualifying.len());
        let mut products = Vec::with_capacity(qualifying.len());

        for (mut product, new_qty) in qualifying {
            let added = new_qty - product.stock_quantity;
            let line = Transaction {
                id: Uuid::new_v4().to_string(),
                product_id: Some(product.id.clone()),
                product_name: product.name.clone(),
                quantity: added,
                amount_cents: product.cost().multiply_quantity(added).cents(),
                kind: TransactionKind::RestockLine {
                    parent_id: parent.id.clone(),
                },
                date: now,
                user_id: actor.user_id.clone(),
                user_name: actor.user_name.clone(),
            };
            insert_transaction(&mut *db_tx, &line).await?;
            write_stock_and_restocked(&mut *db_tx, &product.id, new_qty, Some(now), now).await?;

            product.stock_quantity = new_qty;
            product.last_restocked = Some(now);
            product.updated_at = now;
            lines.push(line);
            products.push(product);
        }

        db_tx.commit().await.map_err(DbError::from)?;

        info!(
            parent_id = %parent.id,
            products = lines.len(),
            skipped = skipped.len(),
            total_cost = %total_cost,
            "Monthly restock recorded"
        );

        Ok(MonthlyRestockReceipt {
            parent: Some(parent),
            lines,
            products,
            total_cost_cents: total_cost.cents(),
            skipped,
        })
    }

    /// Returns one sale line: stock goes back on the shelf and a `Return`
    /// row priced at the refunded amount is appended, linked to the
    /// original line.
    ///
    /// ## Preconditions
    /// - the transaction exists and is a sale line
    /// - it has not already been returned
    /// - the product still exists (returns restock it)
    pub async fn record_return(
        &self,
        transaction_id: &str,
        actor: &Actor,
    ) -> LedgerResult<StockChangeReceipt> {
        let mut db_tx = self.pool.begin().await.map_err(DbError::from)?;

        let original = fetch_transaction(&mut *db_tx, transaction_id)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", transaction_id))?;

        if !original.is_sale() {
            return Err(CoreError::NotASaleLine(transaction_id.to_string()).into());
        }

        let already_returned: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE kind = 'return' AND parent_id = ?1",
        )
        .bind(transaction_id)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(DbError::from)?;
        if already_returned > 0 {
            return Err(CoreError::AlreadyReturned(transaction_id.to_string()).into());
        }

        let product_id = original.product_id.clone().ok_or_else(|| {
            DbError::corrupt("Transaction", transaction_id, "sale line without product_id")
        })?;
        let mut product = fetch_product(&mut *db_tx, &product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;

        let now = Utc::now();
        let new_stock = product.stock_quantity + original.quantity;

        let tx = Transaction {
            id: Uuid::new_v4().to_string(),
            product_id: Some(product_id.clone()),
            product_name: original.product_name.clone(),
            quantity: original.quantity,
            amount_cents: original.amount_cents,
            kind: TransactionKind::Return {
                original_id: Some(original.id.clone()),
            },
            date: now,
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
        };

        insert_transaction(&mut *db_tx, &tx).await?;
        write_stock(&mut *db_tx, &product_id, new_stock, now).await?;

        db_tx.commit().await.map_err(DbError::from)?;

        product.stock_quantity = new_stock;
        product.updated_at = now;

        info!(
            original = %original.id,
            product = %product.name,
            quantity = %original.quantity,
            refunded = %Money::from_cents(original.amount_cents),
            "Return recorded"
        );

        Ok(StockChangeReceipt {
            transaction: tx,
            product,
        })
    }

    /// Returns the child lines of an aggregate restock, newest first.
    pub async fn get_restock_details(&self, parent_id: &str) -> DbResult<Vec<Transaction>> {
        TransactionRepository::new(self.pool.clone())
            .children_of(parent_id)
            .await
    }

    /// Reverses one recorded action: restores the prior stock level (and
    /// the last_restocked stamp, for restock undo), deletes the ledger row,
    /// and removes the orphaned sale header when there is one - atomically.
    ///
    /// Returns the product as restored.
    pub async fn revert(&self, reversal: &StockReversal) -> DbResult<Product> {
        debug!(transaction_id = %reversal.transaction_id, "Reverting last action");

        let mut db_tx = self.pool.begin().await?;

        let mut product = fetch_product(&mut *db_tx, &reversal.product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &reversal.product_id))?;

        let now = Utc::now();
        if reversal.restore_last_restocked {
            write_stock_and_restocked(
                &mut *db_tx,
                &reversal.product_id,
                reversal.prior_stock,
                reversal.prior_last_restocked,
                now,
            )
            .await?;
            product.last_restocked = reversal.prior_last_restocked;
        } else {
            write_stock(&mut *db_tx, &reversal.product_id, reversal.prior_stock, now).await?;
        }

        delete_transaction(&mut *db_tx, &reversal.transaction_id).await?;
        if let Some(sale_id) = &reversal.sale_id {
            delete_sale(&mut *db_tx, sale_id).await?;
        }

        db_tx.commit().await?;

        product.stock_quantity = reversal.prior_stock;
        product.updated_at = now;

        info!(
            transaction_id = %reversal.transaction_id,
            product = %product.name,
            restored_stock = %reversal.prior_stock,
            "Last action reverted"
        );

        Ok(product)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
