//! # Row Mappers
//!
//! The single translation point between the snake_case storage schema and
//! the domain types in vendo-core.
//!
//! ## Mapping Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Row → Domain Mapping                              │
//! │                                                                         │
//! │  storage shape                     domain shape                         │
//! │  ─────────────                     ────────────                         │
//! │  NULL-able columns        ──────►  Option<T>                            │
//! │  kind TEXT label          ──────►  tagged TransactionKind / FinanceKind │
//! │  category TEXT (JSON?)    ──────►  FinanceCategory (decoded ONCE here)  │
//! │  TEXT timestamps          ──────►  DateTime<Utc>   (decoded by sqlx)    │
//! │                                                                         │
//! │  Downstream code never re-parses kind labels or bundle JSON.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Conversions are pure and side-effect free. A row that decodes to an
//! impossible shape (unknown kind label, restock line without a parent) is
//! a programming error surfaced as [`DbError::Corrupt`] - there is no
//! recovery path. The one sanctioned downgrade is bundle JSON: malformed
//! descriptors become a plain category (see `FinanceCategory::decode`).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::error::{DbError, DbResult};
use vendo_core::{
    FinanceCategory, FinanceKind, FinanceRecord, Product, Sale, Service, Transaction,
    TransactionKind,
};

// =============================================================================
// Product
// =============================================================================

/// A row of the `products` table.
#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub cost_cents: i64,
    pub price_cents: i64,
    pub stock_quantity: i64,
    pub low_stock_threshold: i64,
    pub last_restocked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    /// Total conversion; the products schema cannot express an invalid product.
    pub fn into_domain(self) -> Product {
        Product {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            cost_cents: self.cost_cents,
            price_cents: self.price_cents,
            stock_quantity: self.stock_quantity,
            low_stock_threshold: self.low_stock_threshold,
            last_restocked: self.last_restocked,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// A row of the `services` table.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl ServiceRow {
    pub fn into_domain(self) -> Service {
        Service {
            id: self.id,
            name: self.name,
            description: self.description,
            price_cents: self.price_cents,
            active: self.active,
            created_at: self.created_at,
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A row of the `transactions` table. The flat optional columns collapse
/// into the tagged [`TransactionKind`] on the way into the domain.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: String,
    pub product_id: Option<String>,
    pub product_name: String,
    pub quantity: i64,
    pub amount_cents: i64,
    pub kind: String,
    pub date: DateTime<Utc>,
    pub user_id: String,
    pub user_name: String,
    pub sale_id: Option<String>,
    pub discount_cents: Option<i64>,
    pub original_cents: Option<i64>,
    pub parent_id: Option<String>,
}

impl TransactionRow {
    /// Decodes the kind label and its companion columns into the tagged
    /// domain kind. Fails fast on shapes the schema CHECK should prevent.
    pub fn into_domain(self) -> DbResult<Transaction> {
        let kind = match self.kind.as_str() {
            "sale" => TransactionKind::Sale {
                sale_id: self.sale_id,
                discount_cents: self.discount_cents,
                original_cents: self.original_cents,
            },
            "restock" => TransactionKind::Restock,
            "restock_aggregate" => TransactionKind::RestockAggregate,
            "restock_line" => TransactionKind::RestockLine {
                parent_id: self.parent_id.ok_or_else(|| {
                    DbError::corrupt("Transaction", &self.id, "restock_line without parent_id")
                })?,
            },
            "adjustment" => TransactionKind::Adjustment,
            "return" => TransactionKind::Return {
                original_id: self.parent_id,
            },
            other => {
                return Err(DbError::corrupt(
                    "Transaction",
                    &self.id,
                    format!("unknown kind '{other}'"),
                ))
            }
        };

        Ok(Transaction {
            id: self.id,
            product_id: self.product_id,
            product_name: self.product_name,
            quantity: self.quantity,
            amount_cents: self.amount_cents,
            kind,
            date: self.date,
            user_id: self.user_id,
            user_name: self.user_name,
        })
    }

    /// Flattens a domain transaction back into column values for insertion.
    pub fn from_domain(tx: &Transaction) -> TransactionRow {
        let (sale_id, discount_cents, original_cents, parent_id) = match &tx.kind {
            TransactionKind::Sale {
                sale_id,
                discount_cents,
                original_cents,
            } => (sale_id.clone(), *discount_cents, *original_cents, None),
            TransactionKind::RestockLine { parent_id } => {
                (None, None, None, Some(parent_id.clone()))
            }
            TransactionKind::Return { original_id } => (None, None, None, original_id.clone()),
            _ => (None, None, None, None),
        };

        TransactionRow {
            id: tx.id.clone(),
            product_id: tx.product_id.clone(),
            product_name: tx.product_name.clone(),
            quantity: tx.quantity,
            amount_cents: tx.amount_cents,
            kind: tx.kind.label().to_string(),
            date: tx.date,
            user_id: tx.user_id.clone(),
            user_name: tx.user_name.clone(),
            sale_id,
            discount_cents,
            original_cents,
            parent_id,
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A row of the `sales` table (header only; items are joined separately).
#[derive(Debug, Clone, FromRow)]
pub struct SaleRow {
    pub id: String,
    pub date: DateTime<Utc>,
    pub total_cents: i64,
    pub user_id: String,
    pub user_name: String,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub discount_cents: Option<i64>,
    pub original_total_cents: Option<i64>,
}

impl SaleRow {
    /// Attaches the line transactions sharing this sale's id.
    pub fn into_domain(self, items: Vec<Transaction>) -> Sale {
        Sale {
            id: self.id,
            date: self.date,
            total_cents: self.total_cents,
            user_id: self.user_id,
            user_name: self.user_name,
            payment_method: self.payment_method,
            notes: self.notes,
            discount_cents: self.discount_cents,
            original_total_cents: self.original_total_cents,
            items,
        }
    }
}

// =============================================================================
// Finance
// =============================================================================

/// A row of the `finances` table.
#[derive(Debug, Clone, FromRow)]
pub struct FinanceRow {
    pub id: String,
    pub kind: String,
    pub date: DateTime<Utc>,
    pub amount_cents: i64,
    pub customer_name: Option<String>,
    pub service_id: Option<String>,
    pub payment_method: Option<String>,
    pub tip_cents: Option<i64>,
    pub vendor: Option<String>,
    pub category: Option<String>,
}

impl FinanceRow {
    /// Decodes the kind label and the category column (plain name or
    /// bundle JSON - the only place that JSON is ever parsed).
    pub fn into_domain(self) -> DbResult<FinanceRecord> {
        let kind = match self.kind.as_str() {
            "income" => FinanceKind::Income,
            "expense" => FinanceKind::Expense,
            other => {
                return Err(DbError::corrupt(
                    "FinanceRecord",
                    &self.id,
                    format!("unknown kind '{other}'"),
                ))
            }
        };

        Ok(FinanceRecord {
            id: self.id,
            kind,
            date: self.date,
            amount_cents: self.amount_cents,
            customer_name: self.customer_name,
            service_id: self.service_id,
            payment_method: self.payment_method,
            tip_cents: self.tip_cents,
            vendor: self.vendor,
            category: FinanceCategory::decode(self.category.as_deref()),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
