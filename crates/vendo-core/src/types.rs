//! # Domain Types
//!
//! Core domain types used throughout Vendo.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  Transaction    │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  stock_quantity │   │  kind (tagged)  │   │  total_cents    │       │
//! │  │  price/cost     │   │  amount_cents   │   │  items[]        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Service      │   │  FinanceRecord  │   │  ServiceIncome  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  active (soft   │   │  Income/Expense │   │  record + name  │       │
//! │  │  delete flag)   │   │  category enum  │   │  (resolved)     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Ledger rows denormalize `product_name` and `user_name` at write time so
//! history stays readable after catalog rows change or disappear.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Actor
// =============================================================================

/// The user on whose behalf an operation runs.
///
/// Both fields are snapshotted onto every ledger row and sale header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: String,
    pub user_name: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Actor {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// ## Invariant
/// `stock_quantity` never goes negative as a result of a sale: sales are
/// rejected when the requested quantity exceeds stock, before any write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, snapshotted onto ledger rows at transaction time.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Category label, used by the category revenue metric.
    pub category: String,

    /// Acquisition cost per unit in cents (profit calculations).
    pub cost_cents: i64,

    /// Sell price per unit in cents.
    pub price_cents: i64,

    /// Current stock level. Never negative after a sale.
    pub stock_quantity: i64,

    /// Stock level at or below which the product counts as low stock.
    pub low_stock_threshold: i64,

    /// When the product was last restocked, if ever.
    #[ts(as = "Option<String>")]
    pub last_restocked: Option<DateTime<Utc>>,

    /// When the product was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the sell price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the unit cost as a Money type.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Checks whether a sale of `quantity` units is allowed.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        quantity > 0 && self.stock_quantity >= quantity
    }

    /// Checks whether the product is at or below its low-stock threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }
}

// =============================================================================
// Service
// =============================================================================

/// A service offered alongside the product catalog.
///
/// ## Soft Delete
/// Deactivating sets `active = false` instead of removing the row, so past
/// finance records keep resolving to a service name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Service {
    /// Returns the service price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Transaction (Ledger Entry)
// =============================================================================

/// Discriminates the shape of a ledger row.
///
/// ## Restock Aggregation
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                   Monthly Restock Representation                        │
/// │                                                                         │
/// │   RestockAggregate { }            one parent, priced at the total      │
/// │        ▲       ▲                  cost of the whole restock event      │
/// │        │       │                                                        │
/// │   RestockLine  RestockLine        one child per restocked product,     │
/// │   {parent_id}  {parent_id}        linked back to the parent            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
///
/// The tagged variants replace a sentinel "system product" identifier: the
/// kind itself says whether a row is an aggregate header or a member line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TransactionKind {
    /// A sale line, optionally grouped under a sale header.
    /// `discount_cents`/`original_cents` are set when the line was discounted.
    Sale {
        sale_id: Option<String>,
        discount_cents: Option<i64>,
        original_cents: Option<i64>,
    },
    /// A restock applied to a single product.
    Restock,
    /// The parent header of a bulk restock event (no single product).
    RestockAggregate,
    /// A per-product line belonging to a bulk restock event.
    RestockLine { parent_id: String },
    /// A manual stock correction. Carries no monetary value.
    Adjustment,
    /// A compensating entry for a returned sale line. `original_id` links
    /// back to the line being returned when known.
    Return { original_id: Option<String> },
}

impl TransactionKind {
    /// Stable lowercase label, as stored in the ledger's kind column.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Sale { .. } => "sale",
            TransactionKind::Restock => "restock",
            TransactionKind::RestockAggregate => "restock_aggregate",
            TransactionKind::RestockLine { .. } => "restock_line",
            TransactionKind::Adjustment => "adjustment",
            TransactionKind::Return { .. } => "return",
        }
    }

    /// True for any of the restock-family kinds.
    pub fn is_restock(&self) -> bool {
        matches!(
            self,
            TransactionKind::Restock
                | TransactionKind::RestockAggregate
                | TransactionKind::RestockLine { .. }
        )
    }
}

/// An entry in the append-only ledger.
///
/// ## Invariant
/// Immutable once written. Corrections happen via new `Adjustment`/`Return`
/// rows; the single exception is the one-level undo, which deletes the most
/// recent row and reverses its stock effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,

    /// The affected product. `None` only for `RestockAggregate` headers,
    /// which span many products.
    pub product_id: Option<String>,

    /// Product name at transaction time (frozen).
    pub product_name: String,

    /// Units moved. For adjustments: `|new − old|`, direction-agnostic.
    pub quantity: i64,

    /// Total line amount in cents (not unit price).
    pub amount_cents: i64,

    pub kind: TransactionKind,

    #[ts(as = "String")]
    pub date: DateTime<Utc>,

    pub user_id: String,

    /// User name at transaction time (frozen).
    pub user_name: String,
}

impl Transaction {
    /// Returns the line amount as a Money type.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// The sale header this line belongs to, if any.
    pub fn sale_id(&self) -> Option<&str> {
        match &self.kind {
            TransactionKind::Sale { sale_id, .. } => sale_id.as_deref(),
            _ => None,
        }
    }

    /// True for sale lines.
    #[inline]
    pub fn is_sale(&self) -> bool {
        matches!(self.kind, TransactionKind::Sale { .. })
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale header grouping one checkout's line transactions.
///
/// `discount_cents`/`original_total_cents` are populated when an order-level
/// or per-item discount applied; `total_cents` is always the net amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub total_cents: i64,
    pub user_id: String,
    pub user_name: String,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub discount_cents: Option<i64>,
    pub original_total_cents: Option<i64>,

    /// The line transactions sharing this sale's id.
    pub items: Vec<Transaction>,
}

impl Sale {
    /// Returns the net total as a Money type.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Finance Records
// =============================================================================

/// Whether a finance record is money in or money out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FinanceKind {
    Income,
    Expense,
}

impl FinanceKind {
    /// Stable lowercase label, as stored in the finances kind column.
    pub fn label(&self) -> &'static str {
        match self {
            FinanceKind::Income => "income",
            FinanceKind::Expense => "expense",
        }
    }
}

/// Descriptor of a bundled multi-service income row.
///
/// The backing schema supports one `service_id` per finance row; a bundle of
/// N services sold together is denormalized into this descriptor, stored as
/// JSON in the category column and decoded exactly once by the row mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBundle {
    pub service_ids: Vec<String>,
    pub service_names: Vec<String>,
    pub service_prices_cents: Vec<i64>,
    pub discount_cents: i64,
}

impl ServiceBundle {
    /// The three member arrays must agree in length and be non-empty.
    pub fn is_consistent(&self) -> bool {
        !self.service_ids.is_empty()
            && self.service_ids.len() == self.service_names.len()
            && self.service_ids.len() == self.service_prices_cents.len()
    }

    /// Pre-discount sum of the bundled prices.
    pub fn subtotal(&self) -> Money {
        self.service_prices_cents
            .iter()
            .map(|c| Money::from_cents(*c))
            .sum()
    }
}

/// The decoded category of a finance record.
///
/// A plain category name (or nothing) for ordinary rows; a bundle descriptor
/// for multi-service income. Downstream logic matches on this variant and
/// never re-parses the raw column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FinanceCategory {
    Plain { name: Option<String> },
    Bundle { bundle: ServiceBundle },
}

impl FinanceCategory {
    /// Decodes the raw category column.
    ///
    /// ## Downgrade Policy
    /// Malformed or inconsistent bundle JSON is treated as a plain category
    /// name, never as an error: a corrupted descriptor downgrades the row to
    /// an ordinary unbundled income.
    pub fn decode(raw: Option<&str>) -> FinanceCategory {
        let Some(raw) = raw else {
            return FinanceCategory::Plain { name: None };
        };

        if let Ok(bundle) = serde_json::from_str::<ServiceBundle>(raw) {
            if bundle.is_consistent() {
                return FinanceCategory::Bundle { bundle };
            }
        }

        FinanceCategory::Plain {
            name: Some(raw.to_string()),
        }
    }

    /// Encodes back to the raw column representation.
    pub fn encode(&self) -> Option<String> {
        match self {
            FinanceCategory::Plain { name } => name.clone(),
            FinanceCategory::Bundle { bundle } => {
                Some(serde_json::to_string(bundle).unwrap_or_default())
            }
        }
    }

    /// The bundle descriptor, if this is a bundled category.
    pub fn bundle(&self) -> Option<&ServiceBundle> {
        match self {
            FinanceCategory::Bundle { bundle } => Some(bundle),
            FinanceCategory::Plain { .. } => None,
        }
    }
}

/// An income or expense record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FinanceRecord {
    pub id: String,
    pub kind: FinanceKind,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub amount_cents: i64,
    pub customer_name: Option<String>,
    pub service_id: Option<String>,
    pub payment_method: Option<String>,
    pub tip_cents: Option<i64>,
    pub vendor: Option<String>,
    pub category: FinanceCategory,
}

impl FinanceRecord {
    /// Returns the record amount as a Money type.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Returns the tip as a Money type (zero when absent).
    #[inline]
    pub fn tip(&self) -> Money {
        Money::from_cents(self.tip_cents.unwrap_or(0))
    }
}

/// An income record resolved for the metrics layer: the raw record plus the
/// service name it answers to (joined from the service catalog, or fallen
/// back to the plain category when the service row is gone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIncome {
    pub record: FinanceRecord,
    pub service_name: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64, threshold: i64) -> Product {
        Product {
            id: "p1".to_string(),
            name: "Test".to_string(),
            description: None,
            category: "General".to_string(),
            cost_cents: 500,
            price_cents: 900,
            stock_quantity: stock,
            low_stock_threshold: threshold,
            last_restocked: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_product_can_sell() {
        let p = product(5, 2);
        assert!(p.can_sell(5));
        assert!(!p.can_sell(6));
        assert!(!p.can_sell(0));
        assert!(!p.can_sell(-1));
    }

    #[test]
    fn test_product_low_stock() {
        assert!(product(2, 2).is_low_stock());
        assert!(product(0, 2).is_low_stock());
        assert!(!product(3, 2).is_low_stock());
    }

    #[test]
    fn test_kind_labels() {
        let sale = TransactionKind::Sale {
            sale_id: None,
            discount_cents: None,
            original_cents: None,
        };
        assert_eq!(sale.label(), "sale");
        assert_eq!(TransactionKind::Restock.label(), "restock");
        assert_eq!(
            TransactionKind::RestockAggregate.label(),
            "restock_aggregate"
        );
        assert_eq!(
            TransactionKind::RestockLine {
                parent_id: "t1".to_string()
            }
            .label(),
            "restock_line"
        );
        assert_eq!(TransactionKind::Adjustment.label(), "adjustment");
        assert_eq!(
            TransactionKind::Return { original_id: None }.label(),
            "return"
        );
    }

    #[test]
    fn test_restock_family() {
        assert!(TransactionKind::Restock.is_restock());
        assert!(TransactionKind::RestockAggregate.is_restock());
        assert!(TransactionKind::RestockLine {
            parent_id: "x".to_string()
        }
        .is_restock());
        assert!(!TransactionKind::Adjustment.is_restock());
    }

    #[test]
    fn test_finance_category_decodes_bundle() {
        let raw = r#"{"serviceIds":["s1","s2"],"serviceNames":["Wash","Wax"],"servicePricesCents":[3000,7000],"discountCents":1000}"#;
        let decoded = FinanceCategory::decode(Some(raw));

        let bundle = decoded.bundle().expect("should decode as bundle");
        assert_eq!(bundle.service_ids, vec!["s1", "s2"]);
        assert_eq!(bundle.subtotal().cents(), 10000);
        assert_eq!(bundle.discount_cents, 1000);
    }

    #[test]
    fn test_finance_category_downgrades_malformed_json() {
        let decoded = FinanceCategory::decode(Some("{not json"));
        assert_eq!(
            decoded,
            FinanceCategory::Plain {
                name: Some("{not json".to_string())
            }
        );
    }

    #[test]
    fn test_finance_category_downgrades_inconsistent_bundle() {
        // Two ids but only one price: arrays disagree, treat as plain text.
        let raw = r#"{"serviceIds":["s1","s2"],"serviceNames":["A","B"],"servicePricesCents":[3000],"discountCents":0}"#;
        let decoded = FinanceCategory::decode(Some(raw));
        assert!(decoded.bundle().is_none());
    }

    #[test]
    fn test_finance_category_roundtrip() {
        let bundle = ServiceBundle {
            service_ids: vec!["s1".to_string()],
            service_names: vec!["Detailing".to_string()],
            service_prices_cents: vec![4500],
            discount_cents: 0,
        };
        let encoded = FinanceCategory::Bundle { bundle }.encode().unwrap();
        let decoded = FinanceCategory::decode(Some(&encoded));
        assert!(decoded.bundle().is_some());
    }

    #[test]
    fn test_plain_category_roundtrip() {
        let cat = FinanceCategory::Plain {
            name: Some("Maintenance".to_string()),
        };
        assert_eq!(
            FinanceCategory::decode(cat.encode().as_deref()),
            FinanceCategory::Plain {
                name: Some("Maintenance".to_string())
            }
        );
        assert_eq!(FinanceCategory::decode(None).encode(), None);
    }
}
