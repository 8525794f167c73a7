//! # Metrics Derivation
//!
//! Pure, cache-only derivation of business metrics from already-loaded
//! snapshot data. No I/O, no clock: callers pass `now`.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Metrics Derivation                                 │
//! │                                                                         │
//! │  Store snapshot                      Derived (this module)             │
//! │  ──────────────                      ──────────────────────             │
//! │  transactions ───┬──────────────► product_performance (profit ranking) │
//! │                  ├──────────────► category_revenue                     │
//! │                  └──────────────► latest_restock                       │
//! │  sales ─────────────────────────► sales_by_day (time series)           │
//! │  service incomes ───┬───────────► service_performance (bundle-aware)   │
//! │                     └───────────► unique_customers                     │
//! │  all of the above ──────────────► total_metrics                        │
//! │                                                                         │
//! │  Every function filters by a TimeWindow before aggregating.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Product, Sale, ServiceIncome, Transaction};

// =============================================================================
// Time Windows
// =============================================================================

/// The dashboard's selectable reporting windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
    /// No lower bound.
    AllTime,
}

impl TimeWindow {
    /// Date-threshold predicate against the caller's `now`.
    pub fn contains(&self, date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            TimeWindow::Week => date >= now - Duration::days(7),
            TimeWindow::Month => date >= now - Duration::days(30),
            TimeWindow::AllTime => true,
        }
    }
}

// =============================================================================
// Result Types
// =============================================================================

/// Sales performance of one product over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductPerformance {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub total_sold: i64,
    pub revenue_cents: i64,
    /// revenue − cost × units sold
    pub profit_cents: i64,
}

/// Revenue for one calendar day (ISO `YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailyRevenue {
    pub date: String,
    pub revenue_cents: i64,
}

/// Sale revenue attributed to one product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRevenue {
    pub category: String,
    pub revenue_cents: i64,
}

/// Performance of one service over a window, bundle rows expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ServicePerformance {
    pub service_id: Option<String>,
    pub name: String,
    pub occurrences: i64,
    pub revenue_cents: i64,
    pub unique_customers: i64,
}

/// Headline reductions over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TotalMetrics {
    /// Number of sale lines in the window.
    pub sale_count: i64,
    pub sales_revenue_cents: i64,
    /// Number of service income rows in the window (bundles count once).
    pub service_count: i64,
    pub service_revenue_cents: i64,
    pub tip_cents: i64,
    /// sales + service revenue (tips reported separately).
    pub total_revenue_cents: i64,
    pub unique_customers: i64,
}

// =============================================================================
// Product Metrics
// =============================================================================

/// Groups sale-type transactions by product, accumulating units sold,
/// revenue, and profit. Sorted descending by profit.
///
/// Unit cost and category come from the catalog; a product that has since
/// been deleted falls back to its ledger name snapshot and a zero cost.
pub fn product_performance(
    transactions: &[Transaction],
    products: &[Product],
    window: TimeWindow,
    now: DateTime<Utc>,
) -> Vec<ProductPerformance> {
    struct Acc {
        name: String,
        category: String,
        cost_cents: i64,
        total_sold: i64,
        revenue: Money,
    }

    let catalog: BTreeMap<&str, &Product> =
        products.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut by_product: BTreeMap<String, Acc> = BTreeMap::new();

    for tx in transactions {
        if !tx.is_sale() || !window.contains(tx.date, now) {
            continue;
        }
        let Some(product_id) = tx.product_id.as_deref() else {
            continue;
        };

        let entry = by_product.entry(product_id.to_string()).or_insert_with(|| {
            let known = catalog.get(product_id);
            Acc {
                name: known
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| tx.product_name.clone()),
                category: known
                    .map(|p| p.category.clone())
                    .unwrap_or_else(|| "Uncategorized".to_string()),
                cost_cents: known.map(|p| p.cost_cents).unwrap_or(0),
                total_sold: 0,
                revenue: Money::zero(),
            }
        });

        entry.total_sold += tx.quantity;
        entry.revenue += tx.amount();
    }

    let mut rows: Vec<ProductPerformance> = by_product
        .into_iter()
        .map(|(product_id, acc)| {
            let cost = Money::from_cents(acc.cost_cents).multiply_quantity(acc.total_sold);
            ProductPerformance {
                product_id,
                name: acc.name,
                category: acc.category,
                total_sold: acc.total_sold,
                revenue_cents: acc.revenue.cents(),
                profit_cents: (acc.revenue - cost).cents(),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.profit_cents.cmp(&a.profit_cents));
    rows
}

/// Groups sale revenue by product category, sorted descending by revenue.
pub fn category_revenue(
    transactions: &[Transaction],
    products: &[Product],
    window: TimeWindow,
    now: DateTime<Utc>,
) -> Vec<CategoryRevenue> {
    let catalog: BTreeMap<&str, &Product> =
        products.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut by_category: BTreeMap<String, Money> = BTreeMap::new();

    for tx in transactions {
        if !tx.is_sale() || !window.contains(tx.date, now) {
            continue;
        }
        let category = tx
            .product_id
            .as_deref()
            .and_then(|id| catalog.get(id))
            .map(|p| p.category.clone())
            .unwrap_or_else(|| "Uncategorized".to_string());

        *by_category.entry(category).or_insert_with(Money::zero) += tx.amount();
    }

    let mut rows: Vec<CategoryRevenue> = by_category
        .into_iter()
        .map(|(category, revenue)| CategoryRevenue {
            category,
            revenue_cents: revenue.cents(),
        })
        .collect();

    rows.sort_by(|a, b| b.revenue_cents.cmp(&a.revenue_cents));
    rows
}

// =============================================================================
// Sales Time Series
// =============================================================================

/// Groups sales by calendar day within the window, summing revenue per day.
/// Sorted ascending by date; feeds the revenue time-series chart.
pub fn sales_by_day(sales: &[Sale], window: TimeWindow, now: DateTime<Utc>) -> Vec<DailyRevenue> {
    let mut by_day: BTreeMap<String, Money> = BTreeMap::new();

    for sale in sales {
        if !window.contains(sale.date, now) {
            continue;
        }
        let day = sale.date.date_naive().to_string();
        *by_day.entry(day).or_insert_with(Money::zero) += sale.total();
    }

    // BTreeMap iterates keys ascending; ISO dates sort chronologically.
    by_day
        .into_iter()
        .map(|(date, revenue)| DailyRevenue {
            date,
            revenue_cents: revenue.cents(),
        })
        .collect()
}

// =============================================================================
// Service Metrics
// =============================================================================

/// Groups filtered service incomes by service, sorted descending by revenue.
///
/// ## Bundle Expansion
/// A bundled income expands into one entry per member service, each getting
/// its proportional share of the bundle discount:
/// `net_i = price_i − (price_i / Σprices) × discount`, floored at zero.
/// The bundle's customer counts toward every member service.
pub fn service_performance(
    incomes: &[ServiceIncome],
    window: TimeWindow,
    now: DateTime<Utc>,
) -> Vec<ServicePerformance> {
    struct Acc {
        service_id: Option<String>,
        name: String,
        occurrences: i64,
        revenue: Money,
        customers: BTreeSet<String>,
    }

    let mut by_service: BTreeMap<String, Acc> = BTreeMap::new();

    let mut tally = |key: String,
                     service_id: Option<String>,
                     name: &str,
                     net: Money,
                     customer: Option<&str>| {
        let entry = by_service.entry(key).or_insert_with(|| Acc {
            service_id,
            name: name.to_string(),
            occurrences: 0,
            revenue: Money::zero(),
            customers: BTreeSet::new(),
        });
        entry.occurrences += 1;
        entry.revenue += net;
        if let Some(customer) = customer.map(str::trim).filter(|c| !c.is_empty()) {
            entry.customers.insert(customer.to_string());
        }
    };

    for income in incomes {
        let record = &income.record;
        if !window.contains(record.date, now) {
            continue;
        }
        let customer = record.customer_name.as_deref();

        match record.category.bundle() {
            Some(bundle) => {
                let subtotal = bundle.subtotal();
                let discount = Money::from_cents(bundle.discount_cents);

                let members = bundle
                    .service_ids
                    .iter()
                    .zip(&bundle.service_names)
                    .zip(&bundle.service_prices_cents);
                for ((service_id, name), price_cents) in members {
                    let price = Money::from_cents(*price_cents);
                    let net = price.allocate_discount(subtotal, discount);
                    tally(
                        service_id.clone(),
                        Some(service_id.clone()),
                        name,
                        net,
                        customer,
                    );
                }
            }
            None => {
                // Unbundled rows key by service id when present, otherwise
                // by the resolved name (service row may be long gone).
                let key = record
                    .service_id
                    .clone()
                    .unwrap_or_else(|| format!("name:{}", income.service_name));
                tally(
                    key,
                    record.service_id.clone(),
                    &income.service_name,
                    record.amount(),
                    customer,
                );
            }
        }
    }

    let mut rows: Vec<ServicePerformance> = by_service
        .into_values()
        .map(|acc| ServicePerformance {
            service_id: acc.service_id,
            name: acc.name,
            occurrences: acc.occurrences,
            revenue_cents: acc.revenue.cents(),
            unique_customers: acc.customers.len() as i64,
        })
        .collect();

    rows.sort_by(|a, b| b.revenue_cents.cmp(&a.revenue_cents));
    rows
}

/// Distinct non-empty customer names across the filtered incomes.
pub fn unique_customers(incomes: &[ServiceIncome], window: TimeWindow, now: DateTime<Utc>) -> i64 {
    let names: BTreeSet<&str> = incomes
        .iter()
        .filter(|i| window.contains(i.record.date, now))
        .filter_map(|i| i.record.customer_name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();
    names.len() as i64
}

// =============================================================================
// Headline Reductions
// =============================================================================

/// Simple reductions over the filtered transaction and income sets.
pub fn total_metrics(
    transactions: &[Transaction],
    incomes: &[ServiceIncome],
    window: TimeWindow,
    now: DateTime<Utc>,
) -> TotalMetrics {
    let mut sale_count = 0i64;
    let mut sales_revenue = Money::zero();
    for tx in transactions {
        if tx.is_sale() && window.contains(tx.date, now) {
            sale_count += 1;
            sales_revenue += tx.amount();
        }
    }

    let mut service_count = 0i64;
    let mut service_revenue = Money::zero();
    let mut tips = Money::zero();
    for income in incomes {
        if window.contains(income.record.date, now) {
            service_count += 1;
            service_revenue += income.record.amount();
            tips += income.record.tip();
        }
    }

    TotalMetrics {
        sale_count,
        sales_revenue_cents: sales_revenue.cents(),
        service_count,
        service_revenue_cents: service_revenue.cents(),
        tip_cents: tips.cents(),
        total_revenue_cents: (sales_revenue + service_revenue).cents(),
        unique_customers: unique_customers(incomes, window, now),
    }
}

/// The most recent restock-family transaction date, if any.
///
/// Aggregate headers, their lines, and single restocks all qualify.
pub fn latest_restock(transactions: &[Transaction]) -> Option<DateTime<Utc>> {
    transactions
        .iter()
        .filter(|tx| tx.kind.is_restock())
        .map(|tx| tx.date)
        .max()
}

// =============================================================================
// Unit Tests
// =============================================================================
