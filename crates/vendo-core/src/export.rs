//! # CSV Export
//!
//! Renders metric result sets as comma-separated text for download.
//!
//! Layout contract: one fixed header row, one row per entry, name fields
//! quoted, every numeric field with exactly two decimal places.

use crate::metrics::{ProductPerformance, ServicePerformance};
use crate::money::Money;

/// Quotes a CSV field, doubling embedded quotes.
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Formats a count with the same two-decimal convention as money columns.
fn count(n: i64) -> String {
    format!("{n}.00")
}

/// Renders product performance rows as CSV.
///
/// ## Example
/// ```text
/// Product,Category,Units Sold,Revenue,Profit
/// "Motor Oil 1L","Fluids",3.00,60.00,36.00
/// ```
pub fn product_performance_csv(rows: &[ProductPerformance]) -> String {
    let mut csv = String::from("Product,Category,Units Sold,Revenue,Profit\n");
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            quote(&row.name),
            quote(&row.category),
            count(row.total_sold),
            Money::from_cents(row.revenue_cents).format_decimal(),
            Money::from_cents(row.profit_cents).format_decimal(),
        ));
    }
    csv
}

/// Renders service performance rows as CSV.
pub fn service_performance_csv(rows: &[ServicePerformance]) -> String {
    let mut csv = String::from("Service,Occurrences,Revenue,Unique Customers\n");
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{}\n",
            quote(&row.name),
            count(row.occurrences),
            Money::from_cents(row.revenue_cents).format_decimal(),
            count(row.unique_customers),
        ));
    }
    csv
}

// =============================================================================
// Unit Tests
// =============================================================================
