//! # Seed Data Generator
//!
//! Populates the database with test catalog data for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p vendo-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p vendo-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p vendo-db --bin seed -- --db ./data/vendo.db
//! ```
//!
//! ## Generated Data
//! Products across realistic shop categories (parts, fluids, accessories,
//! consumables) with pseudo-random prices, costs, and stock levels, plus a
//! small set of services.

use chrono::Utc;
use std::env;
use tracing::info;
use uuid::Uuid;

use vendo_core::{Product, Service, DEFAULT_LOW_STOCK_THRESHOLD};
use vendo_db::{Database, DbConfig};

/// Product categories with base names for generated entries.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Fluids",
        &[
            "Motor Oil 1L",
            "Motor Oil 4L",
            "Coolant",
            "Brake Fluid",
            "Power Steering Fluid",
            "Windshield Washer",
            "Transmission Fluid",
            "Grease Tube",
        ],
    ),
    (
        "Parts",
        &[
            "Oil Filter",
            "Air Filter",
            "Cabin Filter",
            "Spark Plug",
            "Wiper Blade",
            "Brake Pad Set",
            "Serpentine Belt",
            "Battery 45Ah",
            "Headlight Bulb",
            "Fuse Kit",
        ],
    ),
    (
        "Accessories",
        &[
            "Floor Mat Set",
            "Seat Cover",
            "Phone Mount",
            "Air Freshener",
            "Tire Gauge",
            "Jump Cables",
            "Microfiber Cloth Pack",
        ],
    ),
    (
        "Consumables",
        &[
            "Shop Towels",
            "Degreaser Spray",
            "Hand Cleaner",
            "Polish Wax",
            "Glass Cleaner",
            "Tire Shine",
        ],
    ),
];

const SERVICES: &[(&str, i64)] = &[
    ("Oil Change", 4500),
    ("Tire Rotation", 3000),
    ("Brake Inspection", 2500),
    ("Battery Check", 1500),
    ("Full Detailing", 12000),
    ("Wash & Wax", 5500),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let count = arg_value(&args, "--count")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(200);
    let db_path = arg_value(&args, "--db").unwrap_or_else(|| "./vendo.db".to_string());

    info!(db = %db_path, count = count, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let products = db.products();
    let now = Utc::now();

    for i in 0..count {
        let (category, names) = CATEGORIES[i % CATEGORIES.len()];
        let base = names[(i / CATEGORIES.len()) % names.len()];

        // Deterministic pseudo-random spread; good enough for fixtures.
        let price_cents = 199 + ((i as i64 * 137) % 4800);
        let cost_cents = price_cents * 6 / 10;
        let stock = (i as i64 * 31) % 60;

        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: format!("{base} #{}", i + 1),
            description: None,
            category: category.to_string(),
            cost_cents,
            price_cents,
            stock_quantity: stock,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            last_restocked: None,
            created_at: now,
            updated_at: now,
        };
        products.insert(&product).await?;
    }

    let services = db.services();
    for (name, price_cents) in SERVICES {
        let service = Service {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: None,
            price_cents: *price_cents,
            active: true,
            created_at: now,
        };
        services.insert(&service).await?;
    }

    info!(
        products = count,
        services = SERVICES.len(),
        "Seed complete"
    );

    Ok(())
}

/// Returns the value following a `--flag` argument, if present.
fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
