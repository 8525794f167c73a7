//! # vendo-db: Database Layer for Vendo
//!
//! This crate provides database access for the Vendo system.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Vendo Data Flow                                │
//! │                                                                         │
//! │  vendo-store operation (record_sale, load, undo_last, ...)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     vendo-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐   ┌──────────────┐   ┌────────────────────┐  │   │
//! │  │   │  Database  │   │ Repositories │   │   LedgerService    │  │   │
//! │  │   │ (pool.rs)  │   │ product sale │   │  multi-row writes  │  │   │
//! │  │   │            │◄──│ service tx   │◄──│  in one SQLite     │  │   │
//! │  │   │ SqlitePool │   │ finance      │   │  transaction       │  │   │
//! │  │   └────────────┘   └──────┬───────┘   └────────────────────┘  │   │
//! │  │                          │                                     │   │
//! │  │                   ┌──────▼───────┐                             │   │
//! │  │                   │  Row Mappers │  snake_case rows → domain   │   │
//! │  │                   │   (rows.rs)  │  (kind labels, bundle JSON) │   │
//! │  │                   └──────────────┘                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL mode, embedded migrations)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`rows`] - Row structs and row → domain mappers
//! - [`repository`] - Repository implementations (product, sale, etc.)
//! - [`ledger`] - The ledger write service
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vendo_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/vendo.db")).await?;
//!
//! let products = db.products().list().await?;
//! let receipt = db.ledger().record_sale(&products[0].id, 2, &actor).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod rows;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use ledger::{
    BulkSaleReceipt, LedgerError, LedgerResult, LedgerService, MonthlyRestockReceipt,
    RestockTarget, SaleLine, SaleReceipt, StockChangeReceipt, StockReversal,
};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::finance::FinanceRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::service::ServiceRepository;
pub use repository::transaction::TransactionRepository;
