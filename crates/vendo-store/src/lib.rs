//! # vendo-store: Application State Container
//!
//! The in-process snapshot of catalog, ledger, sales, and service income
//! data, and the operation surface the UI layer calls.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Vendo Control Flow                               │
//! │                                                                         │
//! │  UI action (out of scope)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 vendo-store (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   Store ── validates against the snapshot                       │   │
//! │  │     │      calls vendo-db (ledger service / repositories)       │   │
//! │  │     │      mirrors successful writes into the snapshot          │   │
//! │  │     │      arms the single-slot undo                            │   │
//! │  │     │                                                           │   │
//! │  │     └── metrics read the snapshot on demand (vendo-core)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Single-threaded event model: one mutation at a time, awaited to       │
//! │  completion before the snapshot is read again.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vendo_core::Actor;
//! use vendo_db::{Database, DbConfig};
//! use vendo_store::Store;
//!
//! let db = Database::new(DbConfig::new("./vendo.db")).await?;
//! let mut store = Store::new(db, Actor::new("user-1", "Ana"));
//!
//! let report = store.load().await;
//! if !report.is_complete() {
//!     // Degraded but usable: failed categories are empty.
//! }
//!
//! let sale = store.record_sale(&product_id, 2).await?;
//! let outcome = store.undo_last().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod store;
pub mod undo;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use store::{
    BundledServiceSale, LoadReport, NewExpense, NewProduct, NewService, SingleServiceSale, Store,
};
pub use undo::{LastAction, UndoOutcome};

// Ledger input/receipt types callers need alongside the store.
pub use vendo_db::{MonthlyRestockReceipt, RestockTarget, SaleLine};
