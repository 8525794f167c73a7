//! # Repositories
//!
//! One repository per entity, each a thin struct over the shared pool.
//!
//! Repositories cover reads and single-row writes. Multi-row writes that
//! must keep stock and the ledger consistent live in the ledger service,
//! which reuses the `pub(crate)` executor-generic helpers defined here so
//! the SQL for each row shape exists exactly once.

pub mod finance;
pub mod product;
pub mod sale;
pub mod service;
pub mod transaction;
