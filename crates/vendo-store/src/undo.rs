//! # Single-Slot Undo
//!
//! The store remembers exactly the most recent action - one slot, not a
//! stack. Each undoable variant carries exactly the data needed to reverse
//! it; everything else is remembered only so the user can be told why it
//! cannot be undone.
//!
//! ## Slot Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  record_sale ──────────► slot = Sale(reversal)                          │
//! │  record_bulk_sale ─────► slot = NotUndoable("bulk sale")                │
//! │  undo_last (undoable) ─► reverse, slot = empty                          │
//! │  undo_last (empty) ────► "nothing to undo" (benign, not an error)       │
//! │  undo_last (blocked) ──► "cannot undo", slot keeps the action           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use vendo_core::Product;
use vendo_db::StockReversal;

/// The most recent recorded action, tagged by how (or whether) it reverses.
#[derive(Debug, Clone)]
pub enum LastAction {
    /// A single-product sale: delete the line and its header, restore stock.
    Sale(StockReversal),
    /// A restock: delete the row, restore stock and the previous
    /// last_restocked stamp.
    Restock(StockReversal),
    /// A manual adjustment: delete the row, restore stock.
    Adjustment(StockReversal),
    /// A catalog edit: write the previous product back.
    ProductUpdate { previous: Product },
    /// A catalog delete: re-insert the previous product row.
    ProductDelete { previous: Product },
    /// Anything else that was recorded but does not support undo.
    NotUndoable { action: &'static str },
}

impl LastAction {
    /// Human-readable name of the recorded action.
    pub fn label(&self) -> &'static str {
        match self {
            LastAction::Sale(_) => "sale",
            LastAction::Restock(_) => "restock",
            LastAction::Adjustment(_) => "inventory adjustment",
            LastAction::ProductUpdate { .. } => "product update",
            LastAction::ProductDelete { .. } => "product delete",
            LastAction::NotUndoable { action } => action,
        }
    }
}

/// What an undo attempt came to. The two refusals are benign outcomes,
/// not errors: nothing about the system state is wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The action was reversed.
    Undone { description: String },
    /// The slot was empty (or already consumed by a previous undo).
    NothingToUndo,
    /// The most recent action is of a kind that does not support undo.
    CannotUndo { action: String },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let reversal = StockReversal {
            transaction_id: "t1".to_string(),
            sale_id: None,
            product_id: "p1".to_string(),
            prior_stock: 5,
            restore_last_restocked: false,
            prior_last_restocked: None,
        };

        assert_eq!(LastAction::Sale(reversal.clone()).label(), "sale");
        assert_eq!(LastAction::Restock(reversal).label(), "restock");
        assert_eq!(
            LastAction::NotUndoable {
                action: "bulk sale"
            }
            .label(),
            "bulk sale"
        );
    }
}
