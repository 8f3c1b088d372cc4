use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillbook_core::{AdjustmentId, ProductId};

/// How a stock adjustment changes the on-hand quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockAdjustmentKind {
    /// Receiving, returns: on-hand increases by the quantity.
    Add,
    /// Sales, shrinkage: on-hand decreases by the quantity. Never allowed to
    /// take the quantity below zero.
    Remove,
    /// Stocktake correction: on-hand becomes the (non-negative) quantity.
    Set,
}

/// Immutable journal entry for one stock mutation.
///
/// Entries are append-only: once written they are never edited or removed,
/// which makes the journal the audit trail for every quantity the shop has
/// ever held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub id: AdjustmentId,
    pub product_id: ProductId,
    pub kind: StockAdjustmentKind,
    /// Signed quantity change actually applied (`Set` records new − old).
    pub delta: i64,
    /// On-hand quantity immediately after this entry was applied.
    pub resulting_stock: u64,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// One cart line of a sale reservation: how many units of which product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub quantity: u64,
}
