//! Stock ledger: the single owner of on-hand quantities.
//!
//! All quantity changes go through [`StockLedger`] operations, each of which
//! appends one immutable [`StockAdjustment`] to an append-only journal in the
//! same critical section as the mutation. Multi-line sale reservations are
//! all-or-nothing across the cart, and their release is idempotent so a
//! failed delete can be retried safely.

pub mod adjustment;
pub mod ledger;

pub use adjustment::{SaleLine, StockAdjustment, StockAdjustmentKind};
pub use ledger::{InMemoryStockLedger, StockLedger};
