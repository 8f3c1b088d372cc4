//! Billing orchestration: the transactional heart of the till.
//!
//! [`BillingService`] turns a cart draft into a durable invoice while
//! atomically adjusting three other aggregates (stock, customer outstanding
//! balance, loyalty points), reverses those side effects on delete, replays
//! them on restore, and derives the receivables rollup on demand. Multi-step
//! workflows compensate explicitly (release what was reserved) instead of
//! relying on a cross-aggregate transaction, and [`BillingService::reconcile`]
//! sweeps up reservations orphaned by a crash between steps.

pub mod config;
pub mod receivables;
pub mod service;

pub use config::{BillingConfig, OverpaymentPolicy};
pub use receivables::Receivable;
pub use service::{BillingService, InvoiceRestoration, RestoredEntity};
