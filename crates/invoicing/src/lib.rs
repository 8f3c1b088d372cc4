//! Invoicing domain module.
//!
//! Business rules for sales invoices and their payments, implemented purely as
//! deterministic domain logic (no IO, no storage). Orchestration across stock,
//! customer balances and numbering lives in `tillbook-billing`.

pub mod draft;
pub mod invoice;

pub use draft::{DraftItem, SaleDraft};
pub use invoice::{Invoice, InvoiceLine, InvoiceTotals, Payment, PaymentMode};
