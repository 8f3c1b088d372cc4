//! `tillbook-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the shared error taxonomy and the strongly-typed identifiers used by every
//! other ledger crate.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{
    AdjustmentId, CustomerId, DeletedItemId, EmployeeId, ExpenseId, InvoiceId, PaymentId,
    ProductId, SupplierId,
};
