//! Expenses domain module.
//!
//! Shop running costs (rent, utilities, wages). Kept minimal: expenses do not
//! interact with stock or receivables, but they are one of the soft-deletable
//! entity kinds and so flow through the recycle bin like everything else.

pub mod expense;

pub use expense::Expense;
