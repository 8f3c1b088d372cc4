//! Parties domain module: the people the shop transacts with.
//!
//! Customers carry ledger state (outstanding balance, loyalty points, store
//! credit) that only the billing workflows mutate. Suppliers and employees
//! are plain directory records; they exist here so the soft-delete registry
//! can span them.

pub mod customer;
pub mod party;

pub use customer::Customer;
pub use party::{ContactInfo, Employee, Supplier};
