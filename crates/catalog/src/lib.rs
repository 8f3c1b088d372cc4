//! Product catalog domain module.
//!
//! Descriptive product data only: name, SKU/barcode, pricing, tax rate and the
//! minimum-stock threshold. On-hand quantity is owned by the stock ledger and
//! is never a field here; invoice code reads prices from the catalog but
//! mutates quantity exclusively through ledger operations.

pub mod product;

pub use product::Product;
