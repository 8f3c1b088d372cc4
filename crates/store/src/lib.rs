//! `tillbook-store` — generic key/value persistence seam.
//!
//! Record-holding components (catalog, parties, invoices, recycle bin) all
//! sit on [`KeyValueStore`]. The shipped implementation is in-memory; a
//! SQL-backed implementation only has to satisfy the trait.

pub mod kv;

pub use kv::{InMemoryStore, KeyValueStore};
