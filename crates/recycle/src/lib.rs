//! Soft-delete / restore registry.
//!
//! Every delete path in the system snapshots the entity into the recycle bin
//! before removing the live record. A bin entry can be restored exactly once
//! (the entry is consumed) or purged permanently. Restores are re-linked per
//! kind by the billing layer: the tagged [`DeletedRecord`] enum makes that
//! dispatch exhaustive at compile time instead of stringly-typed.

pub mod bin;
pub mod deleted;

pub use bin::RecycleBin;
pub use deleted::{DeletedItem, DeletedKind, DeletedRecord};
