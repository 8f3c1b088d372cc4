//! Invoice number allocation.
//!
//! Human-facing invoice numbers ("INV-1025") must be unique and monotonic per
//! prefix even with many till terminals writing at once. The allocator is the
//! only component allowed to touch the counter, and it only exposes an atomic
//! increment-and-fetch; there is deliberately no "read current value" API to
//! pre-read-then-write against.

pub mod allocator;

pub use allocator::{InMemorySequenceAllocator, InvoiceNumber, SequenceAllocator};
