use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use tillbook_core::{DomainError, DomainResult};

/// A human-facing invoice number, e.g. "INV-1025".
///
/// Distinct from [`tillbook_core::InvoiceId`]: the id is the internal key,
/// the number is what gets printed on the bill.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    pub fn new(prefix: &str, value: u64) -> Self {
        Self(format!("{prefix}{value}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Collision-free allocator of invoice numbers.
///
/// `next` is an atomic increment-and-fetch: no two callers ever receive the
/// same value for the same prefix, with or without contention. Numbers issued
/// to operations that later fail stay consumed: the sequence may have gaps,
/// never duplicates.
pub trait SequenceAllocator: Send + Sync {
    /// Allocate the next number for `prefix`.
    ///
    /// Fails with [`DomainError::AllocatorUnavailable`] if the underlying
    /// counter store cannot be reached; callers must not have applied any
    /// other side effect before requesting a number.
    fn next(&self, prefix: &str) -> DomainResult<InvoiceNumber>;
}

impl<A> SequenceAllocator for Arc<A>
where
    A: SequenceAllocator + ?Sized,
{
    fn next(&self, prefix: &str) -> DomainResult<InvoiceNumber> {
        (**self).next(prefix)
    }
}

/// In-memory allocator: one `AtomicU64` per prefix.
///
/// The outer map lock is only held to find or create the counter; the
/// increment itself is a lock-free `fetch_add`, so allocations against
/// different prefixes (or the same one) never serialize on the map.
#[derive(Debug, Default)]
pub struct InMemorySequenceAllocator {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl InMemorySequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the next value to issue for a prefix (settings page's
    /// "Next Invoice Number"). Counters default to 1 when not seeded.
    pub fn set_next(&self, prefix: &str, next: u64) -> DomainResult<()> {
        let counter = self.counter(prefix)?;
        counter.store(next, Ordering::SeqCst);
        Ok(())
    }

    fn counter(&self, prefix: &str) -> DomainResult<Arc<AtomicU64>> {
        if let Some(counter) = self
            .counters
            .read()
            .map_err(|_| DomainError::AllocatorUnavailable("counter store poisoned".into()))?
            .get(prefix)
        {
            return Ok(counter.clone());
        }

        let mut counters = self
            .counters
            .write()
            .map_err(|_| DomainError::AllocatorUnavailable("counter store poisoned".into()))?;
        Ok(counters
            .entry(prefix.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(1)))
            .clone())
    }
}

impl SequenceAllocator for InMemorySequenceAllocator {
    fn next(&self, prefix: &str) -> DomainResult<InvoiceNumber> {
        let counter = self.counter(prefix)?;
        let value = counter.fetch_add(1, Ordering::SeqCst);
        Ok(InvoiceNumber::new(prefix, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn numbers_are_sequential_per_prefix() {
        let allocator = InMemorySequenceAllocator::new();
        allocator.set_next("INV-", 1025).unwrap();

        assert_eq!(allocator.next("INV-").unwrap().as_str(), "INV-1025");
        assert_eq!(allocator.next("INV-").unwrap().as_str(), "INV-1026");
        assert_eq!(allocator.next("INV-").unwrap().as_str(), "INV-1027");
    }

    #[test]
    fn prefixes_have_independent_counters() {
        let allocator = InMemorySequenceAllocator::new();
        allocator.set_next("INV-", 100).unwrap();
        allocator.set_next("CRN-", 7).unwrap();

        assert_eq!(allocator.next("INV-").unwrap().as_str(), "INV-100");
        assert_eq!(allocator.next("CRN-").unwrap().as_str(), "CRN-7");
        assert_eq!(allocator.next("INV-").unwrap().as_str(), "INV-101");
    }

    #[test]
    fn unseeded_prefix_starts_at_one() {
        let allocator = InMemorySequenceAllocator::new();
        assert_eq!(allocator.next("POS-").unwrap().as_str(), "POS-1");
    }

    #[test]
    fn concurrent_allocations_never_collide() {
        let allocator = Arc::new(InMemorySequenceAllocator::new());
        allocator.set_next("INV-", 1).unwrap();

        let threads = 8;
        let per_thread = 250;

        let mut handles = Vec::new();
        for _ in 0..threads {
            let allocator = allocator.clone();
            handles.push(std::thread::spawn(move || {
                let mut issued = Vec::with_capacity(per_thread);
                for _ in 0..per_thread {
                    issued.push(allocator.next("INV-").unwrap());
                }
                issued
            }));
        }

        let mut all = HashSet::new();
        for h in handles {
            for number in h.join().unwrap() {
                assert!(all.insert(number.as_str().to_string()), "duplicate number");
            }
        }

        assert_eq!(all.len(), threads * per_thread);
    }
}
