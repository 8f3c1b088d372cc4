use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;

use tillbook_core::{AdjustmentId, DomainError, DomainResult, InvoiceId, ProductId};

use crate::adjustment::{SaleLine, StockAdjustment, StockAdjustmentKind};

/// Atomic stock operations with an append-only audit journal.
///
/// Implementations must guarantee:
/// - quantity never goes below zero (`InsufficientStock` instead);
/// - every successful mutation appends exactly one journal entry in the same
///   critical section as the mutation;
/// - `reserve_for_sale` validates the whole cart before decrementing any line;
/// - `release_for_sale` is idempotent per invoice id;
/// - operations on different products do not block each other.
pub trait StockLedger: Send + Sync {
    /// Apply a single manual adjustment (receiving, shrinkage, stocktake).
    fn adjust(
        &self,
        product_id: ProductId,
        kind: StockAdjustmentKind,
        quantity: i64,
        reason: &str,
    ) -> DomainResult<StockAdjustment>;

    /// Decrement every line of a sale, all-or-nothing, and record the
    /// reservation under `invoice_id` so it can be released later.
    fn reserve_for_sale(
        &self,
        invoice_id: InvoiceId,
        lines: &[SaleLine],
    ) -> DomainResult<Vec<StockAdjustment>>;

    /// Exact inverse of `reserve_for_sale`. Returns `false` when there was
    /// nothing to release (already released, or never reserved).
    fn release_for_sale(&self, invoice_id: InvoiceId) -> DomainResult<bool>;

    /// Current on-hand quantity (zero for products the ledger has not seen).
    fn on_hand(&self, product_id: ProductId) -> u64;

    /// All on-hand quantities the ledger tracks.
    fn levels(&self) -> Vec<(ProductId, u64)>;

    /// Full audit journal, in append order.
    fn journal(&self) -> Vec<StockAdjustment>;

    /// Audit journal filtered to one product, in append order.
    fn journal_for(&self, product_id: ProductId) -> Vec<StockAdjustment>;

    /// Invoice ids with a reservation that has not been released yet.
    /// Feeds the crash-recovery reconciliation sweep.
    fn open_reservations(&self) -> Vec<InvoiceId>;
}

impl<L> StockLedger for Arc<L>
where
    L: StockLedger + ?Sized,
{
    fn adjust(
        &self,
        product_id: ProductId,
        kind: StockAdjustmentKind,
        quantity: i64,
        reason: &str,
    ) -> DomainResult<StockAdjustment> {
        (**self).adjust(product_id, kind, quantity, reason)
    }

    fn reserve_for_sale(
        &self,
        invoice_id: InvoiceId,
        lines: &[SaleLine],
    ) -> DomainResult<Vec<StockAdjustment>> {
        (**self).reserve_for_sale(invoice_id, lines)
    }

    fn release_for_sale(&self, invoice_id: InvoiceId) -> DomainResult<bool> {
        (**self).release_for_sale(invoice_id)
    }

    fn on_hand(&self, product_id: ProductId) -> u64 {
        (**self).on_hand(product_id)
    }

    fn levels(&self) -> Vec<(ProductId, u64)> {
        (**self).levels()
    }

    fn journal(&self) -> Vec<StockAdjustment> {
        (**self).journal()
    }

    fn journal_for(&self, product_id: ProductId) -> Vec<StockAdjustment> {
        (**self).journal_for(product_id)
    }

    fn open_reservations(&self) -> Vec<InvoiceId> {
        (**self).open_reservations()
    }
}

/// In-memory stock ledger.
///
/// Each product's quantity sits behind its own `Mutex`; the outer map lock is
/// only held to find or create an entry, so tills selling different products
/// never contend. Multi-product reservations take the per-product locks in
/// sorted id order, which rules out lock-order inversions between two
/// concurrent carts.
#[derive(Debug, Default)]
pub struct InMemoryStockLedger {
    levels: RwLock<HashMap<ProductId, Arc<Mutex<u64>>>>,
    journal: RwLock<Vec<StockAdjustment>>,
    reservations: RwLock<HashMap<InvoiceId, Vec<SaleLine>>>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn level_handle(&self, product_id: ProductId) -> DomainResult<Arc<Mutex<u64>>> {
        if let Some(handle) = self
            .levels
            .read()
            .map_err(|_| DomainError::storage("stock map poisoned"))?
            .get(&product_id)
        {
            return Ok(handle.clone());
        }

        let mut levels = self
            .levels
            .write()
            .map_err(|_| DomainError::storage("stock map poisoned"))?;
        Ok(levels.entry(product_id).or_default().clone())
    }

    fn append_journal(&self, entries: &[StockAdjustment]) -> DomainResult<()> {
        let mut journal = self
            .journal
            .write()
            .map_err(|_| DomainError::storage("stock journal poisoned"))?;
        journal.extend_from_slice(entries);
        Ok(())
    }

    /// Aggregate cart lines per product, in stable lock order.
    fn aggregate_lines(lines: &[SaleLine]) -> DomainResult<BTreeMap<ProductId, u64>> {
        if lines.is_empty() {
            return Err(DomainError::invalid_adjustment("no sale lines"));
        }

        let mut wanted: BTreeMap<ProductId, u64> = BTreeMap::new();
        for line in lines {
            if line.quantity == 0 {
                return Err(DomainError::invalid_adjustment(
                    "sale line quantity must be positive",
                ));
            }
            let slot = wanted.entry(line.product_id).or_insert(0);
            *slot = slot
                .checked_add(line.quantity)
                .ok_or_else(|| DomainError::invariant("sale quantity overflow"))?;
        }
        Ok(wanted)
    }

    /// Lock the given products in sorted order and return the guards.
    fn lock_all<'a>(
        handles: &'a [(ProductId, Arc<Mutex<u64>>)],
    ) -> DomainResult<Vec<(ProductId, MutexGuard<'a, u64>)>> {
        let mut guards = Vec::with_capacity(handles.len());
        for (product_id, handle) in handles {
            let guard = handle
                .lock()
                .map_err(|_| DomainError::storage("stock level poisoned"))?;
            guards.push((*product_id, guard));
        }
        Ok(guards)
    }
}

impl StockLedger for InMemoryStockLedger {
    fn adjust(
        &self,
        product_id: ProductId,
        kind: StockAdjustmentKind,
        quantity: i64,
        reason: &str,
    ) -> DomainResult<StockAdjustment> {
        if quantity < 0 {
            return Err(DomainError::invalid_adjustment(
                "quantity cannot be negative",
            ));
        }
        let quantity = quantity as u64;
        if quantity == 0 && kind != StockAdjustmentKind::Set {
            return Err(DomainError::invalid_adjustment("quantity must be positive"));
        }

        let handle = self.level_handle(product_id)?;
        let mut on_hand = handle
            .lock()
            .map_err(|_| DomainError::storage("stock level poisoned"))?;

        let old = *on_hand;
        let new = match kind {
            StockAdjustmentKind::Add => old
                .checked_add(quantity)
                .ok_or_else(|| DomainError::invariant("stock quantity overflow"))?,
            StockAdjustmentKind::Remove => {
                if quantity > old {
                    return Err(DomainError::InsufficientStock {
                        requested: quantity,
                        available: old,
                    });
                }
                old - quantity
            }
            StockAdjustmentKind::Set => quantity,
        };

        *on_hand = new;

        let entry = StockAdjustment {
            id: AdjustmentId::new(),
            product_id,
            kind,
            delta: new as i64 - old as i64,
            resulting_stock: new,
            reason: reason.to_string(),
            occurred_at: Utc::now(),
        };

        // Still inside the per-product critical section: the mutation and its
        // audit entry commit together.
        self.append_journal(std::slice::from_ref(&entry))?;
        drop(on_hand);

        tracing::debug!(
            product_id = %product_id,
            ?kind,
            delta = entry.delta,
            resulting_stock = entry.resulting_stock,
            "stock adjusted"
        );

        Ok(entry)
    }

    fn reserve_for_sale(
        &self,
        invoice_id: InvoiceId,
        lines: &[SaleLine],
    ) -> DomainResult<Vec<StockAdjustment>> {
        let wanted = Self::aggregate_lines(lines)?;

        {
            let reservations = self
                .reservations
                .read()
                .map_err(|_| DomainError::storage("reservation map poisoned"))?;
            if reservations.contains_key(&invoice_id) {
                return Err(DomainError::conflict(format!(
                    "reservation already exists for invoice {invoice_id}"
                )));
            }
        }

        let handles: Vec<(ProductId, Arc<Mutex<u64>>)> = wanted
            .keys()
            .map(|&p| Ok((p, self.level_handle(p)?)))
            .collect::<DomainResult<_>>()?;

        let mut guards = Self::lock_all(&handles)?;

        // Phase 1: validate every line before touching anything.
        for (product_id, guard) in &guards {
            let requested = wanted[product_id];
            if requested > **guard {
                return Err(DomainError::InsufficientStock {
                    requested,
                    available: **guard,
                });
            }
        }

        // Phase 2: apply all decrements and journal them.
        let now = Utc::now();
        let mut entries = Vec::with_capacity(guards.len());
        for (product_id, guard) in &mut guards {
            let product_id: ProductId = *product_id;
            let requested = wanted[&product_id];
            **guard -= requested;
            entries.push(StockAdjustment {
                id: AdjustmentId::new(),
                product_id,
                kind: StockAdjustmentKind::Remove,
                delta: -(requested as i64),
                resulting_stock: **guard,
                reason: format!("sale {invoice_id}"),
                occurred_at: now,
            });
        }

        // Record the reservation and the journal entries before releasing the
        // product locks, so release/reconcile can never observe the decrement
        // without its bookkeeping.
        {
            let mut reservations = self
                .reservations
                .write()
                .map_err(|_| DomainError::storage("reservation map poisoned"))?;
            reservations.insert(
                invoice_id,
                wanted
                    .iter()
                    .map(|(&product_id, &quantity)| SaleLine {
                        product_id,
                        quantity,
                    })
                    .collect(),
            );
        }
        self.append_journal(&entries)?;
        drop(guards);

        tracing::debug!(invoice_id = %invoice_id, lines = entries.len(), "stock reserved for sale");

        Ok(entries)
    }

    fn release_for_sale(&self, invoice_id: InvoiceId) -> DomainResult<bool> {
        let reserved = {
            let mut reservations = self
                .reservations
                .write()
                .map_err(|_| DomainError::storage("reservation map poisoned"))?;
            match reservations.remove(&invoice_id) {
                Some(lines) => lines,
                // Already released (or never reserved): idempotent no-op.
                None => return Ok(false),
            }
        };

        let wanted = Self::aggregate_lines(&reserved)?;
        let handles: Vec<(ProductId, Arc<Mutex<u64>>)> = wanted
            .keys()
            .map(|&p| Ok((p, self.level_handle(p)?)))
            .collect::<DomainResult<_>>()?;

        let mut guards = Self::lock_all(&handles)?;

        let now = Utc::now();
        let mut entries = Vec::with_capacity(guards.len());
        for (product_id, guard) in &mut guards {
            let product_id: ProductId = *product_id;
            let quantity = wanted[&product_id];
            **guard = guard
                .checked_add(quantity)
                .ok_or_else(|| DomainError::invariant("stock quantity overflow"))?;
            entries.push(StockAdjustment {
                id: AdjustmentId::new(),
                product_id,
                kind: StockAdjustmentKind::Add,
                delta: quantity as i64,
                resulting_stock: **guard,
                reason: format!("release {invoice_id}"),
                occurred_at: now,
            });
        }

        self.append_journal(&entries)?;
        drop(guards);

        tracing::debug!(invoice_id = %invoice_id, "sale reservation released");

        Ok(true)
    }

    fn on_hand(&self, product_id: ProductId) -> u64 {
        let Ok(levels) = self.levels.read() else {
            return 0;
        };
        levels
            .get(&product_id)
            .and_then(|handle| handle.lock().ok().map(|g| *g))
            .unwrap_or(0)
    }

    fn levels(&self) -> Vec<(ProductId, u64)> {
        let Ok(levels) = self.levels.read() else {
            return vec![];
        };
        levels
            .iter()
            .filter_map(|(&p, handle)| handle.lock().ok().map(|g| (p, *g)))
            .collect()
    }

    fn journal(&self) -> Vec<StockAdjustment> {
        self.journal.read().map(|j| j.clone()).unwrap_or_default()
    }

    fn journal_for(&self, product_id: ProductId) -> Vec<StockAdjustment> {
        self.journal()
            .into_iter()
            .filter(|e| e.product_id == product_id)
            .collect()
    }

    fn open_reservations(&self) -> Vec<InvoiceId> {
        self.reservations
            .read()
            .map(|r| r.keys().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ledger_with(product_id: ProductId, stock: i64) -> InMemoryStockLedger {
        let ledger = InMemoryStockLedger::new();
        ledger
            .adjust(product_id, StockAdjustmentKind::Set, stock, "opening stock")
            .unwrap();
        ledger
    }

    #[test]
    fn add_increases_on_hand() {
        let product_id = ProductId::new();
        let ledger = ledger_with(product_id, 10);

        let entry = ledger
            .adjust(product_id, StockAdjustmentKind::Add, 5, "goods received")
            .unwrap();

        assert_eq!(entry.delta, 5);
        assert_eq!(entry.resulting_stock, 15);
        assert_eq!(ledger.on_hand(product_id), 15);
    }

    #[test]
    fn remove_decreases_on_hand() {
        let product_id = ProductId::new();
        let ledger = ledger_with(product_id, 10);

        let entry = ledger
            .adjust(product_id, StockAdjustmentKind::Remove, 4, "damage")
            .unwrap();

        assert_eq!(entry.delta, -4);
        assert_eq!(ledger.on_hand(product_id), 6);
    }

    #[test]
    fn remove_below_zero_is_rejected() {
        let product_id = ProductId::new();
        let ledger = ledger_with(product_id, 3);

        let err = ledger
            .adjust(product_id, StockAdjustmentKind::Remove, 4, "oversell")
            .unwrap_err();

        match err {
            DomainError::InsufficientStock {
                requested,
                available,
            } => {
                assert_eq!(requested, 4);
                assert_eq!(available, 3);
            }
            _ => panic!("Expected InsufficientStock"),
        }
        // Nothing changed, nothing journaled.
        assert_eq!(ledger.on_hand(product_id), 3);
        assert_eq!(ledger.journal_for(product_id).len(), 1);
    }

    #[test]
    fn set_is_absolute() {
        let product_id = ProductId::new();
        let ledger = ledger_with(product_id, 10);

        let entry = ledger
            .adjust(product_id, StockAdjustmentKind::Set, 4, "stocktake")
            .unwrap();

        assert_eq!(entry.delta, -6);
        assert_eq!(ledger.on_hand(product_id), 4);
    }

    #[test]
    fn negative_quantity_is_invalid() {
        let product_id = ProductId::new();
        let ledger = InMemoryStockLedger::new();

        for kind in [
            StockAdjustmentKind::Add,
            StockAdjustmentKind::Remove,
            StockAdjustmentKind::Set,
        ] {
            let err = ledger.adjust(product_id, kind, -1, "bad input").unwrap_err();
            match err {
                DomainError::InvalidAdjustment(_) => {}
                _ => panic!("Expected InvalidAdjustment for negative quantity"),
            }
        }
    }

    #[test]
    fn zero_quantity_add_remove_is_invalid() {
        let product_id = ProductId::new();
        let ledger = InMemoryStockLedger::new();

        for kind in [StockAdjustmentKind::Add, StockAdjustmentKind::Remove] {
            let err = ledger.adjust(product_id, kind, 0, "noop").unwrap_err();
            match err {
                DomainError::InvalidAdjustment(_) => {}
                _ => panic!("Expected InvalidAdjustment for zero quantity"),
            }
        }

        // Set-to-zero is a legitimate stocktake result.
        ledger
            .adjust(product_id, StockAdjustmentKind::Set, 0, "stocktake")
            .unwrap();
    }

    #[test]
    fn every_mutation_appends_one_journal_entry() {
        let product_id = ProductId::new();
        let ledger = InMemoryStockLedger::new();

        ledger
            .adjust(product_id, StockAdjustmentKind::Set, 10, "opening stock")
            .unwrap();
        ledger
            .adjust(product_id, StockAdjustmentKind::Add, 2, "goods received")
            .unwrap();
        ledger
            .adjust(product_id, StockAdjustmentKind::Remove, 1, "damage")
            .unwrap();

        let journal = ledger.journal_for(product_id);
        assert_eq!(journal.len(), 3);
        assert_eq!(
            journal.iter().map(|e| e.resulting_stock).collect::<Vec<_>>(),
            vec![10, 12, 11]
        );
    }

    #[test]
    fn reserve_decrements_every_line() {
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let ledger = InMemoryStockLedger::new();
        ledger.adjust(p1, StockAdjustmentKind::Set, 10, "opening stock").unwrap();
        ledger.adjust(p2, StockAdjustmentKind::Set, 5, "opening stock").unwrap();

        let invoice_id = InvoiceId::new();
        let entries = ledger
            .reserve_for_sale(
                invoice_id,
                &[
                    SaleLine { product_id: p1, quantity: 3 },
                    SaleLine { product_id: p2, quantity: 2 },
                ],
            )
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(ledger.on_hand(p1), 7);
        assert_eq!(ledger.on_hand(p2), 3);
        assert!(entries
            .iter()
            .all(|e| e.reason == format!("sale {invoice_id}")));
        assert_eq!(ledger.open_reservations(), vec![invoice_id]);
    }

    #[test]
    fn reserve_is_all_or_nothing_across_the_cart() {
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let ledger = InMemoryStockLedger::new();
        ledger.adjust(p1, StockAdjustmentKind::Set, 10, "opening stock").unwrap();
        ledger.adjust(p2, StockAdjustmentKind::Set, 1, "opening stock").unwrap();

        let err = ledger
            .reserve_for_sale(
                InvoiceId::new(),
                &[
                    SaleLine { product_id: p1, quantity: 3 },
                    SaleLine { product_id: p2, quantity: 2 },
                ],
            )
            .unwrap_err();

        match err {
            DomainError::InsufficientStock { requested, available } => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            _ => panic!("Expected InsufficientStock"),
        }
        // Neither line was decremented.
        assert_eq!(ledger.on_hand(p1), 10);
        assert_eq!(ledger.on_hand(p2), 1);
        assert!(ledger.open_reservations().is_empty());
    }

    #[test]
    fn duplicate_product_lines_are_aggregated() {
        let product_id = ProductId::new();
        let ledger = ledger_with(product_id, 5);

        let err = ledger
            .reserve_for_sale(
                InvoiceId::new(),
                &[
                    SaleLine { product_id, quantity: 3 },
                    SaleLine { product_id, quantity: 3 },
                ],
            )
            .unwrap_err();

        match err {
            DomainError::InsufficientStock { requested, available } => {
                assert_eq!(requested, 6);
                assert_eq!(available, 5);
            }
            _ => panic!("Expected InsufficientStock for aggregated quantity"),
        }
    }

    #[test]
    fn release_restores_reserved_stock() {
        let product_id = ProductId::new();
        let ledger = ledger_with(product_id, 10);
        let invoice_id = InvoiceId::new();

        ledger
            .reserve_for_sale(invoice_id, &[SaleLine { product_id, quantity: 3 }])
            .unwrap();
        assert_eq!(ledger.on_hand(product_id), 7);

        assert!(ledger.release_for_sale(invoice_id).unwrap());
        assert_eq!(ledger.on_hand(product_id), 10);
        assert!(ledger.open_reservations().is_empty());
    }

    #[test]
    fn release_is_idempotent() {
        let product_id = ProductId::new();
        let ledger = ledger_with(product_id, 10);
        let invoice_id = InvoiceId::new();

        ledger
            .reserve_for_sale(invoice_id, &[SaleLine { product_id, quantity: 3 }])
            .unwrap();

        assert!(ledger.release_for_sale(invoice_id).unwrap());
        assert!(!ledger.release_for_sale(invoice_id).unwrap());
        assert!(!ledger.release_for_sale(invoice_id).unwrap());
        // Only one release was applied.
        assert_eq!(ledger.on_hand(product_id), 10);
    }

    #[test]
    fn reserving_same_invoice_twice_conflicts() {
        let product_id = ProductId::new();
        let ledger = ledger_with(product_id, 10);
        let invoice_id = InvoiceId::new();
        let lines = [SaleLine { product_id, quantity: 2 }];

        ledger.reserve_for_sale(invoice_id, &lines).unwrap();
        let err = ledger.reserve_for_sale(invoice_id, &lines).unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict for duplicate reservation"),
        }
        assert_eq!(ledger.on_hand(product_id), 8);
    }

    #[test]
    fn two_terminals_racing_for_the_last_units() {
        // Stock 10; one terminal wants 6, the other 7. Exactly one wins.
        let product_id = ProductId::new();
        let ledger = Arc::new(ledger_with(product_id, 10));

        let spawn = |qty: u64| {
            let ledger = ledger.clone();
            std::thread::spawn(move || {
                ledger.reserve_for_sale(
                    InvoiceId::new(),
                    &[SaleLine { product_id, quantity: qty }],
                )
            })
        };

        let first = spawn(6);
        let second = spawn(7);
        let a = first.join().unwrap();
        let b = second.join().unwrap();

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        let sold: u64 = if a.is_ok() { 6 } else { 7 };
        assert_eq!(ledger.on_hand(product_id), 10 - sold);
    }

    #[test]
    fn oversubscribed_concurrent_reservations_account_for_every_attempt() {
        // 16 attempts of 3 units against stock 30: acceptances + rejections
        // must cover all attempts and stock must never go negative.
        let product_id = ProductId::new();
        let ledger = Arc::new(ledger_with(product_id, 30));
        let accepted = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            let accepted = accepted.clone();
            let rejected = rejected.clone();
            handles.push(std::thread::spawn(move || {
                match ledger.reserve_for_sale(
                    InvoiceId::new(),
                    &[SaleLine { product_id, quantity: 3 }],
                ) {
                    Ok(_) => accepted.fetch_add(1, Ordering::SeqCst),
                    Err(DomainError::InsufficientStock { .. }) => {
                        rejected.fetch_add(1, Ordering::SeqCst)
                    }
                    Err(e) => panic!("unexpected error: {e}"),
                };
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let accepted = accepted.load(Ordering::SeqCst);
        let rejected = rejected.load(Ordering::SeqCst);
        assert_eq!(accepted + rejected, 16);
        assert_eq!(accepted, 10); // floor(30 / 3)
        assert_eq!(ledger.on_hand(product_id), 30 - accepted as u64 * 3);
    }
}
