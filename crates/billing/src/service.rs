use std::sync::Arc;

use chrono::Utc;

use tillbook_catalog::Product;
use tillbook_core::{
    CustomerId, DeletedItemId, DomainError, DomainResult, EmployeeId, ExpenseId, InvoiceId,
    ProductId, SupplierId,
};
use tillbook_expenses::Expense;
use tillbook_inventory::{
    InMemoryStockLedger, SaleLine, StockAdjustment, StockAdjustmentKind, StockLedger,
};
use tillbook_invoicing::{Invoice, InvoiceLine, InvoiceTotals, PaymentMode, SaleDraft};
use tillbook_numbering::{InMemorySequenceAllocator, SequenceAllocator};
use tillbook_parties::{Customer, Employee, Supplier};
use tillbook_recycle::{DeletedItem, DeletedRecord, RecycleBin};
use tillbook_store::{InMemoryStore, KeyValueStore};

use crate::config::{BillingConfig, OverpaymentPolicy};
use crate::receivables::{self, Receivable};

/// Result of restoring a soft-deleted invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRestoration {
    pub invoice: Invoice,
    /// Lines whose product was permanently deleted in the meantime: kept on
    /// the invoice for the record, but no longer linked to a catalog entry
    /// and not re-reserved.
    pub unlinked_products: Vec<ProductId>,
    /// The customer was permanently deleted; balance and points were not
    /// re-applied.
    pub customer_missing: bool,
}

/// A restored entity, by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoredEntity {
    Invoice(InvoiceRestoration),
    Product(Product),
    Customer(Customer),
    Supplier(Supplier),
    Employee(Employee),
    Expense(Expense),
}

/// The invoice aggregate manager.
///
/// Each public operation presents all-or-nothing effect to the caller. The
/// multi-aggregate workflows (create, delete, restore) run as compensated
/// step sequences: once stock is reserved, every later failure releases the
/// reservation before the error surfaces. There is no global lock; two
/// operations only contend when they touch the same product, customer,
/// invoice or numbering prefix.
pub struct BillingService {
    config: BillingConfig,
    products: Arc<dyn KeyValueStore<ProductId, Product>>,
    customers: Arc<dyn KeyValueStore<CustomerId, Customer>>,
    suppliers: Arc<dyn KeyValueStore<SupplierId, Supplier>>,
    employees: Arc<dyn KeyValueStore<EmployeeId, Employee>>,
    expenses: Arc<dyn KeyValueStore<ExpenseId, Expense>>,
    invoices: Arc<dyn KeyValueStore<InvoiceId, Invoice>>,
    stock: Arc<dyn StockLedger>,
    numbers: Arc<dyn SequenceAllocator>,
    bin: Arc<RecycleBin>,
}

impl BillingService {
    /// Wire the service with in-memory stores (dev/test), seeding the
    /// number allocator from the config.
    pub fn in_memory(config: BillingConfig) -> DomainResult<Self> {
        let numbers = Arc::new(InMemorySequenceAllocator::new());
        numbers.set_next(&config.invoice_prefix, config.next_invoice_number)?;

        Ok(Self {
            config,
            products: Arc::new(InMemoryStore::new()),
            customers: Arc::new(InMemoryStore::new()),
            suppliers: Arc::new(InMemoryStore::new()),
            employees: Arc::new(InMemoryStore::new()),
            expenses: Arc::new(InMemoryStore::new()),
            invoices: Arc::new(InMemoryStore::new()),
            stock: Arc::new(InMemoryStockLedger::new()),
            numbers,
            bin: Arc::new(RecycleBin::new()),
        })
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Stock ledger handle (read side; also used by recovery tooling).
    pub fn stock(&self) -> Arc<dyn StockLedger> {
        self.stock.clone()
    }

    // ------------------------------------------------------------------
    // Registration (the CRUD pages call these)
    // ------------------------------------------------------------------

    pub fn add_product(&self, product: Product, opening_stock: i64) -> DomainResult<()> {
        if self.products.contains(&product.id) {
            return Err(DomainError::conflict("product already exists"));
        }
        let product_id = product.id;
        self.products.insert(product_id, product);
        if opening_stock > 0 {
            self.stock.adjust(
                product_id,
                StockAdjustmentKind::Set,
                opening_stock,
                "opening stock",
            )?;
        }
        Ok(())
    }

    pub fn add_customer(&self, customer: Customer) -> DomainResult<()> {
        if self.customers.contains(&customer.id) {
            return Err(DomainError::conflict("customer already exists"));
        }
        self.customers.insert(customer.id, customer);
        Ok(())
    }

    pub fn add_supplier(&self, supplier: Supplier) -> DomainResult<()> {
        if self.suppliers.contains(&supplier.id) {
            return Err(DomainError::conflict("supplier already exists"));
        }
        self.suppliers.insert(supplier.id, supplier);
        Ok(())
    }

    pub fn add_employee(&self, employee: Employee) -> DomainResult<()> {
        if self.employees.contains(&employee.id) {
            return Err(DomainError::conflict("employee already exists"));
        }
        self.employees.insert(employee.id, employee);
        Ok(())
    }

    pub fn add_expense(&self, expense: Expense) -> DomainResult<()> {
        if self.expenses.contains(&expense.id) {
            return Err(DomainError::conflict("expense already exists"));
        }
        self.expenses.insert(expense.id, expense);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn invoice(&self, invoice_id: InvoiceId) -> DomainResult<Invoice> {
        self.invoices
            .get(&invoice_id)
            .ok_or(DomainError::InvoiceNotFound)
    }

    pub fn customer(&self, customer_id: CustomerId) -> DomainResult<Customer> {
        self.customers
            .get(&customer_id)
            .ok_or(DomainError::CustomerNotFound)
    }

    pub fn product(&self, product_id: ProductId) -> DomainResult<Product> {
        self.products
            .get(&product_id)
            .ok_or(DomainError::ProductNotFound)
    }

    pub fn on_hand(&self, product_id: ProductId) -> u64 {
        self.stock.on_hand(product_id)
    }

    pub fn deleted_items(&self) -> Vec<DeletedItem> {
        self.bin.list()
    }

    /// Products at or below their reorder threshold.
    pub fn low_stock(&self) -> Vec<(Product, u64)> {
        self.products
            .list()
            .into_iter()
            .filter_map(|product| {
                let on_hand = self.stock.on_hand(product.id);
                (on_hand <= product.min_stock).then_some((product, on_hand))
            })
            .collect()
    }

    /// Per-customer rollup of open invoices, derived fresh on every call.
    pub fn receivables(&self, overdue_only: bool) -> Vec<Receivable> {
        self.receivables_as_of(Utc::now(), overdue_only)
    }

    pub fn receivables_as_of(
        &self,
        as_of: chrono::DateTime<Utc>,
        overdue_only: bool,
    ) -> Vec<Receivable> {
        let invoices = self.invoices.list();
        let mut rollup = receivables::compute(
            &invoices,
            self.customers.as_ref(),
            self.config.overdue_after_days,
            as_of,
        );
        if overdue_only {
            rollup.retain(|r| r.overdue);
        }
        rollup
    }

    // ------------------------------------------------------------------
    // Stock
    // ------------------------------------------------------------------

    /// Manual stock adjustment (receiving, shrinkage, stocktake) for a
    /// cataloged product.
    pub fn adjust_stock(
        &self,
        product_id: ProductId,
        kind: StockAdjustmentKind,
        quantity: i64,
        reason: &str,
    ) -> DomainResult<StockAdjustment> {
        if !self.products.contains(&product_id) {
            return Err(DomainError::ProductNotFound);
        }
        self.stock.adjust(product_id, kind, quantity, reason)
    }

    // ------------------------------------------------------------------
    // Invoice lifecycle
    // ------------------------------------------------------------------

    /// Turn a cart draft into a durable invoice.
    ///
    /// Order matters: everything that can fail without side effects is
    /// checked first; the number allocation is the first side effect (a
    /// later failure leaves a gap in the sequence, never a duplicate); the
    /// stock reservation is second and is released if any later step fails.
    #[tracing::instrument(skip_all, fields(customer = ?draft.customer_id))]
    pub fn create_invoice(&self, draft: &SaleDraft) -> DomainResult<Invoice> {
        if draft.items.is_empty() {
            return Err(DomainError::EmptyInvoice);
        }

        if let Some(customer_id) = draft.customer_id {
            if !self.customers.contains(&customer_id) {
                return Err(DomainError::CustomerNotFound);
            }
        }

        // Snapshot price/tax from the catalog; the draft's only monetary
        // input is the per-line discount and the tender.
        let mut lines = Vec::with_capacity(draft.items.len());
        for item in &draft.items {
            let product = self
                .products
                .get(&item.product_id)
                .ok_or(DomainError::ProductNotFound)?;
            lines.push(InvoiceLine {
                product_id: product.id,
                name: product.name,
                quantity: item.quantity,
                unit_price: product.unit_price,
                tax_rate_pct: product.tax_rate_pct,
                discount_pct: item.discount_pct,
            });
        }

        let totals = InvoiceTotals::compute(&lines)?;

        let (tendered, credit_excess) = if draft.amount_paid > totals.grand_total {
            match (self.config.overpayment_policy, draft.customer_id) {
                (OverpaymentPolicy::CreditToAccount, Some(_)) => {
                    (totals.grand_total, draft.amount_paid - totals.grand_total)
                }
                _ => {
                    return Err(DomainError::Overpayment {
                        balance: totals.grand_total,
                        attempted: draft.amount_paid,
                    });
                }
            }
        } else {
            (draft.amount_paid, 0)
        };

        if draft.customer_id.is_none() && tendered < totals.grand_total {
            return Err(DomainError::validation(
                "walk-in sales must be paid in full",
            ));
        }

        let points_awarded = match draft.customer_id {
            Some(_) if self.config.points_per_unit > 0 => {
                totals.grand_total / self.config.points_per_unit
            }
            _ => 0,
        };

        let invoice_id = InvoiceId::new();

        // First side effect: consume a number.
        let number = self.numbers.next(&self.config.invoice_prefix)?;

        let invoice = Invoice::issue(
            invoice_id,
            number,
            draft.customer_id,
            lines,
            draft.payment_mode,
            tendered,
            points_awarded,
            Utc::now(),
        )?;

        // Second side effect: reserve the cart, all-or-nothing. An
        // insufficient-stock failure here has nothing to compensate.
        let sale_lines: Vec<SaleLine> = draft
            .items
            .iter()
            .map(|item| SaleLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();
        self.stock.reserve_for_sale(invoice_id, &sale_lines)?;

        // From here on every failure must release the reservation.
        if let Err(e) = self.apply_customer_side(&invoice, credit_excess) {
            self.compensate_reservation(invoice_id);
            return Err(e);
        }

        self.invoices.insert(invoice_id, invoice.clone());

        tracing::info!(
            number = %invoice.number,
            grand_total = invoice.totals.grand_total,
            balance = invoice.balance(),
            "invoice created"
        );

        Ok(invoice)
    }

    /// Record a payment event against a live invoice.
    #[tracing::instrument(skip_all, fields(invoice_id = %invoice_id, amount))]
    pub fn record_payment(
        &self,
        invoice_id: InvoiceId,
        amount: u64,
        mode: PaymentMode,
    ) -> DomainResult<Invoice> {
        if amount == 0 {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        let policy = self.config.overpayment_policy;
        let mut outcome = Ok(());
        let mut applied = 0u64;
        let mut excess = 0u64;

        let updated = self.invoices.update(&invoice_id, &mut |invoice| {
            if invoice.deleted {
                outcome = Err(DomainError::InvoiceNotFound);
                return;
            }

            let balance = invoice.balance();
            if amount > balance {
                match (policy, invoice.customer_id) {
                    (OverpaymentPolicy::CreditToAccount, Some(_)) if balance > 0 => {
                        applied = balance;
                        excess = amount - balance;
                    }
                    _ => {
                        outcome = Err(DomainError::Overpayment {
                            balance,
                            attempted: amount,
                        });
                        return;
                    }
                }
            } else {
                applied = amount;
            }

            outcome = invoice
                .record_payment(applied, mode, Utc::now())
                .map(|_| ());
        });

        let invoice = updated.ok_or(DomainError::InvoiceNotFound)?;
        outcome?;

        if let Some(customer_id) = invoice.customer_id {
            let mut settle_outcome = Ok(());
            self.customers.update(&customer_id, &mut |customer| {
                let mut next = customer.clone();
                next.settle(applied);
                settle_outcome = if excess > 0 {
                    next.add_store_credit(excess)
                } else {
                    Ok(())
                };
                if settle_outcome.is_ok() {
                    *customer = next;
                }
            });
            settle_outcome?;
        }

        tracing::info!(applied, excess, balance = invoice.balance(), "payment recorded");

        Ok(invoice)
    }

    /// Soft-delete an invoice, reversing its side effects.
    ///
    /// Stock goes back via the idempotent release; the customer's
    /// outstanding balance drops by the invoice's *current* balance
    /// (already-paid amounts are not un-paid) and the points the sale
    /// awarded come back off.
    #[tracing::instrument(skip_all, fields(invoice_id = %invoice_id))]
    pub fn delete_invoice(&self, invoice_id: InvoiceId) -> DomainResult<DeletedItemId> {
        // Atomically claim the delete: exactly one caller flips the flag.
        let mut outcome = Ok(());
        let updated = self.invoices.update(&invoice_id, &mut |invoice| {
            if invoice.deleted {
                outcome = Err(DomainError::AlreadyDeleted);
            } else {
                invoice.deleted = true;
            }
        });
        let claimed = updated.ok_or(DomainError::InvoiceNotFound)?;
        outcome?;

        let mut snapshot = claimed;
        snapshot.deleted = false; // the snapshot is the live state at delete time

        // File the snapshot before reversing anything: if a later step fails
        // the invoice is still restorable, and the reconcile sweep can
        // release the stock.
        let deleted_id = self
            .bin
            .tombstone(DeletedRecord::Invoice(snapshot.clone()), Utc::now());

        self.stock.release_for_sale(invoice_id)?;

        if let Some(customer_id) = snapshot.customer_id {
            self.customers.update(&customer_id, &mut |customer| {
                customer.reverse_sale(snapshot.balance(), snapshot.points_awarded);
            });
        }

        tracing::info!(deleted_id = %deleted_id, "invoice soft-deleted");

        Ok(deleted_id)
    }

    /// Restore a soft-deleted invoice from its bin entry.
    ///
    /// References are re-validated: permanently deleted products turn their
    /// lines into unlinked, informational entries; a permanently deleted
    /// customer skips the balance/points re-apply. The stock reservation is
    /// re-run, so a restore that would now oversell fails with
    /// `InsufficientStock` and leaves the bin entry intact for retry.
    #[tracing::instrument(skip_all, fields(deleted_item_id = %deleted_item_id))]
    pub fn restore_invoice(
        &self,
        deleted_item_id: DeletedItemId,
    ) -> DomainResult<InvoiceRestoration> {
        let item = self.bin.peek(deleted_item_id)?;
        let DeletedRecord::Invoice(snapshot) = item.record else {
            return Err(DomainError::validation("deleted item is not an invoice"));
        };
        let invoice_id = snapshot.id;

        if let Some(existing) = self.invoices.get(&invoice_id) {
            if !existing.deleted {
                return Err(DomainError::conflict("invoice is already live"));
            }
        }

        let mut unlinked_products = Vec::new();
        let mut linked_lines = Vec::new();
        for line in &snapshot.lines {
            if self.products.contains(&line.product_id) {
                linked_lines.push(SaleLine {
                    product_id: line.product_id,
                    quantity: line.quantity,
                });
            } else {
                unlinked_products.push(line.product_id);
            }
        }

        if !linked_lines.is_empty() {
            self.stock.reserve_for_sale(invoice_id, &linked_lines)?;
        }

        let mut customer_missing = false;
        if let Some(customer_id) = snapshot.customer_id {
            let mut outcome = Ok(());
            let updated = self.customers.update(&customer_id, &mut |customer| {
                let mut next = customer.clone();
                outcome = next.apply_sale(snapshot.balance(), snapshot.points_awarded);
                if outcome.is_ok() {
                    *customer = next;
                }
            });
            match updated {
                None => customer_missing = true,
                Some(_) => {
                    if let Err(e) = outcome {
                        self.compensate_reservation(invoice_id);
                        return Err(e);
                    }
                }
            }
        }

        let restored = snapshot;
        self.invoices.insert(invoice_id, restored.clone());
        self.bin.take(deleted_item_id)?;

        tracing::info!(
            number = %restored.number,
            unlinked = unlinked_products.len(),
            "invoice restored"
        );

        Ok(InvoiceRestoration {
            invoice: restored,
            unlinked_products,
            customer_missing,
        })
    }

    // ------------------------------------------------------------------
    // Generic soft-delete / restore across the six entity kinds
    // ------------------------------------------------------------------

    pub fn delete_product(&self, product_id: ProductId) -> DomainResult<DeletedItemId> {
        let product = self
            .products
            .remove(&product_id)
            .ok_or(DomainError::ProductNotFound)?;
        Ok(self
            .bin
            .tombstone(DeletedRecord::Product(product), Utc::now()))
    }

    pub fn delete_customer(&self, customer_id: CustomerId) -> DomainResult<DeletedItemId> {
        let customer = self
            .customers
            .remove(&customer_id)
            .ok_or(DomainError::CustomerNotFound)?;
        Ok(self
            .bin
            .tombstone(DeletedRecord::Customer(customer), Utc::now()))
    }

    pub fn delete_supplier(&self, supplier_id: SupplierId) -> DomainResult<DeletedItemId> {
        let supplier = self
            .suppliers
            .remove(&supplier_id)
            .ok_or(DomainError::NotFound)?;
        Ok(self
            .bin
            .tombstone(DeletedRecord::Supplier(supplier), Utc::now()))
    }

    pub fn delete_employee(&self, employee_id: EmployeeId) -> DomainResult<DeletedItemId> {
        let employee = self
            .employees
            .remove(&employee_id)
            .ok_or(DomainError::NotFound)?;
        Ok(self
            .bin
            .tombstone(DeletedRecord::Employee(employee), Utc::now()))
    }

    pub fn delete_expense(&self, expense_id: ExpenseId) -> DomainResult<DeletedItemId> {
        let expense = self
            .expenses
            .remove(&expense_id)
            .ok_or(DomainError::NotFound)?;
        Ok(self
            .bin
            .tombstone(DeletedRecord::Expense(expense), Utc::now()))
    }

    /// Restore any kind of bin entry. The invoice hook replays the full
    /// workflow; the simpler kinds re-insert their snapshot, refusing to
    /// clobber a live entity with the same id.
    pub fn restore_entity(&self, deleted_item_id: DeletedItemId) -> DomainResult<RestoredEntity> {
        let item = self.bin.peek(deleted_item_id)?;
        match item.record {
            DeletedRecord::Invoice(_) => self
                .restore_invoice(deleted_item_id)
                .map(RestoredEntity::Invoice),
            DeletedRecord::Product(product) => {
                if self.products.contains(&product.id) {
                    return Err(DomainError::conflict(
                        "a live product with this id already exists",
                    ));
                }
                self.products.insert(product.id, product.clone());
                self.bin.take(deleted_item_id)?;
                Ok(RestoredEntity::Product(product))
            }
            DeletedRecord::Customer(customer) => {
                if self.customers.contains(&customer.id) {
                    return Err(DomainError::conflict(
                        "a live customer with this id already exists",
                    ));
                }
                self.customers.insert(customer.id, customer.clone());
                self.bin.take(deleted_item_id)?;
                Ok(RestoredEntity::Customer(customer))
            }
            DeletedRecord::Supplier(supplier) => {
                if self.suppliers.contains(&supplier.id) {
                    return Err(DomainError::conflict(
                        "a live supplier with this id already exists",
                    ));
                }
                self.suppliers.insert(supplier.id, supplier.clone());
                self.bin.take(deleted_item_id)?;
                Ok(RestoredEntity::Supplier(supplier))
            }
            DeletedRecord::Employee(employee) => {
                if self.employees.contains(&employee.id) {
                    return Err(DomainError::conflict(
                        "a live employee with this id already exists",
                    ));
                }
                self.employees.insert(employee.id, employee.clone());
                self.bin.take(deleted_item_id)?;
                Ok(RestoredEntity::Employee(employee))
            }
            DeletedRecord::Expense(expense) => {
                if self.expenses.contains(&expense.id) {
                    return Err(DomainError::conflict(
                        "a live expense with this id already exists",
                    ));
                }
                self.expenses.insert(expense.id, expense.clone());
                self.bin.take(deleted_item_id)?;
                Ok(RestoredEntity::Expense(expense))
            }
        }
    }

    /// Drop a bin entry forever. The entity was fully reversed when it was
    /// tombstoned, so there is nothing to compensate.
    pub fn purge(&self, deleted_item_id: DeletedItemId) -> DomainResult<()> {
        self.bin.purge(deleted_item_id)
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Crash-recovery sweep: release every stock reservation whose invoice
    /// never became (or no longer is) a live record. Run on startup and
    /// whenever a compensating release could not be applied in-line.
    /// Idempotent.
    pub fn reconcile(&self) -> DomainResult<Vec<InvoiceId>> {
        let mut released = Vec::new();
        for invoice_id in self.stock.open_reservations() {
            let live = self
                .invoices
                .get(&invoice_id)
                .map(|invoice| !invoice.deleted)
                .unwrap_or(false);
            if !live && self.stock.release_for_sale(invoice_id)? {
                tracing::warn!(invoice_id = %invoice_id, "released orphaned stock reservation");
                released.push(invoice_id);
            }
        }
        Ok(released)
    }

    // ------------------------------------------------------------------

    fn apply_customer_side(&self, invoice: &Invoice, credit_excess: u64) -> DomainResult<()> {
        let Some(customer_id) = invoice.customer_id else {
            return Ok(());
        };

        let unpaid = invoice.balance();
        let points = invoice.points_awarded;
        let mut outcome = Ok(());
        let updated = self.customers.update(&customer_id, &mut |customer| {
            let mut next = customer.clone();
            outcome = next.apply_sale(unpaid, points).and_then(|_| {
                if credit_excess > 0 {
                    next.add_store_credit(credit_excess)
                } else {
                    Ok(())
                }
            });
            if outcome.is_ok() {
                *customer = next;
            }
        });

        if updated.is_none() {
            return Err(DomainError::CustomerNotFound);
        }
        outcome
    }

    fn compensate_reservation(&self, invoice_id: InvoiceId) {
        if let Err(e) = self.stock.release_for_sale(invoice_id) {
            // The reservation stays open with no invoice record behind it;
            // the reconcile sweep will pick it up.
            tracing::error!(invoice_id = %invoice_id, error = %e, "compensating stock release failed");
        }
    }
}
