//! Receivables rollup: who owes the shop what.
//!
//! Derived on demand from invoice + payment state and never cached durably:
//! the invoices are the system of record and this view cannot drift from
//! them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillbook_core::CustomerId;
use tillbook_invoicing::Invoice;
use tillbook_parties::Customer;
use tillbook_store::KeyValueStore;

/// Per-customer rollup of unpaid / partially-paid invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receivable {
    pub customer_id: CustomerId,
    pub customer_name: String,
    /// Sum of open balances across this customer's unpaid invoices.
    pub total_due: u64,
    /// Date of the oldest unpaid invoice.
    pub oldest_due_date: DateTime<Utc>,
    /// Most recent payment event among the unpaid invoices, if any.
    pub last_payment_date: Option<DateTime<Utc>>,
    pub overdue: bool,
}

/// Build the rollup from all invoices as of a point in time.
///
/// Only non-deleted invoices with `balance > 0` participate; walk-in sales
/// never appear (they are always paid in full). `overdue` flags customers
/// whose oldest unpaid invoice is older than `overdue_after_days`.
pub fn compute(
    invoices: &[Invoice],
    customers: &dyn KeyValueStore<CustomerId, Customer>,
    overdue_after_days: i64,
    as_of: DateTime<Utc>,
) -> Vec<Receivable> {
    let mut open_by_customer: HashMap<CustomerId, Vec<&Invoice>> = HashMap::new();
    for invoice in invoices {
        if invoice.deleted || invoice.balance() == 0 {
            continue;
        }
        let Some(customer_id) = invoice.customer_id else {
            continue;
        };
        open_by_customer.entry(customer_id).or_default().push(invoice);
    }

    let mut receivables: Vec<Receivable> = open_by_customer
        .into_iter()
        .map(|(customer_id, open)| {
            let total_due = open.iter().map(|i| i.balance()).sum();
            let oldest_due_date = open
                .iter()
                .map(|i| i.created_at)
                .min()
                .expect("group is non-empty");
            let last_payment_date = open.iter().filter_map(|i| i.last_payment_at()).max();
            let customer_name = customers
                .get(&customer_id)
                .map(|c| c.name)
                .unwrap_or_else(|| "(deleted customer)".to_string());

            Receivable {
                customer_id,
                customer_name,
                total_due,
                oldest_due_date,
                last_payment_date,
                overdue: (as_of - oldest_due_date).num_days() > overdue_after_days,
            }
        })
        .collect();

    // Largest debts first, name as tiebreaker for stable output.
    receivables.sort_by(|a, b| {
        b.total_due
            .cmp(&a.total_due)
            .then_with(|| a.customer_name.cmp(&b.customer_name))
    });
    receivables
}
