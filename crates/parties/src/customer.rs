use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillbook_core::{CustomerId, DomainError, DomainResult};

use crate::party::ContactInfo;

/// Customer record with its ledger state.
///
/// `outstanding_balance` is the cached sum of this customer's unpaid invoice
/// balances; `loyalty_points` accrue per completed sale; `store_credit` holds
/// overpayment excess when the shop runs the credit-to-account policy. All
/// three are in smallest currency units / whole points and are only mutated
/// through the checked helpers below, inside an atomic store update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub contact: ContactInfo,
    pub outstanding_balance: u64,
    pub loyalty_points: u64,
    pub store_credit: u64,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(
        id: CustomerId,
        name: impl Into<String>,
        contact: ContactInfo,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            contact,
            outstanding_balance: 0,
            loyalty_points: 0,
            store_credit: 0,
            created_at: now,
        })
    }

    /// Record a sale: the unpaid part of the invoice joins the outstanding
    /// balance and the sale's loyalty points accrue.
    pub fn apply_sale(&mut self, unpaid: u64, points: u64) -> DomainResult<()> {
        // Validate both additions before assigning either, so a failure leaves
        // the record untouched.
        let new_balance = self
            .outstanding_balance
            .checked_add(unpaid)
            .ok_or_else(|| DomainError::invariant("outstanding balance overflow"))?;
        let new_points = self
            .loyalty_points
            .checked_add(points)
            .ok_or_else(|| DomainError::invariant("loyalty points overflow"))?;
        self.outstanding_balance = new_balance;
        self.loyalty_points = new_points;
        Ok(())
    }

    /// Exact inverse of [`Customer::apply_sale`], used when an invoice is
    /// deleted. `unpaid` is the invoice's balance *at delete time*; amounts
    /// already paid are not un-paid.
    pub fn reverse_sale(&mut self, unpaid: u64, points: u64) {
        self.outstanding_balance = self.outstanding_balance.saturating_sub(unpaid);
        self.loyalty_points = self.loyalty_points.saturating_sub(points);
    }

    /// Settle part of the outstanding balance after a payment was recorded
    /// against one of this customer's invoices.
    pub fn settle(&mut self, amount: u64) {
        self.outstanding_balance = self.outstanding_balance.saturating_sub(amount);
    }

    /// Park overpayment excess as store credit (credit-to-account policy).
    pub fn add_store_credit(&mut self, amount: u64) -> DomainResult<()> {
        self.store_credit = self
            .store_credit
            .checked_add(amount)
            .ok_or_else(|| DomainError::invariant("store credit overflow"))?;
        Ok(())
    }
}
