use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillbook_core::{CustomerId, DomainError, DomainResult, InvoiceId, PaymentId, ProductId};
use tillbook_numbering::InvoiceNumber;

/// How a payment was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Cash,
    Card,
    Upi,
    Split,
}

/// Invoice line with sale-time snapshots.
///
/// `unit_price`, `tax_rate_pct` and `discount_pct` are copied from the
/// catalog (and the cashier's discount) when the invoice is created. Editing
/// the product afterwards must never change what this bill said.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub product_id: ProductId,
    /// Product name at sale time, for rendering old bills.
    pub name: String,
    pub quantity: u64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    pub tax_rate_pct: u32,
    pub discount_pct: u32,
}

impl InvoiceLine {
    fn validate(&self) -> DomainResult<()> {
        if self.quantity == 0 {
            return Err(DomainError::validation(
                "invoice line quantity must be positive",
            ));
        }
        if self.tax_rate_pct > 100 {
            return Err(DomainError::validation("tax rate cannot exceed 100%"));
        }
        if self.discount_pct > 100 {
            return Err(DomainError::validation("discount cannot exceed 100%"));
        }
        Ok(())
    }

    pub fn line_subtotal(&self) -> DomainResult<u64> {
        checked_u64(self.quantity as u128 * self.unit_price as u128)
    }

    pub fn tax_amount(&self) -> DomainResult<u64> {
        let subtotal = self.line_subtotal()? as u128;
        checked_u64(subtotal * self.tax_rate_pct as u128 / 100)
    }

    pub fn discount_amount(&self) -> DomainResult<u64> {
        let subtotal = self.line_subtotal()? as u128;
        checked_u64(subtotal * self.discount_pct as u128 / 100)
    }
}

fn checked_u64(value: u128) -> DomainResult<u64> {
    u64::try_from(value).map_err(|_| DomainError::invariant("invoice amount overflow"))
}

/// Server-computed monetary totals of an invoice.
///
/// Always derived from the line items; caller-supplied totals do not exist in
/// this model. Invariant: `grand_total = subtotal + total_tax - total_discount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: u64,
    pub total_tax: u64,
    pub total_discount: u64,
    pub grand_total: u64,
}

impl InvoiceTotals {
    pub fn compute(lines: &[InvoiceLine]) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::EmptyInvoice);
        }

        let mut subtotal: u64 = 0;
        let mut total_tax: u64 = 0;
        let mut total_discount: u64 = 0;

        for line in lines {
            line.validate()?;
            subtotal = subtotal
                .checked_add(line.line_subtotal()?)
                .ok_or_else(|| DomainError::invariant("invoice subtotal overflow"))?;
            total_tax = total_tax
                .checked_add(line.tax_amount()?)
                .ok_or_else(|| DomainError::invariant("invoice tax overflow"))?;
            total_discount = total_discount
                .checked_add(line.discount_amount()?)
                .ok_or_else(|| DomainError::invariant("invoice discount overflow"))?;
        }

        let grand_total = subtotal
            .checked_add(total_tax)
            .and_then(|v| v.checked_sub(total_discount))
            .ok_or_else(|| DomainError::invariant("invoice grand total overflow"))?;

        Ok(Self {
            subtotal,
            total_tax,
            total_discount,
            grand_total,
        })
    }
}

/// A discrete, auditable payment event against an invoice.
///
/// Payments are appended, never overwritten: `amount_paid` on the invoice is
/// the running sum of these events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub amount: u64,
    pub mode: PaymentMode,
    pub occurred_at: DateTime<Utc>,
}

/// A durable sales invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: InvoiceNumber,
    /// `None` is a walk-in sale.
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<InvoiceLine>,
    pub totals: InvoiceTotals,
    pub payment_mode: PaymentMode,
    pub amount_paid: u64,
    pub payments: Vec<Payment>,
    /// Loyalty points this sale awarded, snapshotted so delete can reverse
    /// them exactly even if the accrual rate changes later.
    pub points_awarded: u64,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
}

impl Invoice {
    /// Issue a new invoice from validated lines.
    ///
    /// Totals are recomputed here; the initial tender (if any) becomes the
    /// first payment event. Walk-in sales must be paid in full, since there
    /// is no customer account to carry the balance.
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        id: InvoiceId,
        number: InvoiceNumber,
        customer_id: Option<CustomerId>,
        lines: Vec<InvoiceLine>,
        payment_mode: PaymentMode,
        amount_paid: u64,
        points_awarded: u64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let totals = InvoiceTotals::compute(&lines)?;

        if amount_paid > totals.grand_total {
            return Err(DomainError::Overpayment {
                balance: totals.grand_total,
                attempted: amount_paid,
            });
        }

        if customer_id.is_none() && amount_paid < totals.grand_total {
            return Err(DomainError::validation(
                "walk-in sales must be paid in full",
            ));
        }

        let payments = if amount_paid > 0 {
            vec![Payment {
                id: PaymentId::new(),
                amount: amount_paid,
                mode: payment_mode,
                occurred_at: now,
            }]
        } else {
            Vec::new()
        };

        Ok(Self {
            id,
            number,
            customer_id,
            lines,
            totals,
            payment_mode,
            amount_paid,
            payments,
            points_awarded,
            created_at: now,
            deleted: false,
        })
    }

    /// Remaining amount owed. Invariant: `balance = grand_total - amount_paid`.
    pub fn balance(&self) -> u64 {
        self.totals.grand_total.saturating_sub(self.amount_paid)
    }

    pub fn is_settled(&self) -> bool {
        self.balance() == 0
    }

    /// Record a payment event. `amount_paid` only ever grows through here;
    /// the delete path is the sole correction mechanism.
    pub fn record_payment(
        &mut self,
        amount: u64,
        mode: PaymentMode,
        now: DateTime<Utc>,
    ) -> DomainResult<Payment> {
        if self.deleted {
            return Err(DomainError::AlreadyDeleted);
        }
        if amount == 0 {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        let balance = self.balance();
        if amount > balance {
            return Err(DomainError::Overpayment {
                balance,
                attempted: amount,
            });
        }

        self.amount_paid = self
            .amount_paid
            .checked_add(amount)
            .ok_or_else(|| DomainError::invariant("payment total overflow"))?;

        let payment = Payment {
            id: PaymentId::new(),
            amount,
            mode,
            occurred_at: now,
        };
        self.payments.push(payment.clone());
        Ok(payment)
    }

    /// When the most recent payment event happened, if any.
    pub fn last_payment_at(&self) -> Option<DateTime<Utc>> {
        self.payments.iter().map(|p| p.occurred_at).max()
    }
}
