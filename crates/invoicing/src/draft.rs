use serde::{Deserialize, Serialize};

use tillbook_core::{CustomerId, ProductId};

use crate::invoice::PaymentMode;

/// One cart line of a draft: which product, how many, and any discount the
/// cashier granted.
///
/// Deliberately no price and no tax fields: those are snapshotted from the
/// catalog when the invoice is created, so a tampered client cannot post its
/// own totals. Amounts are recomputed server-side from the catalog every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftItem {
    pub product_id: ProductId,
    pub quantity: u64,
    pub discount_pct: u32,
}

/// An in-progress cart ("held bill").
///
/// Drafts are ephemeral: the till keeps them in its own session and only
/// hands one over when the sale completes. They are never persisted here;
/// a draft that is never submitted simply disappears with the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDraft {
    /// `None` is a walk-in sale (no account to carry a balance).
    pub customer_id: Option<CustomerId>,
    pub items: Vec<DraftItem>,
    pub payment_mode: PaymentMode,
    /// Amount tendered at the till, in smallest currency units.
    pub amount_paid: u64,
}

impl SaleDraft {
    pub fn walk_in(items: Vec<DraftItem>, payment_mode: PaymentMode, amount_paid: u64) -> Self {
        Self {
            customer_id: None,
            items,
            payment_mode,
            amount_paid,
        }
    }

    pub fn for_customer(
        customer_id: CustomerId,
        items: Vec<DraftItem>,
        payment_mode: PaymentMode,
        amount_paid: u64,
    ) -> Self {
        Self {
            customer_id: Some(customer_id),
            items,
            payment_mode,
            amount_paid,
        }
    }
}
