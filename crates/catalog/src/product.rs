use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillbook_core::{DomainError, DomainResult, ProductId};

/// Catalog record for a sellable product.
///
/// `unit_price` is in the smallest currency unit (e.g., cents).
/// `tax_rate_pct` is an integer percentage (e.g., 18 for 18% GST).
///
/// Invoices snapshot `unit_price`/`tax_rate_pct` at sale time; editing a
/// product later never alters an existing invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Barcode or SKU used for scanning at the till.
    pub sku: String,
    pub unit_price: u64,
    pub tax_rate_pct: u32,
    /// Reorder threshold; the stock ledger's low-stock query compares
    /// on-hand quantity against this.
    pub min_stock: u64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        sku: impl Into<String>,
        unit_price: u64,
        tax_rate_pct: u32,
        min_stock: u64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        let sku = sku.into();

        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }

        if tax_rate_pct > 100 {
            return Err(DomainError::validation("tax rate cannot exceed 100%"));
        }

        Ok(Self {
            id,
            name,
            sku,
            unit_price,
            tax_rate_pct,
            min_stock,
            created_at: now,
        })
    }
}
