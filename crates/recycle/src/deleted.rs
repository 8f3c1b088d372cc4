use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillbook_catalog::Product;
use tillbook_core::DeletedItemId;
use tillbook_expenses::Expense;
use tillbook_invoicing::Invoice;
use tillbook_parties::{Customer, Employee, Supplier};

/// The entity kinds the recycle bin can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletedKind {
    Invoice,
    Product,
    Customer,
    Supplier,
    Employee,
    Expense,
}

/// Full snapshot of an entity at delete time, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeletedRecord {
    Invoice(Invoice),
    Product(Product),
    Customer(Customer),
    Supplier(Supplier),
    Employee(Employee),
    Expense(Expense),
}

impl DeletedRecord {
    pub fn kind(&self) -> DeletedKind {
        match self {
            DeletedRecord::Invoice(_) => DeletedKind::Invoice,
            DeletedRecord::Product(_) => DeletedKind::Product,
            DeletedRecord::Customer(_) => DeletedKind::Customer,
            DeletedRecord::Supplier(_) => DeletedKind::Supplier,
            DeletedRecord::Employee(_) => DeletedKind::Employee,
            DeletedRecord::Expense(_) => DeletedKind::Expense,
        }
    }

    /// Human-facing label for the deleted-items view.
    pub fn label(&self) -> String {
        match self {
            DeletedRecord::Invoice(i) => i.number.to_string(),
            DeletedRecord::Product(p) => p.name.clone(),
            DeletedRecord::Customer(c) => c.name.clone(),
            DeletedRecord::Supplier(s) => s.name.clone(),
            DeletedRecord::Employee(e) => e.name.clone(),
            DeletedRecord::Expense(e) => e.description.clone(),
        }
    }
}

/// A recycle-bin entry: one deleted entity, restorable until purged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedItem {
    pub id: DeletedItemId,
    pub record: DeletedRecord,
    pub deleted_at: DateTime<Utc>,
}
