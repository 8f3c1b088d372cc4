use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillbook_core::{DomainError, DomainResult, ExpenseId};

/// A recorded shop expense. `amount` is in smallest currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    pub category: String,
    pub amount: u64,
    pub incurred_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        id: ExpenseId,
        description: impl Into<String>,
        category: impl Into<String>,
        amount: u64,
        incurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(DomainError::validation("description cannot be empty"));
        }
        if amount == 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        Ok(Self {
            id,
            description,
            category: category.into(),
            amount,
            incurred_at,
        })
    }
}
