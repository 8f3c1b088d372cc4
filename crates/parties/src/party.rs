use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillbook_core::{DomainError, DomainResult, EmployeeId, SupplierId};

/// Contact information for a party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Directory record for a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    /// Tax registration number, if the supplier has one.
    pub gstin: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Supplier {
    pub fn new(
        id: SupplierId,
        name: impl Into<String>,
        contact: ContactInfo,
        gstin: Option<String>,
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
            gstin,
            created_at: now,
        })
    }
}

/// Directory record for an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub role: String,
    pub contact: ContactInfo,
    pub created_at: DateTime<Utc>,
}

impl Employee {
    pub fn new(
        id: EmployeeId,
        name: impl Into<String>,
        role: impl Into<String>,
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
            role: role.into(),
            contact,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplier_rejects_empty_name() {
        let err = Supplier::new(
            SupplierId::new(),
            "  ",
            ContactInfo::default(),
            None,
            Utc::now(),
        )
        .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn employee_keeps_role() {
        let employee = Employee::new(
            EmployeeId::new(),
            "Asha",
            "cashier",
            ContactInfo::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(employee.role, "cashier");
    }
}
