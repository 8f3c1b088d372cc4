//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Validation variants reject synchronously with no side effect; conflict
/// variants surface state the caller must resolve; `AllocatorUnavailable` and
/// `Storage` are infrastructure failures the caller may retry at
/// whole-operation granularity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A conflict occurred (e.g. duplicate creation, live entity in the way).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An invoice draft carried no line items.
    #[error("invoice has no line items")]
    EmptyInvoice,

    /// A stock adjustment request was malformed (negative or zero quantity).
    #[error("invalid stock adjustment: {0}")]
    InvalidAdjustment(String),

    /// A stock decrement would take the on-hand quantity below zero.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u64, available: u64 },

    /// A payment exceeded the invoice's remaining balance.
    #[error("overpayment: balance is {balance}, attempted {attempted}")]
    Overpayment { balance: u64, attempted: u64 },

    #[error("invoice not found")]
    InvoiceNotFound,

    #[error("product not found")]
    ProductNotFound,

    #[error("customer not found")]
    CustomerNotFound,

    /// A requested resource was not found (kinds without a dedicated variant).
    #[error("not found")]
    NotFound,

    /// The entity was already soft-deleted (its snapshot is in the bin).
    #[error("already deleted")]
    AlreadyDeleted,

    /// No recycle-bin entry exists for the given id.
    #[error("deleted item not found")]
    TombstoneNotFound,

    /// The invoice number allocator could not be reached.
    #[error("sequence allocator unavailable: {0}")]
    AllocatorUnavailable(String),

    /// Underlying storage failed (poisoned lock, unreachable backend).
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_adjustment(msg: impl Into<String>) -> Self {
        Self::InvalidAdjustment(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AllocatorUnavailable(_) | Self::Storage(_))
    }
}
