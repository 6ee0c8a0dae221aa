//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Storage and transport concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A requested entity does not exist (or does not belong to its parent).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A status change that the lifecycle table does not allow.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// The acting identity lacks the named capability.
    #[error("forbidden: missing capability '{0}'")]
    Forbidden(&'static str),

    /// Receiving would exceed the ordered quantity of a line.
    #[error(
        "over-receipt on line {line_id}: ordered {ordered}, already received {received}, requested {requested}"
    )]
    OverReceipt {
        line_id: String,
        ordered: i64,
        received: i64,
        requested: i64,
    },

    /// An outbound movement exceeds the quantity on hand (or available, for reservations).
    #[error("insufficient stock: requested {requested}, on hand {on_hand}")]
    InsufficientStock { requested: i64, on_hand: i64 },

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A uniqueness conflict (duplicate order number, duplicate inventory key).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

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

    /// Stable, machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound { .. } => "not_found",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::OverReceipt { .. } => "over_receipt",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::Validation(_) => "validation_error",
            DomainError::Conflict(_) => "conflict",
            DomainError::InvariantViolation(_) => "invariant_violation",
            DomainError::InvalidId(_) => "invalid_id",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_both_states() {
        let err = DomainError::invalid_transition("draft", "received");
        assert_eq!(err.to_string(), "invalid transition from draft to received");
        assert_eq!(err.code(), "invalid_transition");
    }

    #[test]
    fn not_found_carries_entity_and_id() {
        let err = DomainError::not_found("purchase order line", 42);
        assert_eq!(err.to_string(), "purchase order line not found: 42");
    }
}
