//! Service-level error: domain rejections plus storage failures.

use thiserror::Error;

use replenish_core::DomainError;

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),

    /// The background scheduler is no longer running.
    #[error("alert scheduler stopped")]
    SchedulerStopped,
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            // Unique-key violations are business conflicts for the caller.
            StoreError::Conflict(msg) => ServiceError::Domain(DomainError::Conflict(msg)),
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    /// Worth retrying at the next opportunity (never mid-operation).
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Store(e) if e.is_transient())
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::Conflict(_)))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_surface_as_domain_conflicts() {
        let err = ServiceError::from(StoreError::Conflict("duplicate".into()));
        assert!(err.is_conflict());
        assert!(!err.is_transient());

        let err = ServiceError::from(StoreError::Unavailable("timeout".into()));
        assert!(err.is_transient());
        assert!(err.domain().is_none());
    }
}
