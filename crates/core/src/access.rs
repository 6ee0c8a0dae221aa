//! Authorization boundary: pre-resolved capabilities of the acting identity.
//!
//! The engine never derives permissions from roles. The caller's authorization
//! layer resolves them and passes an [`Actor`] into every mutating operation.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// A capability the engine can ask about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Approve,
    Cancel,
    Receive,
    Edit,
    ViewAll,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Approve => "can_approve",
            Capability::Cancel => "can_cancel",
            Capability::Receive => "can_receive",
            Capability::Edit => "can_edit",
            Capability::ViewAll => "can_view_all",
        }
    }
}

/// Capability flags for one identity.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_approve: bool,
    pub can_cancel: bool,
    pub can_receive: bool,
    pub can_edit: bool,
    pub can_view_all: bool,
}

impl Capabilities {
    /// Every capability granted (system actors, tests).
    pub fn all() -> Self {
        Self {
            can_approve: true,
            can_cancel: true,
            can_receive: true,
            can_edit: true,
            can_view_all: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Approve => self.can_approve,
            Capability::Cancel => self.can_cancel,
            Capability::Receive => self.can_receive,
            Capability::Edit => self.can_edit,
            Capability::ViewAll => self.can_view_all,
        }
    }
}

/// The acting identity together with its resolved capabilities.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub capabilities: Capabilities,
}

impl Actor {
    pub fn new(user_id: UserId, capabilities: Capabilities) -> Self {
        Self {
            user_id,
            capabilities,
        }
    }

    /// Fail with `Forbidden` unless the capability was granted.
    pub fn require(&self, capability: Capability) -> DomainResult<()> {
        if self.capabilities.allows(capability) {
            Ok(())
        } else {
            Err(DomainError::Forbidden(capability.as_str()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_missing_capability() {
        let actor = Actor::new(
            UserId::new(),
            Capabilities {
                can_receive: true,
                ..Capabilities::none()
            },
        );
        assert!(actor.require(Capability::Receive).is_ok());
        assert_eq!(
            actor.require(Capability::Approve),
            Err(DomainError::Forbidden("can_approve"))
        );
    }
}
