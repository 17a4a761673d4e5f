//! Host errors

use crate::component::ComponentKind;
use arena_core::EntityRef;
use thiserror::Error;

/// Errors reported by a [`GameHost`](crate::GameHost)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    /// Entity does not exist (destroyed or never created)
    #[error("entity {0} does not exist")]
    EntityNotFound(EntityRef),

    /// Entity exists but lacks the component
    #[error("entity {entity} has no {kind:?} component")]
    MissingComponent {
        entity: EntityRef,
        kind: ComponentKind,
    },

    /// Component value had a different kind than requested
    #[error("component kind mismatch: expected {expected:?}, found {found:?}")]
    KindMismatch {
        expected: ComponentKind,
        found: ComponentKind,
    },

    /// Host refused the operation
    #[error("host rejected operation: {0}")]
    Rejected(String),
}

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;
