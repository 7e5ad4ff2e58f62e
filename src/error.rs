/// Error kinds surfaced by every fallible world operation.
///
/// Each variant names the rule that was violated and carries enough context
/// (the offending coordinate, or a message) for presentation to report a
/// rejected command without inspecting world state.

use thiserror::Error;

use crate::domain::coord::Coord;

pub type Result<T> = std::result::Result<T, IceError>;

#[derive(Debug, Error)]
pub enum IceError {
    /// Access outside `[0, width) x [0, height)`.
    #[error("coordinates {0} are outside the board")]
    InvalidCoordinates(Coord),

    /// Solid object at the destination, or a conflicting static occupant.
    #[error("cell {0} is blocked")]
    CellBlocked(Coord),

    /// Conflicting dynamic occupant.
    #[error("cell {0} is already occupied")]
    CellOccupied(Coord),

    /// Precondition violation (no level loaded, wrong phase, cooldown...).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Failure reported by the level/save collaborator.
    #[error("persistence failure: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl IceError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        IceError::InvalidOperation(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        IceError::Persistence { message: message.into(), source: None }
    }

    pub fn persistence_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        IceError::Persistence { message: message.into(), source: Some(Box::new(source)) }
    }
}
