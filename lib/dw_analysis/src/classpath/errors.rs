//! Class hierarchy resolution errors.

use thiserror::Error;

/// An alias for result that can be a [`ClassPathError`].
pub type ClassPathResult<T> = Result<T, ClassPathError>;

#[derive(Debug, Error)]
pub enum ClassPathError {
    #[error("Could not resolve class {0}")]
    UnresolvedClass(String),

    #[error("Interfaces for class {0} not fully resolved")]
    InterfacesNotResolved(String),

    #[error("Cyclic class hierarchy while computing {0}")]
    Cycle(String),

    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Cannot compute a common superclass for primitive type {0}")]
    NoCommonSuperclass(String),
}

impl ClassPathError {
    /// Returns `true` for the errors meaning "cannot tell" rather than "malformed".
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedClass(_) | Self::InterfacesNotResolved(_) | Self::Cycle(_)
        )
    }
}
