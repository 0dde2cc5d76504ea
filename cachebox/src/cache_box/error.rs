//! Cache box error types.

use thiserror::Error;
use tracing::Level;

use super::BoxState;
use crate::resource::ResourceId;

/// Failure of a cache box operation.
///
/// Public operations never return these; they log them at [`severity`](Self::severity)
/// and yield an absent result instead.
#[derive(Debug, Error)]
pub enum CacheBoxError {
    /// Null reference, empty path, or invalid class.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Resolution, cast or capability check failed.
    #[error("failed to load {path}: {reason}")]
    Resolution { path: String, reason: String },

    /// The owning context could not construct the resource.
    #[error("failed to create {class}: {reason}")]
    Construction { class: String, reason: String },

    /// The handle was invalidated before the operation reached it.
    #[error("resource {0} is no longer valid")]
    StaleHandle(ResourceId),

    /// The box has already started tearing down.
    #[error("{operation} called on a cache box that is {state}")]
    PostTeardown {
        state: BoxState,
        operation: &'static str,
    },

    /// A host was asked for its box outside the owner's lifetime.
    #[error("no active cache box for {0}")]
    NoActiveBox(String),
}

impl CacheBoxError {
    /// Log level at which this failure is reported.
    pub fn severity(&self) -> Level {
        match self {
            CacheBoxError::InvalidInput(_)
            | CacheBoxError::Resolution { .. }
            | CacheBoxError::PostTeardown { .. }
            | CacheBoxError::NoActiveBox(_) => Level::ERROR,
            CacheBoxError::Construction { .. } => Level::WARN,
            CacheBoxError::StaleHandle(_) => Level::DEBUG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(
            CacheBoxError::InvalidInput("null".into()).severity(),
            Level::ERROR
        );
        assert_eq!(
            CacheBoxError::Construction {
                class: "Pawn".into(),
                reason: "world closed".into()
            }
            .severity(),
            Level::WARN
        );
        assert_eq!(
            CacheBoxError::StaleHandle(ResourceId::next()).severity(),
            Level::DEBUG
        );
    }

    #[test]
    fn test_post_teardown_display() {
        let err = CacheBoxError::PostTeardown {
            state: BoxState::Torn,
            operation: "load_object",
        };
        assert_eq!(err.to_string(), "load_object called on a cache box that is torn");
    }
}
