//! Error taxonomy shared by behavior, coordinator and ports.

use crate::key::{ParseKeyError, Slug, Version};
use thiserror::Error;

/// Errors raised by the storage boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: the stored version is not the one the
    /// write was computed from.
    ///
    /// `expected: None` means the write was a creation; `actual: None` means
    /// nothing is stored under the key.
    #[error("Version conflict on {slug}: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        /// Key of the aggregate
        slug: Slug,
        /// The version the write was computed from
        expected: Option<Version>,
        /// The version currently stored
        actual: Option<Version>,
    },

    /// A creation found the key already taken.
    #[error("Already exists: {0}")]
    AlreadyExists(Slug),

    /// Nothing stored under the key.
    #[error("Not found: {0}")]
    NotFound(Slug),

    /// The backend failed.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether re-reading and re-applying the transform may succeed.
    #[must_use]
    pub const fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

/// Errors raised while forwarding deltas to subscribers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The transport refused or dropped the batch.
    #[error("Failed to deliver deltas for {target}: {reason}")]
    DeliveryFailed {
        /// Slug the batch targets
        target: Slug,
        /// Transport-specific reason
        reason: String,
    },
}

/// Errors surfaced to callers of attendance and series operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttendanceError {
    /// Unknown slug, or unknown attendee within an event.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic write kept conflicting, or a creation lost a race.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Input rejected by validation. Never retried.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Caller is not allowed to perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Storage failure other than a version conflict.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ParseKeyError> for AttendanceError {
    fn from(error: ParseKeyError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

/// Result alias for attendance operations.
pub type Result<T> = std::result::Result<T, AttendanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_conflict_display() {
        let error = StoreError::VersionConflict {
            slug: Slug::new("yoga"),
            expected: Some(Version::new(3)),
            actual: Some(Version::new(4)),
        };
        let display = format!("{error}");
        assert!(display.contains("yoga"));
        assert!(error.is_version_conflict());
        assert!(!StoreError::AlreadyExists(Slug::new("yoga")).is_version_conflict());
    }

    #[test]
    fn parse_errors_become_bad_requests() {
        let error: AttendanceError = ParseKeyError::InvalidEmail("nope".to_string()).into();
        assert!(matches!(error, AttendanceError::BadRequest(_)));
    }
}
