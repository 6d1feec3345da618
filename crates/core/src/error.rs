use crate::records::{RecordId, RecordKind};
use chrono::NaiveDate;
use hs_types::TextError;
use std::path::PathBuf;

/// A record violates the rules of its kind. Raised before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} id must be greater than 0")]
    NonPositiveId { kind: RecordKind },
    #[error("invalid {field}: {source}")]
    Text {
        field: &'static str,
        #[source]
        source: TextError,
    },
    #[error("{field} exceeds {max} characters (got {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    #[error("birthdate {0} lies in the future")]
    BirthdateInFuture(NaiveDate),
    #[error("birthdate {0} is before 1900-01-01")]
    BirthdateTooEarly(NaiveDate),
    #[error("ward capacity must be between {min} and {max} (got {actual})")]
    CapacityOutOfRange { min: u32, max: u32, actual: u32 },
}

impl ValidationError {
    pub(crate) fn text(field: &'static str) -> impl FnOnce(TextError) -> Self {
        move |source| match source {
            TextError::TooLong { max, actual } => Self::TooLong { field, max, actual },
            source => Self::Text { field, source },
        }
    }
}

/// A ward assignment, ward resize or ward removal would break the capacity
/// rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityRejection {
    #[error("ward {ward_id} does not exist")]
    WardNotFound { ward_id: RecordId },
    #[error("ward {ward_id} is full ({occupancy}/{capacity})")]
    WardFull {
        ward_id: RecordId,
        capacity: u32,
        occupancy: usize,
    },
    #[error("ward {ward_id} holds {occupancy} patients, more than the new capacity {capacity}")]
    CapacityBelowOccupancy {
        ward_id: RecordId,
        capacity: u32,
        occupancy: usize,
    },
    #[error("ward {ward_id} still has {occupancy} patients assigned")]
    WardOccupied { ward_id: RecordId, occupancy: usize },
}

/// Classified failure of a registry operation. The registry is unchanged
/// whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
    #[error("{kind} {id} already exists")]
    DuplicateId { kind: RecordKind, id: RecordId },
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: RecordId },
    #[error("constraint rejected: {0}")]
    ConstraintRejected(#[from] CapacityRejection),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Saving or loading a snapshot failed.
///
/// These never abort the registry operation that triggered them; they are
/// reported through [`crate::SnapshotStatus::Degraded`] or as the error of an
/// explicit `save`/`load` call.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid collection name: {0}")]
    InvalidCollection(String),
    #[error("snapshot I/O failed (path: {path}): {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(String),
    #[error("failed to decode snapshot {path} at {location}: {message}", path = path.display())]
    Decode {
        path: PathBuf,
        location: String,
        message: String,
    },
    #[error("snapshot holds collection '{found}', expected '{expected}'")]
    CollectionMismatch { expected: String, found: String },
}

impl SnapshotError {
    /// Whether the file was read but its contents are not a usable snapshot
    /// of the collection.
    pub fn is_unreadable_content(&self) -> bool {
        matches!(
            self,
            SnapshotError::Decode { .. } | SnapshotError::CollectionMismatch { .. }
        )
    }
}

pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    InvalidInput(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
