//! Input validation utilities.
//!
//! Per-field rules shared by the record kinds. Each record's `validate`
//! composes these; patch application reuses the same helpers so a patched
//! value is held to the same rules as a freshly created one.

use crate::constants::{
    earliest_birthdate, MAX_COLLECTION_NAME_LEN, MAX_WARD_CAPACITY, MIN_WARD_CAPACITY,
};
use crate::error::{SnapshotError, SnapshotResult, ValidationError};
use crate::records::{RecordId, RecordKind};
use chrono::NaiveDate;
use hs_types::{EmailAddress, NonEmptyText};

/// Ids are positive; `0` is reserved as "unassigned".
pub fn validate_id(kind: RecordKind, id: RecordId) -> Result<(), ValidationError> {
    if id == 0 {
        return Err(ValidationError::NonPositiveId { kind });
    }
    Ok(())
}

/// Parses a required text field, optionally bounded in length.
pub fn required_text(
    field: &'static str,
    value: impl AsRef<str>,
    max: Option<usize>,
) -> Result<NonEmptyText, ValidationError> {
    let parsed = match max {
        Some(max) => NonEmptyText::bounded(value, max),
        None => NonEmptyText::new(value),
    };
    parsed.map_err(ValidationError::text(field))
}

/// Re-checks the length bound of an already constructed text field.
///
/// Needed for values that arrive through deserialisation, where only the
/// non-empty rule is enforced by the type itself.
pub fn check_text_len(
    field: &'static str,
    value: &NonEmptyText,
    max: usize,
) -> Result<(), ValidationError> {
    let actual = value.char_len();
    if actual > max {
        return Err(ValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

pub fn parse_email(value: impl AsRef<str>) -> Result<EmailAddress, ValidationError> {
    EmailAddress::parse(value).map_err(ValidationError::text("email"))
}

/// Birth dates must fall within `[1900-01-01, today]`.
pub fn validate_birthdate(birthdate: NaiveDate, today: NaiveDate) -> Result<(), ValidationError> {
    if birthdate > today {
        return Err(ValidationError::BirthdateInFuture(birthdate));
    }
    if birthdate < earliest_birthdate() {
        return Err(ValidationError::BirthdateTooEarly(birthdate));
    }
    Ok(())
}

pub fn validate_capacity(capacity: u32) -> Result<(), ValidationError> {
    if !(MIN_WARD_CAPACITY..=MAX_WARD_CAPACITY).contains(&capacity) {
        return Err(ValidationError::CapacityOutOfRange {
            min: MIN_WARD_CAPACITY,
            max: MAX_WARD_CAPACITY,
            actual: capacity,
        });
    }
    Ok(())
}

/// Validates that a collection name is safe to use as a snapshot file stem.
///
/// Collection names become file names under the data directory, so this
/// applies the same guardrails one would apply to any externally supplied
/// path component:
/// - Rejects empty strings and names starting with `.`
/// - Bounds the length
/// - Restricts characters to alphanumeric ASCII, `.`, `-` and `_`
pub fn validate_collection_name(collection: &str) -> SnapshotResult<()> {
    if collection.is_empty() || collection.starts_with('.') {
        return Err(SnapshotError::InvalidCollection(format!(
            "'{collection}' must be non-empty and must not start with '.'"
        )));
    }

    if collection.len() > MAX_COLLECTION_NAME_LEN {
        return Err(SnapshotError::InvalidCollection(format!(
            "'{collection}' exceeds maximum length of {MAX_COLLECTION_NAME_LEN} characters"
        )));
    }

    let ok = collection
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));

    if !ok {
        return Err(SnapshotError::InvalidCollection(format!(
            "'{collection}' contains invalid characters (only alphanumeric, '.', '-', '_' allowed)"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn test_validate_birthdate_bounds() {
        let today = date(2025, 6, 1);
        assert!(validate_birthdate(date(1900, 1, 1), today).is_ok());
        assert!(validate_birthdate(today, today).is_ok());
        assert_eq!(
            validate_birthdate(date(1899, 12, 31), today),
            Err(ValidationError::BirthdateTooEarly(date(1899, 12, 31)))
        );
        assert_eq!(
            validate_birthdate(date(2025, 6, 2), today),
            Err(ValidationError::BirthdateInFuture(date(2025, 6, 2)))
        );
    }

    #[test]
    fn test_validate_capacity_range() {
        assert!(validate_capacity(1).is_ok());
        assert!(validate_capacity(100).is_ok());
        assert!(matches!(
            validate_capacity(0),
            Err(ValidationError::CapacityOutOfRange { actual: 0, .. })
        ));
        assert!(validate_capacity(101).is_err());
    }

    #[test]
    fn test_required_text_reports_field_and_bound() {
        let err = required_text("name", "x".repeat(51), Some(50)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TooLong {
                field: "name",
                max: 50,
                actual: 51
            }
        );

        let err = required_text("firstname", "  ", None).unwrap_err();
        assert!(matches!(err, ValidationError::Text { field: "firstname", .. }));
    }

    #[test]
    fn test_validate_collection_name_rejects_path_components() {
        assert!(validate_collection_name("patients").is_ok());
        assert!(validate_collection_name("wards_v2.backup").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("../patients").is_err());
        assert!(validate_collection_name(".hidden").is_err());
        assert!(validate_collection_name("a/b").is_err());
        assert!(validate_collection_name(&"x".repeat(65)).is_err());
    }
}
