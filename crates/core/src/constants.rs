//! Constants used throughout the HealthSphere core crate.
//!
//! This module contains collection names, field bounds and configuration
//! defaults so that validation, persistence and the CLI agree on them.

use chrono::NaiveDate;

/// Default directory for snapshot storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "hospital_data";

/// Snapshot collection name for patients.
pub const PATIENTS_COLLECTION: &str = "patients";

/// Snapshot collection name for employees.
pub const EMPLOYEES_COLLECTION: &str = "employees";

/// Snapshot collection name for wards.
pub const WARDS_COLLECTION: &str = "wards";

/// Snapshot collection name for treatments.
pub const TREATMENTS_COLLECTION: &str = "treatments";

/// Maximum length of a person's family name, in characters.
pub const MAX_NAME_LEN: usize = 50;

/// Maximum length of an employee's department, in characters.
pub const MAX_DEPARTMENT_LEN: usize = 100;

/// Smallest permitted ward capacity.
pub const MIN_WARD_CAPACITY: u32 = 1;

/// Largest permitted ward capacity.
pub const MAX_WARD_CAPACITY: u32 = 100;

/// Maximum length of a snapshot collection name.
pub const MAX_COLLECTION_NAME_LEN: usize = 64;

/// Earliest accepted birth date (1900-01-01).
pub fn earliest_birthdate() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}
