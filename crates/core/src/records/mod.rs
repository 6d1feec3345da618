//! Hospital record kinds.
//!
//! Each kind (patients, employees, wards and treatments) is a plain data type
//! implementing [`Record`], which is everything the generic
//! [`Registry`](crate::Registry) needs: a positive integer identity, per-kind
//! validation, patch application and a canonical ordering.
//!
//! Records reference each other only by id. A treatment names its patient
//! and doctor by person id, and patients and employees name their ward by ward
//! id. No record owns another.

pub mod employee;
pub mod patient;
pub mod person;
pub mod treatment;
pub mod ward;

pub use employee::{Employee, EmployeePatch};
pub use patient::{Patient, PatientPatch};
pub use person::{Person, PersonPatch};
pub use treatment::{Treatment, TreatmentPatch};
pub use ward::{Ward, WardPatch};

use crate::constants::{
    EMPLOYEES_COLLECTION, PATIENTS_COLLECTION, TREATMENTS_COLLECTION, WARDS_COLLECTION,
};
use crate::error::ValidationError;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Identity of a record within its registry. `0` is never a valid id.
pub type RecordId = u64;

/// The kind of record a registry manages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Patient,
    Employee,
    Ward,
    Treatment,
}

impl RecordKind {
    /// Default snapshot collection name for this kind.
    pub fn collection(self) -> &'static str {
        match self {
            RecordKind::Patient => PATIENTS_COLLECTION,
            RecordKind::Employee => EMPLOYEES_COLLECTION,
            RecordKind::Ward => WARDS_COLLECTION,
            RecordKind::Treatment => TREATMENTS_COLLECTION,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Patient => "patient",
            RecordKind::Employee => "employee",
            RecordKind::Ward => "ward",
            RecordKind::Treatment => "treatment",
        };
        f.write_str(name)
    }
}

/// Capability a type needs to be managed by a [`Registry`](crate::Registry).
///
/// # Invariants
/// - `id()` never changes for the lifetime of a record; patches cannot touch it.
/// - `id()` is the record's identity. `PartialEq` compares every field and
///   answers a different question: whether two values are the same version.
/// - `canonical_cmp` is a total order over records with distinct ids.
pub trait Record:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Partial update: `None` fields are left unchanged.
    type Patch: fmt::Debug + Default;

    const KIND: RecordKind;

    fn id(&self) -> RecordId;

    /// Whether both values describe the same record, whatever their fields.
    fn same_identity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Checks every per-kind rule. `today` bounds date fields.
    fn validate(&self, today: NaiveDate) -> Result<(), ValidationError>;

    /// Overwrites every field the patch supplies.
    ///
    /// Text fields are parsed while applying, so a malformed value fails
    /// here; cross-field and date rules are left to [`Record::validate`].
    fn apply_patch(&mut self, patch: &Self::Patch) -> Result<(), ValidationError>;

    /// The kind's canonical listing order.
    fn canonical_cmp(&self, other: &Self, today: NaiveDate) -> Ordering;
}
