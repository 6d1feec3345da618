use crate::constants::MAX_DEPARTMENT_LEN;
use crate::error::ValidationError;
use crate::ordering;
use crate::records::{Person, PersonPatch, Record, RecordId, RecordKind};
use crate::validation::{check_text_len, required_text};
use chrono::NaiveDate;
use hs_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A member of staff.
///
/// `ward_id` records where the employee works. It is not a capacity-bearing
/// assignment, so any number of employees may name the same ward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    #[serde(flatten)]
    pub person: Person,
    pub department: NonEmptyText,
    #[serde(default)]
    pub ward_id: Option<RecordId>,
}

impl Employee {
    pub fn new(person: Person, department: impl AsRef<str>) -> Result<Self, ValidationError> {
        Ok(Self {
            person,
            department: required_text("department", department, Some(MAX_DEPARTMENT_LEN))?,
            ward_id: None,
        })
    }

    pub fn with_ward(mut self, ward_id: RecordId) -> Self {
        self.ward_id = Some(ward_id);
        self
    }
}

/// Partial update of an employee. `ward_id` follows the same
/// three-state convention as [`PatientPatch`](super::PatientPatch).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmployeePatch {
    pub person: PersonPatch,
    pub department: Option<String>,
    pub ward_id: Option<Option<RecordId>>,
}

impl Record for Employee {
    type Patch = EmployeePatch;

    const KIND: RecordKind = RecordKind::Employee;

    fn id(&self) -> RecordId {
        self.person.id
    }

    fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        self.person.validate(Self::KIND, today)?;
        check_text_len("department", &self.department, MAX_DEPARTMENT_LEN)
    }

    fn apply_patch(&mut self, patch: &EmployeePatch) -> Result<(), ValidationError> {
        self.person.apply_patch(&patch.person)?;
        if let Some(department) = &patch.department {
            self.department = required_text("department", department, Some(MAX_DEPARTMENT_LEN))?;
        }
        if let Some(ward_id) = patch.ward_id {
            self.ward_id = ward_id;
        }
        Ok(())
    }

    fn canonical_cmp(&self, other: &Self, today: NaiveDate) -> Ordering {
        ordering::employee_cmp(self, other, today)
    }
}
