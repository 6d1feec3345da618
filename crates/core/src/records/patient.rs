use crate::error::ValidationError;
use crate::ordering;
use crate::records::{Person, PersonPatch, Record, RecordId, RecordKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A patient, optionally assigned to a ward.
///
/// Ward assignments count against the ward's capacity; see
/// [`CapacityCoordinator`](crate::CapacityCoordinator).
///
/// Two patients are the same patient when their ids match
/// ([`Record::same_identity`]). `==` compares every field, including the
/// ward assignment, and is what the registry uses to tell versions apart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    #[serde(flatten)]
    pub person: Person,
    #[serde(default)]
    pub ward_id: Option<RecordId>,
}

impl Patient {
    pub fn new(person: Person) -> Self {
        Self {
            person,
            ward_id: None,
        }
    }

    pub fn with_ward(mut self, ward_id: RecordId) -> Self {
        self.ward_id = Some(ward_id);
        self
    }
}

/// Partial update of a patient.
///
/// `ward_id` is doubly optional: `None` leaves the assignment alone,
/// `Some(None)` discharges the patient from their ward and `Some(Some(id))`
/// (re)assigns them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatientPatch {
    pub person: PersonPatch,
    pub ward_id: Option<Option<RecordId>>,
}

impl Record for Patient {
    type Patch = PatientPatch;

    const KIND: RecordKind = RecordKind::Patient;

    fn id(&self) -> RecordId {
        self.person.id
    }

    fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        self.person.validate(Self::KIND, today)
    }

    fn apply_patch(&mut self, patch: &PatientPatch) -> Result<(), ValidationError> {
        self.person.apply_patch(&patch.person)?;
        if let Some(ward_id) = patch.ward_id {
            self.ward_id = ward_id;
        }
        Ok(())
    }

    fn canonical_cmp(&self, other: &Self, today: NaiveDate) -> Ordering {
        ordering::patient_cmp(self, other, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: RecordId) -> Person {
        let born = NaiveDate::from_ymd_opt(1975, 9, 2).expect("valid test date");
        Person::new(id, "Schulz", "Jonas", born).expect("valid person")
    }

    #[test]
    fn test_identity_follows_id_not_fields() {
        let admitted = Patient::new(person(7)).with_ward(3);
        let discharged = Patient::new(person(7));
        let other = Patient::new(person(8));

        assert!(admitted.same_identity(&discharged));
        assert_ne!(admitted, discharged);
        assert!(!discharged.same_identity(&other));
    }
}
