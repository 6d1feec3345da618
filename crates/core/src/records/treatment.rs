use crate::error::ValidationError;
use crate::ordering;
use crate::records::{Record, RecordId, RecordKind};
use crate::validation::validate_id;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A treatment given to a patient by a doctor on a given day.
///
/// `patient_id` and `doctor_id` are loose references. They are not checked
/// when the treatment is written and may point at persons that do not (or no
/// longer) exist; see [`Hospital::resolve_treatment`](crate::Hospital::resolve_treatment).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: RecordId,
    pub date: NaiveDate,
    pub therapy: String,
    pub patient_id: RecordId,
    pub doctor_id: RecordId,
}

impl Treatment {
    pub fn new(
        id: RecordId,
        date: NaiveDate,
        therapy: impl Into<String>,
        patient_id: RecordId,
        doctor_id: RecordId,
    ) -> Self {
        Self {
            id,
            date,
            therapy: therapy.into(),
            patient_id,
            doctor_id,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreatmentPatch {
    pub date: Option<NaiveDate>,
    pub therapy: Option<String>,
    pub patient_id: Option<RecordId>,
    pub doctor_id: Option<RecordId>,
}

impl Record for Treatment {
    type Patch = TreatmentPatch;

    const KIND: RecordKind = RecordKind::Treatment;

    fn id(&self) -> RecordId {
        self.id
    }

    fn validate(&self, _today: NaiveDate) -> Result<(), ValidationError> {
        validate_id(Self::KIND, self.id)
    }

    fn apply_patch(&mut self, patch: &TreatmentPatch) -> Result<(), ValidationError> {
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(therapy) = &patch.therapy {
            self.therapy = therapy.clone();
        }
        if let Some(patient_id) = patch.patient_id {
            self.patient_id = patient_id;
        }
        if let Some(doctor_id) = patch.doctor_id {
            self.doctor_id = doctor_id;
        }
        Ok(())
    }

    fn canonical_cmp(&self, other: &Self, _today: NaiveDate) -> Ordering {
        ordering::treatment_cmp(self, other)
    }
}
