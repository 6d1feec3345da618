//! Deterministic listing orders.
//!
//! Every record kind has one canonical order (used by
//! [`Registry::sorted`](crate::Registry::sorted)) plus a few named alternate
//! views. String keys compare case-insensitively. Each chain ends on the
//! record id, so two records with different ids never compare equal.
//!
//! | kind      | canonical key chain                                          |
//! |-----------|--------------------------------------------------------------|
//! | person    | name, firstname, age ascending, id                           |
//! | patient   | ward id ascending (unassigned last), person order            |
//! | employee  | department, ward id ascending (unassigned last), person order|
//! | ward      | name, capacity descending, id                                |
//! | treatment | date descending, therapy, id                                 |

use crate::records::{Employee, Patient, Person, RecordId, Treatment, Ward};
use chrono::NaiveDate;
use std::cmp::Ordering;

/// Case-insensitive string comparison.
fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Assigned wards ascending, unassigned after every assigned one.
fn cmp_ward_nulls_last(a: Option<RecordId>, b: Option<RecordId>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn person_cmp(a: &Person, b: &Person, today: NaiveDate) -> Ordering {
    cmp_ignore_case(a.name.as_str(), b.name.as_str())
        .then_with(|| cmp_ignore_case(a.firstname.as_str(), b.firstname.as_str()))
        .then_with(|| a.age_on(today).cmp(&b.age_on(today)))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn patient_cmp(a: &Patient, b: &Patient, today: NaiveDate) -> Ordering {
    cmp_ward_nulls_last(a.ward_id, b.ward_id).then_with(|| person_cmp(&a.person, &b.person, today))
}

pub fn employee_cmp(a: &Employee, b: &Employee, today: NaiveDate) -> Ordering {
    cmp_ignore_case(a.department.as_str(), b.department.as_str())
        .then_with(|| cmp_ward_nulls_last(a.ward_id, b.ward_id))
        .then_with(|| person_cmp(&a.person, &b.person, today))
}

pub fn ward_cmp(a: &Ward, b: &Ward) -> Ordering {
    cmp_ignore_case(a.name.as_str(), b.name.as_str())
        .then_with(|| b.capacity.cmp(&a.capacity))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn treatment_cmp(a: &Treatment, b: &Treatment) -> Ordering {
    b.date
        .cmp(&a.date)
        .then_with(|| cmp_ignore_case(&a.therapy, &b.therapy))
        .then_with(|| a.id.cmp(&b.id))
}

/// Named patient listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PatientOrder {
    #[default]
    Canonical,
    /// Oldest first, then person order.
    AgeDescending,
}

impl PatientOrder {
    pub fn compare(self, a: &Patient, b: &Patient, today: NaiveDate) -> Ordering {
        match self {
            PatientOrder::Canonical => patient_cmp(a, b, today),
            PatientOrder::AgeDescending => b
                .person
                .age_on(today)
                .cmp(&a.person.age_on(today))
                .then_with(|| person_cmp(&a.person, &b.person, today)),
        }
    }
}

/// Named employee listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmployeeOrder {
    #[default]
    Canonical,
    /// Ward (unassigned last), then department, then person order.
    WardThenDepartment,
}

impl EmployeeOrder {
    pub fn compare(self, a: &Employee, b: &Employee, today: NaiveDate) -> Ordering {
        match self {
            EmployeeOrder::Canonical => employee_cmp(a, b, today),
            EmployeeOrder::WardThenDepartment => cmp_ward_nulls_last(a.ward_id, b.ward_id)
                .then_with(|| cmp_ignore_case(a.department.as_str(), b.department.as_str()))
                .then_with(|| person_cmp(&a.person, &b.person, today)),
        }
    }
}

/// Named ward listings. Ordering by occupancy needs the patient registry and
/// lives on [`Hospital::census_by_occupancy_rate`](crate::Hospital::census_by_occupancy_rate).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WardOrder {
    #[default]
    Canonical,
    /// Largest first, then name.
    CapacityDescending,
    /// Name only, with the id as the final tie-break.
    Name,
}

impl WardOrder {
    pub fn compare(self, a: &Ward, b: &Ward) -> Ordering {
        match self {
            WardOrder::Canonical => ward_cmp(a, b),
            WardOrder::CapacityDescending => b
                .capacity
                .cmp(&a.capacity)
                .then_with(|| cmp_ignore_case(a.name.as_str(), b.name.as_str()))
                .then_with(|| a.id.cmp(&b.id)),
            WardOrder::Name => cmp_ignore_case(a.name.as_str(), b.name.as_str())
                .then_with(|| a.id.cmp(&b.id)),
        }
    }
}

/// Named treatment listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TreatmentOrder {
    #[default]
    Canonical,
    DateDescending,
    DateAscending,
    /// Therapy, then most recent first.
    Therapy,
    /// Patient id, then most recent first.
    PatientThenDate,
}

impl TreatmentOrder {
    pub fn compare(self, a: &Treatment, b: &Treatment) -> Ordering {
        match self {
            TreatmentOrder::Canonical => treatment_cmp(a, b),
            TreatmentOrder::DateDescending => b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)),
            TreatmentOrder::DateAscending => a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)),
            TreatmentOrder::Therapy => cmp_ignore_case(&a.therapy, &b.therapy)
                .then_with(|| b.date.cmp(&a.date))
                .then_with(|| a.id.cmp(&b.id)),
            TreatmentOrder::PatientThenDate => a
                .patient_id
                .cmp(&b.patient_id)
                .then_with(|| b.date.cmp(&a.date))
                .then_with(|| a.id.cmp(&b.id)),
        }
    }
}
