//! Ward capacity enforcement.
//!
//! Occupancy is never stored. It is the number of patients whose `ward_id`
//! names the ward, counted from the patient registry at the moment of the
//! check. Two guards keep it within capacity:
//!
//! - [`CapacityCoordinator`] guards the patient registry and refuses an
//!   assignment to a missing or full ward.
//! - [`WardOccupancyGuard`] guards the ward registry and refuses shrinking a
//!   ward below its occupancy or deleting a ward that still has patients.
//!
//! Each guard reads the other registry while its own registry's write lock is
//! held. Both registries share one [`crate::MutationLock`], so at most one of
//! them is being written at a time and the two lock orders never meet.

use crate::error::CapacityRejection;
use crate::records::{Patient, RecordId, Ward};
use crate::registry::{AssignmentGuard, Registry};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Read access to ward capacities.
pub trait WardDirectory: Send + Sync {
    /// Capacity of the ward, or `None` if it does not exist.
    fn ward_capacity(&self, ward_id: RecordId) -> Option<u32>;
}

impl WardDirectory for Registry<Ward> {
    fn ward_capacity(&self, ward_id: RecordId) -> Option<u32> {
        self.with_records(|wards| wards.get(&ward_id).map(|w| w.capacity))
    }
}

/// Read access to ward occupancy.
pub trait OccupancyQuery: Send + Sync {
    fn occupancy(&self, ward_id: RecordId) -> usize;
}

impl OccupancyQuery for Registry<Patient> {
    fn occupancy(&self, ward_id: RecordId) -> usize {
        self.with_records(|patients| occupancy(ward_id, patients.values()))
    }
}

/// Number of patients in `patients` assigned to `ward_id`.
pub fn occupancy<'a>(ward_id: RecordId, patients: impl IntoIterator<Item = &'a Patient>) -> usize {
    patients
        .into_iter()
        .filter(|p| p.ward_id == Some(ward_id))
        .count()
}

pub struct CapacityCoordinator {
    wards: Arc<dyn WardDirectory>,
}

impl CapacityCoordinator {
    pub fn new(wards: Arc<dyn WardDirectory>) -> Self {
        Self { wards }
    }

    /// Whether `ward_id` exists and has at least one free place among
    /// `patients`.
    pub fn has_capacity<'a>(
        &self,
        ward_id: RecordId,
        patients: impl IntoIterator<Item = &'a Patient>,
    ) -> bool {
        self.wards
            .ward_capacity(ward_id)
            .is_some_and(|capacity| occupancy(ward_id, patients) < capacity as usize)
    }

    /// Decides whether `candidate` may take a place in its ward.
    ///
    /// The candidate's own stored entry, if any, is left out of the count so
    /// that re-saving an already admitted patient never counts them twice.
    /// Patients without a ward are always accepted.
    pub fn check_assignment(
        &self,
        candidate: &Patient,
        patients: &BTreeMap<RecordId, Patient>,
    ) -> Result<(), CapacityRejection> {
        let Some(ward_id) = candidate.ward_id else {
            return Ok(());
        };
        let capacity = self
            .wards
            .ward_capacity(ward_id)
            .ok_or(CapacityRejection::WardNotFound { ward_id })?;

        let candidate_id = candidate.person.id;
        let occupancy = occupancy(
            ward_id,
            patients
                .values()
                .filter(|p| p.person.id != candidate_id),
        );
        if occupancy >= capacity as usize {
            return Err(CapacityRejection::WardFull {
                ward_id,
                capacity,
                occupancy,
            });
        }
        Ok(())
    }
}

impl AssignmentGuard<Patient> for CapacityCoordinator {
    fn admit(
        &self,
        candidate: &Patient,
        previous: Option<&Patient>,
        current: &BTreeMap<RecordId, Patient>,
    ) -> Result<(), CapacityRejection> {
        // Only a change of ward claims a new place.
        if previous.is_some_and(|p| p.ward_id == candidate.ward_id) {
            return Ok(());
        }
        self.check_assignment(candidate, current)
    }
}

/// Keeps ward changes consistent with the patients already assigned.
///
/// Holds the patient registry weakly, since the patient registry's own guard
/// holds the ward registry. Once the patients are gone nothing is checked.
pub struct WardOccupancyGuard {
    patients: Weak<dyn OccupancyQuery>,
}

impl WardOccupancyGuard {
    pub fn new(patients: &Arc<dyn OccupancyQuery>) -> Self {
        Self {
            patients: Arc::downgrade(patients),
        }
    }

    fn occupancy(&self, ward_id: RecordId) -> usize {
        self.patients
            .upgrade()
            .map_or(0, |patients| patients.occupancy(ward_id))
    }
}

impl AssignmentGuard<Ward> for WardOccupancyGuard {
    fn admit(
        &self,
        candidate: &Ward,
        previous: Option<&Ward>,
        _current: &BTreeMap<RecordId, Ward>,
    ) -> Result<(), CapacityRejection> {
        // Only a shrink can strand patients.
        if previous.map_or(true, |p| candidate.capacity >= p.capacity) {
            return Ok(());
        }
        let occupancy = self.occupancy(candidate.id);
        if occupancy > candidate.capacity as usize {
            return Err(CapacityRejection::CapacityBelowOccupancy {
                ward_id: candidate.id,
                capacity: candidate.capacity,
                occupancy,
            });
        }
        Ok(())
    }

    fn release(
        &self,
        ward: &Ward,
        _current: &BTreeMap<RecordId, Ward>,
    ) -> Result<(), CapacityRejection> {
        match self.occupancy(ward.id) {
            0 => Ok(()),
            occupancy => Err(CapacityRejection::WardOccupied {
                ward_id: ward.id,
                occupancy,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::records::{PatientPatch, Person, WardPatch};
    use chrono::NaiveDate;

    fn patient(id: RecordId, ward_id: Option<RecordId>) -> Patient {
        let born = NaiveDate::from_ymd_opt(1980, 3, 4).expect("valid test date");
        let mut patient =
            Patient::new(Person::new(id, "Meier", "Anna", born).expect("valid person"));
        patient.ward_id = ward_id;
        patient
    }

    fn setup(capacity: u32) -> (Arc<Registry<Ward>>, Registry<Patient>) {
        let wards = Arc::new(Registry::<Ward>::new());
        wards
            .add(Ward::new(1, "Cardiology", capacity).expect("valid ward"))
            .expect("add ward");
        let coordinator = CapacityCoordinator::new(wards.clone());
        let patients = Registry::<Patient>::new().with_guard(Arc::new(coordinator));
        (wards, patients)
    }

    #[test]
    fn test_rejects_unknown_ward() {
        let (_wards, patients) = setup(2);
        let err = patients.add(patient(10, Some(9))).unwrap_err();
        assert_eq!(
            err,
            RegistryError::ConstraintRejected(CapacityRejection::WardNotFound { ward_id: 9 })
        );
        assert!(patients.is_empty());
    }

    #[test]
    fn test_unassigned_patients_are_never_checked() {
        let (_wards, patients) = setup(1);
        for id in 1..=5 {
            patients.add(patient(id, None)).expect("add should succeed");
        }
        assert_eq!(patients.len(), 5);
    }

    #[test]
    fn test_update_into_full_ward_is_rejected_and_state_kept() {
        let (_wards, patients) = setup(1);
        patients.add(patient(10, Some(1))).expect("first patient fits");
        patients.add(patient(11, None)).expect("unassigned patient");

        let patch = PatientPatch {
            ward_id: Some(Some(1)),
            ..Default::default()
        };
        let err = patients.update_patch(11, &patch).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::ConstraintRejected(CapacityRejection::WardFull {
                ward_id: 1,
                capacity: 1,
                occupancy: 1
            })
        ));
        assert_eq!(patients.find_by_id(11).expect("patient exists").ward_id, None);
    }

    #[test]
    fn test_patching_other_fields_of_admitted_patient_in_full_ward() {
        let (_wards, patients) = setup(1);
        patients.add(patient(10, Some(1))).expect("first patient fits");

        let patch = PatientPatch {
            person: crate::records::PersonPatch {
                phone: Some("0170 123456".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        patients
            .update_patch(10, &patch)
            .expect("unchanged ward needs no new place");
    }

    #[test]
    fn test_discharge_frees_a_place() {
        let (_wards, patients) = setup(1);
        patients.add(patient(10, Some(1))).expect("first patient fits");
        assert!(patients.add(patient(11, Some(1))).is_err());

        let discharge = PatientPatch {
            ward_id: Some(None),
            ..Default::default()
        };
        patients.update_patch(10, &discharge).expect("discharge");
        patients.add(patient(11, Some(1))).expect("place is free again");
    }

    #[test]
    fn test_has_capacity_and_occupancy() {
        let (wards, _patients) = setup(2);
        let coordinator = CapacityCoordinator::new(wards);
        let population = [patient(1, Some(1)), patient(2, None), patient(3, Some(1))];

        assert_eq!(occupancy(1, &population), 2);
        assert!(!coordinator.has_capacity(1, &population));
        assert!(coordinator.has_capacity(1, &population[..2]));
        assert!(!coordinator.has_capacity(42, &population[..0]));
    }

    #[test]
    fn test_concurrent_admissions_never_overfill() {
        use std::thread;

        let (_wards, patients) = setup(3);
        let patients = Arc::new(patients);
        let handles: Vec<_> = (1..=16)
            .map(|id| {
                let patients = Arc::clone(&patients);
                thread::spawn(move || patients.add(patient(id, Some(1))).is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 3);
        assert_eq!(patients.count(|p| p.ward_id == Some(1)), 3);
    }

    fn linked(capacity: u32) -> (Arc<Registry<Ward>>, Arc<Registry<Patient>>) {
        let lock = crate::registry::MutationLock::default();
        let wards = Arc::new(Registry::<Ward>::new().with_mutation_lock(lock.clone()));
        wards
            .add(Ward::new(1, "Cardiology", capacity).expect("valid ward"))
            .expect("add ward");
        let patients = Arc::new(
            Registry::<Patient>::new()
                .with_mutation_lock(lock)
                .with_guard(Arc::new(CapacityCoordinator::new(wards.clone()))),
        );
        let query: Arc<dyn OccupancyQuery> = patients.clone();
        assert!(wards.install_guard(Arc::new(WardOccupancyGuard::new(&query))));
        (wards, patients)
    }

    fn resize(capacity: u32) -> WardPatch {
        WardPatch {
            capacity: Some(capacity),
            ..Default::default()
        }
    }

    #[test]
    fn test_shrinking_ward_below_occupancy_is_rejected() {
        let (wards, patients) = linked(3);
        patients.add(patient(10, Some(1))).expect("first patient fits");
        patients.add(patient(11, Some(1))).expect("second patient fits");

        let err = wards.update_patch(1, &resize(1)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::ConstraintRejected(CapacityRejection::CapacityBelowOccupancy {
                ward_id: 1,
                capacity: 1,
                occupancy: 2
            })
        );
        assert_eq!(wards.find_by_id(1).expect("ward exists").capacity, 3);
    }

    #[test]
    fn test_shrinking_ward_down_to_occupancy_is_allowed() {
        let (wards, patients) = linked(3);
        patients.add(patient(10, Some(1))).expect("first patient fits");
        patients.add(patient(11, Some(1))).expect("second patient fits");

        wards.update_patch(1, &resize(2)).expect("shrink to occupancy");
        wards.update_patch(1, &resize(5)).expect("grow");
        assert_eq!(wards.find_by_id(1).expect("ward exists").capacity, 5);
    }

    #[test]
    fn test_deleting_occupied_ward_is_rejected_until_discharge() {
        let (wards, patients) = linked(2);
        patients.add(patient(10, Some(1))).expect("patient fits");

        let err = wards.delete(1).unwrap_err();
        assert_eq!(
            err,
            RegistryError::ConstraintRejected(CapacityRejection::WardOccupied {
                ward_id: 1,
                occupancy: 1
            })
        );
        assert!(wards.contains(1));

        let discharge = PatientPatch {
            ward_id: Some(None),
            ..Default::default()
        };
        patients.update_patch(10, &discharge).expect("discharge");
        wards.delete(1).expect("empty ward can be deleted");
        assert!(!wards.contains(1));
    }

    #[test]
    fn test_ward_guard_is_inert_once_patients_are_dropped() {
        let (wards, patients) = linked(2);
        patients.add(patient(10, Some(1))).expect("patient fits");
        drop(patients);

        wards.delete(1).expect("nothing left to check against");
    }

    #[test]
    fn test_guard_is_installed_once() {
        let (wards, patients) = linked(2);
        let query: Arc<dyn OccupancyQuery> = patients;
        assert!(!wards.install_guard(Arc::new(WardOccupancyGuard::new(&query))));
    }

    #[test]
    fn test_concurrent_shrink_and_admissions_never_overfill() {
        use std::thread;

        let (wards, patients) = linked(4);
        let shrinker = {
            let wards = Arc::clone(&wards);
            thread::spawn(move || {
                for capacity in (1..=4).rev() {
                    let _ = wards.update_patch(1, &resize(capacity));
                }
            })
        };
        let admissions: Vec<_> = (1..=12)
            .map(|id| {
                let patients = Arc::clone(&patients);
                thread::spawn(move || {
                    let _ = patients.add(patient(id, Some(1)));
                })
            })
            .collect();

        shrinker.join().expect("shrinker should not panic");
        for handle in admissions {
            handle.join().expect("thread should not panic");
        }

        let capacity = wards.find_by_id(1).expect("ward exists").capacity as usize;
        let occupied = patients.occupancy(1);
        assert!(occupied >= 1);
        assert!(occupied <= capacity, "{occupied} patients in a ward of {capacity}");
    }
}
