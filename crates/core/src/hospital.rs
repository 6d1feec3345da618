//! Process-wide set of registries.
//!
//! [`Hospital`] owns exactly one registry per record kind and wires the
//! capacity guards between the ward and patient registries. It is
//! built once at startup, either from a [`CoreConfig`] (snapshot-backed) or
//! in memory, and shared with callers by reference.
//!
//! Read-side views that join kinds (ward census, treatment resolution) live
//! here too. They tolerate dangling ids: a treatment whose patient was
//! deleted still resolves, with the patient reported as unknown.

use crate::capacity::{occupancy, CapacityCoordinator, OccupancyQuery, WardOccupancyGuard};
use crate::config::CoreConfig;
use crate::constants::{
    EMPLOYEES_COLLECTION, PATIENTS_COLLECTION, TREATMENTS_COLLECTION, WARDS_COLLECTION,
};
use crate::error::{RegistryError, RegistryResult, SnapshotResult};
use crate::ordering::{ward_cmp, WardOrder};
use crate::records::{Employee, Patient, Person, Record, RecordId, RecordKind, Treatment, Ward};
use crate::registry::{MutationLock, Registry};
use crate::snapshot::{SnapshotStatus, SnapshotStore};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Id and display name of a person, as shown in joined views.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonSummary {
    pub id: RecordId,
    pub display_name: String,
}

impl From<&Person> for PersonSummary {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id,
            display_name: person.display_name(),
        }
    }
}

impl fmt::Display for PersonSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// Outcome of following a loose id reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved<T> {
    Found(T),
    /// The id does not (or no longer does) name a stored record.
    NotFound(RecordId),
}

impl<T> Resolved<T> {
    pub fn found(&self) -> Option<&T> {
        match self {
            Resolved::Found(value) => Some(value),
            Resolved::NotFound(_) => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Resolved<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Found(value) => fmt::Display::fmt(value, f),
            Resolved::NotFound(id) => write!(f, "unknown (id {id})"),
        }
    }
}

/// A treatment with its patient and doctor looked up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreatmentView {
    pub treatment: Treatment,
    pub patient: Resolved<PersonSummary>,
    pub doctor: Resolved<PersonSummary>,
}

/// Occupancy of one ward at the time it was taken.
#[derive(Clone, Debug, PartialEq)]
pub struct WardCensus {
    pub ward: Ward,
    pub occupancy: usize,
    /// Assigned patients in canonical patient order.
    pub patients: Vec<PersonSummary>,
}

impl WardCensus {
    /// Free places; zero when the ward is at or over capacity.
    pub fn available(&self) -> usize {
        (self.ward.capacity as usize).saturating_sub(self.occupancy)
    }

    pub fn has_capacity(&self) -> bool {
        self.occupancy < self.ward.capacity as usize
    }

    /// Occupancy as a percentage of capacity.
    pub fn occupancy_rate(&self) -> f64 {
        if self.ward.capacity == 0 {
            return 0.0;
        }
        self.occupancy as f64 * 100.0 / f64::from(self.ward.capacity)
    }

    pub fn status_line(&self) -> String {
        format!(
            "Occupancy: {}/{} | Free: {} | Status: {}",
            self.occupancy,
            self.ward.capacity,
            self.available(),
            if self.has_capacity() { "available" } else { "full" }
        )
    }
}

/// Puts the ward and patient registries under one mutation lock and installs
/// the capacity guard on each side.
fn link(
    wards: Registry<Ward>,
    patients: Registry<Patient>,
) -> (Arc<Registry<Ward>>, Arc<Registry<Patient>>) {
    let lock = MutationLock::default();
    let wards = Arc::new(wards.with_mutation_lock(lock.clone()));
    let patients = Arc::new(
        patients
            .with_mutation_lock(lock)
            .with_guard(Arc::new(CapacityCoordinator::new(wards.clone()))),
    );
    let query: Arc<dyn OccupancyQuery> = patients.clone();
    wards.install_guard(Arc::new(WardOccupancyGuard::new(&query)));
    (wards, patients)
}

pub struct Hospital {
    wards: Arc<Registry<Ward>>,
    patients: Arc<Registry<Patient>>,
    employees: Registry<Employee>,
    treatments: Registry<Treatment>,
    store: Option<Arc<SnapshotStore>>,
}

impl Hospital {
    /// Opens every registry against the snapshot directory in `cfg`,
    /// loading existing snapshots.
    ///
    /// Snapshots that cannot be read are logged and the affected registry
    /// starts empty.
    ///
    /// # Errors
    ///
    /// Returns a `SnapshotError` only if a collection name is rejected.
    pub fn open(cfg: Arc<CoreConfig>) -> SnapshotResult<Self> {
        let store = Arc::new(SnapshotStore::new(cfg.data_dir(), cfg.snapshot_format()));
        let autosave = cfg.autosave();

        let (wards, patients) = link(
            Registry::<Ward>::bound(Arc::clone(&store), WARDS_COLLECTION, autosave)?,
            Registry::<Patient>::bound(Arc::clone(&store), PATIENTS_COLLECTION, autosave)?,
        );
        let employees =
            Registry::<Employee>::bound(Arc::clone(&store), EMPLOYEES_COLLECTION, autosave)?;
        let treatments =
            Registry::<Treatment>::bound(Arc::clone(&store), TREATMENTS_COLLECTION, autosave)?;

        tracing::info!(
            data_dir = %cfg.data_dir().display(),
            format = %cfg.snapshot_format(),
            autosave,
            wards = wards.len(),
            patients = patients.len(),
            employees = employees.len(),
            treatments = treatments.len(),
            "hospital opened"
        );

        Ok(Self {
            wards,
            patients,
            employees,
            treatments,
            store: Some(store),
        })
    }

    /// Builds unbound registries with no persistence.
    pub fn in_memory() -> Self {
        let (wards, patients) = link(Registry::new(), Registry::new());
        Self {
            wards,
            patients,
            employees: Registry::new(),
            treatments: Registry::new(),
            store: None,
        }
    }

    pub fn wards(&self) -> &Registry<Ward> {
        &self.wards
    }

    pub fn patients(&self) -> &Registry<Patient> {
        &self.patients
    }

    pub fn employees(&self) -> &Registry<Employee> {
        &self.employees
    }

    pub fn treatments(&self) -> &Registry<Treatment> {
        &self.treatments
    }

    pub fn snapshot_store(&self) -> Option<&SnapshotStore> {
        self.store.as_deref()
    }

    /// Number of patients currently assigned to `ward_id`.
    pub fn occupancy(&self, ward_id: RecordId) -> usize {
        self.patients.count(|p| p.ward_id == Some(ward_id))
    }

    /// Census of a single ward.
    pub fn ward_census(&self, ward_id: RecordId) -> RegistryResult<WardCensus> {
        let ward = self.wards.find_by_id(ward_id)?;
        let assigned = self.patients.filter(|p| p.ward_id == Some(ward_id));
        Ok(Self::census_of(ward, &assigned))
    }

    /// Census of every ward in canonical ward order.
    pub fn census(&self) -> Vec<WardCensus> {
        self.census_sorted(|a, b| ward_cmp(&a.ward, &b.ward))
    }

    /// Census ordered by occupancy rate, fullest first, then by name.
    pub fn census_by_occupancy_rate(&self) -> Vec<WardCensus> {
        self.census_sorted(|a, b| {
            b.occupancy_rate()
                .total_cmp(&a.occupancy_rate())
                .then_with(|| WardOrder::Name.compare(&a.ward, &b.ward))
        })
    }

    /// Wards with at least one free place, in canonical ward order.
    pub fn available_wards(&self) -> Vec<Ward> {
        self.census()
            .into_iter()
            .filter(WardCensus::has_capacity)
            .map(|c| c.ward)
            .collect()
    }

    /// Looks up a treatment and resolves its patient and doctor.
    ///
    /// Missing persons are not an error; they come back as
    /// [`Resolved::NotFound`].
    pub fn resolve_treatment(&self, treatment_id: RecordId) -> RegistryResult<TreatmentView> {
        let treatment = self.treatments.find_by_id(treatment_id)?;
        let patient = match self.patients.get(treatment.patient_id) {
            Some(p) => Resolved::Found(PersonSummary::from(&p.person)),
            None => Resolved::NotFound(treatment.patient_id),
        };
        let doctor = match self.employees.get(treatment.doctor_id) {
            Some(e) => Resolved::Found(PersonSummary::from(&e.person)),
            None => Resolved::NotFound(treatment.doctor_id),
        };
        Ok(TreatmentView {
            treatment,
            patient,
            doctor,
        })
    }

    /// Treatments given to `patient_id`, most recent first.
    pub fn treatments_for_patient(&self, patient_id: RecordId) -> RegistryResult<Vec<Treatment>> {
        if !self.patients.contains(patient_id) {
            return Err(RegistryError::NotFound {
                kind: Patient::KIND,
                id: patient_id,
            });
        }
        let mut treatments = self.treatments.filter(|t| t.patient_id == patient_id);
        treatments.sort_by(|a, b| a.canonical_cmp(b, crate::registry::today()));
        Ok(treatments)
    }

    /// Writes every bound registry, ignoring the auto-persistence setting.
    pub fn save_all(&self) -> Vec<(RecordKind, SnapshotStatus)> {
        vec![
            (Ward::KIND, self.wards.save()),
            (Patient::KIND, self.patients.save()),
            (Employee::KIND, self.employees.save()),
            (Treatment::KIND, self.treatments.save()),
        ]
    }

    fn census_sorted<F>(&self, mut compare: F) -> Vec<WardCensus>
    where
        F: FnMut(&WardCensus, &WardCensus) -> Ordering,
    {
        let patients = self.patients.get_all();
        let mut census: Vec<_> = self
            .wards
            .get_all()
            .into_iter()
            .map(|ward| {
                let assigned: Vec<_> = patients
                    .iter()
                    .filter(|p| p.ward_id == Some(ward.id))
                    .cloned()
                    .collect();
                Self::census_of(ward, &assigned)
            })
            .collect();
        census.sort_by(|a, b| compare(a, b));
        census
    }

    fn census_of(ward: Ward, assigned: &[Patient]) -> WardCensus {
        let today = crate::registry::today();
        let mut assigned = assigned.to_vec();
        assigned.sort_by(|a, b| a.canonical_cmp(b, today));
        WardCensus {
            occupancy: occupancy(ward.id, &assigned),
            patients: assigned.iter().map(|p| PersonSummary::from(&p.person)).collect(),
            ward,
        }
    }
}

impl fmt::Debug for Hospital {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hospital")
            .field("wards", &self.wards)
            .field("patients", &self.patients)
            .field("employees", &self.employees)
            .field("treatments", &self.treatments)
            .finish()
    }
}
