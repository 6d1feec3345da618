//! # HealthSphere Core
//!
//! Core record management for the HealthSphere hospital system.
//!
//! This crate contains the in-memory registries and their persistence:
//! - Patients, employees, wards and treatments as validated record types
//! - A generic [`Registry`] enforcing unique ids, patch updates and ordered listings
//! - The [`CapacityCoordinator`] and [`WardOccupancyGuard`] keeping ward occupancy within capacity
//! - Whole-collection JSON/YAML snapshots under `HEALTHSPHERE_DATA_DIR`
//!
//! **No transport concerns**: command-line parsing and output formatting belong in `hs-cli`.

pub mod capacity;
pub mod config;
pub mod constants;
pub mod error;
pub mod hospital;
pub mod ordering;
pub mod records;
pub mod registry;
pub mod snapshot;
pub mod validation;

pub use capacity::{CapacityCoordinator, OccupancyQuery, WardDirectory, WardOccupancyGuard};
pub use config::CoreConfig;
pub use error::{
    CapacityRejection, ConfigError, ConfigResult, RegistryError, RegistryResult, SnapshotError,
    SnapshotResult, ValidationError,
};
pub use hospital::{Hospital, PersonSummary, Resolved, TreatmentView, WardCensus};
pub use ordering::{EmployeeOrder, PatientOrder, TreatmentOrder, WardOrder};
pub use records::{
    Employee, EmployeePatch, Patient, PatientPatch, Person, PersonPatch, Record, RecordId,
    RecordKind, Treatment, TreatmentPatch, Ward, WardPatch,
};
pub use registry::{AssignmentGuard, MutationLock, Registry};
pub use snapshot::{SnapshotFormat, SnapshotStatus, SnapshotStore};
