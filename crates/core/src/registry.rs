//! Generic keyed registry for one record kind.
//!
//! A [`Registry`] owns the in-memory set of one kind of [`Record`] and is the
//! only way to mutate it. Every mutation runs under the registry's write lock:
//! validation, the optional [`AssignmentGuard`] check, the insert itself and
//! the snapshot write that follows all happen in one critical section, so no
//! other writer can slip in between a check and the act it guards. Reads take
//! the shared lock and hand back owned copies.
//!
//! Registries whose guards look at each other (patients and wards) share a
//! [`MutationLock`]. It is taken before the registry's own write lock, so a
//! write on one of them never interleaves with a write on the other.
//!
//! A registry is either unbound (purely in memory, saved and loaded only on
//! request) or bound to a collection in a [`SnapshotStore`]. A bound registry
//! with auto-persistence enabled rewrites its snapshot after every successful
//! mutation. Snapshot failures never undo a mutation; they are reported as
//! [`SnapshotStatus::Degraded`].

use crate::error::{
    CapacityRejection, RegistryError, RegistryResult, SnapshotResult, ValidationError,
};
use crate::records::{Record, RecordId};
use crate::snapshot::{SnapshotStatus, SnapshotStore};
use crate::validation::validate_collection_name;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{
    Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::ops::{Deref, DerefMut};

/// Cross-record check run inside a registry's critical section before a
/// record is inserted, replaced or removed.
///
/// `previous` is the stored version of the record for updates and `None` for
/// inserts. `current` is the full set as it stands before the mutation.
pub trait AssignmentGuard<R: Record>: Send + Sync {
    fn admit(
        &self,
        candidate: &R,
        previous: Option<&R>,
        current: &BTreeMap<RecordId, R>,
    ) -> Result<(), CapacityRejection>;

    /// Checks whether `record` may be deleted.
    fn release(
        &self,
        _record: &R,
        _current: &BTreeMap<RecordId, R>,
    ) -> Result<(), CapacityRejection> {
        Ok(())
    }
}

/// Lock shared by registries whose guards consult each other.
pub type MutationLock = Arc<Mutex<()>>;

struct Binding {
    store: Arc<SnapshotStore>,
    collection: String,
    autosave: bool,
}

struct Inner<R> {
    records: BTreeMap<RecordId, R>,
    binding: Option<Binding>,
}

/// Write access to a registry's state. Fields drop in order, so the write
/// lock is released before the shared mutation lock.
struct Writer<'a, R> {
    inner: RwLockWriteGuard<'a, Inner<R>>,
    _serial: Option<MutexGuard<'a, ()>>,
}

impl<R> Deref for Writer<'_, R> {
    type Target = Inner<R>;

    fn deref(&self) -> &Inner<R> {
        &self.inner
    }
}

impl<R> DerefMut for Writer<'_, R> {
    fn deref_mut(&mut self) -> &mut Inner<R> {
        &mut self.inner
    }
}

pub struct Registry<R: Record> {
    inner: RwLock<Inner<R>>,
    guard: OnceLock<Arc<dyn AssignmentGuard<R>>>,
    mutation_lock: Option<MutationLock>,
}

impl<R: Record> Default for Registry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> fmt::Debug for Registry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("Registry")
            .field("kind", &R::KIND)
            .field("len", &inner.records.len())
            .field(
                "collection",
                &inner.binding.as_ref().map(|b| b.collection.as_str()),
            )
            .field("guarded", &self.guard.get().is_some())
            .finish()
    }
}

/// The date used to validate birthdates and compute ages.
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

impl<R: Record> Registry<R> {
    /// Creates an empty, unbound registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: BTreeMap::new(),
                binding: None,
            }),
            guard: OnceLock::new(),
            mutation_lock: None,
        }
    }

    /// Creates a registry bound to `collection` in `store` and loads any
    /// existing snapshot.
    ///
    /// A snapshot that cannot be read is logged and ignored; the registry
    /// then starts empty. See [`Registry::load`] for what happens to the file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SnapshotError::InvalidCollection`] if `collection`
    /// is not a safe file stem.
    pub fn bound(
        store: Arc<SnapshotStore>,
        collection: impl Into<String>,
        autosave: bool,
    ) -> SnapshotResult<Self> {
        let registry = Self::new();
        registry.bind(store, collection, autosave)?;
        if let Err(e) = registry.load() {
            tracing::warn!(kind = %R::KIND, error = %e, "starting with an empty registry");
        }
        Ok(registry)
    }

    /// Installs a guard consulted on every insert, update and delete.
    pub fn with_guard(self, guard: Arc<dyn AssignmentGuard<R>>) -> Self {
        self.install_guard(guard);
        self
    }

    /// Installs a guard on a registry that is already shared.
    ///
    /// Returns `false` if a guard was installed before; the first one stays.
    pub fn install_guard(&self, guard: Arc<dyn AssignmentGuard<R>>) -> bool {
        self.guard.set(guard).is_ok()
    }

    /// Serialises this registry's mutations with every other registry
    /// holding the same lock.
    pub fn with_mutation_lock(mut self, lock: MutationLock) -> Self {
        self.mutation_lock = Some(lock);
        self
    }

    /// Binds the registry to a snapshot collection, replacing any previous
    /// binding. Does not load or save.
    pub fn bind(
        &self,
        store: Arc<SnapshotStore>,
        collection: impl Into<String>,
        autosave: bool,
    ) -> SnapshotResult<()> {
        let collection = collection.into();
        validate_collection_name(&collection)?;
        self.write().binding = Some(Binding {
            store,
            collection,
            autosave,
        });
        Ok(())
    }

    pub fn unbind(&self) {
        self.write().binding = None;
    }

    /// Turns auto-persistence on or off for a bound registry.
    ///
    /// Returns `false` (and changes nothing) when the registry is unbound.
    pub fn set_autosave(&self, enabled: bool) -> bool {
        match self.write().binding.as_mut() {
            Some(binding) => {
                binding.autosave = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_autosave_enabled(&self) -> bool {
        self.read().binding.as_ref().is_some_and(|b| b.autosave)
    }

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the record breaks a rule of its kind
    /// - `DuplicateId` if a record with the same id is already stored
    /// - `ConstraintRejected` if the installed guard refuses it
    ///
    /// The registry is unchanged whenever an error is returned.
    pub fn add(&self, record: R) -> RegistryResult<SnapshotStatus> {
        record.validate(today())?;

        let mut inner = self.write();
        let id = record.id();
        if inner.records.contains_key(&id) {
            return Err(RegistryError::DuplicateId { kind: R::KIND, id });
        }
        self.admit(&record, None, &inner.records)?;

        inner.records.insert(id, record);
        tracing::debug!(kind = %R::KIND, id, "record added");
        Ok(Self::persist(&inner))
    }

    /// Builds a record from the next free id and inserts it, without another
    /// writer being able to claim that id in between.
    ///
    /// Returns the id that was assigned.
    pub fn add_with_next_id<F>(&self, build: F) -> RegistryResult<(RecordId, SnapshotStatus)>
    where
        F: FnOnce(RecordId) -> Result<R, ValidationError>,
    {
        let mut inner = self.write();
        let id = Self::next_id_in(&inner.records);
        let record = build(id)?;
        record.validate(today())?;
        // The builder is free to ignore the offered id.
        let id = record.id();
        if inner.records.contains_key(&id) {
            return Err(RegistryError::DuplicateId { kind: R::KIND, id });
        }
        self.admit(&record, None, &inner.records)?;

        inner.records.insert(id, record);
        tracing::debug!(kind = %R::KIND, id, "record added with generated id");
        Ok((id, Self::persist(&inner)))
    }

    /// Applies a partial update to the record with `id`.
    ///
    /// The patch is applied to a copy which is validated and checked by the
    /// guard before it replaces the stored record. An empty patch succeeds
    /// and leaves the record unchanged.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no record has this id
    /// - `ValidationFailed` if the patched record is invalid
    /// - `ConstraintRejected` if the guard refuses the patched record
    pub fn update_patch(&self, id: RecordId, patch: &R::Patch) -> RegistryResult<SnapshotStatus> {
        let mut inner = self.write();
        let existing = inner
            .records
            .get(&id)
            .ok_or(RegistryError::NotFound { kind: R::KIND, id })?;

        let mut candidate = existing.clone();
        candidate.apply_patch(patch)?;
        candidate.validate(today())?;
        self.admit(&candidate, Some(existing), &inner.records)?;

        inner.records.insert(id, candidate);
        tracing::debug!(kind = %R::KIND, id, ?patch, "record updated");
        Ok(Self::persist(&inner))
    }

    /// Removes the record with `id`.
    ///
    /// Records elsewhere that reference it are left as they are unless the
    /// installed guard refuses the removal.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no record has this id
    /// - `ConstraintRejected` if the guard refuses the removal
    pub fn delete(&self, id: RecordId) -> RegistryResult<SnapshotStatus> {
        let mut inner = self.write();
        let existing = inner
            .records
            .get(&id)
            .ok_or(RegistryError::NotFound { kind: R::KIND, id })?;
        if let Some(guard) = self.guard.get() {
            guard
                .release(existing, &inner.records)
                .map_err(|rejection| Self::rejected(id, rejection))?;
        }

        inner.records.remove(&id);
        tracing::debug!(kind = %R::KIND, id, "record deleted");
        Ok(Self::persist(&inner))
    }

    pub fn find_by_id(&self, id: RecordId) -> RegistryResult<R> {
        self.get(id)
            .ok_or(RegistryError::NotFound { kind: R::KIND, id })
    }

    pub fn get(&self, id: RecordId) -> Option<R> {
        self.read().records.get(&id).cloned()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.read().records.contains_key(&id)
    }

    /// Copy of every record, in id order.
    pub fn get_all(&self) -> Vec<R> {
        self.read().records.values().cloned().collect()
    }

    /// Copies of the records matching `predicate`, in id order.
    pub fn filter<P>(&self, mut predicate: P) -> Vec<R>
    where
        P: FnMut(&R) -> bool,
    {
        self.read()
            .records
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    /// Counts matching records without copying them.
    pub fn count<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&R) -> bool,
    {
        self.read().records.values().filter(|r| predicate(r)).count()
    }

    /// Every record in the kind's canonical order.
    pub fn sorted(&self) -> Vec<R> {
        let today = today();
        self.sorted_by(|a, b| a.canonical_cmp(b, today))
    }

    pub fn sorted_by<F>(&self, compare: F) -> Vec<R>
    where
        F: FnMut(&R, &R) -> Ordering,
    {
        let mut records = self.get_all();
        records.sort_by(compare);
        records
    }

    /// Largest stored id plus one, or `1` when empty.
    ///
    /// Advisory only: another writer may take the id before it is used. Use
    /// [`Registry::add_with_next_id`] to allocate and insert atomically.
    pub fn next_id(&self) -> RecordId {
        Self::next_id_in(&self.read().records)
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    /// Writes the current set to the bound collection regardless of the
    /// auto-persistence setting.
    pub fn save(&self) -> SnapshotStatus {
        // Exclusive so that writes to one collection never interleave.
        let inner = self.write();
        match &inner.binding {
            Some(binding) => Self::write_snapshot(binding, &inner.records),
            None => SnapshotStatus::NotBound,
        }
    }

    /// Replaces the in-memory set with the bound collection's snapshot.
    ///
    /// Returns the number of records loaded, or `None` if the registry is
    /// unbound or no snapshot exists yet (the in-memory set is then kept).
    /// Snapshot entries that fail validation or repeat an earlier id are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns the snapshot error if the file exists but cannot be read. The
    /// in-memory set is left untouched. A file that was read but is not a
    /// snapshot of this collection is renamed to `<collection>.<ext>.corrupt`
    /// first, so the next save cannot overwrite it.
    pub fn load(&self) -> SnapshotResult<Option<usize>> {
        let mut inner = self.write();
        let Some(binding) = &inner.binding else {
            return Ok(None);
        };
        let collection = binding.collection.clone();

        let loaded = match binding.store.load::<R>(&collection) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(kind = %R::KIND, collection = %collection, error = %e, "snapshot load failed; keeping in-memory state");
                if e.is_unreadable_content() {
                    // Keep the damaged file out of the way of the next save.
                    match binding.store.set_aside(&collection) {
                        Ok(Some(moved)) => {
                            tracing::warn!(kind = %R::KIND, path = %moved.display(), "unreadable snapshot moved aside")
                        }
                        Ok(None) => {}
                        Err(err) => {
                            tracing::warn!(kind = %R::KIND, error = %err, "could not move unreadable snapshot aside")
                        }
                    }
                }
                return Err(e);
            }
        };

        let today = today();
        let mut records = BTreeMap::new();
        for record in loaded {
            let id = record.id();
            if let Err(e) = record.validate(today) {
                tracing::warn!(kind = %R::KIND, collection = %collection, id, error = %e, "skipping invalid snapshot record");
                continue;
            }
            if records.contains_key(&id) {
                tracing::warn!(kind = %R::KIND, collection = %collection, id, "skipping duplicate snapshot record");
                continue;
            }
            records.insert(id, record);
        }

        let count = records.len();
        inner.records = records;
        tracing::info!(kind = %R::KIND, collection = %collection, count, "snapshot loaded");
        Ok(Some(count))
    }

    /// Runs `f` against the live set under the shared lock.
    ///
    /// Used by collaborators that need a consistent view across several
    /// lookups without copying the set.
    pub(crate) fn with_records<T>(&self, f: impl FnOnce(&BTreeMap<RecordId, R>) -> T) -> T {
        f(&self.read().records)
    }

    fn admit(
        &self,
        candidate: &R,
        previous: Option<&R>,
        current: &BTreeMap<RecordId, R>,
    ) -> RegistryResult<()> {
        let Some(guard) = self.guard.get() else {
            return Ok(());
        };
        guard
            .admit(candidate, previous, current)
            .map_err(|rejection| Self::rejected(candidate.id(), rejection))
    }

    fn rejected(id: RecordId, rejection: CapacityRejection) -> RegistryError {
        tracing::warn!(kind = %R::KIND, id, %rejection, "mutation rejected");
        RegistryError::ConstraintRejected(rejection)
    }

    fn next_id_in(records: &BTreeMap<RecordId, R>) -> RecordId {
        records
            .last_key_value()
            .map_or(1, |(id, _)| id.saturating_add(1))
    }

    fn persist(inner: &Inner<R>) -> SnapshotStatus {
        match &inner.binding {
            None => SnapshotStatus::NotBound,
            Some(binding) if !binding.autosave => SnapshotStatus::Deferred,
            Some(binding) => Self::write_snapshot(binding, &inner.records),
        }
    }

    fn write_snapshot(binding: &Binding, records: &BTreeMap<RecordId, R>) -> SnapshotStatus {
        let records: Vec<&R> = records.values().collect();
        match binding.store.save(&binding.collection, &records) {
            Ok(()) => SnapshotStatus::Saved,
            Err(e) => {
                tracing::warn!(
                    kind = %R::KIND,
                    collection = %binding.collection,
                    error = %e,
                    "snapshot write failed; in-memory state is ahead of disk"
                );
                SnapshotStatus::Degraded(e)
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner<R>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> Writer<'_, R> {
        let serial = self
            .mutation_lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));
        Writer {
            inner: self.inner.write().unwrap_or_else(PoisonError::into_inner),
            _serial: serial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Treatment, TreatmentPatch, Ward, WardPatch};
    use crate::snapshot::SnapshotFormat;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    fn ward(id: RecordId, name: &str, capacity: u32) -> Ward {
        Ward::new(id, name, capacity).expect("valid ward")
    }

    fn store(temp_dir: &TempDir) -> Arc<SnapshotStore> {
        Arc::new(SnapshotStore::new(temp_dir.path(), SnapshotFormat::Json))
    }

    #[test]
    fn test_add_find_delete() {
        let registry = Registry::<Ward>::new();
        let w = ward(1, "Cardiology", 10);

        let status = registry.add(w.clone()).expect("add should succeed");
        assert!(matches!(status, SnapshotStatus::NotBound));
        assert_eq!(registry.find_by_id(1).expect("ward should exist"), w);

        registry.delete(1).expect("delete should succeed");
        assert_eq!(
            registry.find_by_id(1),
            Err(RegistryError::NotFound {
                kind: Ward::KIND,
                id: 1
            })
        );
        assert!(matches!(
            registry.delete(1),
            Err(RegistryError::NotFound { id: 1, .. })
        ));
    }

    #[test]
    fn test_add_rejects_duplicate_id_in_either_order() {
        let first = ward(3, "Oncology", 5);
        let second = ward(3, "Surgery", 8);

        for (a, b) in [(first.clone(), second.clone()), (second, first)] {
            let registry = Registry::<Ward>::new();
            assert!(registry.add(a.clone()).is_ok());
            assert_eq!(
                registry.add(b).unwrap_err(),
                RegistryError::DuplicateId {
                    kind: Ward::KIND,
                    id: 3
                }
            );
            assert_eq!(registry.get_all(), vec![a]);
        }
    }

    #[test]
    fn test_add_rejects_invalid_record_without_mutation() {
        let registry = Registry::<Ward>::new();
        let mut w = ward(1, "Cardiology", 10);
        w.capacity = 0;

        assert!(matches!(
            registry.add(w),
            Err(RegistryError::ValidationFailed(
                ValidationError::CapacityOutOfRange { actual: 0, .. }
            ))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_patch_is_a_noop() {
        let registry = Registry::<Ward>::new();
        let w = ward(1, "Cardiology", 10).with_description("Level 2");
        registry.add(w.clone()).expect("add should succeed");

        registry
            .update_patch(1, &WardPatch::default())
            .expect("empty patch should succeed");
        assert_eq!(registry.find_by_id(1).expect("ward should exist"), w);
    }

    #[test]
    fn test_failed_patch_leaves_record_unchanged() {
        let registry = Registry::<Ward>::new();
        let w = ward(1, "Cardiology", 10);
        registry.add(w.clone()).expect("add should succeed");

        let patch = WardPatch {
            name: Some("Intensive care".into()),
            capacity: Some(500),
            ..Default::default()
        };
        assert!(matches!(
            registry.update_patch(1, &patch),
            Err(RegistryError::ValidationFailed(_))
        ));
        assert_eq!(registry.find_by_id(1).expect("ward should exist"), w);

        assert!(matches!(
            registry.update_patch(2, &WardPatch::default()),
            Err(RegistryError::NotFound { id: 2, .. })
        ));
    }

    #[test]
    fn test_patch_overwrites_only_supplied_fields() {
        let registry = Registry::<Treatment>::new();
        registry
            .add(Treatment::new(5, date(2025, 1, 10), "Physio", 10, 20))
            .expect("add should succeed");

        let patch = TreatmentPatch {
            therapy: Some("Massage".into()),
            ..Default::default()
        };
        registry.update_patch(5, &patch).expect("patch should succeed");

        let updated = registry.find_by_id(5).expect("treatment should exist");
        assert_eq!(updated.therapy, "Massage");
        assert_eq!(updated.date, date(2025, 1, 10));
        assert_eq!(updated.patient_id, 10);
    }

    #[test]
    fn test_next_id_and_add_with_next_id() {
        let registry = Registry::<Ward>::new();
        assert_eq!(registry.next_id(), 1);

        registry.add(ward(7, "Oncology", 5)).expect("add should succeed");
        assert_eq!(registry.next_id(), 8);

        let (id, _) = registry
            .add_with_next_id(|id| Ward::new(id, "Surgery", 12))
            .expect("add should succeed");
        assert_eq!(id, 8);
        assert_eq!(registry.find_by_id(8).expect("ward should exist").name.as_str(), "Surgery");
    }

    #[test]
    fn test_concurrent_add_with_next_id_assigns_distinct_ids() {
        let registry = Arc::new(Registry::<Ward>::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry
                        .add_with_next_id(|id| Ward::new(id, "Ward", 10))
                        .expect("add should succeed")
                        .0
                })
            })
            .collect();

        let mut ids: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn test_filter_and_sorted() {
        let registry = Registry::<Ward>::new();
        registry.add(ward(1, "surgery", 10)).expect("add");
        registry.add(ward(2, "Cardiology", 30)).expect("add");
        registry.add(ward(3, "Oncology", 5)).expect("add");

        let large = registry.filter(|w| w.capacity >= 10);
        assert_eq!(large.iter().map(|w| w.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(registry.count(|w| w.capacity < 10), 1);

        let names: Vec<_> = registry
            .sorted()
            .into_iter()
            .map(|w| w.name.as_str().to_owned())
            .collect();
        assert_eq!(names, vec!["Cardiology", "Oncology", "surgery"]);
    }

    #[test]
    fn test_autosave_writes_after_each_mutation() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = store(&temp_dir);
        let registry = Registry::<Ward>::bound(Arc::clone(&store), "wards", true)
            .expect("bind should succeed");

        let status = registry.add(ward(1, "Cardiology", 10)).expect("add");
        assert!(matches!(status, SnapshotStatus::Saved));

        let reopened = Registry::<Ward>::bound(store, "wards", true).expect("bind should succeed");
        assert_eq!(reopened.get_all(), registry.get_all());
    }

    #[test]
    fn test_autosave_toggle_defers_writes() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = store(&temp_dir);
        let registry = Registry::<Ward>::new();
        assert!(!registry.set_autosave(true));

        registry
            .bind(Arc::clone(&store), "wards", false)
            .expect("bind should succeed");
        assert!(!registry.is_autosave_enabled());

        let status = registry.add(ward(1, "Cardiology", 10)).expect("add");
        assert!(matches!(status, SnapshotStatus::Deferred));
        assert!(!store.exists("wards").expect("valid name"));

        assert!(matches!(registry.save(), SnapshotStatus::Saved));
        assert!(store.exists("wards").expect("valid name"));

        assert!(registry.set_autosave(true));
        let status = registry.add(ward(2, "Oncology", 10)).expect("add");
        assert!(matches!(status, SnapshotStatus::Saved));
    }

    #[test]
    fn test_save_failure_is_degraded_not_rolled_back() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        // A regular file where the data directory should be.
        let blocked = temp_dir.path().join("blocked");
        fs::write(&blocked, "not a directory").expect("write fixture");
        let store = Arc::new(SnapshotStore::new(&blocked, SnapshotFormat::Json));

        let registry = Registry::<Ward>::new();
        registry.bind(store, "wards", true).expect("bind should succeed");

        let status = registry.add(ward(1, "Cardiology", 10)).expect("add should still succeed");
        assert!(status.is_degraded());
        assert!(registry.contains(1));
    }

    #[test]
    fn test_load_skips_invalid_and_duplicate_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(
            temp_dir.path().join("wards.json"),
            r#"{"collection":"wards","records":[
                {"id":1,"name":"Cardiology","capacity":10},
                {"id":2,"name":"Oncology","capacity":0},
                {"id":1,"name":"Duplicate","capacity":5},
                {"id":3,"name":"  ","capacity":5},
                {"id":4,"name":"Surgery","capacity":20}
            ]}"#,
        )
        .expect("write fixture");

        let registry = Registry::<Ward>::bound(store(&temp_dir), "wards", true)
            .expect("bind should succeed");
        let ids: Vec<_> = registry.get_all().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(
            registry.find_by_id(1).expect("ward should exist").name.as_str(),
            "Cardiology"
        );
    }

    #[test]
    fn test_load_failure_keeps_in_memory_state() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let registry = Registry::<Ward>::new();
        registry.add(ward(1, "Cardiology", 10)).expect("add");

        fs::write(temp_dir.path().join("wards.json"), "{ not json").expect("write fixture");
        registry
            .bind(store(&temp_dir), "wards", true)
            .expect("bind should succeed");

        assert!(registry.load().is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unreadable_snapshot_survives_next_autosave() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let damaged = "{ \"collection\": \"wards\", \"records\": [ {";
        fs::write(temp_dir.path().join("wards.json"), damaged).expect("write fixture");

        let registry =
            Registry::<Ward>::bound(store(&temp_dir), "wards", true).expect("bound should succeed");
        assert!(registry.is_empty());

        let status = registry.add(ward(1, "Cardiology", 10)).expect("add");
        assert!(matches!(status, SnapshotStatus::Saved));

        let kept = fs::read_to_string(temp_dir.path().join("wards.json.corrupt"))
            .expect("damaged snapshot should be kept aside");
        assert_eq!(kept, damaged);
        let reloaded = Registry::<Ward>::bound(store(&temp_dir), "wards", false).expect("bound");
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_snapshot_of_other_collection_is_set_aside() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let foreign = r#"{ "collection": "patients", "records": [] }"#;
        fs::write(temp_dir.path().join("wards.json"), foreign).expect("write fixture");

        let registry = Registry::<Ward>::new();
        registry
            .bind(store(&temp_dir), "wards", true)
            .expect("bind should succeed");
        assert!(registry.load().is_err());

        assert!(!temp_dir.path().join("wards.json").exists());
        let kept = fs::read_to_string(temp_dir.path().join("wards.json.corrupt"))
            .expect("foreign snapshot should be kept aside");
        assert_eq!(kept, foreign);
    }

    #[test]
    fn test_bind_rejects_unsafe_collection() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let registry = Registry::<Ward>::new();
        assert!(registry.bind(store(&temp_dir), "../wards", true).is_err());
    }

    struct RejectAll;

    impl AssignmentGuard<Ward> for RejectAll {
        fn admit(
            &self,
            candidate: &Ward,
            _previous: Option<&Ward>,
            _current: &BTreeMap<RecordId, Ward>,
        ) -> Result<(), CapacityRejection> {
            Err(CapacityRejection::WardNotFound {
                ward_id: candidate.id,
            })
        }
    }

    #[test]
    fn test_guard_rejection_leaves_registry_unchanged() {
        let registry = Registry::<Ward>::new().with_guard(Arc::new(RejectAll));
        let err = registry.add(ward(1, "Cardiology", 10)).unwrap_err();
        assert!(matches!(err, RegistryError::ConstraintRejected(_)));
        assert!(registry.is_empty());
    }

    struct KeepAll;

    impl AssignmentGuard<Ward> for KeepAll {
        fn admit(
            &self,
            _candidate: &Ward,
            _previous: Option<&Ward>,
            _current: &BTreeMap<RecordId, Ward>,
        ) -> Result<(), CapacityRejection> {
            Ok(())
        }

        fn release(
            &self,
            ward: &Ward,
            _current: &BTreeMap<RecordId, Ward>,
        ) -> Result<(), CapacityRejection> {
            Err(CapacityRejection::WardOccupied {
                ward_id: ward.id,
                occupancy: 1,
            })
        }
    }

    #[test]
    fn test_guard_can_refuse_delete() {
        let registry = Registry::<Ward>::new().with_guard(Arc::new(KeepAll));
        registry.add(ward(1, "Cardiology", 10)).expect("add");

        let err = registry.delete(1).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::ConstraintRejected(CapacityRejection::WardOccupied { ward_id: 1, .. })
        ));
        assert!(registry.contains(1));
        assert!(matches!(
            registry.delete(2),
            Err(RegistryError::NotFound { id: 2, .. })
        ));
    }

    #[test]
    fn test_registries_sharing_a_mutation_lock_both_make_progress() {
        let lock = MutationLock::default();
        let wards = Arc::new(Registry::<Ward>::new().with_mutation_lock(lock.clone()));
        let treatments = Arc::new(Registry::<Treatment>::new().with_mutation_lock(lock));

        let ward_writer = {
            let wards = Arc::clone(&wards);
            thread::spawn(move || {
                for id in 1..=20 {
                    wards.add(ward(id, "Ward", 5)).expect("add ward");
                }
            })
        };
        for _ in 0..20 {
            treatments
                .add_with_next_id(|id| Ok(Treatment::new(id, date(2024, 1, 1), "Checkup", 1, 1)))
                .expect("add treatment");
        }
        ward_writer.join().expect("thread should not panic");

        assert_eq!(wards.len(), 20);
        assert_eq!(treatments.len(), 20);
    }
}
