use crate::error::ValidationError;
use crate::ordering;
use crate::records::{Record, RecordId, RecordKind};
use crate::validation::{required_text, validate_capacity, validate_id};
use chrono::NaiveDate;
use hs_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A ward with a fixed number of patient places.
///
/// Occupancy is not stored here. It is derived from the patient registry
/// whenever it is needed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ward {
    pub id: RecordId,
    pub name: NonEmptyText,
    #[serde(default)]
    pub description: Option<String>,
    pub capacity: u32,
}

impl Ward {
    pub fn new(id: RecordId, name: impl AsRef<str>, capacity: u32) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            name: required_text("name", name, None)?,
            description: None,
            capacity,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WardPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub capacity: Option<u32>,
}

impl Record for Ward {
    type Patch = WardPatch;

    const KIND: RecordKind = RecordKind::Ward;

    fn id(&self) -> RecordId {
        self.id
    }

    fn validate(&self, _today: NaiveDate) -> Result<(), ValidationError> {
        validate_id(Self::KIND, self.id)?;
        validate_capacity(self.capacity)
    }

    fn apply_patch(&mut self, patch: &WardPatch) -> Result<(), ValidationError> {
        if let Some(name) = &patch.name {
            self.name = required_text("name", name, None)?;
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(capacity) = patch.capacity {
            self.capacity = capacity;
        }
        Ok(())
    }

    fn canonical_cmp(&self, other: &Self, _today: NaiveDate) -> Ordering {
        ordering::ward_cmp(self, other)
    }
}
