//! Fields shared by every person-like record.
//!
//! `Person` is never stored on its own; [`Patient`](super::Patient) and
//! [`Employee`](super::Employee) embed it and flatten it into their
//! serialised form.

use crate::constants::MAX_NAME_LEN;
use crate::error::ValidationError;
use crate::records::{RecordId, RecordKind};
use crate::validation::{
    check_text_len, parse_email, required_text, validate_birthdate, validate_id,
};
use chrono::NaiveDate;
use hs_types::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: RecordId,
    /// Family name, at most 50 characters.
    pub name: NonEmptyText,
    pub firstname: NonEmptyText,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<EmailAddress>,
    #[serde(default)]
    pub address: Option<String>,
    pub birthdate: NaiveDate,
}

impl Person {
    /// Creates a person with the required fields.
    ///
    /// Text rules are checked here. Id and birthdate bounds are checked by
    /// [`Person::validate`], which every registry write runs.
    pub fn new(
        id: RecordId,
        name: impl AsRef<str>,
        firstname: impl AsRef<str>,
        birthdate: NaiveDate,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            name: required_text("name", name, Some(MAX_NAME_LEN))?,
            firstname: required_text("firstname", firstname, None)?,
            phone: None,
            email: None,
            address: None,
            birthdate,
        })
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_email(mut self, email: impl AsRef<str>) -> Result<Self, ValidationError> {
        self.email = Some(parse_email(email)?);
        Ok(self)
    }

    pub(crate) fn validate(&self, kind: RecordKind, today: NaiveDate) -> Result<(), ValidationError> {
        validate_id(kind, self.id)?;
        check_text_len("name", &self.name, MAX_NAME_LEN)?;
        validate_birthdate(self.birthdate, today)
    }

    /// Age in completed years on `today`. Never stored.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        today.years_since(self.birthdate).unwrap_or(0)
    }

    /// "Firstname Name", as shown in listings and treatment details.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.name)
    }

    pub(crate) fn apply_patch(&mut self, patch: &PersonPatch) -> Result<(), ValidationError> {
        if let Some(name) = &patch.name {
            self.name = required_text("name", name, Some(MAX_NAME_LEN))?;
        }
        if let Some(firstname) = &patch.firstname {
            self.firstname = required_text("firstname", firstname, None)?;
        }
        if let Some(phone) = &patch.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(email) = &patch.email {
            self.email = Some(parse_email(email)?);
        }
        if let Some(address) = &patch.address {
            self.address = Some(address.clone());
        }
        if let Some(birthdate) = patch.birthdate {
            self.birthdate = birthdate;
        }
        Ok(())
    }
}

/// Partial update of the shared person fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersonPatch {
    pub name: Option<String>,
    pub firstname: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

impl PersonPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
