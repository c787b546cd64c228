use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Customer, CustomerId, FilmId, RentalId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("invalid email address '{value}'")]
    InvalidEmail { value: String },

    #[error("failed to read form file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("invalid form file '{path}': {message}")]
    Parse { path: String, message: String },
}

/// Customer fields accepted by the create and update endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CustomerForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Field overrides for an edit; `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomerPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn email_pattern() -> &'static Regex {
    // Shape check only; the backend owns real validation.
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

impl CustomerForm {
    pub fn validate(&self) -> Result<(), FormError> {
        for (field, value) in [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                return Err(FormError::MissingField { field });
            }
        }
        if !email_pattern().is_match(self.email.trim()) {
            return Err(FormError::InvalidEmail {
                value: self.email.clone(),
            });
        }
        Ok(())
    }

    /// Trims every field and drops optional ones left blank.
    pub fn normalized(self) -> Self {
        let opt = |v: Option<String>| v.and_then(|s| non_empty(&s));
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            address: opt(self.address),
            city: opt(self.city),
            district: opt(self.district),
            country: opt(self.country),
            postal_code: opt(self.postal_code),
            phone: opt(self.phone),
        }
    }

    pub fn apply(mut self, patch: CustomerPatch) -> Self {
        if let Some(v) = patch.first_name {
            self.first_name = v;
        }
        if let Some(v) = patch.last_name {
            self.last_name = v;
        }
        if let Some(v) = patch.email {
            self.email = v;
        }
        if patch.address.is_some() {
            self.address = patch.address;
        }
        if patch.city.is_some() {
            self.city = patch.city;
        }
        if patch.district.is_some() {
            self.district = patch.district;
        }
        if patch.country.is_some() {
            self.country = patch.country;
        }
        if patch.postal_code.is_some() {
            self.postal_code = patch.postal_code;
        }
        if patch.phone.is_some() {
            self.phone = patch.phone;
        }
        self
    }

    /// Sends `""` for optional fields the patch explicitly blanked, so the backend clears them.
    pub fn keep_cleared(mut self, patch: &CustomerPatch) -> Self {
        let blank = |v: &Option<String>| matches!(v.as_deref(), Some(s) if s.trim().is_empty());
        for (requested, field) in [
            (&patch.address, &mut self.address),
            (&patch.city, &mut self.city),
            (&patch.district, &mut self.district),
            (&patch.country, &mut self.country),
            (&patch.postal_code, &mut self.postal_code),
            (&patch.phone, &mut self.phone),
        ] {
            if blank(requested) {
                *field = Some(String::new());
            }
        }
        self
    }

    /// Loads a form from a JSON or YAML file, rejecting unknown keys.
    pub fn from_file(path: &Path) -> Result<Self, FormError> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|e| FormError::Read {
            path: display.clone(),
            message: e.to_string(),
        })?;
        Self::parse(&contents, path.extension().and_then(|e| e.to_str()))
            .map_err(|message| FormError::Parse {
                path: display,
                message,
            })
    }

    fn parse(contents: &str, extension: Option<&str>) -> Result<Self, String> {
        match extension.map(|e| e.to_ascii_lowercase()).as_deref() {
            Some("json") => serde_json::from_str(contents).map_err(|e| e.to_string()),
            _ => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
        }
    }
}

impl From<&Customer> for CustomerForm {
    fn from(c: &Customer) -> Self {
        Self {
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            email: c.email.clone(),
            address: non_empty(&c.address),
            city: non_empty(&c.city),
            district: non_empty(&c.district),
            country: non_empty(&c.country),
            postal_code: non_empty(&c.postal_code),
            phone: non_empty(&c.phone),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentRequest {
    pub film_id: FilmId,
    pub customer_id: CustomerId,
    pub staff_id: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub rental_id: RentalId,
}
