use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

pub type CustomerId = i64;
pub type RentalId = i64;
pub type FilmId = i64;
pub type ActorId = i64;

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rental {
    pub rental_id: RentalId,
    #[serde(default)]
    pub rental_date: String,
    #[serde(default)]
    pub return_date: Option<String>,
    #[serde(default)]
    pub film_title: String,
    #[serde(default)]
    pub staff_id: i64,
}

impl Rental {
    pub fn is_outstanding(&self) -> bool {
        self.return_date.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub district: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub postal_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub create_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_update: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rentals: Option<Vec<Rental>>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn rentals(&self) -> &[Rental] {
        self.rentals.as_deref().unwrap_or(&[])
    }

    pub fn outstanding_rentals(&self) -> usize {
        self.rentals().iter().filter(|r| r.is_outstanding()).count()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmCategory {
    #[serde(default)]
    pub category_id: i64,
    #[serde(default)]
    pub film_id: FilmId,
    #[serde(default)]
    pub category_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmActor {
    #[serde(default)]
    pub film_id: FilmId,
    pub actor_id: ActorId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl FilmActor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    pub film_id: FilmId,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub film_categories: Vec<FilmCategory>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub release_year: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub film_actors: Vec<FilmActor>,
    #[serde(default)]
    pub rental_duration: i64,
    #[serde(default)]
    pub rental_rate: f64,
    #[serde(default)]
    pub length: i64,
    #[serde(default)]
    pub replacement_cost: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rating: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub special_features: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_update: String,
    #[serde(default)]
    pub language_id: i64,
    #[serde(default)]
    pub original_language_id: Option<i64>,
}

impl Film {
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.film_categories.iter().map(|c| c.category_name.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub actor_id: ActorId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bio: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub top_rented_films: Vec<Film>,
}

impl Actor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAvailability {
    pub rented_count: i64,
    pub available_count: i64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => s,
        Some(Raw::Int(n)) => n.to_string(),
        Some(Raw::Float(n)) => n.to_string(),
        None => String::new(),
    })
}

/// Parses the timestamp shapes the backend is known to emit.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Renders a timestamp as a calendar date, falling back to the raw text.
pub fn display_date(value: &str) -> String {
    match parse_timestamp(value) {
        Some(dt) => dt.date().format("%Y-%m-%d").to_string(),
        None => value.trim().to_string(),
    }
}

fn compare_for_display(a: &Rental, b: &Rental) -> Ordering {
    let returned = a.return_date.is_some().cmp(&b.return_date.is_some());
    let date = match (parse_timestamp(&a.rental_date), parse_timestamp(&b.rental_date)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    returned
        .then(date)
        .then(a.rental_id.cmp(&b.rental_id))
}

/// Orders rentals for display: outstanding first, then by rental date ascending.
pub fn sort_rentals_for_display(rentals: &[Rental]) -> Vec<Rental> {
    let mut out = rentals.to_vec();
    out.sort_by(compare_for_display);
    out
}
