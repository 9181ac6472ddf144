use chrono::NaiveDate;
use serde::Serialize;

use super::domain::DriverProfile;

/// How much of a driver profile has been filled in, for the dashboard progress bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileCompletion {
    pub percent: u8,
    pub completed: usize,
    pub total: usize,
    pub missing: Vec<&'static str>,
}

type FieldCheck = (&'static str, fn(&DriverProfile) -> bool);

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

const TRACKED_FIELDS: &[FieldCheck] = &[
    ("full_name", |d| !d.full_name.trim().is_empty()),
    ("phone", |d| !d.phone.trim().is_empty()),
    ("email", |d| filled(&d.email)),
    ("date_of_birth", |d| d.date_of_birth.is_some()),
    ("address", |d| filled(&d.address)),
    ("city", |d| filled(&d.city)),
    ("license_number", |d| filled(&d.license_number)),
    ("license_type", |d| d.license_type.is_some()),
    ("license_expiry", |d| d.license_expiry.is_some()),
    ("identity_number", |d| filled(&d.identity_number)),
    ("experience_years", |d| d.experience_years.is_some()),
    ("vehicle_types", |d| !d.vehicle_types.is_empty()),
    ("preferred_locations", |d| !d.preferred_locations.is_empty()),
    ("photo_url", |d| filled(&d.photo_url)),
];

impl ProfileCompletion {
    pub fn for_driver(driver: &DriverProfile) -> Self {
        let missing: Vec<&'static str> = TRACKED_FIELDS
            .iter()
            .filter(|(_, check)| !check(driver))
            .map(|(name, _)| *name)
            .collect();
        let total = TRACKED_FIELDS.len();
        let completed = total - missing.len();
        let percent = (completed * 100 / total) as u8;

        Self {
            percent,
            completed,
            total,
            missing,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// A licence counts as valid on `date` only when an expiry is on file and has not passed.
pub fn license_is_valid_on(driver: &DriverProfile, date: NaiveDate) -> bool {
    driver.license_expiry.is_some_and(|expiry| expiry >= date)
}
