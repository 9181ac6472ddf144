//! Request validation applied before anything reaches storage.
//!
//! Every `validate_*` function consumes the inbound payload and hands back a normalized copy
//! (trimmed strings, canonical phone numbers, upper-cased registration plates) so the service
//! layer only ever persists cleaned values.

use super::domain::{
    DriverUpdate, FleetOwnerUpdate, JobUpdate, NewApplication, NewDriver, NewFleetOwner, NewJob,
    NewNotification, NewTransporter, NewTrip, Trip, TripCompletion, TransporterUpdate,
};

const MAX_EXPERIENCE_YEARS: u8 = 60;
const MAX_TEXT_LEN: usize = 2000;

/// Field-level validation failure surfaced to clients as a 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Canonicalizes an Indian mobile number to its ten significant digits.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let digits = if let Some(rest) = compact.strip_prefix("+91") {
        rest
    } else if compact.len() == 12 && compact.starts_with("91") {
        &compact[2..]
    } else if compact.len() == 11 && compact.starts_with('0') {
        &compact[1..]
    } else {
        compact.as_str()
    };

    if digits.len() != 10 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new(
            "phone",
            "must contain exactly ten digits",
        ));
    }
    if !matches!(digits.as_bytes()[0], b'6'..=b'9') {
        return Err(ValidationError::new(
            "phone",
            "mobile numbers start with 6, 7, 8, or 9",
        ));
    }

    Ok(digits.to_string())
}

pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
                && email.matches('@').count() == 1
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(ValidationError::new("email", "must be a valid e-mail address"))
    }
}

pub(crate) fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    if trimmed.len() > MAX_TEXT_LEN {
        return Err(ValidationError::new(
            field,
            format!("must be at most {MAX_TEXT_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Blank optional strings collapse to `None` the way an empty form input would.
fn optional(field: &'static str, value: Option<String>) -> Result<Option<String>, ValidationError> {
    match value {
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => required(field, &raw).map(Some),
        None => Ok(None),
    }
}

fn optional_email(value: Option<String>) -> Result<Option<String>, ValidationError> {
    match value {
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => validate_email(&raw).map(Some),
        None => Ok(None),
    }
}

fn string_list(field: &'static str, values: Vec<String>) -> Result<Vec<String>, ValidationError> {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = required(field, &value)?;
        if !cleaned.iter().any(|existing| existing.eq_ignore_ascii_case(&value)) {
            cleaned.push(value);
        }
    }
    Ok(cleaned)
}

pub fn normalize_license_number(raw: &str) -> Result<String, ValidationError> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !(6..=20).contains(&compact.len()) || !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            "license_number",
            "must be 6-20 letters or digits",
        ));
    }
    Ok(compact)
}

fn experience(value: Option<u8>) -> Result<Option<u8>, ValidationError> {
    match value {
        Some(years) if years > MAX_EXPERIENCE_YEARS => Err(ValidationError::new(
            "experience_years",
            format!("must be at most {MAX_EXPERIENCE_YEARS}"),
        )),
        other => Ok(other),
    }
}

pub fn validate_new_driver(mut driver: NewDriver) -> Result<NewDriver, ValidationError> {
    driver.full_name = required("full_name", &driver.full_name)?;
    driver.phone = normalize_phone(&driver.phone)?;
    driver.email = optional_email(driver.email)?;
    driver.address = optional("address", driver.address)?;
    driver.city = optional("city", driver.city)?;
    driver.license_number = driver
        .license_number
        .filter(|value| !value.trim().is_empty())
        .map(|value| normalize_license_number(&value))
        .transpose()?;
    driver.identity_number = optional("identity_number", driver.identity_number)?;
    driver.experience_years = experience(driver.experience_years)?;
    driver.preferred_locations = string_list("preferred_locations", driver.preferred_locations)?;
    driver.photo_url = optional("photo_url", driver.photo_url)?;
    let mut seen = Vec::with_capacity(driver.vehicle_types.len());
    driver.vehicle_types.retain(|vehicle| {
        if seen.contains(vehicle) {
            false
        } else {
            seen.push(*vehicle);
            true
        }
    });
    Ok(driver)
}

pub fn validate_driver_update(mut update: DriverUpdate) -> Result<DriverUpdate, ValidationError> {
    update.full_name = update
        .full_name
        .map(|value| required("full_name", &value))
        .transpose()?;
    update.email = optional_email(update.email)?;
    update.address = optional("address", update.address)?;
    update.city = optional("city", update.city)?;
    update.license_number = update
        .license_number
        .filter(|value| !value.trim().is_empty())
        .map(|value| normalize_license_number(&value))
        .transpose()?;
    update.identity_number = optional("identity_number", update.identity_number)?;
    update.experience_years = experience(update.experience_years)?;
    update.preferred_locations = update
        .preferred_locations
        .map(|values| string_list("preferred_locations", values))
        .transpose()?;
    update.photo_url = optional("photo_url", update.photo_url)?;
    Ok(update)
}

pub fn validate_new_fleet_owner(
    mut owner: NewFleetOwner,
) -> Result<NewFleetOwner, ValidationError> {
    owner.company_name = required("company_name", &owner.company_name)?;
    owner.contact_name = required("contact_name", &owner.contact_name)?;
    owner.phone = normalize_phone(&owner.phone)?;
    owner.email = optional_email(owner.email)?;
    owner.gst_number = owner
        .gst_number
        .filter(|value| !value.trim().is_empty())
        .map(|value| validate_gst_number(&value))
        .transpose()?;
    owner.city = optional("city", owner.city)?;
    Ok(owner)
}

pub fn validate_fleet_owner_update(
    mut update: FleetOwnerUpdate,
) -> Result<FleetOwnerUpdate, ValidationError> {
    update.company_name = update
        .company_name
        .map(|value| required("company_name", &value))
        .transpose()?;
    update.contact_name = update
        .contact_name
        .map(|value| required("contact_name", &value))
        .transpose()?;
    update.email = optional_email(update.email)?;
    update.gst_number = update
        .gst_number
        .filter(|value| !value.trim().is_empty())
        .map(|value| validate_gst_number(&value))
        .transpose()?;
    update.city = optional("city", update.city)?;
    Ok(update)
}

/// GSTIN is 15 alphanumerics; the checksum is left to the tax portal.
fn validate_gst_number(raw: &str) -> Result<String, ValidationError> {
    let gst = raw.trim().to_ascii_uppercase();
    if gst.len() == 15 && gst.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(gst)
    } else {
        Err(ValidationError::new(
            "gst_number",
            "must be a 15 character GSTIN",
        ))
    }
}

pub fn validate_new_transporter(
    mut transporter: NewTransporter,
) -> Result<NewTransporter, ValidationError> {
    transporter.company_name = required("company_name", &transporter.company_name)?;
    transporter.contact_name = required("contact_name", &transporter.contact_name)?;
    transporter.phone = normalize_phone(&transporter.phone)?;
    transporter.email = optional_email(transporter.email)?;
    transporter.operating_regions =
        string_list("operating_regions", transporter.operating_regions)?;
    Ok(transporter)
}

pub fn validate_transporter_update(
    mut update: TransporterUpdate,
) -> Result<TransporterUpdate, ValidationError> {
    update.company_name = update
        .company_name
        .map(|value| required("company_name", &value))
        .transpose()?;
    update.contact_name = update
        .contact_name
        .map(|value| required("contact_name", &value))
        .transpose()?;
    update.email = optional_email(update.email)?;
    update.operating_regions = update
        .operating_regions
        .map(|values| string_list("operating_regions", values))
        .transpose()?;
    Ok(update)
}

fn salary_range(min: u32, max: u32) -> Result<(), ValidationError> {
    if min > max {
        return Err(ValidationError::new(
            "salary_max",
            "must be greater than or equal to salary_min",
        ));
    }
    Ok(())
}

pub fn validate_new_job(mut job: NewJob) -> Result<NewJob, ValidationError> {
    job.title = required("title", &job.title)?;
    job.description = required("description", &job.description)?;
    job.location = required("location", &job.location)?;
    salary_range(job.salary_min, job.salary_max)?;
    if job.openings == 0 {
        return Err(ValidationError::new("openings", "must be at least 1"));
    }
    if job.required_experience_years > MAX_EXPERIENCE_YEARS {
        return Err(ValidationError::new(
            "required_experience_years",
            format!("must be at most {MAX_EXPERIENCE_YEARS}"),
        ));
    }
    if !matches!(
        job.status,
        super::domain::JobStatus::Draft | super::domain::JobStatus::Open
    ) {
        return Err(ValidationError::new(
            "status",
            "new jobs start as draft or open",
        ));
    }
    Ok(job)
}

/// Validates the fields of an update; the merged salary range is checked by the service.
pub fn validate_job_update(mut update: JobUpdate) -> Result<JobUpdate, ValidationError> {
    update.title = update
        .title
        .map(|value| required("title", &value))
        .transpose()?;
    update.description = update
        .description
        .map(|value| required("description", &value))
        .transpose()?;
    update.location = update
        .location
        .map(|value| required("location", &value))
        .transpose()?;
    if let (Some(min), Some(max)) = (update.salary_min, update.salary_max) {
        salary_range(min, max)?;
    }
    if update.openings == Some(0) {
        return Err(ValidationError::new("openings", "must be at least 1"));
    }
    if matches!(update.required_experience_years, Some(years) if years > MAX_EXPERIENCE_YEARS) {
        return Err(ValidationError::new(
            "required_experience_years",
            format!("must be at most {MAX_EXPERIENCE_YEARS}"),
        ));
    }
    Ok(update)
}

pub(crate) fn validate_job_salary(min: u32, max: u32) -> Result<(), ValidationError> {
    salary_range(min, max)
}

pub fn validate_new_application(
    mut application: NewApplication,
) -> Result<NewApplication, ValidationError> {
    application.cover_note = optional("cover_note", application.cover_note)?;
    if application.expected_salary == Some(0) {
        return Err(ValidationError::new(
            "expected_salary",
            "must be greater than zero when provided",
        ));
    }
    Ok(application)
}

pub fn normalize_vehicle_number(raw: &str) -> Result<String, ValidationError> {
    let plate: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if plate.len() < 4 || plate.len() > 12 || !plate.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            "vehicle_number",
            "must be a vehicle registration number",
        ));
    }
    Ok(plate)
}

pub fn validate_new_trip(mut trip: NewTrip) -> Result<NewTrip, ValidationError> {
    trip.vehicle_number = normalize_vehicle_number(&trip.vehicle_number)?;
    trip.origin = required("origin", &trip.origin)?;
    trip.destination = required("destination", &trip.destination)?;
    trip.notes = optional("notes", trip.notes)?;
    Ok(trip)
}

pub fn validate_trip_completion(
    trip: &Trip,
    completion: &TripCompletion,
) -> Result<(), ValidationError> {
    if completion.ended_at < trip.started_at {
        return Err(ValidationError::new(
            "ended_at",
            "must not be before started_at",
        ));
    }
    if !completion.distance_km.is_finite() || completion.distance_km < 0.0 {
        return Err(ValidationError::new(
            "distance_km",
            "must be a non-negative number",
        ));
    }
    Ok(())
}

pub fn validate_new_notification(
    mut notification: NewNotification,
) -> Result<NewNotification, ValidationError> {
    notification.title = required("title", &notification.title)?;
    notification.message = required("message", &notification.message)?;
    Ok(notification)
}
