use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Account identifier shared by every role.
    UserId
);
entity_id!(DriverId);
entity_id!(FleetOwnerId);
entity_id!(TransporterId);
entity_id!(JobId);
entity_id!(ApplicationId);
entity_id!(TripId);
entity_id!(NotificationId);

/// Marketplace roles a verified phone number can register as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Driver,
    FleetOwner,
    Transporter,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Driver => "driver",
            UserRole::FleetOwner => "fleet_owner",
            UserRole::Transporter => "transporter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub phone: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub phone_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub phone: String,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub phone_verified: bool,
}

/// Indian driving licence classes relevant to commercial vehicles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseType {
    Lmv,
    Hmv,
    Hgmv,
    Htv,
    Trans,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    MiniTruck,
    Pickup,
    Lcv,
    Truck,
    Trailer,
    Tanker,
    Container,
    Bus,
}

impl VehicleType {
    pub const fn label(self) -> &'static str {
        match self {
            VehicleType::MiniTruck => "mini_truck",
            VehicleType::Pickup => "pickup",
            VehicleType::Lcv => "lcv",
            VehicleType::Truck => "truck",
            VehicleType::Trailer => "trailer",
            VehicleType::Tanker => "tanker",
            VehicleType::Container => "container",
            VehicleType::Bus => "bus",
        }
    }
}

/// Job seeker profile. Most fields are optional so the profile can be completed over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: DriverId,
    pub user_id: UserId,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub license_number: Option<String>,
    pub license_type: Option<LicenseType>,
    pub license_expiry: Option<NaiveDate>,
    pub identity_number: Option<String>,
    pub experience_years: Option<u8>,
    pub vehicle_types: Vec<VehicleType>,
    pub preferred_locations: Vec<String>,
    pub photo_url: Option<String>,
    pub available: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDriver {
    pub user_id: UserId,
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub license_type: Option<LicenseType>,
    #[serde(default)]
    pub license_expiry: Option<NaiveDate>,
    #[serde(default)]
    pub identity_number: Option<String>,
    #[serde(default)]
    pub experience_years: Option<u8>,
    #[serde(default)]
    pub vehicle_types: Vec<VehicleType>,
    #[serde(default)]
    pub preferred_locations: Vec<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub license_number: Option<String>,
    pub license_type: Option<LicenseType>,
    pub license_expiry: Option<NaiveDate>,
    pub identity_number: Option<String>,
    pub experience_years: Option<u8>,
    pub vehicle_types: Option<Vec<VehicleType>>,
    pub preferred_locations: Option<Vec<String>>,
    pub photo_url: Option<String>,
    pub available: Option<bool>,
    pub verified: Option<bool>,
}

impl DriverUpdate {
    pub fn apply(self, driver: &mut DriverProfile) {
        if let Some(value) = self.full_name {
            driver.full_name = value;
        }
        if self.email.is_some() {
            driver.email = self.email;
        }
        if self.date_of_birth.is_some() {
            driver.date_of_birth = self.date_of_birth;
        }
        if self.address.is_some() {
            driver.address = self.address;
        }
        if self.city.is_some() {
            driver.city = self.city;
        }
        if self.license_number.is_some() {
            driver.license_number = self.license_number;
        }
        if self.license_type.is_some() {
            driver.license_type = self.license_type;
        }
        if self.license_expiry.is_some() {
            driver.license_expiry = self.license_expiry;
        }
        if self.identity_number.is_some() {
            driver.identity_number = self.identity_number;
        }
        if self.experience_years.is_some() {
            driver.experience_years = self.experience_years;
        }
        if let Some(value) = self.vehicle_types {
            driver.vehicle_types = value;
        }
        if let Some(value) = self.preferred_locations {
            driver.preferred_locations = value;
        }
        if self.photo_url.is_some() {
            driver.photo_url = self.photo_url;
        }
        if let Some(value) = self.available {
            driver.available = value;
        }
        if let Some(value) = self.verified {
            driver.verified = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetOwnerProfile {
    pub id: FleetOwnerId,
    pub user_id: UserId,
    pub company_name: String,
    pub contact_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub gst_number: Option<String>,
    pub fleet_size: u32,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFleetOwner {
    pub user_id: UserId,
    pub company_name: String,
    pub contact_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub fleet_size: u32,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetOwnerUpdate {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub gst_number: Option<String>,
    pub fleet_size: Option<u32>,
    pub city: Option<String>,
}

impl FleetOwnerUpdate {
    pub fn apply(self, owner: &mut FleetOwnerProfile) {
        if let Some(value) = self.company_name {
            owner.company_name = value;
        }
        if let Some(value) = self.contact_name {
            owner.contact_name = value;
        }
        if self.email.is_some() {
            owner.email = self.email;
        }
        if self.gst_number.is_some() {
            owner.gst_number = self.gst_number;
        }
        if let Some(value) = self.fleet_size {
            owner.fleet_size = value;
        }
        if self.city.is_some() {
            owner.city = self.city;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransporterProfile {
    pub id: TransporterId,
    pub user_id: UserId,
    pub company_name: String,
    pub contact_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub operating_regions: Vec<String>,
    pub fleet_size: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransporter {
    pub user_id: UserId,
    pub company_name: String,
    pub contact_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub operating_regions: Vec<String>,
    #[serde(default)]
    pub fleet_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransporterUpdate {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub operating_regions: Option<Vec<String>>,
    pub fleet_size: Option<u32>,
}

impl TransporterUpdate {
    pub fn apply(self, transporter: &mut TransporterProfile) {
        if let Some(value) = self.company_name {
            transporter.company_name = value;
        }
        if let Some(value) = self.contact_name {
            transporter.contact_name = value;
        }
        if self.email.is_some() {
            transporter.email = self.email;
        }
        if let Some(value) = self.operating_regions {
            transporter.operating_regions = value;
        }
        if let Some(value) = self.fleet_size {
            transporter.fleet_size = value;
        }
    }
}

/// Either company-side role may post jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum JobPoster {
    FleetOwner(FleetOwnerId),
    Transporter(TransporterId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    TripBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Draft,
    Open,
    Paused,
    Closed,
    Filled,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Draft => "draft",
            JobStatus::Open => "open",
            JobStatus::Paused => "paused",
            JobStatus::Closed => "closed",
            JobStatus::Filled => "filled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Closed | JobStatus::Filled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub poster: JobPoster,
    pub title: String,
    pub description: String,
    pub vehicle_type: VehicleType,
    pub location: String,
    pub salary_min: u32,
    pub salary_max: u32,
    pub job_type: JobType,
    pub openings: u32,
    pub required_experience_years: u8,
    pub required_license: Option<LicenseType>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_openings() -> u32 {
    1
}

fn default_job_status() -> JobStatus {
    JobStatus::Open
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub poster: JobPoster,
    pub title: String,
    pub description: String,
    pub vehicle_type: VehicleType,
    pub location: String,
    pub salary_min: u32,
    pub salary_max: u32,
    pub job_type: JobType,
    #[serde(default = "default_openings")]
    pub openings: u32,
    #[serde(default)]
    pub required_experience_years: u8,
    #[serde(default)]
    pub required_license: Option<LicenseType>,
    /// Jobs may be saved as drafts; everything else is published immediately.
    #[serde(default = "default_job_status")]
    pub status: JobStatus,
}

/// Editable job fields. Status changes go through the transition endpoint instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub vehicle_type: Option<VehicleType>,
    pub location: Option<String>,
    pub salary_min: Option<u32>,
    pub salary_max: Option<u32>,
    pub job_type: Option<JobType>,
    pub openings: Option<u32>,
    pub required_experience_years: Option<u8>,
    pub required_license: Option<LicenseType>,
}

impl JobUpdate {
    pub fn apply(self, job: &mut Job) {
        if let Some(value) = self.title {
            job.title = value;
        }
        if let Some(value) = self.description {
            job.description = value;
        }
        if let Some(value) = self.vehicle_type {
            job.vehicle_type = value;
        }
        if let Some(value) = self.location {
            job.location = value;
        }
        if let Some(value) = self.salary_min {
            job.salary_min = value;
        }
        if let Some(value) = self.salary_max {
            job.salary_max = value;
        }
        if let Some(value) = self.job_type {
            job.job_type = value;
        }
        if let Some(value) = self.openings {
            job.openings = value;
        }
        if let Some(value) = self.required_experience_years {
            job.required_experience_years = value;
        }
        if self.required_license.is_some() {
            job.required_license = self.required_license;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Shortlisted,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub driver_id: DriverId,
    pub cover_note: Option<String>,
    pub expected_salary: Option<u32>,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    pub job_id: JobId,
    pub driver_id: DriverId,
    #[serde(default)]
    pub cover_note: Option<String>,
    #[serde(default)]
    pub expected_salary: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TripStatus::Planned => "planned",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One leg in a driver's trip log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub driver_id: DriverId,
    pub vehicle_number: String,
    pub origin: String,
    pub destination: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub distance_km: Option<f64>,
    pub earnings: Option<u32>,
    pub status: TripStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrip {
    pub driver_id: DriverId,
    pub vehicle_number: String,
    pub origin: String,
    pub destination: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCompletion {
    pub ended_at: DateTime<Utc>,
    pub distance_km: f64,
    #[serde(default)]
    pub earnings: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApplicationReceived,
    ApplicationStatus,
    JobStatus,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    #[serde(default = "default_notification_kind")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

fn default_notification_kind() -> NotificationKind {
    NotificationKind::System
}
