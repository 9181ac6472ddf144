//! Key-by-id storage for every marketplace entity.
//!
//! Two implementations ship with the crate: [`InMemoryStorage`] for tests and demos, and
//! [`SqliteStorage`] for persistent deployments. Both honour the same contract: ids are
//! assigned on insert (any id on the incoming record is ignored), lists come back in
//! ascending id order, and updates of unknown ids fail with [`StorageError::NotFound`].

mod memory;
mod migrations;
mod schema;
mod sqlite;

pub use memory::InMemoryStorage;
pub use migrations::CURRENT_VERSION as SCHEMA_VERSION;
pub use sqlite::SqliteStorage;

use super::domain::{
    Application, ApplicationId, DriverId, DriverProfile, FleetOwnerId, FleetOwnerProfile, Job,
    JobId, Notification, NotificationId, TransporterId, TransporterProfile, Trip, TripId, User,
    UserId,
};

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction so the service layer can run against memory or SQLite.
pub trait MarketplaceStorage: Send + Sync {
    fn insert_user(&self, user: User) -> Result<User, StorageError>;
    fn user(&self, id: UserId) -> Result<Option<User>, StorageError>;
    fn user_by_phone(&self, phone: &str) -> Result<Option<User>, StorageError>;
    fn update_user(&self, user: User) -> Result<(), StorageError>;
    /// Removes an account whose role profile could not be stored.
    fn delete_user(&self, id: UserId) -> Result<(), StorageError>;

    fn insert_driver(&self, driver: DriverProfile) -> Result<DriverProfile, StorageError>;
    fn driver(&self, id: DriverId) -> Result<Option<DriverProfile>, StorageError>;
    fn driver_by_user(&self, user_id: UserId) -> Result<Option<DriverProfile>, StorageError>;
    fn update_driver(&self, driver: DriverProfile) -> Result<(), StorageError>;
    fn drivers(&self) -> Result<Vec<DriverProfile>, StorageError>;

    fn insert_fleet_owner(
        &self,
        owner: FleetOwnerProfile,
    ) -> Result<FleetOwnerProfile, StorageError>;
    fn fleet_owner(&self, id: FleetOwnerId) -> Result<Option<FleetOwnerProfile>, StorageError>;
    fn fleet_owner_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<FleetOwnerProfile>, StorageError>;
    fn update_fleet_owner(&self, owner: FleetOwnerProfile) -> Result<(), StorageError>;
    fn fleet_owners(&self) -> Result<Vec<FleetOwnerProfile>, StorageError>;

    fn insert_transporter(
        &self,
        transporter: TransporterProfile,
    ) -> Result<TransporterProfile, StorageError>;
    fn transporter(&self, id: TransporterId) -> Result<Option<TransporterProfile>, StorageError>;
    fn transporter_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<TransporterProfile>, StorageError>;
    fn update_transporter(&self, transporter: TransporterProfile) -> Result<(), StorageError>;
    fn transporters(&self) -> Result<Vec<TransporterProfile>, StorageError>;

    fn insert_job(&self, job: Job) -> Result<Job, StorageError>;
    fn job(&self, id: JobId) -> Result<Option<Job>, StorageError>;
    fn update_job(&self, job: Job) -> Result<(), StorageError>;
    /// Removes the job together with every application filed against it.
    fn delete_job(&self, id: JobId) -> Result<(), StorageError>;
    fn jobs(&self) -> Result<Vec<Job>, StorageError>;

    /// Fails with [`StorageError::Conflict`] when the driver already applied to the job.
    fn insert_application(&self, application: Application) -> Result<Application, StorageError>;
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, StorageError>;
    fn update_application(&self, application: Application) -> Result<(), StorageError>;
    fn applications_for_job(&self, job_id: JobId) -> Result<Vec<Application>, StorageError>;
    fn applications_for_driver(
        &self,
        driver_id: DriverId,
    ) -> Result<Vec<Application>, StorageError>;

    fn insert_trip(&self, trip: Trip) -> Result<Trip, StorageError>;
    fn trip(&self, id: TripId) -> Result<Option<Trip>, StorageError>;
    fn update_trip(&self, trip: Trip) -> Result<(), StorageError>;
    fn trips_for_driver(&self, driver_id: DriverId) -> Result<Vec<Trip>, StorageError>;

    fn insert_notification(
        &self,
        notification: Notification,
    ) -> Result<Notification, StorageError>;
    fn notification(&self, id: NotificationId) -> Result<Option<Notification>, StorageError>;
    fn update_notification(&self, notification: Notification) -> Result<(), StorageError>;
    fn notifications_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, StorageError>;
}
