//! Driver hiring marketplace: profiles, job postings, applications, trip logs,
//! notifications, and the phone-first registration wizard.
//!
//! Everything funnels through [`MarketplaceService`], which is generic over a
//! [`MarketplaceStorage`] backend so the same rules run against memory in tests and SQLite in
//! deployments. [`marketplace_router`] exposes the service over HTTP.

pub mod applications;
pub mod domain;
pub mod extract;
pub mod jobs;
pub mod profile;
pub mod registration;
pub mod router;
pub mod service;
pub mod storage;
pub mod trips;
pub mod validation;

pub use domain::*;
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use jobs::{ApplicantFilter, JobFilter, JobStats};
pub use profile::ProfileCompletion;
pub use registration::{
    CompleteRegistration, DriverDetails, FixedOtpVerifier, FleetOwnerDetails, OtpVerifier,
    RegistrationError, RegistrationId, RegistrationProfile, RegistrationStep, RegistrationView,
    StartRegistration, TransporterDetails, VerifyRegistration,
};
pub use router::marketplace_router;
pub use service::{
    Clock, Entity, MarketplaceError, MarketplaceService, RegisteredAccount, SystemClock,
};
pub use storage::{InMemoryStorage, MarketplaceStorage, SqliteStorage, StorageError};
pub use trips::TripSummary;
pub use validation::ValidationError;

#[cfg(test)]
mod tests;
