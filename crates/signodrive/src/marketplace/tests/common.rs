use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::RegistrationConfig;
use crate::marketplace::domain::{
    Application, ApplicationId, DriverId, DriverProfile, FleetOwnerId, FleetOwnerProfile, Job,
    JobId, JobPoster, JobType, NewApplication, NewDriver, NewFleetOwner, NewJob, NewTransporter,
    Notification, NotificationId, TransporterId, TransporterProfile, Trip, TripId, User, UserId,
    UserRole, VehicleType,
};
use crate::marketplace::registration::FixedOtpVerifier;
use crate::marketplace::service::{Clock, MarketplaceService};
use crate::marketplace::storage::{InMemoryStorage, MarketplaceStorage, StorageError};
use crate::marketplace::marketplace_router;

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

/// Clock that only moves when a test advances it.
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) type TestService = MarketplaceService<InMemoryStorage>;

pub(super) fn build_service() -> (TestService, Arc<InMemoryStorage>, Arc<ManualClock>) {
    let storage = Arc::new(InMemoryStorage::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let service = MarketplaceService::with_parts(
        storage.clone(),
        clock.clone(),
        Arc::new(FixedOtpVerifier::default()),
        &RegistrationConfig::default(),
    );
    (service, storage, clock)
}

pub(super) fn seed_user(storage: &InMemoryStorage, phone: &str, role: UserRole) -> User {
    storage
        .insert_user(User {
            id: UserId(0),
            phone: phone.to_string(),
            full_name: "Seeded User".to_string(),
            email: None,
            role,
            phone_verified: true,
            created_at: start_time(),
        })
        .expect("seed user")
}

pub(super) fn new_driver(user_id: UserId, phone: &str) -> NewDriver {
    NewDriver {
        user_id,
        full_name: "Ramesh Yadav".to_string(),
        phone: phone.to_string(),
        city: Some("Indore".to_string()),
        experience_years: Some(7),
        vehicle_types: vec![VehicleType::Truck, VehicleType::Trailer],
        preferred_locations: vec!["Indore".to_string()],
        ..NewDriver::default()
    }
}

pub(super) fn seed_driver(service: &TestService, storage: &InMemoryStorage, phone: &str) -> DriverProfile {
    let user = seed_user(storage, phone, UserRole::Driver);
    service
        .create_driver(new_driver(user.id, phone))
        .expect("driver created")
}

pub(super) fn seed_fleet_owner(service: &TestService, storage: &InMemoryStorage) -> FleetOwnerProfile {
    let user = seed_user(storage, "9000000001", UserRole::FleetOwner);
    service
        .create_fleet_owner(NewFleetOwner {
            user_id: user.id,
            company_name: "Malwa Roadlines".to_string(),
            contact_name: "Sunita Jain".to_string(),
            phone: "9000000001".to_string(),
            fleet_size: 18,
            city: Some("Indore".to_string()),
            ..NewFleetOwner::default()
        })
        .expect("fleet owner created")
}

pub(super) fn seed_transporter(service: &TestService, storage: &InMemoryStorage) -> TransporterProfile {
    let user = seed_user(storage, "9000000002", UserRole::Transporter);
    service
        .create_transporter(NewTransporter {
            user_id: user.id,
            company_name: "Deccan Freight".to_string(),
            contact_name: "Arjun Rao".to_string(),
            phone: "9000000002".to_string(),
            operating_regions: vec!["Hyderabad".to_string(), "Pune".to_string()],
            fleet_size: 40,
            ..NewTransporter::default()
        })
        .expect("transporter created")
}

pub(super) fn new_job(owner: FleetOwnerId) -> NewJob {
    NewJob {
        poster: JobPoster::FleetOwner(owner),
        title: "Trailer driver, Indore to Mumbai".to_string(),
        description: "Weekly container runs on NH52".to_string(),
        vehicle_type: VehicleType::Trailer,
        location: "Indore".to_string(),
        salary_min: 24000,
        salary_max: 30000,
        job_type: JobType::FullTime,
        openings: 1,
        required_experience_years: 3,
        required_license: None,
        status: crate::marketplace::domain::JobStatus::Open,
    }
}

pub(super) fn seed_job(service: &TestService, owner: FleetOwnerId) -> Job {
    service.create_job(new_job(owner)).expect("job created")
}

pub(super) fn application_for(job_id: JobId, driver_id: DriverId) -> NewApplication {
    NewApplication {
        job_id,
        driver_id,
        cover_note: Some("Seven years on trailers".to_string()),
        expected_salary: Some(28000),
    }
}

/// Storage whose every call fails as if the database were down.
pub(super) struct UnavailableStorage;

fn offline<T>() -> Result<T, StorageError> {
    Err(StorageError::Unavailable("database offline".to_string()))
}

impl MarketplaceStorage for UnavailableStorage {
    fn insert_user(&self, _user: User) -> Result<User, StorageError> {
        offline()
    }
    fn user(&self, _id: UserId) -> Result<Option<User>, StorageError> {
        offline()
    }
    fn user_by_phone(&self, _phone: &str) -> Result<Option<User>, StorageError> {
        offline()
    }
    fn update_user(&self, _user: User) -> Result<(), StorageError> {
        offline()
    }

    fn delete_user(&self, _id: UserId) -> Result<(), StorageError> {
        offline()
    }

    fn insert_driver(&self, _driver: DriverProfile) -> Result<DriverProfile, StorageError> {
        offline()
    }
    fn driver(&self, _id: DriverId) -> Result<Option<DriverProfile>, StorageError> {
        offline()
    }
    fn driver_by_user(&self, _user_id: UserId) -> Result<Option<DriverProfile>, StorageError> {
        offline()
    }
    fn update_driver(&self, _driver: DriverProfile) -> Result<(), StorageError> {
        offline()
    }
    fn drivers(&self) -> Result<Vec<DriverProfile>, StorageError> {
        offline()
    }

    fn insert_fleet_owner(
        &self,
        _owner: FleetOwnerProfile,
    ) -> Result<FleetOwnerProfile, StorageError> {
        offline()
    }
    fn fleet_owner(&self, _id: FleetOwnerId) -> Result<Option<FleetOwnerProfile>, StorageError> {
        offline()
    }
    fn fleet_owner_by_user(
        &self,
        _user_id: UserId,
    ) -> Result<Option<FleetOwnerProfile>, StorageError> {
        offline()
    }
    fn update_fleet_owner(&self, _owner: FleetOwnerProfile) -> Result<(), StorageError> {
        offline()
    }
    fn fleet_owners(&self) -> Result<Vec<FleetOwnerProfile>, StorageError> {
        offline()
    }

    fn insert_transporter(
        &self,
        _transporter: TransporterProfile,
    ) -> Result<TransporterProfile, StorageError> {
        offline()
    }
    fn transporter(
        &self,
        _id: TransporterId,
    ) -> Result<Option<TransporterProfile>, StorageError> {
        offline()
    }
    fn transporter_by_user(
        &self,
        _user_id: UserId,
    ) -> Result<Option<TransporterProfile>, StorageError> {
        offline()
    }
    fn update_transporter(&self, _transporter: TransporterProfile) -> Result<(), StorageError> {
        offline()
    }
    fn transporters(&self) -> Result<Vec<TransporterProfile>, StorageError> {
        offline()
    }

    fn insert_job(&self, _job: Job) -> Result<Job, StorageError> {
        offline()
    }
    fn job(&self, _id: JobId) -> Result<Option<Job>, StorageError> {
        offline()
    }
    fn update_job(&self, _job: Job) -> Result<(), StorageError> {
        offline()
    }
    fn delete_job(&self, _id: JobId) -> Result<(), StorageError> {
        offline()
    }
    fn jobs(&self) -> Result<Vec<Job>, StorageError> {
        offline()
    }

    fn insert_application(&self, _application: Application) -> Result<Application, StorageError> {
        offline()
    }
    fn application(&self, _id: ApplicationId) -> Result<Option<Application>, StorageError> {
        offline()
    }
    fn update_application(&self, _application: Application) -> Result<(), StorageError> {
        offline()
    }
    fn applications_for_job(&self, _job_id: JobId) -> Result<Vec<Application>, StorageError> {
        offline()
    }
    fn applications_for_driver(
        &self,
        _driver_id: DriverId,
    ) -> Result<Vec<Application>, StorageError> {
        offline()
    }

    fn insert_trip(&self, _trip: Trip) -> Result<Trip, StorageError> {
        offline()
    }
    fn trip(&self, _id: TripId) -> Result<Option<Trip>, StorageError> {
        offline()
    }
    fn update_trip(&self, _trip: Trip) -> Result<(), StorageError> {
        offline()
    }
    fn trips_for_driver(&self, _driver_id: DriverId) -> Result<Vec<Trip>, StorageError> {
        offline()
    }

    fn insert_notification(
        &self,
        _notification: Notification,
    ) -> Result<Notification, StorageError> {
        offline()
    }
    fn notification(&self, _id: NotificationId) -> Result<Option<Notification>, StorageError> {
        offline()
    }
    fn update_notification(&self, _notification: Notification) -> Result<(), StorageError> {
        offline()
    }
    fn notifications_for_user(&self, _user_id: UserId) -> Result<Vec<Notification>, StorageError> {
        offline()
    }
}

pub(super) fn unavailable_service() -> MarketplaceService<UnavailableStorage> {
    MarketplaceService::with_parts(
        Arc::new(UnavailableStorage),
        Arc::new(ManualClock::new(start_time())),
        Arc::new(FixedOtpVerifier::default()),
        &RegistrationConfig::default(),
    )
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    marketplace_router(Arc::new(service))
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(
            serde_json::to_vec(&body).expect("serialize body"),
        ))
        .expect("request builds")
}

pub(super) fn get_request(uri: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .expect("request builds")
}
