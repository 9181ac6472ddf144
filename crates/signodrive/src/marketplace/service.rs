use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::applications::{self, ApplicationTransitionError};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, DriverId, DriverProfile, DriverUpdate,
    FleetOwnerId, FleetOwnerProfile, FleetOwnerUpdate, Job, JobId, JobPoster, JobStatus, JobUpdate,
    NewApplication, NewDriver, NewFleetOwner, NewJob, NewNotification, NewTransporter, NewTrip,
    Notification, NotificationId, NotificationKind, TransporterId, TransporterProfile,
    TransporterUpdate, Trip, TripCompletion, TripId, User, UserId, UserRole,
};
use super::jobs::{self, ApplicantFilter, JobFilter, JobStats, JobTransitionError};
use super::profile::ProfileCompletion;
use super::registration::{
    mask_phone, CompleteRegistration, FixedOtpVerifier, OtpVerifier, RegistrationError,
    RegistrationProfile, RegistrationSessions, RegistrationView, StartRegistration,
    VerifyRegistration,
};
use super::storage::{MarketplaceStorage, StorageError};
use super::trips::{self, TripExportError, TripSummary, TripTransitionError};
use super::validation::{self, ValidationError};
use crate::config::RegistrationConfig;

/// Source of the current time so rules that depend on "now" can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Entity kinds used in not-found errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Driver,
    FleetOwner,
    Transporter,
    Job,
    Application,
    Trip,
    Notification,
}

impl Entity {
    pub const fn label(self) -> &'static str {
        match self {
            Entity::User => "user",
            Entity::Driver => "driver",
            Entity::FleetOwner => "fleet owner",
            Entity::Transporter => "transporter",
            Entity::Job => "job",
            Entity::Application => "application",
            Entity::Trip => "trip",
            Entity::Notification => "notification",
        }
    }
}

/// Error raised by the marketplace service.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{} {id} not found", .entity.label())]
    NotFound { entity: Entity, id: u64 },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    JobTransition(#[from] JobTransitionError),
    #[error(transparent)]
    ApplicationTransition(#[from] ApplicationTransitionError),
    #[error(transparent)]
    TripTransition(#[from] TripTransitionError),
    #[error("job {job_id} is {status} and not accepting changes")]
    JobNotOpen { job_id: JobId, status: JobStatus },
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Export(#[from] TripExportError),
}

fn missing(entity: Entity, id: u64) -> MarketplaceError {
    MarketplaceError::NotFound { entity, id }
}

/// Completed sign-up: the account plus the id of the role profile that was created.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RegisteredAccount {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fleet_owner_id: Option<FleetOwnerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transporter_id: Option<TransporterId>,
}

/// Service composing storage, lifecycle rules, notifications, and the registration wizard.
pub struct MarketplaceService<S> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    otp: Arc<dyn OtpVerifier>,
    registrations: RegistrationSessions,
}

impl<S> MarketplaceService<S>
where
    S: MarketplaceStorage + 'static,
{
    pub fn new(storage: Arc<S>, config: &RegistrationConfig) -> Self {
        Self::with_parts(
            storage,
            Arc::new(SystemClock),
            Arc::new(FixedOtpVerifier::new(config.otp_code.clone())),
            config,
        )
    }

    pub fn with_parts(
        storage: Arc<S>,
        clock: Arc<dyn Clock>,
        otp: Arc<dyn OtpVerifier>,
        config: &RegistrationConfig,
    ) -> Self {
        Self {
            storage,
            clock,
            otp,
            registrations: RegistrationSessions::new(config.session_ttl),
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // Users and registration

    pub fn user(&self, id: UserId) -> Result<User, MarketplaceError> {
        self.storage
            .user(id)?
            .ok_or_else(|| missing(Entity::User, id.0))
    }

    pub fn start_registration(
        &self,
        request: StartRegistration,
    ) -> Result<RegistrationView, MarketplaceError> {
        let phone = validation::normalize_phone(&request.phone)?;
        if self.storage.user_by_phone(&phone)?.is_some() {
            return Err(RegistrationError::AlreadyRegistered(phone).into());
        }

        let session = self
            .registrations
            .open(phone.clone(), request.role, self.now())?;
        self.otp.send(&phone)?;
        info!(
            session = %session.id,
            phone = %mask_phone(&phone),
            role = request.role.label(),
            "registration started"
        );
        Ok(session.view())
    }

    pub fn verify_registration(
        &self,
        request: VerifyRegistration,
    ) -> Result<RegistrationView, MarketplaceError> {
        let result = self.registrations.verify(
            &request.session_id,
            &request.otp,
            self.otp.as_ref(),
            self.now(),
        );
        match result {
            Ok(session) => {
                info!(session = %session.id, "registration otp verified");
                Ok(session.view())
            }
            Err(err) => {
                warn!(session = %request.session_id, error = %err, "registration otp rejected");
                Err(err.into())
            }
        }
    }

    pub fn complete_registration(
        &self,
        request: CompleteRegistration,
    ) -> Result<RegisteredAccount, MarketplaceError> {
        let now = self.now();
        let role = request.profile.role();
        let session = self
            .registrations
            .ready_to_complete(&request.session_id, role, now)?;

        let full_name = validation::required("full_name", &request.full_name)?;
        let email = request
            .email
            .filter(|email| !email.trim().is_empty())
            .map(|email| validation::validate_email(&email))
            .transpose()?;

        // Validate the role profile before the account exists so a bad page can be resubmitted.
        let profile = match request.profile {
            RegistrationProfile::Driver(details) => {
                PendingProfile::Driver(validation::validate_new_driver(NewDriver {
                    user_id: UserId(0),
                    full_name: full_name.clone(),
                    phone: session.phone.clone(),
                    email: email.clone(),
                    date_of_birth: details.date_of_birth,
                    city: details.city,
                    license_number: details.license_number,
                    license_type: details.license_type,
                    license_expiry: details.license_expiry,
                    experience_years: details.experience_years,
                    vehicle_types: details.vehicle_types,
                    preferred_locations: details.preferred_locations,
                    ..NewDriver::default()
                })?)
            }
            RegistrationProfile::FleetOwner(details) => {
                PendingProfile::FleetOwner(validation::validate_new_fleet_owner(NewFleetOwner {
                    user_id: UserId(0),
                    company_name: details.company_name,
                    contact_name: full_name.clone(),
                    phone: session.phone.clone(),
                    email: email.clone(),
                    gst_number: details.gst_number,
                    fleet_size: details.fleet_size,
                    city: details.city,
                })?)
            }
            RegistrationProfile::Transporter(details) => {
                PendingProfile::Transporter(validation::validate_new_transporter(NewTransporter {
                    user_id: UserId(0),
                    company_name: details.company_name,
                    contact_name: full_name.clone(),
                    phone: session.phone.clone(),
                    email: email.clone(),
                    operating_regions: details.operating_regions,
                    fleet_size: details.fleet_size,
                })?)
            }
        };

        let user = self
            .storage
            .insert_user(User {
                id: UserId(0),
                phone: session.phone.clone(),
                full_name,
                email,
                role,
                phone_verified: true,
                created_at: now,
            })
            .map_err(|err| match err {
                StorageError::Conflict(_) => {
                    MarketplaceError::from(RegistrationError::AlreadyRegistered(
                        session.phone.clone(),
                    ))
                }
                other => other.into(),
            })?;

        let mut account = RegisteredAccount {
            user: user.clone(),
            driver_id: None,
            fleet_owner_id: None,
            transporter_id: None,
        };
        let stored_profile = match profile {
            PendingProfile::Driver(mut driver) => {
                driver.user_id = user.id;
                self.insert_driver(driver, now)
                    .map(|stored| account.driver_id = Some(stored.id))
            }
            PendingProfile::FleetOwner(mut owner) => {
                owner.user_id = user.id;
                self.insert_fleet_owner(owner, now)
                    .map(|stored| account.fleet_owner_id = Some(stored.id))
            }
            PendingProfile::Transporter(mut transporter) => {
                transporter.user_id = user.id;
                self.insert_transporter(transporter, now)
                    .map(|stored| account.transporter_id = Some(stored.id))
            }
        };
        // The session stays open, so the phone must be free again for the retry.
        if let Err(err) = stored_profile {
            if let Err(cleanup) = self.storage.delete_user(user.id) {
                warn!(user_id = %user.id, error = %cleanup, "failed to remove account without profile");
            }
            return Err(err);
        }

        self.registrations
            .mark_completed(&request.session_id, now)?;
        self.notify(
            user.id,
            NotificationKind::System,
            "Welcome to SignoDrive",
            format!("Your {} account is ready.", role.label().replace('_', " ")),
        )?;
        info!(user_id = %user.id, role = role.label(), "registration completed");
        Ok(account)
    }

    fn require_role(&self, user_id: UserId, role: UserRole) -> Result<(), MarketplaceError> {
        let user = self.user(user_id)?;
        if user.role != role {
            return Err(ValidationError::new(
                "user_id",
                format!("user {} is registered as {}", user.id, user.role.label()),
            )
            .into());
        }
        Ok(())
    }

    // Drivers

    pub fn create_driver(&self, driver: NewDriver) -> Result<DriverProfile, MarketplaceError> {
        let driver = validation::validate_new_driver(driver)?;
        self.require_role(driver.user_id, UserRole::Driver)?;
        self.insert_driver(driver, self.now())
    }

    fn insert_driver(
        &self,
        driver: NewDriver,
        now: DateTime<Utc>,
    ) -> Result<DriverProfile, MarketplaceError> {
        let stored = self.storage.insert_driver(DriverProfile {
            id: DriverId(0),
            user_id: driver.user_id,
            full_name: driver.full_name,
            phone: driver.phone,
            email: driver.email,
            date_of_birth: driver.date_of_birth,
            address: driver.address,
            city: driver.city,
            license_number: driver.license_number,
            license_type: driver.license_type,
            license_expiry: driver.license_expiry,
            identity_number: driver.identity_number,
            experience_years: driver.experience_years,
            vehicle_types: driver.vehicle_types,
            preferred_locations: driver.preferred_locations,
            photo_url: driver.photo_url,
            available: true,
            verified: false,
            created_at: now,
            updated_at: now,
        })?;
        Ok(stored)
    }

    pub fn driver(&self, id: DriverId) -> Result<DriverProfile, MarketplaceError> {
        self.storage
            .driver(id)?
            .ok_or_else(|| missing(Entity::Driver, id.0))
    }

    pub fn drivers(&self) -> Result<Vec<DriverProfile>, MarketplaceError> {
        Ok(self.storage.drivers()?)
    }

    pub fn update_driver(
        &self,
        id: DriverId,
        update: DriverUpdate,
    ) -> Result<DriverProfile, MarketplaceError> {
        let update = validation::validate_driver_update(update)?;
        let mut driver = self.driver(id)?;
        update.apply(&mut driver);
        driver.updated_at = self.now();
        self.storage.update_driver(driver.clone())?;
        Ok(driver)
    }

    pub fn driver_completion(&self, id: DriverId) -> Result<ProfileCompletion, MarketplaceError> {
        Ok(ProfileCompletion::for_driver(&self.driver(id)?))
    }

    // Fleet owners and transporters

    pub fn create_fleet_owner(
        &self,
        owner: NewFleetOwner,
    ) -> Result<FleetOwnerProfile, MarketplaceError> {
        let owner = validation::validate_new_fleet_owner(owner)?;
        self.require_role(owner.user_id, UserRole::FleetOwner)?;
        self.insert_fleet_owner(owner, self.now())
    }

    fn insert_fleet_owner(
        &self,
        owner: NewFleetOwner,
        now: DateTime<Utc>,
    ) -> Result<FleetOwnerProfile, MarketplaceError> {
        Ok(self.storage.insert_fleet_owner(FleetOwnerProfile {
            id: FleetOwnerId(0),
            user_id: owner.user_id,
            company_name: owner.company_name,
            contact_name: owner.contact_name,
            phone: owner.phone,
            email: owner.email,
            gst_number: owner.gst_number,
            fleet_size: owner.fleet_size,
            city: owner.city,
            created_at: now,
        })?)
    }

    pub fn fleet_owner(&self, id: FleetOwnerId) -> Result<FleetOwnerProfile, MarketplaceError> {
        self.storage
            .fleet_owner(id)?
            .ok_or_else(|| missing(Entity::FleetOwner, id.0))
    }

    pub fn fleet_owners(&self) -> Result<Vec<FleetOwnerProfile>, MarketplaceError> {
        Ok(self.storage.fleet_owners()?)
    }

    pub fn update_fleet_owner(
        &self,
        id: FleetOwnerId,
        update: FleetOwnerUpdate,
    ) -> Result<FleetOwnerProfile, MarketplaceError> {
        let update = validation::validate_fleet_owner_update(update)?;
        let mut owner = self.fleet_owner(id)?;
        update.apply(&mut owner);
        self.storage.update_fleet_owner(owner.clone())?;
        Ok(owner)
    }

    pub fn create_transporter(
        &self,
        transporter: NewTransporter,
    ) -> Result<TransporterProfile, MarketplaceError> {
        let transporter = validation::validate_new_transporter(transporter)?;
        self.require_role(transporter.user_id, UserRole::Transporter)?;
        self.insert_transporter(transporter, self.now())
    }

    fn insert_transporter(
        &self,
        transporter: NewTransporter,
        now: DateTime<Utc>,
    ) -> Result<TransporterProfile, MarketplaceError> {
        Ok(self.storage.insert_transporter(TransporterProfile {
            id: TransporterId(0),
            user_id: transporter.user_id,
            company_name: transporter.company_name,
            contact_name: transporter.contact_name,
            phone: transporter.phone,
            email: transporter.email,
            operating_regions: transporter.operating_regions,
            fleet_size: transporter.fleet_size,
            created_at: now,
        })?)
    }

    pub fn transporter(&self, id: TransporterId) -> Result<TransporterProfile, MarketplaceError> {
        self.storage
            .transporter(id)?
            .ok_or_else(|| missing(Entity::Transporter, id.0))
    }

    pub fn transporters(&self) -> Result<Vec<TransporterProfile>, MarketplaceError> {
        Ok(self.storage.transporters()?)
    }

    pub fn update_transporter(
        &self,
        id: TransporterId,
        update: TransporterUpdate,
    ) -> Result<TransporterProfile, MarketplaceError> {
        let update = validation::validate_transporter_update(update)?;
        let mut transporter = self.transporter(id)?;
        update.apply(&mut transporter);
        self.storage.update_transporter(transporter.clone())?;
        Ok(transporter)
    }

    fn poster_user(&self, poster: JobPoster) -> Result<UserId, MarketplaceError> {
        match poster {
            JobPoster::FleetOwner(id) => Ok(self.fleet_owner(id)?.user_id),
            JobPoster::Transporter(id) => Ok(self.transporter(id)?.user_id),
        }
    }

    // Jobs

    pub fn create_job(&self, job: NewJob) -> Result<Job, MarketplaceError> {
        let job = validation::validate_new_job(job)?;
        self.poster_user(job.poster)?;
        let now = self.now();
        let stored = self.storage.insert_job(Job {
            id: JobId(0),
            poster: job.poster,
            title: job.title,
            description: job.description,
            vehicle_type: job.vehicle_type,
            location: job.location,
            salary_min: job.salary_min,
            salary_max: job.salary_max,
            job_type: job.job_type,
            openings: job.openings,
            required_experience_years: job.required_experience_years,
            required_license: job.required_license,
            status: job.status,
            created_at: now,
            updated_at: now,
        })?;
        info!(job_id = %stored.id, status = stored.status.label(), "job posted");
        Ok(stored)
    }

    pub fn job(&self, id: JobId) -> Result<Job, MarketplaceError> {
        self.storage
            .job(id)?
            .ok_or_else(|| missing(Entity::Job, id.0))
    }

    pub fn jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, MarketplaceError> {
        Ok(filter.apply(self.storage.jobs()?))
    }

    pub fn update_job(&self, id: JobId, update: JobUpdate) -> Result<Job, MarketplaceError> {
        let update = validation::validate_job_update(update)?;
        let mut job = self.job(id)?;
        if job.status.is_terminal() {
            return Err(MarketplaceError::JobNotOpen {
                job_id: job.id,
                status: job.status,
            });
        }
        update.apply(&mut job);
        validation::validate_job_salary(job.salary_min, job.salary_max)?;

        let accepted = self
            .storage
            .applications_for_job(id)?
            .iter()
            .filter(|application| application.status == ApplicationStatus::Accepted)
            .count() as u32;
        if job.openings < accepted {
            return Err(ValidationError::new(
                "openings",
                format!("{accepted} drivers are already accepted"),
            )
            .into());
        }

        job.updated_at = self.now();
        self.storage.update_job(job.clone())?;
        Ok(job)
    }

    pub fn delete_job(&self, id: JobId) -> Result<(), MarketplaceError> {
        self.storage.delete_job(id).map_err(|err| match err {
            StorageError::NotFound => missing(Entity::Job, id.0),
            other => other.into(),
        })?;
        info!(job_id = %id, "job deleted");
        Ok(())
    }

    pub fn change_job_status(&self, id: JobId, to: JobStatus) -> Result<Job, MarketplaceError> {
        let mut job = self.job(id)?;
        let from = job.status;
        jobs::transition(&mut job, to)?;
        job.updated_at = self.now();
        self.storage.update_job(job.clone())?;
        info!(job_id = %id, from = from.label(), to = to.label(), "job status changed");

        if to.is_terminal() {
            self.notify_open_applicants(&job)?;
        }
        Ok(job)
    }

    fn notify_open_applicants(&self, job: &Job) -> Result<(), MarketplaceError> {
        let message = match job.status {
            JobStatus::Filled => format!("\"{}\" has been filled.", job.title),
            _ => format!("\"{}\" is no longer accepting applications.", job.title),
        };
        for application in self.storage.applications_for_job(job.id)? {
            if application.status.is_terminal() {
                continue;
            }
            let driver = self.driver(application.driver_id)?;
            self.notify(
                driver.user_id,
                NotificationKind::JobStatus,
                "Job update",
                message.clone(),
            )?;
        }
        Ok(())
    }

    pub fn job_applications(
        &self,
        id: JobId,
        filter: ApplicantFilter,
    ) -> Result<Vec<Application>, MarketplaceError> {
        self.job(id)?;
        Ok(filter.apply(self.storage.applications_for_job(id)?))
    }

    pub fn job_stats(&self, id: JobId) -> Result<JobStats, MarketplaceError> {
        let job = self.job(id)?;
        let applications = self.storage.applications_for_job(id)?;
        Ok(JobStats::compute(&job, &applications))
    }

    pub fn recommended_jobs(&self, driver_id: DriverId) -> Result<Vec<Job>, MarketplaceError> {
        let driver = self.driver(driver_id)?;
        Ok(jobs::recommended_for(&driver, self.storage.jobs()?))
    }

    // Applications

    pub fn apply(&self, application: NewApplication) -> Result<Application, MarketplaceError> {
        let application = validation::validate_new_application(application)?;
        let job = self.job(application.job_id)?;
        if job.status != JobStatus::Open {
            return Err(MarketplaceError::JobNotOpen {
                job_id: job.id,
                status: job.status,
            });
        }
        let driver = self.driver(application.driver_id)?;

        let now = self.now();
        let stored = self.storage.insert_application(Application {
            id: ApplicationId(0),
            job_id: job.id,
            driver_id: driver.id,
            cover_note: application.cover_note,
            expected_salary: application.expected_salary,
            status: ApplicationStatus::Pending,
            applied_at: now,
            updated_at: now,
        })?;

        let poster_user = self.poster_user(job.poster)?;
        self.notify(
            poster_user,
            NotificationKind::ApplicationReceived,
            "New application",
            format!("{} applied for \"{}\".", driver.full_name, job.title),
        )?;
        info!(application_id = %stored.id, job_id = %job.id, driver_id = %driver.id, "application submitted");
        Ok(stored)
    }

    pub fn application(&self, id: ApplicationId) -> Result<Application, MarketplaceError> {
        self.storage
            .application(id)?
            .ok_or_else(|| missing(Entity::Application, id.0))
    }

    pub fn driver_applications(
        &self,
        driver_id: DriverId,
    ) -> Result<Vec<Application>, MarketplaceError> {
        self.driver(driver_id)?;
        Ok(self.storage.applications_for_driver(driver_id)?)
    }

    pub fn change_application_status(
        &self,
        id: ApplicationId,
        to: ApplicationStatus,
    ) -> Result<Application, MarketplaceError> {
        let mut application = self.application(id)?;
        let from = application.status;
        applications::transition(&mut application, to)?;
        if to == ApplicationStatus::Accepted {
            self.ensure_opening(application.job_id)?;
        }
        let now = self.now();
        application.updated_at = now;
        self.storage.update_application(application.clone())?;
        info!(application_id = %id, from = from.label(), to = to.label(), "application status changed");

        let job = self.job(application.job_id)?;
        if let Some(message) = applications::status_message(to, &job.title) {
            let driver = self.driver(application.driver_id)?;
            self.notify(
                driver.user_id,
                NotificationKind::ApplicationStatus,
                "Application update",
                message,
            )?;
        }

        if to == ApplicationStatus::Accepted {
            let accepted = self
                .storage
                .applications_for_job(job.id)?
                .iter()
                .filter(|application| application.status == ApplicationStatus::Accepted)
                .count() as u32;
            if accepted >= job.openings {
                self.change_job_status(job.id, JobStatus::Filled)?;
            }
        }

        Ok(application)
    }

    /// Accepting is only allowed on an open job that still has an unfilled opening.
    fn ensure_opening(&self, job_id: JobId) -> Result<(), MarketplaceError> {
        let job = self.job(job_id)?;
        let accepted = self
            .storage
            .applications_for_job(job_id)?
            .iter()
            .filter(|application| application.status == ApplicationStatus::Accepted)
            .count() as u32;
        if job.status != JobStatus::Open || accepted >= job.openings {
            return Err(MarketplaceError::JobNotOpen {
                job_id,
                status: job.status,
            });
        }
        Ok(())
    }

    // Trips

    pub fn log_trip(&self, trip: NewTrip) -> Result<Trip, MarketplaceError> {
        let trip = validation::validate_new_trip(trip)?;
        self.driver(trip.driver_id)?;
        let status = trips::initial_status(trip.started_at, self.now());
        Ok(self.storage.insert_trip(Trip {
            id: TripId(0),
            driver_id: trip.driver_id,
            vehicle_number: trip.vehicle_number,
            origin: trip.origin,
            destination: trip.destination,
            started_at: trip.started_at,
            ended_at: None,
            distance_km: None,
            earnings: None,
            status,
            notes: trip.notes,
        })?)
    }

    pub fn trip(&self, id: TripId) -> Result<Trip, MarketplaceError> {
        self.storage
            .trip(id)?
            .ok_or_else(|| missing(Entity::Trip, id.0))
    }

    pub fn driver_trips(&self, driver_id: DriverId) -> Result<Vec<Trip>, MarketplaceError> {
        self.driver(driver_id)?;
        Ok(self.storage.trips_for_driver(driver_id)?)
    }

    pub fn start_trip(&self, id: TripId) -> Result<Trip, MarketplaceError> {
        let mut trip = self.trip(id)?;
        trips::start(&mut trip, self.now())?;
        self.storage.update_trip(trip.clone())?;
        Ok(trip)
    }

    pub fn complete_trip(
        &self,
        id: TripId,
        completion: TripCompletion,
    ) -> Result<Trip, MarketplaceError> {
        let mut trip = self.trip(id)?;
        validation::validate_trip_completion(&trip, &completion)?;
        trips::complete(&mut trip, completion)?;
        self.storage.update_trip(trip.clone())?;
        Ok(trip)
    }

    pub fn cancel_trip(&self, id: TripId) -> Result<Trip, MarketplaceError> {
        let mut trip = self.trip(id)?;
        trips::cancel(&mut trip)?;
        self.storage.update_trip(trip.clone())?;
        Ok(trip)
    }

    pub fn trip_summary(&self, driver_id: DriverId) -> Result<TripSummary, MarketplaceError> {
        let trips = self.driver_trips(driver_id)?;
        Ok(TripSummary::compute(driver_id, &trips))
    }

    pub fn export_trips(&self, driver_id: DriverId) -> Result<String, MarketplaceError> {
        let trips = self.driver_trips(driver_id)?;
        Ok(trips::export_csv(&trips)?)
    }

    // Notifications

    fn notify(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        title: &str,
        message: String,
    ) -> Result<Notification, MarketplaceError> {
        Ok(self.storage.insert_notification(Notification {
            id: NotificationId(0),
            user_id,
            kind,
            title: title.to_string(),
            message,
            read: false,
            created_at: self.now(),
        })?)
    }

    pub fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, MarketplaceError> {
        let notification = validation::validate_new_notification(notification)?;
        self.user(notification.user_id)?;
        self.notify(
            notification.user_id,
            notification.kind,
            &notification.title,
            notification.message,
        )
    }

    /// Newest first.
    pub fn notifications(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, MarketplaceError> {
        self.user(user_id)?;
        let mut notifications: Vec<Notification> = self
            .storage
            .notifications_for_user(user_id)?
            .into_iter()
            .filter(|notification| !unread_only || !notification.read)
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    pub fn unread_count(&self, user_id: UserId) -> Result<usize, MarketplaceError> {
        Ok(self
            .storage
            .notifications_for_user(user_id)?
            .iter()
            .filter(|notification| !notification.read)
            .count())
    }

    pub fn mark_notification_read(
        &self,
        id: NotificationId,
    ) -> Result<Notification, MarketplaceError> {
        let mut notification = self
            .storage
            .notification(id)?
            .ok_or_else(|| missing(Entity::Notification, id.0))?;
        if !notification.read {
            notification.read = true;
            self.storage.update_notification(notification.clone())?;
        }
        Ok(notification)
    }

    /// Returns how many notifications changed.
    pub fn mark_all_read(&self, user_id: UserId) -> Result<usize, MarketplaceError> {
        self.user(user_id)?;
        let mut changed = 0;
        for mut notification in self.storage.notifications_for_user(user_id)? {
            if notification.read {
                continue;
            }
            notification.read = true;
            self.storage.update_notification(notification)?;
            changed += 1;
        }
        Ok(changed)
    }
}

enum PendingProfile {
    Driver(NewDriver),
    FleetOwner(NewFleetOwner),
    Transporter(NewTransporter),
}
