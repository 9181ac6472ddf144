use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{
    ApplicationId, ApplicationStatus, DriverId, DriverUpdate, FleetOwnerId, FleetOwnerUpdate,
    JobId, JobStatus, JobUpdate, NewApplication, NewDriver, NewFleetOwner, NewJob,
    NewNotification, NewTransporter, NewTrip, NotificationId, TransporterId, TransporterUpdate,
    TripCompletion, TripId, UserId,
};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::jobs::{ApplicantFilter, JobFilter};
use super::registration::{
    CompleteRegistration, RegistrationError, StartRegistration, VerifyRegistration,
};
use super::service::{MarketplaceError, MarketplaceService};
use super::storage::{MarketplaceStorage, StorageError};

type SharedService<S> = State<Arc<MarketplaceService<S>>>;

/// Router builder exposing the marketplace HTTP API under `/api/v1`.
pub fn marketplace_router<S>(service: Arc<MarketplaceService<S>>) -> Router
where
    S: MarketplaceStorage + 'static,
{
    Router::new()
        .route(
            "/api/v1/registration/start",
            post(start_registration_handler::<S>),
        )
        .route(
            "/api/v1/registration/verify",
            post(verify_registration_handler::<S>),
        )
        .route(
            "/api/v1/registration/complete",
            post(complete_registration_handler::<S>),
        )
        .route("/api/v1/users/:id", get(user_handler::<S>))
        .route(
            "/api/v1/users/:id/notifications",
            get(notifications_handler::<S>),
        )
        .route(
            "/api/v1/users/:id/notifications/read-all",
            post(mark_all_read_handler::<S>),
        )
        .route(
            "/api/v1/drivers",
            get(list_drivers_handler::<S>).post(create_driver_handler::<S>),
        )
        .route(
            "/api/v1/drivers/:id",
            get(driver_handler::<S>).patch(update_driver_handler::<S>),
        )
        .route(
            "/api/v1/drivers/:id/completion",
            get(driver_completion_handler::<S>),
        )
        .route(
            "/api/v1/drivers/:id/applications",
            get(driver_applications_handler::<S>),
        )
        .route(
            "/api/v1/drivers/:id/recommended-jobs",
            get(recommended_jobs_handler::<S>),
        )
        .route(
            "/api/v1/drivers/:id/trips",
            get(driver_trips_handler::<S>).post(log_trip_handler::<S>),
        )
        .route(
            "/api/v1/drivers/:id/trips/summary",
            get(trip_summary_handler::<S>),
        )
        .route(
            "/api/v1/drivers/:id/trips/export",
            get(export_trips_handler::<S>),
        )
        .route(
            "/api/v1/fleet-owners",
            get(list_fleet_owners_handler::<S>).post(create_fleet_owner_handler::<S>),
        )
        .route(
            "/api/v1/fleet-owners/:id",
            get(fleet_owner_handler::<S>).patch(update_fleet_owner_handler::<S>),
        )
        .route(
            "/api/v1/transporters",
            get(list_transporters_handler::<S>).post(create_transporter_handler::<S>),
        )
        .route(
            "/api/v1/transporters/:id",
            get(transporter_handler::<S>).patch(update_transporter_handler::<S>),
        )
        .route(
            "/api/v1/jobs",
            get(list_jobs_handler::<S>).post(create_job_handler::<S>),
        )
        .route(
            "/api/v1/jobs/:id",
            get(job_handler::<S>)
                .patch(update_job_handler::<S>)
                .delete(delete_job_handler::<S>),
        )
        .route("/api/v1/jobs/:id/status", post(job_status_handler::<S>))
        .route(
            "/api/v1/jobs/:id/applications",
            get(job_applications_handler::<S>),
        )
        .route("/api/v1/jobs/:id/stats", get(job_stats_handler::<S>))
        .route("/api/v1/applications", post(apply_handler::<S>))
        .route("/api/v1/applications/:id", get(application_handler::<S>))
        .route(
            "/api/v1/applications/:id/status",
            post(application_status_handler::<S>),
        )
        .route("/api/v1/trips/:id/start", post(start_trip_handler::<S>))
        .route(
            "/api/v1/trips/:id/complete",
            post(complete_trip_handler::<S>),
        )
        .route("/api/v1/trips/:id/cancel", post(cancel_trip_handler::<S>))
        .route(
            "/api/v1/notifications",
            post(create_notification_handler::<S>),
        )
        .route(
            "/api/v1/notifications/:id/read",
            post(mark_read_handler::<S>),
        )
        .with_state(service)
}

/// HTTP status for a service error.
pub fn status_for(error: &MarketplaceError) -> StatusCode {
    match error {
        MarketplaceError::Validation(_) => StatusCode::BAD_REQUEST,
        MarketplaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        MarketplaceError::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
        MarketplaceError::Storage(StorageError::Conflict(_)) => StatusCode::CONFLICT,
        MarketplaceError::Storage(StorageError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        MarketplaceError::JobTransition(_)
        | MarketplaceError::ApplicationTransition(_)
        | MarketplaceError::TripTransition(_)
        | MarketplaceError::JobNotOpen { .. } => StatusCode::CONFLICT,
        MarketplaceError::Registration(error) => match error {
            RegistrationError::UnknownSession(_) => StatusCode::NOT_FOUND,
            RegistrationError::Expired(_) => StatusCode::GONE,
            RegistrationError::Locked => StatusCode::TOO_MANY_REQUESTS,
            RegistrationError::InvalidOtp { .. } | RegistrationError::RoleMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            RegistrationError::WrongStep { .. } | RegistrationError::AlreadyRegistered(_) => {
                StatusCode::CONFLICT
            }
            RegistrationError::Delivery(_) => StatusCode::BAD_GATEWAY,
        },
        MarketplaceError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(error: MarketplaceError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        error!(error = %error, "marketplace request failed");
    }
    let mut payload = json!({
        "error": error.to_string(),
    });
    if let MarketplaceError::Registration(RegistrationError::InvalidOtp { attempts_left }) = error
    {
        payload["attempts_left"] = json!(attempts_left);
    }
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, MarketplaceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct JobStatusChange {
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ApplicationStatusChange {
    pub status: ApplicationStatus,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct NotificationQuery {
    pub unread_only: bool,
}

/// Driver trip logs arrive without the driver id; it comes from the path.
#[derive(Debug, Clone, Deserialize)]
pub struct TripLogRequest {
    pub vehicle_number: String,
    pub origin: String,
    pub destination: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

// Registration

pub(crate) async fn start_registration_handler<S>(
    State(service): SharedService<S>,
    ApiJson(request): ApiJson<StartRegistration>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::CREATED, service.start_registration(request))
}

pub(crate) async fn verify_registration_handler<S>(
    State(service): SharedService<S>,
    ApiJson(request): ApiJson<VerifyRegistration>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.verify_registration(request))
}

pub(crate) async fn complete_registration_handler<S>(
    State(service): SharedService<S>,
    ApiJson(request): ApiJson<CompleteRegistration>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::CREATED, service.complete_registration(request))
}

// Users and notifications

pub(crate) async fn user_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.user(UserId(id)))
}

pub(crate) async fn notifications_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    let user_id = UserId(id);
    let result = service.notifications(user_id, query.unread_only).and_then(|items| {
        let unread = service.unread_count(user_id)?;
        Ok(json!({
            "unread": unread,
            "notifications": items,
        }))
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn mark_all_read_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    let result = service
        .mark_all_read(UserId(id))
        .map(|updated| json!({ "updated": updated }));
    respond(StatusCode::OK, result)
}

pub(crate) async fn create_notification_handler<S>(
    State(service): SharedService<S>,
    ApiJson(notification): ApiJson<NewNotification>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::CREATED, service.create_notification(notification))
}

pub(crate) async fn mark_read_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(
        StatusCode::OK,
        service.mark_notification_read(NotificationId(id)),
    )
}

// Drivers

pub(crate) async fn list_drivers_handler<S>(State(service): SharedService<S>) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.drivers())
}

pub(crate) async fn create_driver_handler<S>(
    State(service): SharedService<S>,
    ApiJson(driver): ApiJson<NewDriver>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::CREATED, service.create_driver(driver))
}

pub(crate) async fn driver_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.driver(DriverId(id)))
}

pub(crate) async fn update_driver_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(update): ApiJson<DriverUpdate>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.update_driver(DriverId(id), update))
}

pub(crate) async fn driver_completion_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.driver_completion(DriverId(id)))
}

pub(crate) async fn driver_applications_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.driver_applications(DriverId(id)))
}

pub(crate) async fn recommended_jobs_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.recommended_jobs(DriverId(id)))
}

// Trips

pub(crate) async fn driver_trips_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.driver_trips(DriverId(id)))
}

pub(crate) async fn log_trip_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(request): ApiJson<TripLogRequest>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    let trip = NewTrip {
        driver_id: DriverId(id),
        vehicle_number: request.vehicle_number,
        origin: request.origin,
        destination: request.destination,
        started_at: request.started_at,
        notes: request.notes,
    };
    respond(StatusCode::CREATED, service.log_trip(trip))
}

pub(crate) async fn trip_summary_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.trip_summary(DriverId(id)))
}

pub(crate) async fn export_trips_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    match service.export_trips(DriverId(id)) {
        Ok(csv) => {
            let disposition = format!("attachment; filename=\"driver-{id}-trips.csv\"");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                csv,
            )
                .into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn start_trip_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.start_trip(TripId(id)))
}

pub(crate) async fn complete_trip_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(completion): ApiJson<TripCompletion>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.complete_trip(TripId(id), completion))
}

pub(crate) async fn cancel_trip_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.cancel_trip(TripId(id)))
}

// Fleet owners and transporters

pub(crate) async fn list_fleet_owners_handler<S>(State(service): SharedService<S>) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.fleet_owners())
}

pub(crate) async fn create_fleet_owner_handler<S>(
    State(service): SharedService<S>,
    ApiJson(owner): ApiJson<NewFleetOwner>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::CREATED, service.create_fleet_owner(owner))
}

pub(crate) async fn fleet_owner_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.fleet_owner(FleetOwnerId(id)))
}

pub(crate) async fn update_fleet_owner_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(update): ApiJson<FleetOwnerUpdate>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(
        StatusCode::OK,
        service.update_fleet_owner(FleetOwnerId(id), update),
    )
}

pub(crate) async fn list_transporters_handler<S>(State(service): SharedService<S>) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.transporters())
}

pub(crate) async fn create_transporter_handler<S>(
    State(service): SharedService<S>,
    ApiJson(transporter): ApiJson<NewTransporter>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::CREATED, service.create_transporter(transporter))
}

pub(crate) async fn transporter_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.transporter(TransporterId(id)))
}

pub(crate) async fn update_transporter_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(update): ApiJson<TransporterUpdate>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(
        StatusCode::OK,
        service.update_transporter(TransporterId(id), update),
    )
}

// Jobs

pub(crate) async fn list_jobs_handler<S>(
    State(service): SharedService<S>,
    ApiQuery(filter): ApiQuery<JobFilter>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.jobs(&filter))
}

pub(crate) async fn create_job_handler<S>(
    State(service): SharedService<S>,
    ApiJson(job): ApiJson<NewJob>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::CREATED, service.create_job(job))
}

pub(crate) async fn job_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.job(JobId(id)))
}

pub(crate) async fn update_job_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(update): ApiJson<JobUpdate>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.update_job(JobId(id), update))
}

pub(crate) async fn delete_job_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    match service.delete_job(JobId(id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn job_status_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(change): ApiJson<JobStatusChange>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(
        StatusCode::OK,
        service.change_job_status(JobId(id), change.status),
    )
}

pub(crate) async fn job_applications_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(filter): ApiQuery<ApplicantFilter>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.job_applications(JobId(id), filter))
}

pub(crate) async fn job_stats_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.job_stats(JobId(id)))
}

// Applications

pub(crate) async fn apply_handler<S>(
    State(service): SharedService<S>,
    ApiJson(application): ApiJson<NewApplication>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::CREATED, service.apply(application))
}

pub(crate) async fn application_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(StatusCode::OK, service.application(ApplicationId(id)))
}

pub(crate) async fn application_status_handler<S>(
    State(service): SharedService<S>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(change): ApiJson<ApplicationStatusChange>,
) -> Response
where
    S: MarketplaceStorage + 'static,
{
    respond(
        StatusCode::OK,
        service.change_application_status(ApplicationId(id), change.status),
    )
}
