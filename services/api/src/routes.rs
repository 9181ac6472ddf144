use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use signodrive::error::AppError;
use signodrive::frappe::{
    FrappeApplication, FrappeClient, FrappeDriver, FrappeError, FrappeFilter, FrappeJob,
    FrappeQuery, NewFrappeApplication, JOB_DOCTYPE,
};
use signodrive::marketplace::{
    marketplace_router, ApiJson, ApiPath, ApiQuery, MarketplaceService, MarketplaceStorage,
};
use std::sync::Arc;

const DEFAULT_FRAPPE_PAGE: usize = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct FrappePage {
    pub(crate) limit: Option<usize>,
    pub(crate) offset: Option<usize>,
    pub(crate) search: Option<String>,
}

pub(crate) fn with_operational_routes<S>(service: Arc<MarketplaceService<S>>) -> axum::Router
where
    S: MarketplaceStorage + 'static,
{
    marketplace_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/frappe/jobs", get(frappe_jobs_endpoint))
        .route("/api/v1/frappe/jobs/:name", get(frappe_job_endpoint))
        .route(
            "/api/v1/frappe/jobs/:name/applications",
            get(frappe_job_applications_endpoint),
        )
        .route("/api/v1/frappe/drivers", get(frappe_drivers_endpoint))
        .route(
            "/api/v1/frappe/applications",
            axum::routing::post(frappe_submit_application_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn frappe_client(state: &AppState) -> Result<Arc<FrappeClient>, AppError> {
    state
        .frappe
        .clone()
        .ok_or(AppError::Frappe(FrappeError::NotConfigured))
}

pub(crate) async fn frappe_jobs_endpoint(
    Extension(state): Extension<AppState>,
    ApiQuery(page): ApiQuery<FrappePage>,
) -> Result<Json<Vec<FrappeJob>>, AppError> {
    let client = frappe_client(&state)?;
    let mut query = FrappeQuery::new()
        .fields(FrappeJob::FIELDS.iter().copied())
        .filter(FrappeFilter::eq("status", "Open"))
        .order_by("creation desc")
        .limit(page.limit.unwrap_or(DEFAULT_FRAPPE_PAGE))
        .offset(page.offset.unwrap_or(0));
    if let Some(search) = page.search.filter(|s| !s.trim().is_empty()) {
        query = query.filter(FrappeFilter::like("job_title", format!("%{}%", search.trim())));
    }
    Ok(Json(client.list(JOB_DOCTYPE, &query).await?))
}

pub(crate) async fn frappe_job_endpoint(
    Extension(state): Extension<AppState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<FrappeJob>, AppError> {
    let client = frappe_client(&state)?;
    Ok(Json(client.get(JOB_DOCTYPE, &name).await?))
}

pub(crate) async fn frappe_job_applications_endpoint(
    Extension(state): Extension<AppState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<Vec<FrappeApplication>>, AppError> {
    let client = frappe_client(&state)?;
    Ok(Json(client.applications_for_job(&name).await?))
}

pub(crate) async fn frappe_drivers_endpoint(
    Extension(state): Extension<AppState>,
    ApiQuery(page): ApiQuery<FrappePage>,
) -> Result<Json<Vec<FrappeDriver>>, AppError> {
    let client = frappe_client(&state)?;
    let mut query = FrappeQuery::new()
        .limit(page.limit.unwrap_or(DEFAULT_FRAPPE_PAGE))
        .offset(page.offset.unwrap_or(0));
    if let Some(search) = page.search.filter(|s| !s.trim().is_empty()) {
        query = query.filter(FrappeFilter::like("full_name", format!("%{}%", search.trim())));
    }
    Ok(Json(client.drivers(&query).await?))
}

pub(crate) async fn frappe_submit_application_endpoint(
    Extension(state): Extension<AppState>,
    ApiJson(application): ApiJson<NewFrappeApplication>,
) -> Result<(StatusCode, Json<FrappeApplication>), AppError> {
    let client = frappe_client(&state)?;
    let created = client.submit_application(&application).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
