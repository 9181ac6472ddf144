use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::net::TcpListener;

use super::*;

#[derive(Default)]
struct Recorded {
    authorization: Option<String>,
    query: HashMap<String, String>,
    inserted: Option<Value>,
}

type Shared = Arc<Mutex<Recorded>>;

async fn list_resource(
    State(recorded): State<Shared>,
    Path(doctype): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    {
        let mut guard = recorded.lock().unwrap();
        guard.authorization = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        guard.query = query;
    }
    match doctype.as_str() {
        "Job Opening" => (
            StatusCode::OK,
            Json(json!({
                "data": [{
                    "name": "HR-OPN-2025-0007",
                    "job_title": "Tanker driver",
                    "status": "Open",
                    "location": "Jamnagar",
                    "lower_range": 26000.0
                }]
            })),
        ),
        "Driver" => (
            StatusCode::FORBIDDEN,
            Json(json!({ "exc_type": "PermissionError" })),
        ),
        _ => (StatusCode::OK, Json(json!({ "data": [] }))),
    }
}

async fn insert_resource(
    State(recorded): State<Shared>,
    Path(_doctype): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    recorded.lock().unwrap().inserted = Some(body.clone());
    Json(json!({
        "data": {
            "name": "HR-APP-2025-0101",
            "applicant_name": body["applicant_name"],
            "job_title": body["job_title"],
            "status": "Open"
        }
    }))
}

async fn get_resource(Path((_doctype, name)): Path<(String, String)>) -> impl IntoResponse {
    Json(json!({ "data": { "name": name, "job_title": "Bus driver", "status": "Closed" } }))
}

async fn spawn_frappe() -> (String, Shared) {
    let recorded: Shared = Arc::default();
    let app = Router::new()
        .route(
            "/api/resource/:doctype",
            get(list_resource).post(insert_resource),
        )
        .route("/api/resource/:doctype/:name", get(get_resource))
        .with_state(recorded.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}"), recorded)
}

fn client_for(base_url: String) -> FrappeClient {
    FrappeClient::from_config(&FrappeConfig {
        base_url: Some(base_url),
        api_key: Some("key123".to_string()),
        api_secret: Some("secret456".to_string()),
        timeout_secs: 5,
    })
    .expect("client builds")
}

#[test]
fn missing_base_url_is_not_configured() {
    let result = FrappeClient::from_config(&FrappeConfig::default());
    assert!(matches!(result, Err(FrappeError::NotConfigured)));
}

#[test]
fn query_params_follow_frappe_conventions() {
    let params = FrappeQuery::new()
        .fields(["name", "status"])
        .filter(FrappeFilter::eq("status", "Open"))
        .filter(FrappeFilter::like("location", "%Pune%"))
        .limit(20)
        .offset(40)
        .order_by("creation desc")
        .params();

    assert_eq!(
        params,
        vec![
            ("fields", r#"["name","status"]"#.to_string()),
            (
                "filters",
                r#"[["status","=","Open"],["location","like","%Pune%"]]"#.to_string()
            ),
            ("limit_page_length", "20".to_string()),
            ("limit_start", "40".to_string()),
            ("order_by", "creation desc".to_string()),
        ]
    );
    assert!(FrappeQuery::default().params().is_empty());
}

#[tokio::test]
async fn open_jobs_sends_token_and_unwraps_data() {
    let (base_url, recorded) = spawn_frappe().await;
    let client = client_for(base_url);

    let jobs = client.open_jobs(25).await.expect("jobs listed");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "HR-OPN-2025-0007");
    assert!(jobs[0].is_open());
    assert_eq!(jobs[0].lower_range, Some(26000.0));

    let recorded = recorded.lock().unwrap();
    assert_eq!(
        recorded.authorization.as_deref(),
        Some("token key123:secret456")
    );
    assert_eq!(recorded.query["limit_page_length"], "25");
    assert_eq!(recorded.query["filters"], r#"[["status","=","Open"]]"#);
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let (base_url, _) = spawn_frappe().await;
    let client = client_for(base_url);

    match client.drivers(&FrappeQuery::new()).await {
        Err(FrappeError::Status { status, body }) => {
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert!(body.contains("PermissionError"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn names_with_spaces_are_path_encoded() {
    let (base_url, _) = spawn_frappe().await;
    let client = client_for(format!("{base_url}/"));

    let job: FrappeJob = client
        .get(JOB_DOCTYPE, "HR OPN 2025 0001")
        .await
        .expect("job fetched");
    assert_eq!(job.name, "HR OPN 2025 0001");
    assert!(!job.is_open());
}

#[tokio::test]
async fn submit_application_posts_json() {
    let (base_url, recorded) = spawn_frappe().await;
    let client = client_for(base_url);

    let created = client
        .submit_application(&NewFrappeApplication {
            applicant_name: "Salim Khan".to_string(),
            phone_number: "9876501234".to_string(),
            email_id: None,
            job_title: "HR-OPN-2025-0007".to_string(),
            cover_letter: None,
        })
        .await
        .expect("application created");

    assert_eq!(created.name, "HR-APP-2025-0101");
    assert_eq!(created.applicant_name, "Salim Khan");
    let inserted = recorded.lock().unwrap().inserted.clone().expect("body sent");
    assert!(inserted.get("email_id").is_none());
}
