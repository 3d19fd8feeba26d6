//! Drives `HttpBackend` against an in-process axum server that speaks the
//! tracking backend's contract.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use pboss_client::{ApiError, Backend, HttpBackend};
use pboss_core::StartRequest;

#[derive(Default)]
struct FakeDay {
    consent: bool,
    day: Option<StartRequest>,
    polls: u32,
}

type Shared = Arc<Mutex<FakeDay>>;

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/personas", get(personas))
        .route("/api/prefs", get(prefs))
        .route("/api/consent", post(consent))
        .route("/api/start_day", post(start_day))
        .route("/api/status", get(status))
        .route("/api/end_day", get(end_day))
        .with_state(state)
}

async fn personas() -> Json<Value> {
    Json(json!([
        {"id": "coach", "name": "Coach", "icon": "🏋"},
        {"id": "zen", "name": "Zen Master", "icon": ""}
    ]))
}

async fn prefs(State(state): State<Shared>) -> Json<Value> {
    let s = state.lock().unwrap();
    Json(json!({
        "consent_given": s.consent,
        "last_persona": "",
        "notification_interval": 15
    }))
}

async fn consent(State(state): State<Shared>) -> Json<Value> {
    state.lock().unwrap().consent = true;
    Json(json!({"status": "consent recorded"}))
}

async fn start_day(
    State(state): State<Shared>,
    Json(body): Json<StartRequest>,
) -> (StatusCode, Json<Value>) {
    let mut s = state.lock().unwrap();
    if s.day.is_some() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Day already started"})));
    }
    if body.persona != "coach" && body.persona != "zen" {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid persona"})));
    }
    if !s.consent {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "Consent required"})));
    }
    s.day = Some(body);
    (
        StatusCode::OK,
        Json(json!({"status": "started", "initial_message": null})),
    )
}

async fn status(State(state): State<Shared>) -> (StatusCode, Json<Value>) {
    let mut s = state.lock().unwrap();
    if s.day.is_none() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "No active session"})));
    }
    s.polls += 1;
    let message = if s.polls == 2 { "Back to work!" } else { "" };
    (
        StatusCode::OK,
        Json(json!({
            "work_time": 125 * s.polls,
            "distraction_time": 0,
            "idle_time": 40,
            "message": message
        })),
    )
}

async fn end_day(State(state): State<Shared>) -> (StatusCode, Json<Value>) {
    let mut s = state.lock().unwrap();
    if s.day.take().is_none() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "No active session"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "work_time": 7384,
            "distraction_time": 300,
            "idle_time": 40,
            "persona_report": "Great job today!"
        })),
    )
}

async fn spawn_backend(state: Shared) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn full_day_over_http() {
    let state = Shared::default();
    let url = spawn_backend(state.clone()).await;
    let backend = HttpBackend::new(&url, None).unwrap();

    let personas = backend.list_personas().await.unwrap();
    assert_eq!(personas.len(), 2);
    assert_eq!(personas[0].label(), "🏋 Coach");
    assert_eq!(personas[1].label(), "Zen Master");

    let prefs = backend.preferences().await.unwrap();
    assert!(!prefs.consent_given);
    assert!(prefs.preselected().is_none());

    backend.accept_consent().await.unwrap();
    assert!(backend.preferences().await.unwrap().consent_given);

    let req = StartRequest {
        goals: "write the report".into(),
        persona: "coach".into(),
    };
    let started = backend.start_day(&req).await.unwrap();
    assert!(started.initial_message().is_none());
    assert_eq!(state.lock().unwrap().day.as_ref(), Some(&req));

    let first = backend.status().await.unwrap();
    assert_eq!(first.work_time, 125.0);
    assert!(first.nudge().is_none());
    let second = backend.status().await.unwrap();
    assert_eq!(second.nudge(), Some("Back to work!"));

    let end = backend.end_day().await.unwrap();
    assert_eq!(end.work_time, 7384.0);
    assert_eq!(end.persona_report.as_deref(), Some("Great job today!"));
}

#[tokio::test]
async fn rejected_start_carries_backend_error_text() {
    let state = Shared::default();
    state.lock().unwrap().consent = true;
    let url = spawn_backend(state).await;
    let backend = HttpBackend::new(&url, None).unwrap();

    let err = backend
        .start_day(&StartRequest {
            goals: String::new(),
            persona: "nobody".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 400, .. }));
    assert_eq!(err.backend_message().as_deref(), Some("Invalid persona"));
}

#[tokio::test]
async fn status_without_a_day_is_a_status_error() {
    let url = spawn_backend(Shared::default()).await;
    let backend = HttpBackend::new(&url, None).unwrap();
    let err = backend.status().await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 400, .. }));
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpBackend::new(&format!("http://{addr}"), None).unwrap();
    let err = backend.list_personas().await.unwrap_err();
    assert!(err.is_unreachable(), "unexpected error: {err}");
}
