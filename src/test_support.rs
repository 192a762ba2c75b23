//! In-process mock of the studio REST API for tests.
//!
//! Binds an axum router to `127.0.0.1:0` and records how often each endpoint
//! was hit. Access tokens are JWT-shaped with a real `exp`, and only tokens
//! the mock issued (or explicitly allowed) pass the bearer check.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};

use crate::token::now_millis;
use crate::token::test_tokens::token_with_claims;

pub(crate) const VALID_EMAIL: &str = "a@b.com";
pub(crate) const VALID_PASSWORD: &str = "longenough1";

#[derive(Default)]
pub(crate) struct MockInner {
    pub(crate) issued: u64,
    pub(crate) login_calls: usize,
    pub(crate) refresh_calls: usize,
    pub(crate) protected_calls: usize,
    pub(crate) valid_access: HashSet<String>,
    pub(crate) refresh_fails: bool,
    pub(crate) rotate_refresh: bool,
    pub(crate) always_unauthorized: bool,
    pub(crate) last_upload: Option<String>,
    pub(crate) deleted_videos: Vec<u64>,
    pub(crate) rejected_bookings: Vec<u64>,
}

#[derive(Clone, Default)]
pub(crate) struct MockState {
    inner: Arc<Mutex<MockInner>>,
}

impl MockState {
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut MockInner) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }

    /// Mint a fresh access token; a serial `jti` keeps tokens issued in the same second distinct.
    fn issue_access(&self, lifetime_secs: i64) -> String {
        let now = i64::try_from(now_millis() / 1000).unwrap();
        self.with(|m| {
            m.issued += 1;
            let token = token_with_claims(&json!({ "exp": now + lifetime_secs, "jti": m.issued }));
            m.valid_access.insert(token.clone());
            token
        })
    }

    fn authorize(&self, headers: &HeaderMap) -> bool {
        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_owned);
        self.with(|m| {
            m.protected_calls += 1;
            !m.always_unauthorized && bearer.is_some_and(|b| m.valid_access.contains(&b))
        })
    }
}

pub(crate) struct MockApi {
    pub(crate) base_url: String,
    pub(crate) state: MockState,
}

impl MockApi {
    pub(crate) fn login_calls(&self) -> usize {
        self.state.with(|m| m.login_calls)
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.state.with(|m| m.refresh_calls)
    }

    pub(crate) fn protected_calls(&self) -> usize {
        self.state.with(|m| m.protected_calls)
    }
}

/// Start the mock API and return its base URL and shared state.
pub(crate) async fn spawn_mock_api() -> MockApi {
    let state = MockState::default();
    let app = Router::new()
        .route("/user/login/", post(login))
        .route("/user/token/refresh/", post(refresh))
        .route("/user/users/", get(list_users))
        .route("/dashboard/analytics/", get(analytics))
        .route("/dashboard/videos/", get(list_videos).post(upload_video))
        .route("/dashboard/videos/{id}/", get(get_video).delete(delete_video))
        .route("/booking/bookings/", get(list_bookings))
        .route("/booking/bookings/{id}/reject/", get(reject_booking))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    MockApi { base_url: format!("http://{addr}"), state }
}

// =============================================================================
// AUTH HANDLERS
// =============================================================================

async fn login(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.with(|m| m.login_calls += 1);
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if email != VALID_EMAIL || password != VALID_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found with the given credentials" })),
        )
            .into_response();
    }
    let access = state.issue_access(3600);
    Json(json!({
        "access": access,
        "refresh": "refresh-1",
        "email": email,
        "full_name": "Ana B",
        "role": "admin",
    }))
    .into_response()
}

async fn refresh(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    // Keep the exchange outstanding long enough for concurrent callers to pile up.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let (calls, fails, rotate) = state.with(|m| {
        m.refresh_calls += 1;
        (m.refresh_calls, m.refresh_fails, m.rotate_refresh)
    });
    if fails || body["refresh"].as_str().is_none_or(str::is_empty) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Token is invalid or expired" }))).into_response();
    }
    let access = state.issue_access(3600);
    if rotate {
        Json(json!({ "access": access, "refresh": format!("refresh-rotated-{calls}") })).into_response()
    } else {
        Json(json!({ "access": access })).into_response()
    }
}

// =============================================================================
// DASHBOARD HANDLERS
// =============================================================================

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Given token not valid for any token type" }))).into_response()
}

fn video(id: u64) -> Value {
    json!({
        "id": id,
        "title": format!("Reformer basics {id}"),
        "description": "Intro session",
        "video_file": format!("https://cdn.studio.test/videos/{id}.mp4"),
        "created_at": "2025-05-01T10:00:00Z",
    })
}

async fn analytics(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    Json(json!({
        "total_bookings": 42,
        "total_confirmed_bookings": 30,
        "total_canceled_bookings": 4,
        "confirmed_last_7_days": 5,
        "confirmed_last_30_days": 18,
        "confirmed_last_3_months": 29,
        "total_students": 25,
        "total_teachers": 3,
    }))
    .into_response()
}

async fn list_videos(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    Json(json!({ "count": 2, "next": null, "previous": null, "results": [video(1), video(2)] })).into_response()
}

async fn get_video(State(state): State<MockState>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    if id > 100 {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response();
    }
    Json(video(id)).into_response()
}

async fn delete_video(State(state): State<MockState>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    state.with(|m| m.deleted_videos.push(id));
    StatusCode::NO_CONTENT.into_response()
}

async fn upload_video(State(state): State<MockState>, headers: HeaderMap, body: Bytes) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    let text = String::from_utf8_lossy(&body).into_owned();
    if !text.contains("name=\"video_file\"") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "message": "video_file is required" }))).into_response();
    }
    state.with(|m| m.last_upload = Some(text));
    (StatusCode::CREATED, Json(video(3))).into_response()
}

async fn list_bookings(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<std::collections::HashMap<String, String>>,
) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    let page = query.get("page").cloned().unwrap_or_else(|| "1".into());
    Json(json!({
        "count": 1,
        "next": null,
        "previous": null,
        "results": [{
            "id": 9,
            "title": format!("Mat class page {page}"),
            "booking_date": "2025-06-01",
            "time_slot": "09:00",
            "status": "pending",
            "students": [1, 2],
            "created_at": "2025-05-20T08:00:00Z",
            "approve": false,
        }],
    }))
    .into_response()
}

async fn reject_booking(State(state): State<MockState>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    state.with(|m| m.rejected_bookings.push(id));
    Json(json!({ "status": "cancelled" })).into_response()
}

async fn list_users(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<std::collections::HashMap<String, String>>,
) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    let role = query.get("role").cloned().unwrap_or_else(|| "student".into());
    Json(json!({
        "count": 1,
        "next": null,
        "previous": null,
        "results": [{
            "id": 5,
            "email": format!("{role}@studio.test"),
            "full_name": "Bea C",
            "role": role,
            "bio": null,
            "contact_number": null,
            "photo": null,
        }],
    }))
    .into_response()
}
