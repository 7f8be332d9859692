use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use course_core::model::{CompletionRecord, ContentId, CourseId, SectionId, UserId};
use serde_json::json;
use services::{
    ApiClient, ApiConfig, ApiError, Clock, LoginResponse, ProgressBackend, SessionEvent,
    SessionManager,
};
use storage::repository::Storage;
use tokio::sync::broadcast::Receiver;

type Hits = Arc<AtomicUsize>;

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn client_for(base: &str, max_retries: u32) -> (ApiClient, Arc<SessionManager>) {
    let session = Arc::new(SessionManager::new(
        Storage::in_memory(),
        Clock::default_clock(),
    ));
    let config = ApiConfig::new(base)
        .unwrap()
        .with_retries(max_retries, Duration::ZERO)
        .with_timeout(Duration::from_secs(5));
    let client = ApiClient::new(config, session.clone()).unwrap();
    (client, session)
}

fn valid_token() -> String {
    let exp = Utc::now().timestamp() + 3600;
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"role":"student"}}"#));
    format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig")
}

async fn logged_in(session: &SessionManager) -> String {
    let token = valid_token();
    session
        .store_login(&LoginResponse {
            token: token.clone(),
            refresh_token: None,
            user_id: Some(UserId::new(5)),
        })
        .await;
    token
}

fn record() -> CompletionRecord {
    CompletionRecord {
        course_id: CourseId::new(1),
        section_id: SectionId::new(2),
        content_id: ContentId::new(3),
        user_id: UserId::new(5),
    }
}

fn drain(events: &mut Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

#[tokio::test]
async fn unauthorized_response_logs_out_exactly_once() {
    async fn reject(State(hits): State<Hits>) -> StatusCode {
        hits.fetch_add(1, Ordering::SeqCst);
        StatusCode::UNAUTHORIZED
    }
    let hits = Hits::default();
    let base = spawn(
        Router::new()
            .route("/api/progress/complete", post(reject))
            .with_state(hits.clone()),
    )
    .await;
    let (client, session) = client_for(&base, 2);
    logged_in(&session).await;
    let mut events = session.subscribe();

    let err = client.mark_complete(&record()).await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(session.token().await.is_none());
    assert_eq!(
        drain(&mut events),
        vec![
            SessionEvent::LoggedOut,
            SessionEvent::LoginRequired {
                route: "/login".into()
            },
        ]
    );
}

#[tokio::test]
async fn gateway_timeouts_are_retried() {
    async fn flaky(State(hits): State<Hits>) -> Response {
        if hits.fetch_add(1, Ordering::SeqCst) < 2 {
            (StatusCode::GATEWAY_TIMEOUT, "upstream timeout").into_response()
        } else {
            "Content marked as completed".into_response()
        }
    }
    let hits = Hits::default();
    let base = spawn(
        Router::new()
            .route("/api/progress/complete", post(flaky))
            .with_state(hits.clone()),
    )
    .await;
    let (client, session) = client_for(&base, 2);
    logged_in(&session).await;

    client.mark_complete(&record()).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(session.is_authenticated().await);
}

#[tokio::test]
async fn retries_are_bounded_and_keep_the_session() {
    async fn timeout(State(hits): State<Hits>) -> StatusCode {
        hits.fetch_add(1, Ordering::SeqCst);
        StatusCode::REQUEST_TIMEOUT
    }
    let hits = Hits::default();
    let base = spawn(
        Router::new()
            .route("/api/progress/complete", post(timeout))
            .with_state(hits.clone()),
    )
    .await;
    let (client, session) = client_for(&base, 1);
    logged_in(&session).await;

    let err = client.mark_complete(&record()).await.unwrap_err();

    assert_eq!(err.status(), Some(reqwest::StatusCode::REQUEST_TIMEOUT));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(session.is_authenticated().await);
}

#[tokio::test]
async fn application_errors_surface_backend_message() {
    async fn missing(State(hits): State<Hits>) -> Response {
        hits.fetch_add(1, Ordering::SeqCst);
        (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Course not found", "status": 404})),
        )
            .into_response()
    }
    let hits = Hits::default();
    let base = spawn(
        Router::new()
            .route("/api/progress/users/{user}/courses/{course}", get(missing))
            .with_state(hits.clone()),
    )
    .await;
    let (client, session) = client_for(&base, 2);
    logged_in(&session).await;

    let err = client
        .course_progress(UserId::new(5), CourseId::new(404))
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Course not found");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(session.is_authenticated().await);
}

#[tokio::test]
async fn login_stores_token_and_later_requests_carry_it() {
    let token = valid_token();
    let issued = token.clone();
    let expected = format!("Bearer {token}");

    let router = Router::new()
        .route(
            "/api/auth/login",
            post(move || {
                let issued = issued.clone();
                async move {
                    Json(json!({"token": issued, "refreshToken": "r-1", "userId": 5}))
                }
            }),
        )
        .route(
            "/api/progress/users/{user}/courses/{course}",
            get(
                move |Path((user, course)): Path<(u64, u64)>, headers: HeaderMap| {
                    let expected = expected.clone();
                    async move {
                        let auth = headers
                            .get(AUTHORIZATION)
                            .and_then(|value| value.to_str().ok());
                        if auth != Some(expected.as_str()) || user != 5 || course != 1 {
                            return StatusCode::UNAUTHORIZED.into_response();
                        }
                        Json(json!({"completedContentIds": [3], "completePercentage": 0.5}))
                            .into_response()
                    }
                },
            ),
        );
    let base = spawn(router).await;
    let (client, session) = client_for(&base, 0);
    let mut events = session.subscribe();

    let login = client.login("ada@example.test", "secret").await.unwrap();
    assert_eq!(login.token, token);
    assert_eq!(session.user_id().await, Some(UserId::new(5)));
    assert_eq!(session.refresh_token().await.as_deref(), Some("r-1"));

    let progress = client
        .course_progress(UserId::new(5), CourseId::new(1))
        .await
        .unwrap();
    assert_eq!(progress.to_string(), "50%");
    assert!(progress.contains(ContentId::new(3)));

    let seen = drain(&mut events);
    assert!(matches!(seen.first(), Some(SessionEvent::Created(_))));
    assert_eq!(
        seen.get(1),
        Some(&SessionEvent::LoggedIn {
            user_id: Some(UserId::new(5))
        })
    );
}

#[tokio::test]
async fn rejected_login_is_not_a_forced_logout() {
    let router = Router::new().route(
        "/api/auth/login",
        post(|| async { (StatusCode::UNAUTHORIZED, "Invalid credentials") }),
    );
    let base = spawn(router).await;
    let (client, session) = client_for(&base, 2);
    let mut events = session.subscribe();

    let err = client.login("ada@example.test", "wrong").await.unwrap_err();

    assert!(matches!(
        err,
        ApiError::Status { status, ref message }
            if status == reqwest::StatusCode::UNAUTHORIZED && message == "Invalid credentials"
    ));
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (client, session) = client_for(&format!("http://{addr}/api"), 1);
    logged_in(&session).await;

    let err = client.mark_complete(&record()).await.unwrap_err();

    assert!(matches!(err, ApiError::Transport(_)));
    assert!(session.is_authenticated().await);
}
