use super::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::error::ErrorCode;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct ServerState {
    greeted: Arc<Mutex<Vec<String>>>,
}

async fn handle_greet(
    State(state): State<ServerState>,
    Json(req): Json<GreetRequest>,
) -> Json<GreetResponse> {
    state.greeted.lock().expect("greeted").push(req.name.clone());
    Json(GreetResponse {
        greeting: format!("Hello, {}!", req.name),
    })
}

async fn handle_get_song(
    Path(song_id): Path<i64>,
) -> Result<Json<Song>, (StatusCode, Json<ApiError>)> {
    Err((
        StatusCode::NOT_FOUND,
        Json(ApiError::not_found(format!(
            "song id:{song_id} could not be found"
        ))),
    ))
}

async fn handle_broken() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "upstream exploded")
}

async fn spawn_backend() -> anyhow::Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/greet", post(handle_greet))
        .route("/songs/:song_id", get(handle_get_song))
        .route("/songs", get(handle_broken))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

#[test]
fn rejects_non_http_server_url() {
    let err = BackendClient::new("ftp://example.com").err().expect("should fail");
    assert!(matches!(err, ClientError::InvalidServerUrl { .. }));

    let err = BackendClient::new("not a url").err().expect("should fail");
    assert!(matches!(err, ClientError::InvalidServerUrl { .. }));
}

#[test]
fn trims_trailing_slash_from_server_url() {
    let client = BackendClient::new("http://127.0.0.1:8080/").expect("client");
    assert_eq!(client.server_url(), "http://127.0.0.1:8080");
}

#[tokio::test]
async fn greet_posts_name_and_returns_greeting() {
    let (server_url, state) = spawn_backend().await.expect("spawn server");
    let client = BackendClient::new(&server_url).expect("client");

    let greeting = client.greet("Alice").await.expect("greet");

    assert_eq!(greeting, "Hello, Alice!");
    assert_eq!(
        state.greeted.lock().expect("greeted").clone(),
        vec!["Alice".to_string()]
    );
}

#[tokio::test]
async fn api_errors_are_decoded() {
    let (server_url, _state) = spawn_backend().await.expect("spawn server");
    let client = BackendClient::new(&server_url).expect("client");

    let err = client.get_song(SongId(5)).await.expect_err("should fail");
    let api_error = err.api_error().expect("api error");
    assert_eq!(api_error.code, ErrorCode::NotFound);
    assert_eq!(api_error.message, "song id:5 could not be found");
}

#[tokio::test]
async fn non_json_error_bodies_report_status() {
    let (server_url, _state) = spawn_backend().await.expect("spawn server");
    let client = BackendClient::new(&server_url).expect("client");

    let err = client.list_songs().await.expect_err("should fail");
    assert!(matches!(err, ClientError::UnexpectedStatus { status: 502, .. }));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = BackendClient::new(&format!("http://{addr}")).expect("client");
    let err = client.greet("Alice").await.expect_err("should fail");
    assert!(matches!(err, ClientError::Transport { .. }));
}

#[tokio::test]
async fn form_handler_greets_through_backend_client() {
    let (server_url, state) = spawn_backend().await.expect("spawn server");
    let client = Arc::new(BackendClient::new(&server_url).expect("client"));
    let form = Arc::new(FormModel::with_name("Alice"));
    let handler = SubmitHandler::new(client, form.clone(), form.clone());

    let event = SubmitEvent::new(form.as_ref());
    assert_eq!(handler.handle_submit(&event).await, EventFlow::Stop);

    let snapshot = form.snapshot();
    assert_eq!(snapshot.greeting.as_deref(), Some("Hello, Alice!"));
    assert!(!snapshot.submit_disabled);
    assert_eq!(state.greeted.lock().expect("greeted").len(), 1);
}
