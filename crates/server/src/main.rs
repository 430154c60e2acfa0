use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use server_api::{
    approve_license, create_license_request, create_licensee, create_owner, create_song,
    get_all_songs, get_license, get_licensee, get_licensee_licenses, get_owner_license_requests,
    get_song, get_song_owner, greet, revoke_license, ApiContext,
};
use shared::{
    domain::{License, LicenseId, Licensee, LicenseeId, Owner, OwnerId, OwnerSummary, Song, SongId},
    error::{ApiError, ErrorCode},
    protocol::{
        GreetRequest, GreetResponse, LicensePayload, LicenseePayload, OwnerPayload,
        ProtectedPayload, SongPayload,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info};

mod config;

use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/greet", post(http_greet))
        .route("/songs", get(http_list_songs).post(http_create_song))
        .route("/songs/:song_id", get(http_get_song))
        .route("/songs/:song_id/owner", get(http_get_song_owner))
        .route("/owners", post(http_create_owner))
        .route(
            "/owners/:owner_id/license_requests",
            get(http_owner_license_requests),
        )
        .route("/licensees", post(http_create_licensee))
        .route("/licensees/:licensee_id", get(http_get_licensee))
        .route(
            "/licensees/:licensee_id/licenses",
            get(http_licensee_licenses),
        )
        .route("/licenses", post(http_create_license))
        .route("/licenses/:license_id", get(http_get_license))
        .route("/licenses/:license_id/approve", post(http_approve_license))
        .route("/licenses/:license_id/revoke", post(http_revoke_license))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::InvalidPayload => StatusCode::BAD_REQUEST,
        ErrorCode::AlreadyApproved => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(err.code);
    if status.is_server_error() {
        error!(code = ?err.code, message = %err.message, "request failed");
    } else {
        debug!(code = ?err.code, message = %err.message, "request rejected");
    }
    (status, Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.api.storage.health_check().await.map_err(|error| {
        error!(%error, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

async fn http_greet(Json(req): Json<GreetRequest>) -> Json<GreetResponse> {
    debug!(name_len = req.name.len(), "greet");
    Json(GreetResponse {
        greeting: greet(&req.name),
    })
}

async fn http_list_songs(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Song>> {
    get_all_songs(&state.api).await.map(Json).map_err(reject)
}

async fn http_get_song(
    State(state): State<Arc<AppState>>,
    Path(song_id): Path<i64>,
) -> ApiResult<Song> {
    get_song(&state.api, SongId(song_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_song(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SongPayload>,
) -> ApiResult<Song> {
    create_song(&state.api, payload)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_get_song_owner(
    State(state): State<Arc<AppState>>,
    Path(song_id): Path<i64>,
) -> ApiResult<OwnerSummary> {
    get_song_owner(&state.api, SongId(song_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_owner(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OwnerPayload>,
) -> ApiResult<Owner> {
    create_owner(&state.api, payload)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_owner_license_requests(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<i64>,
) -> ApiResult<Vec<License>> {
    get_owner_license_requests(&state.api, OwnerId(owner_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_licensee(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LicenseePayload>,
) -> ApiResult<Licensee> {
    create_licensee(&state.api, payload)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_get_licensee(
    State(state): State<Arc<AppState>>,
    Path(licensee_id): Path<i64>,
) -> ApiResult<Licensee> {
    get_licensee(&state.api, LicenseeId(licensee_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_licensee_licenses(
    State(state): State<Arc<AppState>>,
    Path(licensee_id): Path<i64>,
) -> ApiResult<Vec<License>> {
    get_licensee_licenses(&state.api, LicenseeId(licensee_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_license(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LicensePayload>,
) -> ApiResult<License> {
    create_license_request(&state.api, payload)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_get_license(
    State(state): State<Arc<AppState>>,
    Path(license_id): Path<i64>,
) -> ApiResult<License> {
    get_license(&state.api, LicenseId(license_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_approve_license(
    State(state): State<Arc<AppState>>,
    Path(license_id): Path<i64>,
    Json(payload): Json<ProtectedPayload>,
) -> ApiResult<License> {
    approve_license(&state.api, LicenseId(license_id), &payload.auth_key)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_revoke_license(
    State(state): State<Arc<AppState>>,
    Path(license_id): Path<i64>,
    Json(payload): Json<ProtectedPayload>,
) -> ApiResult<License> {
    revoke_license(&state.api, LicenseId(license_id), &payload.auth_key)
        .await
        .map(Json)
        .map_err(reject)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
