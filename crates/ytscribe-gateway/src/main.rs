//! ytscribe gateway: authenticated transcript API.
//! POST /transcript and /transcript_simple; sled cache; token bootstrap on first run.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ytscribe_core::{
    bearer_token, GatewayConfig, ServiceError, TranscriptService, TranscriptStore, YouTubeFetcher,
};

#[derive(Clone)]
struct AppState {
    service: TranscriptService,
}

#[derive(Deserialize)]
struct TranscriptRequest {
    video_id: String,
}

/// Error body: `{"detail": "..."}`.
enum ApiError {
    Service(ServiceError),
    Body(JsonRejection),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Service(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!("[YTSCRIBE] request failed: {}", err);
                }
                (status, err.to_string())
            }
            ApiError::Body(rejection) => (rejection.status(), rejection.body_text()),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("[YTSCRIBE] gateway stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::load()?;
    let store = TranscriptStore::open(Some(config.db_path.as_str()))?;
    let fetcher = YouTubeFetcher::new(config.fetch_timeout(), config.proxy().as_ref())?;
    let service = TranscriptService::new(store, Arc::new(fetcher))
        .with_fetch_timeout(config.fetch_timeout());

    service.authenticator().bootstrap()?;

    let app = build_router(AppState { service });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        "[YTSCRIBE] v{} listening on {} (db: {})",
        ytscribe_core::version(),
        config.bind_addr,
        config.db_path
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/transcript", post(transcript_handler))
        .route("/transcript_simple", post(transcript_simple_handler))
        .with_state(Arc::new(state))
        .layer(axum::middleware::from_fn(log_request))
}

async fn log_request(request: Request<Body>, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    tracing::info!(
        "[YTSCRIBE] {} {} from {}",
        request.method(),
        request.uri().path(),
        peer
    );
    next.run(request).await
}

async fn health() -> &'static str {
    "OK"
}

fn credential(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()))
}

/// Request body, or the rejection once the credential has been checked.
/// A bad credential outranks a bad body.
async fn request_body(
    state: &AppState,
    headers: &HeaderMap,
    payload: Result<Json<TranscriptRequest>, JsonRejection>,
) -> Result<TranscriptRequest, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            state.service.authorize(credential(headers)).await?;
            Err(ApiError::Body(rejection))
        }
    }
}

/// POST /transcript: segment array, from cache or freshly fetched.
async fn transcript_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<TranscriptRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = request_body(&state, &headers, payload).await?;
    let res = state
        .service
        .get_transcript(credential(&headers), &body.video_id)
        .await?;
    Ok(Json(res).into_response())
}

/// POST /transcript_simple: same lookup, transcript flattened to one string.
async fn transcript_simple_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<TranscriptRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = request_body(&state, &headers, payload).await?;
    let res = state
        .service
        .get_transcript_flattened(credential(&headers), &body.video_id)
        .await?;
    Ok(Json(res).into_response())
}
