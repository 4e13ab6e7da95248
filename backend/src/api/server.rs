//! HTTP Server for the fuelboard API.
//!
//! Provides REST endpoints for fuel log upload and reporting.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/report`     | Upload a fuel log, get a report      |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |
//!
//! `/api/report` takes a multipart body with a `file` field (CSV bytes) and
//! an optional `filter` field (JSON filter document). Loaded sources are
//! kept in a shared [`RecordCache`], so re-filtering an uploaded file skips
//! parsing. The cache lock covers only the lookup and the insert; loading
//! and aggregation run on the blocking pool.

use axum::{
    extract::{Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, log_success, LOG_BROADCASTER};
use super::types::{error_response, ReportResponse};
use crate::cache::{CacheStatus, RecordCache, SourceKey};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::transform::filter::FilterParams;
use crate::transform::pipeline::{build_report, load_source, FuelReport};
use crate::validation::parse_filter_params;

type ApiError = (StatusCode, Json<Value>);

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PipelineConfig>,
    pub cache: Arc<Mutex<RecordCache>>,
}

impl AppState {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: Arc::new(config),
            cache: Arc::new(Mutex::new(RecordCache::new())),
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/report", post(upload_report))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, config: PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(AppState::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("Fuelboard server running on http://localhost:{}", port);
    println!("   POST /api/report - Upload fuel log, get report");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "fuelboard",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "report": "POST /api/report",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Report endpoint
async fn upload_report(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ReportResponse>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut params = FilterParams::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| reject(ServerError::BadRequest(format!("Multipart error: {}", e))))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
                file_data = Some(bytes.to_vec());
            }
            "filter" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
                params = parse_filter_params(&text).map_err(|e| reject(PipelineError::from(e).into()))?;
            }
            _ => {}
        }
    }

    let bytes = file_data.ok_or_else(|| reject(ServerError::BadRequest("No file provided".to_string())))?;

    log_info(format!(
        "New upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let report = load_report(&state, bytes, params).await.map_err(|e| {
        log_error(e.to_string());
        reject(e)
    })?;

    Ok(Json(ReportResponse::from(report)))
}

/// Load through the shared cache, then filter and aggregate.
async fn load_report(state: &AppState, bytes: Vec<u8>, params: FilterParams) -> ServerResult<FuelReport> {
    let key = SourceKey::new(&bytes, &state.config);
    let cached = state.cache.lock().await.get(&key).cloned();

    let (source, status) = match cached {
        Some(source) => {
            log_success(format!("Reusing {} cached records", source.records.len()));
            (source, CacheStatus::Hit)
        }
        None => {
            let config = Arc::clone(&state.config);
            let source = tokio::task::spawn_blocking(move || load_source(&bytes, &config))
                .await
                .map_err(|e| ServerError::Internal(format!("Load task failed: {}", e)))?
                .map_err(PipelineError::from)?;
            state.cache.lock().await.insert(key, source.clone());
            (source, CacheStatus::Miss)
        }
    };

    let config = Arc::clone(&state.config);
    tokio::task::spawn_blocking(move || build_report(&source, &params, &config, status))
        .await
        .map_err(|e| ServerError::Internal(format!("Report task failed: {}", e)))
}

/// HTTP status for a server error
fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Validation(_)) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Source(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Pipeline(PipelineError::Config(_)) | ServerError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn reject(err: ServerError) -> ApiError {
    (status_for(&err), Json(error_response(&err.to_string())))
}
