// Student Tracker - Web Server
// REST API with Axum. The tracker sits behind ONE mutex: every handler holds
// it for the whole read-modify-write, so name/ID uniqueness and ledger
// integrity hold under concurrent requests.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use student_tracker::{
    open_file_tracker, CsvStore, EntityId, StudentTracker, TrackerConfig, TrackerError,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    tracker: Arc<Mutex<StudentTracker<CsvStore>>>,
    config: Arc<TrackerConfig>,
}

impl AppState {
    fn lock(&self) -> Result<MutexGuard<'_, StudentTracker<CsvStore>>, ApiError> {
        self.tracker
            .lock()
            .map_err(|_| ApiError::Internal("tracker lock poisoned".to_string()))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

// ============================================================================
// Errors
// ============================================================================

enum ApiError {
    Tracker(TrackerError),
    Internal(String),
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        ApiError::Tracker(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Tracker(e) => {
                let status = match &e {
                    TrackerError::NotFound { .. } => StatusCode::NOT_FOUND,
                    TrackerError::DuplicateName { .. } => StatusCode::CONFLICT,
                    TrackerError::AllocatorExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    TrackerError::Persistence(_) | TrackerError::InvalidConfig(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if !e.is_recoverable() {
                    error!("request failed: {}", e);
                }
                (status, e.to_string())
            }
            ApiError::Internal(msg) => {
                error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({
            "success": false,
            "error": message,
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Deserialize)]
struct NewStudent {
    name: String,
    class_year: i32,
}

#[derive(Deserialize)]
struct NewEvent {
    name: String,
    points: i32,
    duration: String,
}

#[derive(Deserialize)]
struct RegistrationRequest {
    student_id: u32,
    event_id: u32,
}

#[derive(Serialize)]
struct Created {
    id: EntityId,
}

#[derive(Serialize)]
struct Changed {
    changed: bool,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/students - All students with total points
async fn list_students(State(state): State<AppState>) -> ApiResult<Vec<student_tracker::StudentRow>> {
    let tracker = state.lock()?;
    Ok(Json(ApiResponse::ok(tracker.student_rows())))
}

/// POST /api/students - Add a student
async fn add_student(
    State(state): State<AppState>,
    Json(body): Json<NewStudent>,
) -> ApiResult<Created> {
    let mut tracker = state.lock()?;
    let id = tracker.add_student(&body.name, body.class_year)?;
    Ok(Json(ApiResponse::ok(Created { id })))
}

/// DELETE /api/students/:id
async fn remove_student(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<student_tracker::Student> {
    let mut tracker = state.lock()?;
    let student = tracker.remove_student(EntityId::new(id))?;
    Ok(Json(ApiResponse::ok(student)))
}

/// GET /api/events - All events with participant counts
async fn list_events(State(state): State<AppState>) -> ApiResult<Vec<student_tracker::EventRow>> {
    let tracker = state.lock()?;
    Ok(Json(ApiResponse::ok(tracker.event_rows())))
}

/// POST /api/events - Add an event
async fn add_event(
    State(state): State<AppState>,
    Json(body): Json<NewEvent>,
) -> ApiResult<Created> {
    let mut tracker = state.lock()?;
    let id = tracker.add_event(&body.name, body.points, &body.duration)?;
    Ok(Json(ApiResponse::ok(Created { id })))
}

/// DELETE /api/events/:id
async fn remove_event(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<student_tracker::Event> {
    let mut tracker = state.lock()?;
    let event = tracker.remove_event(EntityId::new(id))?;
    Ok(Json(ApiResponse::ok(event)))
}

/// GET /api/events/:id/participants
async fn participants(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<Vec<student_tracker::StudentRow>> {
    let tracker = state.lock()?;
    let id = EntityId::new(id);
    if tracker.event(id).is_none() {
        return Err(TrackerError::NotFound {
            kind: student_tracker::EntityKind::Event,
            key: student_tracker::Lookup::Id(id),
        }
        .into());
    }
    Ok(Json(ApiResponse::ok(tracker.participants(id))))
}

/// POST /api/registrations - Register a student for an event
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegistrationRequest>,
) -> ApiResult<Changed> {
    let mut tracker = state.lock()?;
    let changed = tracker.register(EntityId::new(body.student_id), EntityId::new(body.event_id))?;
    Ok(Json(ApiResponse::ok(Changed { changed })))
}

/// DELETE /api/registrations - Drop a registration
async fn dropoff(
    State(state): State<AppState>,
    Json(body): Json<RegistrationRequest>,
) -> ApiResult<Changed> {
    let mut tracker = state.lock()?;
    let changed = tracker.dropoff(EntityId::new(body.student_id), EntityId::new(body.event_id))?;
    Ok(Json(ApiResponse::ok(Changed { changed })))
}

/// GET /api/reports/:quarter - Quarterly standings
async fn quarterly_report(
    State(state): State<AppState>,
    Path(quarter): Path<String>,
) -> ApiResult<Vec<student_tracker::QuarterStanding>> {
    let tracker = state.lock()?;
    Ok(Json(ApiResponse::ok(tracker.quarterly_standings(&quarter))))
}

/// GET /api/winners - Winners for the default quarter
async fn current_winners(State(state): State<AppState>) -> ApiResult<student_tracker::WinnerSummary> {
    let quarter = state.config.report_quarter();
    let mut tracker = state.lock()?;
    Ok(Json(ApiResponse::ok(tracker.winners(&quarter))))
}

/// GET /api/winners/:quarter
async fn winners(
    State(state): State<AppState>,
    Path(quarter): Path<String>,
) -> ApiResult<student_tracker::WinnerSummary> {
    let mut tracker = state.lock()?;
    Ok(Json(ApiResponse::ok(tracker.winners(&quarter))))
}

/// GET /api/quarters - Quarter tags used by events
async fn quarters(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let tracker = state.lock()?;
    Ok(Json(ApiResponse::ok(tracker.known_quarters())))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = match std::env::var("TRACKER_CONFIG") {
        Ok(path) => TrackerConfig::from_file(&path)
            .with_context(|| format!("Failed to load config {}", path))?,
        Err(_) => TrackerConfig::default(),
    };

    let tracker = open_file_tracker(&config).with_context(|| {
        format!("Failed to open tracker data in {}", config.data_dir.display())
    })?;

    // Create shared state
    let state = AppState {
        tracker: Arc::new(Mutex::new(tracker)),
        config: Arc::new(config),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/students", get(list_students).post(add_student))
        .route("/students/:id", delete(remove_student))
        .route("/events", get(list_events).post(add_event))
        .route("/events/:id", delete(remove_event))
        .route("/events/:id/participants", get(participants))
        .route("/registrations", post(register).delete(dropoff))
        .route("/reports/:quarter", get(quarterly_report))
        .route("/winners", get(current_winners))
        .route("/winners/:quarter", get(winners))
        .route("/quarters", get(quarters))
        .with_state(state);

    // Build main router
    let app = Router::new()
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    // Start server
    let addr = std::env::var("TRACKER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(addr = %addr, "tracker server listening");

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}
