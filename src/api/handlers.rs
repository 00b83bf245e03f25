use crate::api::ApiContext;
use crate::api::responses::{
    FactorsResponse, HealthErrorCode, HealthErrorResponse, HealthStatus, HealthSuccessResponse,
    LotEntryResponse, LotTypeResponse, PollingResponse, RefreshErrorCode, RefreshErrorResponse,
    RefreshOutcomeCode, RefreshSuccessResponse, SnapshotErrorCode, SnapshotErrorResponse,
    SnapshotSuccessResponse,
};
use crate::orchestrator::TickOutcome;
use crate::sources::LotType;
use crate::state::{AppState, Snapshot};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

fn fallback_timestamp() -> String {
    format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format error timestamp");
        "1970-01-01T00:00:00Z".to_string()
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub enum SnapshotResponse {
    Success(SnapshotSuccessResponse),
    Error {
        status: StatusCode,
        body: SnapshotErrorResponse,
    },
}

impl IntoResponse for SnapshotResponse {
    fn into_response(self) -> Response {
        match self {
            SnapshotResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            SnapshotResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_lots(State(context): State<ApiContext>) -> impl IntoResponse {
    build_snapshot_response(context.state)
}

fn build_snapshot_response(state: Arc<RwLock<AppState>>) -> SnapshotResponse {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return snapshot_internal_error("state lock poisoned while reading snapshot");
        }
    };
    let snapshot = guard.snapshot().cloned();
    let status_message = guard.last_error().map(str::to_string);
    drop(guard);

    match snapshot {
        Some(snapshot) => match format_timestamp(snapshot.timestamp) {
            Ok(timestamp) => {
                SnapshotResponse::Success(snapshot_body(&snapshot, timestamp, status_message))
            }
            Err(err) => {
                error!(error = %err, "Failed to format snapshot timestamp");
                snapshot_internal_error("timestamp formatting failure")
            }
        },
        None => SnapshotResponse::Error {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: SnapshotErrorResponse {
                error_code: SnapshotErrorCode::NoData,
                error_message: status_message
                    .unwrap_or_else(|| "No snapshot available yet".to_string()),
                timestamp: fallback_timestamp(),
            },
        },
    }
}

fn snapshot_body(
    snapshot: &Snapshot,
    timestamp: String,
    status_message: Option<String>,
) -> SnapshotSuccessResponse {
    let lots = snapshot
        .lots
        .iter()
        .map(|entry| LotEntryResponse {
            id: entry.lot.id.clone(),
            name: entry.lot.name.clone(),
            latitude: entry.lot.location.latitude,
            longitude: entry.lot.location.longitude,
            lot_type: lot_type_label(entry.lot.lot_type),
            occupancy_percent: round1(entry.prediction.occupancy_percent),
            status: entry.prediction.status,
            color: entry.prediction.color,
            estimated_vehicles: entry.prediction.estimated_vehicles,
            address: entry.lot.address.clone(),
            hours_of_operation: entry.lot.hours_of_operation.clone(),
            fee: entry.lot.fee,
            factors: FactorsResponse {
                time_impact: round2(entry.prediction.factors.time_impact),
                weather_impact: round2(entry.prediction.factors.weather_impact),
                event_impact: round2(entry.prediction.factors.event_impact),
            },
        })
        .collect();

    SnapshotSuccessResponse {
        latitude: snapshot.center.latitude,
        longitude: snapshot.center.longitude,
        timestamp,
        stale: snapshot.stale,
        status_message,
        lots,
    }
}

fn lot_type_label(lot_type: LotType) -> LotTypeResponse {
    match lot_type {
        LotType::Surface => LotTypeResponse::Surface,
        LotType::Garage => LotTypeResponse::Garage,
        LotType::Street => LotTypeResponse::Street,
        LotType::Other => LotTypeResponse::Other,
    }
}

fn snapshot_internal_error(message: &str) -> SnapshotResponse {
    error!(message = message, "Internal error while handling /api/lots");
    SnapshotResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: SnapshotErrorResponse {
            error_code: SnapshotErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

pub enum HealthResponse {
    Success {
        status: StatusCode,
        body: HealthSuccessResponse,
    },
    Error {
        status: StatusCode,
        body: HealthErrorResponse,
    },
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        match self {
            HealthResponse::Success { status, body } => (status, Json(body)).into_response(),
            HealthResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_health(State(context): State<ApiContext>) -> impl IntoResponse {
    build_health_response(context.state, SystemTime::now())
}

fn build_health_response(state: Arc<RwLock<AppState>>, now: SystemTime) -> HealthResponse {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return health_internal_error("state lock poisoned while reading snapshot");
        }
    };
    let status = match guard.snapshot() {
        None => HealthStatus::Ko,
        Some(snapshot) if snapshot.stale => HealthStatus::Degraded,
        Some(_) => HealthStatus::Ok,
    };
    drop(guard);

    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(_) => {
            return health_internal_error("timestamp formatting failure");
        }
    };

    let status_code = match status {
        HealthStatus::Ko => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
    };

    HealthResponse::Success {
        status: status_code,
        body: HealthSuccessResponse { status, timestamp },
    }
}

fn health_internal_error(message: &str) -> HealthResponse {
    error!(message = message, "Internal error while handling /api/health");
    HealthResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: HealthErrorResponse {
            error_code: HealthErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

pub enum RefreshResponse {
    Success(RefreshSuccessResponse),
    Error {
        status: StatusCode,
        body: RefreshErrorResponse,
    },
}

impl IntoResponse for RefreshResponse {
    fn into_response(self) -> Response {
        match self {
            RefreshResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            RefreshResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

/// Trigger an immediate out-of-cycle tick. The pipeline is blocking, so it
/// runs off the async worker; the skip-if-busy rule still applies.
pub async fn post_refresh(State(context): State<ApiContext>) -> impl IntoResponse {
    let orchestrator = Arc::clone(&context.orchestrator);
    let outcome = match tokio::task::spawn_blocking(move || orchestrator.try_tick()).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "Refresh task join failure");
            return refresh_internal_error();
        }
    };

    match outcome {
        TickOutcome::Published => RefreshResponse::Success(RefreshSuccessResponse {
            outcome: RefreshOutcomeCode::Completed,
            timestamp: fallback_timestamp(),
        }),
        TickOutcome::Skipped => RefreshResponse::Success(RefreshSuccessResponse {
            outcome: RefreshOutcomeCode::Skipped,
            timestamp: fallback_timestamp(),
        }),
        TickOutcome::Failed => {
            let message = context
                .state
                .read()
                .ok()
                .and_then(|guard| guard.last_error().map(str::to_string))
                .unwrap_or_else(|| "refresh failed".to_string());
            RefreshResponse::Error {
                status: StatusCode::BAD_GATEWAY,
                body: RefreshErrorResponse {
                    error_code: RefreshErrorCode::RefreshFailed,
                    error_message: message,
                    timestamp: fallback_timestamp(),
                },
            }
        }
    }
}

fn refresh_internal_error() -> RefreshResponse {
    RefreshResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: RefreshErrorResponse {
            error_code: RefreshErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

pub async fn post_polling_start(State(context): State<ApiContext>) -> impl IntoResponse {
    context.orchestrator.start_polling();
    polling_response(&context)
}

pub async fn post_polling_stop(State(context): State<ApiContext>) -> impl IntoResponse {
    context.orchestrator.stop_polling();
    polling_response(&context)
}

fn polling_response(context: &ApiContext) -> Json<PollingResponse> {
    Json(PollingResponse {
        polling: context.orchestrator.polling_enabled(),
        timestamp: fallback_timestamp(),
    })
}
