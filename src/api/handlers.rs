use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;
use utoipa::{IntoParams, OpenApi};

use super::{
    dto::{ReadingDto, StatsDto, SummaryDto},
    errors::AppError,
    AppState,
};
use crate::{
    health::{HealthReport, StoreState, SubscriberState, Verdict},
    stats::service::DateRange,
};

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeParams {
    /// First day of the range, `YYYY-MM-DD` (inclusive).
    pub start_date: Option<String>,
    /// Last day of the range, `YYYY-MM-DD` (inclusive).
    pub end_date: Option<String>,
}

impl DateRangeParams {
    /// `None` unless both bounds are present and non-blank.
    fn range(&self) -> Result<Option<DateRange>, AppError> {
        let (Some(start), Some(end)) = (non_blank(&self.start_date), non_blank(&self.end_date))
        else {
            return Ok(None);
        };
        Ok(Some(DateRange {
            start: parse_date("start_date", start)?,
            end: parse_date("end_date", end)?,
        }))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("{name} must be a date in YYYY-MM-DD format, got {raw:?}")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// The 20 most recent readings, newest first. Chart feed for the dashboard.
#[utoipa::path(
    get,
    path = "/api/data",
    responses(
        (status = 200, description = "Most recent readings, newest first", body = Vec<ReadingDto>),
        (status = 500, description = "Store unreachable"),
    ),
    tag = "sensors"
)]
pub async fn get_recent_readings(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let rows = state.stats.recent().await?;
    Ok(Json(ReadingDto::list(rows, state.stats.offset())))
}

/// Whole-table temperature/humidity aggregates and the total reading count.
#[utoipa::path(
    get,
    path = "/api/summary",
    responses(
        (status = 200, description = "Summary statistics", body = SummaryDto),
        (status = 500, description = "Store unreachable"),
    ),
    tag = "sensors"
)]
pub async fn get_summary(State(state): State<AppState>) -> Result<Json<SummaryDto>, AppError> {
    Ok(Json(state.stats.summary().await?.into()))
}

#[utoipa::path(
    get,
    path = "/api/sensor/latest",
    responses(
        (status = 200, description = "Most recent reading", body = ReadingDto),
        (status = 404, description = "No reading stored yet"),
        (status = 500, description = "Store unreachable"),
    ),
    tag = "sensors"
)]
pub async fn get_latest_reading(
    State(state): State<AppState>,
) -> Result<Json<ReadingDto>, AppError> {
    let reading = state.stats.latest().await?;
    Ok(Json(ReadingDto::new(reading, state.stats.offset())))
}

/// Temperature max/min/avg, plus the newest readings and months that hit
/// the maximum temperature.
#[utoipa::path(
    get,
    path = "/api/sensor/stats",
    responses(
        (status = 200, description = "Detailed temperature statistics", body = StatsDto),
        (status = 500, description = "Store unreachable"),
    ),
    tag = "sensors"
)]
pub async fn get_detailed_stats(State(state): State<AppState>) -> Result<Json<StatsDto>, AppError> {
    let stats = state.stats.detailed().await?;
    Ok(Json(StatsDto::new(stats, state.stats.offset())))
}

/// Readings within an inclusive date range, newest first. When either bound
/// is missing, the 100 most recent readings are returned instead.
#[utoipa::path(
    get,
    path = "/api/sensor/filter",
    params(DateRangeParams),
    responses(
        (status = 200, description = "Matching readings, newest first", body = Vec<ReadingDto>),
        (status = 400, description = "Malformed date"),
        (status = 500, description = "Store unreachable"),
    ),
    tag = "sensors"
)]
pub async fn filter_readings(
    State(state): State<AppState>,
    Query(params): Query<DateRangeParams>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let rows = state.stats.filter(params.range()?).await?;
    Ok(Json(ReadingDto::list(rows, state.stats.offset())))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// `200` while the store is reachable, `500` otherwise. Subscriber state is
/// reported alongside.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Store reachable", body = HealthReport),
        (status = 500, description = "Store unreachable", body = HealthReport),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let store_reachable = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Health check: store unreachable");
            false
        }
    };
    let report = HealthReport::synthesize(store_reachable, state.subscriber.is_running());
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        get_recent_readings,
        get_summary,
        get_latest_reading,
        get_detailed_stats,
        filter_readings,
        health
    ),
    components(schemas(
        ReadingDto,
        SummaryDto,
        StatsDto,
        HealthReport,
        Verdict,
        StoreState,
        SubscriberState
    )),
    tags(
        (name = "sensors", description = "Sensor reading queries"),
        (name = "system",  description = "System endpoints"),
    ),
    info(
        title = "Sensor Monitor API",
        version = "0.1.0",
        description = "Temperature, humidity and illuminance readings ingested over MQTT"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
