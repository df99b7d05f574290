use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    db::models::Reading,
    stats::service::{DetailedStats, Summary},
};

/// Timestamp layout used in every response body.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadingDto {
    pub id: i64,
    /// °C, rounded to 2 decimals.
    pub temperature: f64,
    /// %RH, rounded to 2 decimals.
    pub humidity: f64,
    /// lux, rounded to 2 decimals.
    pub illuminance: f64,
    /// Acceptance time in the configured display offset, `YYYY-MM-DD HH:MM:SS`.
    #[schema(example = "2024-01-15 08:30:00")]
    pub timestamp: String,
}

/// Response for `GET /api/summary`. Zero everywhere on an empty table.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SummaryDto {
    pub temp_max: f64,
    pub temp_min: f64,
    pub temp_avg: f64,
    pub humid_max: f64,
    pub humid_min: f64,
    pub humid_avg: f64,
    pub total_count: i64,
}

/// Response for `GET /api/sensor/stats`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsDto {
    pub tempmax: f64,
    pub tempmin: f64,
    pub tempavg: f64,
    /// At most the 2 newest readings at the maximum temperature.
    pub max_temp_readings: Vec<ReadingDto>,
    /// At most 2 `"<month>-<year>"` buckets, newest first.
    #[schema(example = json!(["3-2024", "2-2024"]))]
    pub max_temp_month_years: Vec<String>,
}

impl ReadingDto {
    pub fn new(r: Reading, offset: FixedOffset) -> Self {
        Self {
            id: r.id,
            temperature: r.temperature,
            humidity: r.humidity,
            illuminance: r.illuminance,
            timestamp: r
                .recorded_at
                .with_timezone(&offset)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
        }
    }

    pub fn list(rows: Vec<Reading>, offset: FixedOffset) -> Vec<Self> {
        rows.into_iter().map(|r| Self::new(r, offset)).collect()
    }
}

impl From<Summary> for SummaryDto {
    fn from(s: Summary) -> Self {
        Self {
            temp_max: s.temp_max,
            temp_min: s.temp_min,
            temp_avg: s.temp_avg,
            humid_max: s.humid_max,
            humid_min: s.humid_min,
            humid_avg: s.humid_avg,
            total_count: s.total_count,
        }
    }
}

impl StatsDto {
    pub fn new(d: DetailedStats, offset: FixedOffset) -> Self {
        Self {
            tempmax: d.temperature.max,
            tempmin: d.temperature.min,
            tempavg: d.temperature.avg,
            max_temp_readings: ReadingDto::list(d.max_temp_readings, offset),
            max_temp_month_years: d.max_temp_month_years,
        }
    }
}
