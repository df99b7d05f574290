use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One persisted row of the `readings` table.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Reading {
    /// Assigned by the store; strictly increasing with insertion order.
    pub id: i64,
    pub temperature: f64,
    pub humidity: f64,
    pub illuminance: f64,
    /// When the subscriber accepted the message, not the sensor's own clock.
    pub recorded_at: DateTime<Utc>,
}

/// A validated reading waiting to be inserted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewReading {
    pub temperature: f64,
    pub humidity: f64,
    pub illuminance: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Raw aggregates over the whole table. Every aggregate is `NULL` when the
/// table is empty.
#[derive(Debug, Clone, FromRow)]
pub struct SummaryRow {
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_avg: Option<f64>,
    pub humid_max: Option<f64>,
    pub humid_min: Option<f64>,
    pub humid_avg: Option<f64>,
    pub total_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct TemperatureRow {
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_avg: Option<f64>,
}

/// A calendar month (UTC) holding at least one max-temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct MonthBucket {
    pub month: i32,
    pub year: i32,
}
