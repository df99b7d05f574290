use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use sqlx::Connection;
use tracing::debug;

use super::round2;
use crate::db::{
    models::{MonthBucket, Reading, SummaryRow, TemperatureRow},
    Store, StoreError,
};

/// Rows returned by [`StatsService::recent`].
pub const RECENT_LIMIT: i64 = 20;
/// Rows returned by [`StatsService::filter`] when no date range is given.
pub const UNFILTERED_LIMIT: i64 = 100;
/// Newest readings reported among those tied at the maximum temperature.
pub const MAX_TEMP_READINGS_LIMIT: i64 = 2;
/// Newest month buckets reported for the maximum temperature.
pub const MAX_TEMP_BUCKETS_LIMIT: i64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("No data available")]
    NoData,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for StatsError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e.into())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Whole-table aggregates. Aggregates of an empty table are `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub temp_max: f64,
    pub temp_min: f64,
    pub temp_avg: f64,
    pub humid_max: f64,
    pub humid_min: f64,
    pub humid_avg: f64,
    pub total_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureStats {
    pub max: f64,
    pub min: f64,
    pub avg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailedStats {
    pub temperature: TemperatureStats,
    /// Newest readings whose temperature equals the table maximum.
    pub max_temp_readings: Vec<Reading>,
    /// `"<month>-<year>"` buckets holding a max-temperature reading, newest first.
    pub max_temp_month_years: Vec<String>,
}

/// Inclusive range of calendar dates, read in the service's display offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Read-only statistics over persisted readings.
///
/// Every operation takes its own connection from the store and returns it on
/// completion. Nothing is cached between calls.
///
/// Calendar questions (date filters, month buckets) are answered in
/// `offset`; stored timestamps stay UTC.
#[derive(Debug, Clone)]
pub struct StatsService {
    store: Store,
    offset: FixedOffset,
}

const READING_COLUMNS: &str = "id, temperature, humidity, illuminance, recorded_at";

impl StatsService {
    /// Service answering calendar questions in UTC.
    pub fn new(store: Store) -> Self {
        Self::with_offset(store, Utc.fix())
    }

    pub fn with_offset(store: Store, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn offset_secs(&self) -> f64 {
        f64::from(self.offset.local_minus_utc())
    }

    /// The latest [`RECENT_LIMIT`] readings, newest first.
    pub async fn recent(&self) -> Result<Vec<Reading>, StatsError> {
        let mut conn = self.store.connect().await?;
        let rows: Vec<Reading> = sqlx::query_as(&format!(
            "SELECT {READING_COLUMNS} FROM readings \
             ORDER BY recorded_at DESC, id DESC LIMIT $1"
        ))
        .bind(RECENT_LIMIT)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(rounded).collect())
    }

    pub async fn summary(&self) -> Result<Summary, StatsError> {
        let mut conn = self.store.connect().await?;
        let row: SummaryRow = sqlx::query_as(
            r#"
            SELECT MAX(temperature) AS temp_max,
                   MIN(temperature) AS temp_min,
                   AVG(temperature) AS temp_avg,
                   MAX(humidity)    AS humid_max,
                   MIN(humidity)    AS humid_min,
                   AVG(humidity)    AS humid_avg,
                   COUNT(*)         AS total_count
            FROM readings
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;

        Ok(Summary {
            temp_max: or_zero(row.temp_max),
            temp_min: or_zero(row.temp_min),
            temp_avg: or_zero(row.temp_avg),
            humid_max: or_zero(row.humid_max),
            humid_min: or_zero(row.humid_min),
            humid_avg: or_zero(row.humid_avg),
            total_count: row.total_count,
        })
    }

    /// The single newest reading, or [`StatsError::NoData`] on an empty table.
    pub async fn latest(&self) -> Result<Reading, StatsError> {
        let mut conn = self.store.connect().await?;
        let row: Option<Reading> = sqlx::query_as(&format!(
            "SELECT {READING_COLUMNS} FROM readings \
             ORDER BY recorded_at DESC, id DESC LIMIT 1"
        ))
        .fetch_optional(&mut *conn)
        .await?;

        row.map(rounded).ok_or(StatsError::NoData)
    }

    /// Temperature aggregates plus the readings and month buckets matching
    /// the maximum temperature.
    ///
    /// All three queries run in one read-only `REPEATABLE READ` transaction,
    /// so they agree on a single snapshot even while the subscriber inserts.
    pub async fn detailed(&self) -> Result<DetailedStats, StatsError> {
        let mut conn = self.store.connect().await?;
        let mut tx = conn.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let temps: TemperatureRow = sqlx::query_as(
            r#"
            SELECT MAX(temperature) AS temp_max,
                   MIN(temperature) AS temp_min,
                   AVG(temperature) AS temp_avg
            FROM readings
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;

        let max_temp_readings: Vec<Reading> = sqlx::query_as(&format!(
            "SELECT {READING_COLUMNS} FROM readings \
             WHERE temperature = (SELECT MAX(temperature) FROM readings) \
             ORDER BY recorded_at DESC, id DESC LIMIT $1"
        ))
        .bind(MAX_TEMP_READINGS_LIMIT)
        .fetch_all(&mut *tx)
        .await?;

        let buckets: Vec<MonthBucket> = sqlx::query_as(
            r#"
            SELECT EXTRACT(MONTH FROM local_at)::INT4 AS month,
                   EXTRACT(YEAR  FROM local_at)::INT4 AS year
            FROM (
                SELECT (recorded_at AT TIME ZONE 'UTC') + make_interval(secs => $1::FLOAT8) AS local_at
                FROM readings
                WHERE temperature = (SELECT MAX(temperature) FROM readings)
            ) AS max_temp
            GROUP BY year, month
            ORDER BY year DESC, month DESC
            LIMIT $2
            "#,
        )
        .bind(self.offset_secs())
        .bind(MAX_TEMP_BUCKETS_LIMIT)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            ties = max_temp_readings.len(),
            buckets = buckets.len(),
            "Detailed statistics computed"
        );

        Ok(DetailedStats {
            temperature: TemperatureStats {
                max: or_zero(temps.temp_max),
                min: or_zero(temps.temp_min),
                avg: or_zero(temps.temp_avg),
            },
            max_temp_readings: max_temp_readings.into_iter().map(rounded).collect(),
            max_temp_month_years: buckets
                .into_iter()
                .map(|b| format!("{}-{}", b.month, b.year))
                .collect(),
        })
    }

    /// Readings whose local date (see [`StatsService::offset`]) lies within
    /// `range`, newest first. Without a range, the latest [`UNFILTERED_LIMIT`]
    /// readings.
    pub async fn filter(&self, range: Option<DateRange>) -> Result<Vec<Reading>, StatsError> {
        let mut conn = self.store.connect().await?;
        let rows: Vec<Reading> = match range {
            Some(DateRange { start, end }) => {
                sqlx::query_as(&format!(
                    "SELECT {READING_COLUMNS} FROM readings \
                     WHERE ((recorded_at AT TIME ZONE 'UTC') + make_interval(secs => $3::FLOAT8))::date \
                           BETWEEN $1 AND $2 \
                     ORDER BY recorded_at DESC, id DESC"
                ))
                .bind(start)
                .bind(end)
                .bind(self.offset_secs())
                .fetch_all(&mut *conn)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {READING_COLUMNS} FROM readings \
                     ORDER BY recorded_at DESC, id DESC LIMIT $1"
                ))
                .bind(UNFILTERED_LIMIT)
                .fetch_all(&mut *conn)
                .await?
            }
        };

        Ok(rows.into_iter().map(rounded).collect())
    }
}

fn or_zero(aggregate: Option<f64>) -> f64 {
    aggregate.map(round2).unwrap_or(0.0)
}

fn rounded(reading: Reading) -> Reading {
    Reading {
        temperature: round2(reading.temperature),
        humidity: round2(reading.humidity),
        illuminance: round2(reading.illuminance),
        ..reading
    }
}
