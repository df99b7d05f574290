pub mod service;

pub use service::{StatsError, StatsService};

/// Rounds to two decimal places, the precision every measurement and
/// statistic is presented with.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
