//! Per-tick output record handed to emission sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::SummaryStats;

/// Timestamp layout of `created_at` (UTC, second precision).
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One summary row for one simulated sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub hardware_id: i64,
    pub metadata_id: i64,
    #[serde(with = "created_at_format")]
    pub created_at: DateTime<Utc>,
    pub average_db: f64,
    pub max_db: f64,
    pub median_db: f64,
    pub std_dev: f64,
    pub kurtosis: f64,
}

impl SensorRecord {
    pub fn from_stats(
        hardware_id: i64,
        metadata_id: i64,
        created_at: DateTime<Utc>,
        stats: &SummaryStats,
    ) -> Self {
        Self {
            hardware_id,
            metadata_id,
            created_at,
            average_db: stats.average,
            max_db: stats.max,
            median_db: stats.median,
            std_dev: stats.std_dev,
            kurtosis: stats.kurtosis_proxy,
        }
    }

    /// `created_at` rendered as `YYYY-MM-DD HH:MM:SS`.
    pub fn created_at_string(&self) -> String {
        self.created_at.format(CREATED_AT_FORMAT).to_string()
    }
}

mod created_at_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::CREATED_AT_FORMAT;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(CREATED_AT_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, CREATED_AT_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
