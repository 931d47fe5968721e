//! # CSV transport payload
//!
//! Downstream monitor wire format: a one-row CSV document, base64 encoded
//! and wrapped in a JSON envelope.
//!
//! ## CSV
//! ```text
//! frequency,power,center_freq,max_db,median_db,std_dev,kurtosis,bandwidth,gain,length,interval,created_at,violation,abovefloor
//! ```
//! Fixed columns: `frequency = center_freq = 915000000`, `bandwidth = 1000000`,
//! `gain = 35`, `length = 1.0`, `interval = 10`.
//! Derived: `power = average_db`, `violation = kurtosis > 4`,
//! `abovefloor = -60 - average_db`.
//!
//! Float columns (`power`, `max_db`, `median_db`, `std_dev`, `kurtosis`,
//! `length`, `abovefloor`) share one rendering, see [`format_float`]:
//! shortest round-trip decimal, never exponent notation, and always with a
//! fractional part (`5.0`, `-86.0`, `0.0`). Integer columns carry no decimal
//! point.
//!
//! ## Envelope
//! `{monitor_id, start_time, end_time, type, format, payload}` where the
//! window is 10 s from emission, `type = "rf_stats"`, `format = "csv"`.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use rfstats_core::SensorRecord;
use serde::{Deserialize, Serialize};

pub const CSV_HEADER: [&str; 14] = [
    "frequency",
    "power",
    "center_freq",
    "max_db",
    "median_db",
    "std_dev",
    "kurtosis",
    "bandwidth",
    "gain",
    "length",
    "interval",
    "created_at",
    "violation",
    "abovefloor",
];

pub const FREQUENCY_HZ: u64 = 915_000_000;
pub const BANDWIDTH_HZ: u64 = 1_000_000;
pub const GAIN_DB: u32 = 35;
/// Rendered as `1.0` on the wire.
pub const LENGTH_SECS: f64 = 1.0;
pub const INTERVAL_SECS: u32 = 10;

/// Kurtosis above this marks the row as a violation.
pub const VIOLATION_KURTOSIS: f64 = 4.0;
/// Reference level for `abovefloor`.
pub const ABOVE_FLOOR_REF_DB: f64 = -60.0;

/// Width of the envelope time window.
pub const ENVELOPE_WINDOW_SECS: i64 = 10;
pub const ENVELOPE_TYPE: &str = "rf_stats";
pub const ENVELOPE_FORMAT: &str = "csv";

/// One CSV row derived from a record.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub power: f64,
    pub max_db: f64,
    pub median_db: f64,
    pub std_dev: f64,
    pub kurtosis: f64,
    pub created_at: String,
    pub violation: u8,
    pub abovefloor: f64,
}

impl CsvRow {
    pub fn from_record(record: &SensorRecord) -> Self {
        Self {
            power: record.average_db,
            max_db: record.max_db,
            median_db: record.median_db,
            std_dev: record.std_dev,
            kurtosis: record.kurtosis,
            created_at: record.created_at_string(),
            violation: u8::from(record.kurtosis > VIOLATION_KURTOSIS),
            abovefloor: ABOVE_FLOOR_REF_DB - record.average_db,
        }
    }

    fn fields(&self) -> [String; 14] {
        [
            FREQUENCY_HZ.to_string(),
            format_float(self.power),
            FREQUENCY_HZ.to_string(),
            format_float(self.max_db),
            format_float(self.median_db),
            format_float(self.std_dev),
            format_float(self.kurtosis),
            BANDWIDTH_HZ.to_string(),
            GAIN_DB.to_string(),
            format_float(LENGTH_SECS),
            INTERVAL_SECS.to_string(),
            self.created_at.clone(),
            self.violation.to_string(),
            format_float(self.abovefloor),
        ]
    }
}

/// Wire rendering of a float column. Integral values keep a `.0`;
/// non-finite values render as `NaN`, `inf`, `-inf`.
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

/// Header line plus one data row, `\n` terminated.
pub fn encode_csv(record: &SensorRecord) -> anyhow::Result<Vec<u8>> {
    let row = CsvRow::from_record(record);
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)?;
    wtr.write_record(row.fields())?;
    wtr.flush()?;
    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("CSV buffer: {}", e.error()))
}

/// JSON envelope carried to the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportEnvelope {
    pub monitor_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub format: String,
    /// Base64 (standard alphabet, padded) CSV document.
    pub payload: String,
}

impl TransportEnvelope {
    /// Wrap `record` for a window starting at `emitted_at`.
    pub fn build(
        monitor_id: &str,
        record: &SensorRecord,
        emitted_at: DateTime<Utc>,
    ) -> anyhow::Result<Self> {
        let csv = encode_csv(record)?;
        Ok(Self {
            monitor_id: monitor_id.to_string(),
            start_time: emitted_at,
            end_time: emitted_at + chrono::Duration::seconds(ENVELOPE_WINDOW_SECS),
            kind: ENVELOPE_TYPE.to_string(),
            format: ENVELOPE_FORMAT.to_string(),
            payload: general_purpose::STANDARD.encode(csv),
        })
    }

    /// Decode the payload back to CSV bytes.
    pub fn decode_payload(&self) -> anyhow::Result<Vec<u8>> {
        Ok(general_purpose::STANDARD.decode(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(average_db: f64, kurtosis: f64) -> SensorRecord {
        SensorRecord {
            hardware_id: 1,
            metadata_id: 77,
            created_at: Utc.with_ymd_and_hms(2024, 8, 9, 10, 11, 12).unwrap(),
            average_db,
            max_db: -88.5,
            median_db: -90.25,
            std_dev: 1.5,
            kurtosis,
        }
    }

    fn lines(bytes: &[u8]) -> Vec<String> {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn header_is_exact() {
        let csv = encode_csv(&record(-115.0, 1.2)).unwrap();
        assert_eq!(
            lines(&csv)[0],
            "frequency,power,center_freq,max_db,median_db,std_dev,kurtosis,bandwidth,gain,length,interval,created_at,violation,abovefloor"
        );
    }

    #[test]
    fn violation_and_abovefloor_derivation() {
        let row = CsvRow::from_record(&record(-90.123, 5.0));
        assert_eq!(row.violation, 1);
        assert!((row.abovefloor - 30.123).abs() < 1e-9);
        assert_eq!(row.power, -90.123);
    }

    #[test]
    fn kurtosis_of_exactly_four_is_not_a_violation() {
        assert_eq!(CsvRow::from_record(&record(-100.0, 4.0)).violation, 0);
        assert_eq!(CsvRow::from_record(&record(-100.0, 4.0001)).violation, 1);
    }

    #[test]
    fn data_row_constants() {
        let csv = encode_csv(&record(-90.123, 5.0)).unwrap();
        let all = lines(&csv);
        assert_eq!(all.len(), 2);
        let cols: Vec<&str> = all[1].split(',').collect();
        assert_eq!(cols.len(), 14);
        assert_eq!(cols[0], "915000000");
        assert_eq!(cols[1], "-90.123");
        assert_eq!(cols[2], "915000000");
        assert_eq!(cols[3], "-88.5");
        assert_eq!(cols[4], "-90.25");
        assert_eq!(cols[5], "1.5");
        assert_eq!(cols[6], "5.0");
        assert_eq!(cols[7], "1000000");
        assert_eq!(cols[8], "35");
        assert_eq!(cols[9], "1.0");
        assert_eq!(cols[10], "10");
        assert_eq!(cols[11], "2024-08-09 10:11:12");
        assert_eq!(cols[12], "1");
        assert!((cols[13].parse::<f64>().unwrap() - 30.123).abs() < 1e-9);
    }

    #[test]
    fn float_columns_share_one_rendering() {
        let mut r = record(-86.0, 0.0);
        r.max_db = -80.0;
        r.median_db = -86.0;
        r.std_dev = 0.0;
        let csv = encode_csv(&r).unwrap();
        let all = lines(&csv);
        let cols: Vec<&str> = all[1].split(',').collect();
        assert_eq!(cols[1], "-86.0");
        assert_eq!(cols[3], "-80.0");
        assert_eq!(cols[4], "-86.0");
        assert_eq!(cols[5], "0.0");
        assert_eq!(cols[6], "0.0");
        assert_eq!(cols[9], "1.0");
        assert_eq!(cols[13], "26.0");
        // Integer columns stay integral.
        assert_eq!(cols[0], "915000000");
        assert_eq!(cols[12], "0");
    }

    #[test]
    fn format_float_never_uses_exponent() {
        assert_eq!(format_float(-90.123), "-90.123");
        assert_eq!(format_float(1e-7), "0.0000001");
        assert_eq!(format_float(-0.5), "-0.5");
        assert_eq!(format_float(f64::NAN), "NaN");
    }

    #[test]
    fn envelope_window_and_payload() {
        let emitted_at = Utc.with_ymd_and_hms(2024, 8, 9, 10, 11, 13).unwrap();
        let env = TransportEnvelope::build("monitor-1", &record(-95.0, 13.2), emitted_at).unwrap();

        assert_eq!(env.monitor_id, "monitor-1");
        assert_eq!(env.start_time, emitted_at);
        assert_eq!((env.end_time - env.start_time).num_seconds(), 10);
        assert_eq!(env.kind, "rf_stats");
        assert_eq!(env.format, "csv");

        let decoded = env.decode_payload().unwrap();
        assert!(lines(&decoded)[0].starts_with("frequency,power,center_freq"));

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "rf_stats");
        assert_eq!(json["format"], "csv");
        assert!(json.get("kind").is_none());
    }
}
