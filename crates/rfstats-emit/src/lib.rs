//! # rfstats emit
//!
//! Destinations for per-tick [`SensorRecord`](rfstats_core::SensorRecord)s.
//!
//! ## Sinks
//! - [`LoggingSink`] - console line per record
//! - [`VecSink`] - in-memory buffer
//! - [`OutputsTableSink`] - append-only JSONL "outputs" table
//! - [`HttpCsvSink`] - base64 CSV envelope POSTed to a monitor endpoint
//! - [`FanoutSink`] - several of the above at once
//!
//! A failed emission is the caller's to log; sinks never retry.

pub mod csv_payload;
pub mod http;
pub mod outputs_table;
pub mod sink;

pub use csv_payload::{CSV_HEADER, CsvRow, TransportEnvelope, encode_csv, format_float};
pub use http::{HttpCsvSink, HttpSinkConfig};
pub use outputs_table::{OutputsTableSink, read_outputs_table};
pub use sink::{EmissionSink, FanoutSink, LoggingSink, VecSink, format_record_line};
