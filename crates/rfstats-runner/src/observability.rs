//! # Observability
//!
//! Structured logging plus an optional Prometheus endpoint.
//!
//! ## Logging Architecture
//! - **stdout**: compact, `rfstats=info,warn` unless `RUST_LOG` says otherwise
//! - **file**: full metadata, daily rotation to `<log_dir>/<service>.log`,
//!   non-blocking writer
//!
//! ## Metrics
//! Counters are always recorded through the `metrics` facade; they are only
//! exported when [`init_metrics`] installed the Prometheus listener.

use std::{fs, net::SocketAddr, path::Path};

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Ticks executed, per sensor.
pub const TICKS_TOTAL: &str = "rfstats_ticks_total";
/// Records a sink failed to deliver, per sensor.
pub const EMIT_FAILURES_TOTAL: &str = "rfstats_emit_failures_total";
/// NOISE->RFI transitions, per sensor.
pub const RFI_TRANSITIONS_TOTAL: &str = "rfstats_rfi_transitions_total";

const DEFAULT_FILTER: &str = "rfstats=info,warn";

/// Guards that must be held for the lifetime of the process.
/// Dropping this will cause buffered logs to be lost.
pub struct TracingGuards {
    _file_guard: WorkerGuard,
}

/// Installs the Prometheus exporter on `addr`.
///
/// Failure is logged and otherwise ignored; the simulator runs without
/// metrics in that case.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!("Prometheus metrics exporter started on {}", addr),
        Err(e) => tracing::warn!(
            "Failed to start Prometheus metrics exporter on {}: {} (continuing without metrics)",
            addr,
            e
        ),
    }
}

/// Initializes stdout + rotated file logging.
pub fn init_tracing(service_name: &str, log_dir: &Path) -> TracingGuards {
    if !log_dir.exists() {
        // Best effort: stdout logging still works without the directory.
        let _ = fs::create_dir_all(log_dir);
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, format!("{}.log", service_name));
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let stdout_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(true)
        .compact()
        .with_filter(stdout_filter);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_filter(file_filter);

    // try_init: a second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    tracing::info!(
        "Observability initialized for service: {} (file={}/{}.log)",
        service_name,
        log_dir.display(),
        service_name
    );

    TracingGuards {
        _file_guard: file_guard,
    }
}

/// Initialize logging, and metrics when an address is given.
pub fn init_observability(
    service_name: &str,
    log_dir: &Path,
    metrics_addr: Option<SocketAddr>,
) -> TracingGuards {
    let guards = init_tracing(service_name, log_dir);
    if let Some(addr) = metrics_addr {
        init_metrics(addr);
    }
    guards
}
