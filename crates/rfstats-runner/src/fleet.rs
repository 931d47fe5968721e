//! Multi-sensor orchestration.
//!
//! Each configured sensor gets its own generator, scheduler, aggregator and
//! sink, and runs as an independent tokio task. Nothing mutable is shared
//! between sensors; the only common input is the shutdown channel.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use rfstats_core::{Clock, SystemClock};
use rfstats_emit::{
    EmissionSink, FanoutSink, HttpCsvSink, HttpSinkConfig, LoggingSink, OutputsTableSink,
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{RfStatsConfig, SensorInfo, SinkInfo};
use crate::runtime::{RunSummary, SensorRuntime, SensorSettings};

/// Build the sink for one sensor. Non-log sinks also echo each record to
/// the console. `clock` is the sensor's clock; time-stamping sinks read it.
pub async fn build_sink(
    cfg: &RfStatsConfig,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Box<dyn EmissionSink>> {
    let sink: Box<dyn EmissionSink> = match &cfg.sink {
        SinkInfo::Log => Box::new(LoggingSink),
        SinkInfo::OutputsTable { path } => {
            let table = OutputsTableSink::open(path).await?;
            let members: Vec<Box<dyn EmissionSink>> = vec![Box::new(LoggingSink), Box::new(table)];
            Box::new(FanoutSink::new(members))
        }
        SinkInfo::Http {
            endpoint,
            monitor_id,
            timeout_secs,
            ..
        } => {
            let http = HttpCsvSink::with_clock(
                HttpSinkConfig {
                    endpoint: endpoint.clone(),
                    monitor_id: monitor_id.clone(),
                    token: cfg.http_token()?,
                    timeout: Duration::from_secs_f64(*timeout_secs),
                },
                clock,
            )?;
            let members: Vec<Box<dyn EmissionSink>> = vec![Box::new(LoggingSink), Box::new(http)];
            Box::new(FanoutSink::new(members))
        }
    };
    Ok(sink)
}

/// Per-sensor settings derived from the shared simulation section.
pub fn sensor_settings(
    cfg: &RfStatsConfig,
    index: usize,
    sensor: SensorInfo,
) -> anyhow::Result<SensorSettings> {
    let sim = &cfg.simulation;
    Ok(SensorSettings {
        hardware_id: sensor.hardware_id,
        metadata_id: sensor.metadata_id,
        noise_floor: sim.noise_floor,
        std_dev: sim.std_dev,
        samples_per_tick: sim.samples_per_tick,
        schedule: sim.schedule()?,
        interval: sim.write_interval()?,
        seed: sim.seed.map(|s| s.wrapping_add(index as u64)),
        max_ticks: sim.max_ticks,
    })
}

/// A set of independent sensor runtimes.
pub struct Fleet {
    runtimes: Vec<SensorRuntime>,
}

impl Fleet {
    /// Build one runtime per `[[sensors]]` entry on the system clock.
    pub async fn from_config(cfg: &RfStatsConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let mut sinks = Vec::with_capacity(cfg.sensors.len());
        for sensor in &cfg.sensors {
            let sink = build_sink(cfg, clock.clone()).await.with_context(|| {
                format!(
                    "build sink for sensor {}/{}",
                    sensor.hardware_id, sensor.metadata_id
                )
            })?;
            sinks.push(sink);
        }
        Self::with_sinks(cfg, clock, sinks)
    }

    /// Build runtimes with an explicit clock and one sink per sensor, in
    /// `[[sensors]]` order.
    pub fn with_sinks(
        cfg: &RfStatsConfig,
        clock: Arc<dyn Clock>,
        sinks: Vec<Box<dyn EmissionSink>>,
    ) -> anyhow::Result<Self> {
        cfg.validate()?;
        if sinks.len() != cfg.sensors.len() {
            anyhow::bail!(
                "{} sinks given for {} sensors",
                sinks.len(),
                cfg.sensors.len()
            );
        }

        let mut runtimes = Vec::with_capacity(cfg.sensors.len());
        for (index, (sensor, sink)) in cfg.sensors.iter().copied().zip(sinks).enumerate() {
            let settings = sensor_settings(cfg, index, sensor)?;
            runtimes.push(SensorRuntime::new(settings, clock.clone(), sink)?);
        }
        Ok(Self { runtimes })
    }

    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }

    /// Run every sensor until shutdown; returns one summary per sensor that
    /// finished cleanly.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Vec<RunSummary> {
        info!("[FLEET] Starting {} sensor(s)", self.runtimes.len());

        let tasks: Vec<_> = self
            .runtimes
            .into_iter()
            .map(|rt| {
                let label = rt.label().to_string();
                let rx = shutdown.clone();
                (label, tokio::spawn(rt.run(rx)))
            })
            .collect();

        let (labels, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let results = join_all(handles).await;

        let mut summaries = Vec::with_capacity(results.len());
        for (label, result) in labels.into_iter().zip(results) {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!("[FLEET] Sensor {} task failed: {}", label, e),
            }
        }

        let ticks: u64 = summaries.iter().map(|s| s.ticks).sum();
        let failed: u64 = summaries.iter().map(|s| s.failed).sum();
        info!(
            sensors = summaries.len(),
            ticks, failed, "[FLEET] All sensors stopped"
        );
        summaries
    }
}
