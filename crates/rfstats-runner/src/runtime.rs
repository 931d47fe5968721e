//! Per-sensor tick loop.
//!
//! One [`SensorRuntime`] owns the generator, scheduler, aggregator and sink of
//! a single simulated sensor. Each tick:
//! 1. let the scheduler apply a NOISE/RFI transition
//! 2. draw a batch from the generator
//! 3. push it into the rolling window and summarize it
//! 4. stamp a [`SensorRecord`] and hand it to the sink
//!
//! Sink errors are logged and counted; the loop keeps going and the record
//! is dropped.

use std::sync::Arc;
use std::time::Duration;

use rfstats_core::{
    AnchorDriftGenerator, Clock, ModeScheduler, SampleAggregator, ScheduleParams, SensorRecord,
    SimError, Transition,
};
use rfstats_emit::EmissionSink;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::observability::{EMIT_FAILURES_TOTAL, RFI_TRANSITIONS_TOTAL, TICKS_TOTAL};

/// Everything needed to build one sensor runtime.
#[derive(Debug, Clone)]
pub struct SensorSettings {
    pub hardware_id: i64,
    pub metadata_id: i64,
    pub noise_floor: f64,
    pub std_dev: f64,
    pub samples_per_tick: usize,
    pub schedule: ScheduleParams,
    pub interval: Duration,
    pub seed: Option<u64>,
    pub max_ticks: Option<u64>,
}

/// Counters reported when a runtime stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub hardware_id: i64,
    pub metadata_id: i64,
    pub ticks: u64,
    pub emitted: u64,
    pub failed: u64,
    pub rfi_entries: u64,
    pub shutdown_reason: String,
}

/// Simulation state and sink of one sensor.
pub struct SensorRuntime {
    settings: SensorSettings,
    generator: AnchorDriftGenerator,
    scheduler: ModeScheduler,
    aggregator: SampleAggregator,
    sink: Box<dyn EmissionSink>,
    clock: Arc<dyn Clock>,
    summary: RunSummary,
    label: String,
}

impl SensorRuntime {
    pub fn new(
        settings: SensorSettings,
        clock: Arc<dyn Clock>,
        sink: Box<dyn EmissionSink>,
    ) -> Result<Self, SimError> {
        let generator = match settings.seed {
            Some(seed) => AnchorDriftGenerator::with_seed(
                settings.noise_floor,
                settings.std_dev,
                clock.clone(),
                seed,
            )?,
            None => {
                AnchorDriftGenerator::new(settings.noise_floor, settings.std_dev, clock.clone())?
            }
        };
        let scheduler = ModeScheduler::new(settings.schedule, clock.clone())?;
        let aggregator = SampleAggregator::new(settings.noise_floor);
        let label = format!("{}/{}", settings.hardware_id, settings.metadata_id);
        let summary = RunSummary {
            hardware_id: settings.hardware_id,
            metadata_id: settings.metadata_id,
            ..RunSummary::default()
        };

        Ok(Self {
            settings,
            generator,
            scheduler,
            aggregator,
            sink,
            clock,
            summary,
            label,
        })
    }

    /// Run one tick and return the record that was handed to the sink.
    pub async fn tick(&mut self) -> SensorRecord {
        if let Some(transition) = self.scheduler.evaluate(&mut self.generator) {
            self.log_transition(transition);
        }

        let batch = self.generator.generate(self.settings.samples_per_tick);
        let stats = self.aggregator.summarize(&batch);
        self.aggregator.record(batch);

        let record = SensorRecord::from_stats(
            self.settings.hardware_id,
            self.settings.metadata_id,
            self.clock.wall_clock(),
            &stats,
        );

        self.summary.ticks += 1;
        metrics::counter!(TICKS_TOTAL, "sensor" => self.label.clone()).increment(1);

        match self.sink.emit(&record).await {
            Ok(()) => self.summary.emitted += 1,
            Err(e) => {
                self.summary.failed += 1;
                metrics::counter!(EMIT_FAILURES_TOTAL, "sensor" => self.label.clone())
                    .increment(1);
                warn!(
                    sensor = %self.label,
                    sink = self.sink.name(),
                    "[SENSOR] Emission failed, record dropped: {:#}",
                    e
                );
            }
        }

        record
    }

    fn log_transition(&mut self, transition: Transition) {
        let now = self.clock.wall_clock().format(rfstats_core::CREATED_AT_FORMAT);
        match transition {
            Transition::EnterRfi => {
                self.summary.rfi_entries += 1;
                metrics::counter!(RFI_TRANSITIONS_TOTAL, "sensor" => self.label.clone())
                    .increment(1);
                info!(sensor = %self.label, "[MODE] Switching to RFI generation: {}", now);
            }
            Transition::EnterNoise => {
                info!(sensor = %self.label, "[MODE] Switching back to noise floor: {}", now);
            }
        }
    }

    /// Tick until `shutdown` flips to `true`, its sender goes away, or
    /// `max_ticks` is reached. The sink is closed before returning.
    ///
    /// The inter-tick sleep races the shutdown channel, so a stop request
    /// never waits for more than the current tick to finish.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> RunSummary {
        info!(
            sensor = %self.label,
            sink = self.sink.name(),
            interval_ms = self.settings.interval.as_millis() as u64,
            "[SENSOR] Starting tick loop"
        );

        let reason = loop {
            if *shutdown.borrow() {
                break "shutdown";
            }
            if self
                .settings
                .max_ticks
                .is_some_and(|max| self.summary.ticks >= max)
            {
                break "max_ticks";
            }

            self.tick().await;

            // Only a `true` ends the sleep early; other updates keep waiting.
            tokio::select! {
                biased;

                stopped = async { shutdown.wait_for(|stop| *stop).await.is_ok() } => {
                    break if stopped { "shutdown" } else { "controller_dropped" };
                }

                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        };

        self.summary.shutdown_reason = reason.to_string();
        if let Err(e) = self.sink.close().await {
            warn!(sensor = %self.label, "[SENSOR] Sink close failed: {:#}", e);
        }

        info!(
            sensor = %self.label,
            ticks = self.summary.ticks,
            emitted = self.summary.emitted,
            failed = self.summary.failed,
            rfi_entries = self.summary.rfi_entries,
            reason,
            "[SENSOR] Tick loop stopped"
        );
        self.summary
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn scheduler(&self) -> &ModeScheduler {
        &self.scheduler
    }

    pub fn generator(&self) -> &AnchorDriftGenerator {
        &self.generator
    }

    pub fn aggregator(&self) -> &SampleAggregator {
        &self.aggregator
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfstats_core::{InitialTrigger, MockClock, Mode, WINDOW_CAPACITY};
    use rfstats_emit::VecSink;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    fn settings() -> SensorSettings {
        SensorSettings {
            hardware_id: 1,
            metadata_id: 47,
            noise_floor: -115.0,
            std_dev: 2.0,
            samples_per_tick: 10,
            schedule: ScheduleParams {
                noise_duration: Duration::from_secs(25),
                rfi_duration: Duration::from_secs(12),
                rfi_shift: 20.0,
                initial_trigger: InitialTrigger::Immediate,
            },
            interval: Duration::from_secs(5),
            seed: Some(11),
            max_ticks: None,
        }
    }

    #[tokio::test]
    async fn tick_builds_record_from_latest_batch() {
        let clock = Arc::new(MockClock::new());
        let sink = VecSink::new();
        let mut rt = SensorRuntime::new(settings(), clock.clone(), Box::new(sink.clone())).unwrap();

        let record = rt.tick().await;
        assert_eq!(record.hardware_id, 1);
        assert_eq!(record.metadata_id, 47);
        assert_eq!(record.created_at, clock.wall_clock());
        assert!((record.average_db - -95.0).abs() < 3.0);
        assert!(record.kurtosis > 4.0);
        assert_eq!(rt.scheduler().mode(), Mode::Rfi);
        assert_eq!(sink.records(), vec![record]);
    }

    #[tokio::test]
    async fn window_stays_bounded_over_many_ticks() {
        let clock = Arc::new(MockClock::new());
        let mut rt =
            SensorRuntime::new(settings(), clock.clone(), Box::new(VecSink::new())).unwrap();
        for _ in 0..25 {
            rt.tick().await;
            clock.advance_secs(5.0);
        }
        assert_eq!(rt.aggregator().window_len(), WINDOW_CAPACITY);
        assert_eq!(rt.summary().ticks, 25);
        assert_eq!(rt.summary().emitted, 25);
    }

    #[tokio::test]
    async fn max_ticks_stops_loop_and_reports() {
        let mut s = settings();
        s.interval = Duration::from_millis(1);
        s.max_ticks = Some(3);
        let sink = VecSink::new();
        let rt = SensorRuntime::new(s, Arc::new(MockClock::new()), Box::new(sink.clone())).unwrap();

        let (_tx, rx) = watch::channel(false);
        let summary = rt.run(rx).await;

        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.emitted, 3);
        assert_eq!(summary.rfi_entries, 1);
        assert_eq!(summary.shutdown_reason, "max_ticks");
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn already_signalled_shutdown_runs_no_ticks() {
        let rt = SensorRuntime::new(
            settings(),
            Arc::new(MockClock::new()),
            Box::new(VecSink::new()),
        )
        .unwrap();
        let (_tx, rx) = watch::channel(true);
        let summary = rt.run(rx).await;
        assert_eq!(summary.ticks, 0);
        assert_eq!(summary.shutdown_reason, "shutdown");
    }

    /// Memory sink that also remembers whether `close` ran.
    struct Tracked {
        records: VecSink,
        closed: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl EmissionSink for Tracked {
        fn name(&self) -> &'static str {
            "tracked"
        }

        async fn emit(&mut self, record: &SensorRecord) -> anyhow::Result<()> {
            self.records.emit(record).await
        }

        async fn close(&mut self) -> anyhow::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    const LONG_INTERVAL: Duration = Duration::from_secs(60);

    /// Spawn a runtime with a 60 s interval and wait for its first tick.
    async fn spawn_long_interval() -> (
        watch::Sender<bool>,
        VecSink,
        Arc<AtomicBool>,
        tokio::task::JoinHandle<RunSummary>,
    ) {
        let mut s = settings();
        s.interval = LONG_INTERVAL;
        let records = VecSink::new();
        let closed = Arc::new(AtomicBool::new(false));
        let sink = Tracked {
            records: records.clone(),
            closed: closed.clone(),
        };
        let rt = SensorRuntime::new(s, Arc::new(MockClock::new()), Box::new(sink)).unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(rt.run(rx));
        while records.is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        (tx, records, closed, handle)
    }

    #[tokio::test]
    async fn stop_request_cuts_sleep_short_and_closes_sink() {
        let (tx, records, closed, handle) = spawn_long_interval().await;

        let started = Instant::now();
        tx.send(true).unwrap();
        let summary = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop kept sleeping after stop request")
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(summary.shutdown_reason, "shutdown");
        assert_eq!(summary.ticks, 1);
        assert_eq!(records.len(), 1);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn non_stop_update_does_not_skip_the_sleep() {
        let (tx, records, closed, handle) = spawn_long_interval().await;

        tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(records.len(), 1);
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        let summary = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
        assert_eq!(summary.ticks, 1);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dropped_controller_ends_loop_and_closes_sink() {
        let (tx, _records, closed, handle) = spawn_long_interval().await;

        drop(tx);
        let summary = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop kept sleeping after controller dropped")
            .unwrap();
        assert_eq!(summary.shutdown_reason, "controller_dropped");
        assert!(closed.load(Ordering::SeqCst));
    }
}
