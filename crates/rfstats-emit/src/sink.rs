//! Emission sink trait and in-process implementations.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rfstats_core::SensorRecord;

/// Consumer of per-tick summary records (persistence, transport, logging).
///
/// Errors are reported to the tick loop, which logs them and moves on; a
/// record whose emission failed is not retried.
#[async_trait]
pub trait EmissionSink: Send {
    /// Short identifier used in log lines.
    fn name(&self) -> &'static str;

    /// Deliver one record.
    async fn emit(&mut self, record: &SensorRecord) -> anyhow::Result<()>;

    /// Flush and release held resources. Called once when the loop exits.
    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Console line in the layout the monitoring team greps for.
pub fn format_record_line(record: &SensorRecord) -> String {
    format!(
        "Inserting: Hardware ID: {}, Metadata ID: {}, Created At: {}, Average DB: {:.2}, \
         Max DB: {:.2}, Median DB: {:.2}, Std Dev: {:.4}, Kurtosis: {:.2}",
        record.hardware_id,
        record.metadata_id,
        record.created_at_string(),
        record.average_db,
        record.max_db,
        record.median_db,
        record.std_dev,
        record.kurtosis
    )
}

/// Sink that only logs records.
pub struct LoggingSink;

#[async_trait]
impl EmissionSink for LoggingSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn emit(&mut self, record: &SensorRecord) -> anyhow::Result<()> {
        tracing::info!("{}", format_record_line(record));
        Ok(())
    }
}

/// Sink that collects records in memory.
///
/// Clones share the same buffer, so a handle kept outside the runtime can
/// inspect what was emitted.
#[derive(Clone, Default)]
pub struct VecSink {
    records: Arc<Mutex<Vec<SensorRecord>>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records emitted so far.
    pub fn records(&self) -> Vec<SensorRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EmissionSink for VecSink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn emit(&mut self, record: &SensorRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("record buffer poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// Forwards each record to several sinks.
///
/// Every member is attempted even if an earlier one fails.
pub struct FanoutSink {
    sinks: Vec<Box<dyn EmissionSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn EmissionSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl EmissionSink for FanoutSink {
    fn name(&self) -> &'static str {
        "fanout"
    }

    async fn emit(&mut self, record: &SensorRecord) -> anyhow::Result<()> {
        let mut failures = Vec::new();
        for sink in &mut self.sinks {
            if let Err(e) = sink.emit(record).await {
                failures.push(format!("{}: {:#}", sink.name(), e));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "{} of {} sinks failed: {}",
                failures.len(),
                self.sinks.len(),
                failures.join("; ")
            )
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        let mut failures = Vec::new();
        for sink in &mut self.sinks {
            if let Err(e) = sink.close().await {
                failures.push(format!("{}: {:#}", sink.name(), e));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("close failed for {}", failures.join("; "))
        }
    }
}
