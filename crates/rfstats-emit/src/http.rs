//! HTTP transport: POSTs the CSV envelope to the monitor endpoint.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rfstats_core::{Clock, SensorRecord, SystemClock};
use tracing::debug;

use crate::csv_payload::TransportEnvelope;
use crate::sink::EmissionSink;

/// Connection settings for [`HttpCsvSink`].
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    pub endpoint: String,
    pub monitor_id: String,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub token: Option<String>,
    pub timeout: Duration,
}

/// Sink delivering each record as a base64 CSV envelope over HTTP.
///
/// The envelope window starts at the clock's wall time when `emit` runs.
pub struct HttpCsvSink {
    client: reqwest::Client,
    cfg: HttpSinkConfig,
    clock: Arc<dyn Clock>,
}

impl HttpCsvSink {
    /// Sink on the system clock.
    pub fn new(cfg: HttpSinkConfig) -> anyhow::Result<Self> {
        Self::with_clock(cfg, Arc::new(SystemClock::new()))
    }

    /// Sink stamping envelopes from `clock`, normally the one driving the
    /// sensor that owns it.
    pub fn with_clock(cfg: HttpSinkConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, cfg, clock })
    }

    pub fn endpoint(&self) -> &str {
        &self.cfg.endpoint
    }
}

#[async_trait]
impl EmissionSink for HttpCsvSink {
    fn name(&self) -> &'static str {
        "http_csv"
    }

    async fn emit(&mut self, record: &SensorRecord) -> anyhow::Result<()> {
        let envelope =
            TransportEnvelope::build(&self.cfg.monitor_id, record, self.clock.wall_clock())?;

        let mut req = self.client.post(&self.cfg.endpoint).json(&envelope);
        if let Some(token) = &self.cfg.token {
            req = req.bearer_auth(token);
        }

        let response = req
            .send()
            .await
            .with_context(|| format!("POST {}", self.cfg.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Monitor endpoint error ({}): {}", status, body);
        }

        debug!(status = %status, metadata_id = record.metadata_id, "[SINK] Envelope accepted");
        Ok(())
    }
}
