//! Append-only "outputs" table persisted as JSON Lines.
//!
//! One row per record, columns in table order:
//! `hardware_id, metadata_id, created_at, average_db, max_db, median_db, std_dev, kurtosis`.
//! Each row is flushed as soon as it is written.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use rfstats_core::SensorRecord;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::sink::EmissionSink;

/// Sink that appends rows to an outputs table file.
pub struct OutputsTableSink {
    path: PathBuf,
    w: Option<BufWriter<tokio::fs::File>>,
    rows_written: u64,
}

impl OutputsTableSink {
    /// Open (or create) the table file for appending.
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create outputs dir {:?}", parent))?;
        }
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("open outputs table {:?}", path))?;
        tracing::info!("[SINK] Outputs table opened: {:?}", path);
        Ok(Self {
            path,
            w: Some(BufWriter::new(f)),
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

#[async_trait]
impl EmissionSink for OutputsTableSink {
    fn name(&self) -> &'static str {
        "outputs_table"
    }

    async fn emit(&mut self, record: &SensorRecord) -> anyhow::Result<()> {
        let w = self
            .w
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("outputs table {:?} already closed", self.path))?;
        let line = serde_json::to_string(record)?;
        w.write_all(line.as_bytes()).await?;
        w.write_all(b"\n").await?;
        w.flush().await?;
        self.rows_written += 1;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mut w) = self.w.take() {
            w.flush().await?;
            tracing::info!(
                rows = self.rows_written,
                "[SINK] Outputs table closed: {:?}",
                self.path
            );
        }
        Ok(())
    }
}

/// Read every row of an outputs table. Blank lines are skipped.
pub fn read_outputs_table(path: impl AsRef<Path>) -> anyhow::Result<Vec<SensorRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("open outputs table {:?}", path))?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read line {}", line_num + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let row: SensorRecord = serde_json::from_str(&line)
            .with_context(|| format!("parse line {}", line_num + 1))?;
        rows.push(row);
    }

    Ok(rows)
}
