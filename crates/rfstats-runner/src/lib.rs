//! # rfstats runner
//!
//! Tick loop, fleet orchestration and CLI for simulated RF noise-floor
//! sensors.
//!
//! ## Commands
//! - `run` - run every sensor of a TOML configuration
//! - `sensor` - run a single sensor from command-line flags
//! - `fleet` - run one sensor per metadata id on shared flags
//! - `check-config` - validate a configuration file and exit

pub mod config;
pub mod fleet;
pub mod observability;
pub mod runtime;
pub mod shutdown;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rfstats_core::InitialTrigger;
use tracing::info;

pub use config::{
    ConfigError, DEFAULT_METADATA_IDS, RfStatsConfig, SensorInfo, SimulationInfo, SinkInfo,
};
pub use fleet::{Fleet, build_sink};
pub use observability::{TracingGuards, init_observability};
pub use runtime::{RunSummary, SensorRuntime, SensorSettings};
pub use shutdown::install_shutdown_signal;

#[derive(Parser, Debug)]
#[command(name = "rfstats")]
#[command(about = "rfstats - synthetic RF noise-floor telemetry with RFI events")]
#[command(version)]
pub struct Cli {
    /// Directory for rotated log files
    #[arg(long, global = true, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Expose Prometheus metrics on this address, e.g. 0.0.0.0:9000
    #[arg(long, global = true, env = "RFSTATS_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every sensor listed in a configuration file
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/sensors.toml")]
        config: String,

        /// Stop each sensor after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Run a single simulated sensor
    Sensor {
        /// Hardware ID written into every record
        #[arg(long, allow_hyphen_values = true)]
        hardware_id: i64,

        /// Metadata ID written into every record
        #[arg(long, allow_hyphen_values = true)]
        metadata_id: i64,

        #[command(flatten)]
        sim: SimArgs,

        #[command(flatten)]
        sink: SinkArgs,
    },

    /// Run one sensor per metadata ID, all on the same hardware ID
    Fleet {
        /// Hardware ID shared by the fleet
        #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
        hardware_id: i64,

        /// Comma-separated metadata IDs
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_METADATA_IDS.to_vec())]
        metadata_ids: Vec<i64>,

        #[command(flatten)]
        sim: SimArgs,

        #[command(flatten)]
        sink: SinkArgs,
    },

    /// Validate a configuration file and print the resolved sensors
    CheckConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/sensors.toml")]
        config: String,
    },
}

/// Signal model flags shared by `sensor` and `fleet`.
#[derive(Args, Debug, Clone)]
pub struct SimArgs {
    /// Noise floor (dB) the anchor rests on
    #[arg(long, default_value_t = -115.0, allow_hyphen_values = true)]
    pub noise_floor: f64,

    /// Standard deviation of samples around the anchor
    #[arg(long, default_value_t = 2.0)]
    pub std_dev: f64,

    /// Samples drawn per tick
    #[arg(long, default_value_t = 10)]
    pub samples: usize,

    /// Seconds of noise floor between RFI events
    #[arg(long, default_value_t = 25.0)]
    pub noise_duration: f64,

    /// Seconds each RFI event lasts
    #[arg(long, default_value_t = 12.0)]
    pub rfi_duration: f64,

    /// Anchor shift (dB) during RFI
    #[arg(long, default_value_t = 20.0, allow_hyphen_values = true)]
    pub rfi_shift: f64,

    /// Seconds between ticks
    #[arg(long, default_value_t = 5.0)]
    pub write_interval: f64,

    /// When the first RFI event fires
    #[arg(long, value_enum, default_value_t = TriggerArg::Immediate)]
    pub initial_trigger: TriggerArg,

    /// RNG seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop after this many ticks
    #[arg(long)]
    pub ticks: Option<u64>,
}

/// Destination flags shared by `sensor` and `fleet`.
#[derive(Args, Debug, Clone, Default)]
pub struct SinkArgs {
    /// Append records to this JSONL outputs table
    #[arg(long, conflicts_with = "endpoint")]
    pub outputs: Option<PathBuf>,

    /// POST CSV envelopes to this monitor endpoint
    #[arg(long, requires = "monitor_id")]
    pub endpoint: Option<String>,

    /// Monitor identifier carried in the envelope
    #[arg(long)]
    pub monitor_id: Option<String>,

    /// Env var holding the bearer token for the endpoint
    #[arg(long)]
    pub token_env: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 10.0)]
    pub timeout: f64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerArg {
    Immediate,
    AfterNoisePhase,
}

impl From<TriggerArg> for InitialTrigger {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::Immediate => InitialTrigger::Immediate,
            TriggerArg::AfterNoisePhase => InitialTrigger::AfterNoisePhase,
        }
    }
}

impl SimArgs {
    pub fn to_simulation(&self) -> SimulationInfo {
        SimulationInfo {
            noise_floor: self.noise_floor,
            std_dev: self.std_dev,
            samples_per_tick: self.samples,
            noise_duration_secs: self.noise_duration,
            rfi_duration_secs: self.rfi_duration,
            rfi_shift: self.rfi_shift,
            write_interval_secs: self.write_interval,
            initial_trigger: self.initial_trigger.into(),
            seed: self.seed,
            max_ticks: self.ticks,
        }
    }
}

impl SinkArgs {
    pub fn to_sink(&self) -> SinkInfo {
        match (&self.outputs, &self.endpoint) {
            (Some(path), _) => SinkInfo::OutputsTable { path: path.clone() },
            (None, Some(endpoint)) => SinkInfo::Http {
                endpoint: endpoint.clone(),
                monitor_id: self.monitor_id.clone().unwrap_or_default(),
                token_env: self.token_env.clone(),
                timeout_secs: self.timeout,
            },
            (None, None) => SinkInfo::Log,
        }
    }
}

impl Commands {
    /// Resolve the command into a validated configuration.
    pub fn to_config(&self) -> anyhow::Result<RfStatsConfig> {
        let cfg = match self {
            Commands::Run { config, ticks } => {
                let mut cfg = RfStatsConfig::load(config)?;
                if ticks.is_some() {
                    cfg.simulation.max_ticks = *ticks;
                }
                cfg
            }
            Commands::CheckConfig { config } => RfStatsConfig::load(config)?,
            Commands::Sensor {
                hardware_id,
                metadata_id,
                sim,
                sink,
            } => RfStatsConfig {
                simulation: sim.to_simulation(),
                sensors: vec![SensorInfo {
                    hardware_id: *hardware_id,
                    metadata_id: *metadata_id,
                }],
                sink: sink.to_sink(),
            },
            Commands::Fleet {
                hardware_id,
                metadata_ids,
                sim,
                sink,
            } => RfStatsConfig {
                simulation: sim.to_simulation(),
                sensors: metadata_ids
                    .iter()
                    .map(|&metadata_id| SensorInfo {
                        hardware_id: *hardware_id,
                        metadata_id,
                    })
                    .collect(),
                sink: sink.to_sink(),
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Create the shared tokio runtime.
pub fn create_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create runtime: {}", e))
}

/// Main entry point for the rfstats binary.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let rt = create_runtime()?;
    rt.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> anyhow::Result<()> {
    let _guards = init_observability("rfstats", &cli.log_dir, cli.metrics_addr);

    // Configuration errors abort here, before any sensor starts.
    let cfg = cli.command.to_config()?;

    if let Commands::CheckConfig { config } = &cli.command {
        println!("{}: OK", config);
        println!("  sink: {:?}", cfg.sink);
        for s in &cfg.sensors {
            println!(
                "  sensor hardware_id={} metadata_id={}",
                s.hardware_id, s.metadata_id
            );
        }
        return Ok(());
    }

    let fleet = Fleet::from_config(&cfg).await?;
    let shutdown = install_shutdown_signal();
    let summaries = fleet.run(shutdown).await;

    for s in &summaries {
        info!(
            "Sensor {}/{} stopped ({}): ticks={}, emitted={}, failed={}, rfi_events={}",
            s.hardware_id,
            s.metadata_id,
            s.shutdown_reason,
            s.ticks,
            s.emitted,
            s.failed,
            s.rfi_entries
        );
    }
    println!("Stopping data generation... {} sensor(s) stopped.", summaries.len());

    Ok(())
}
