//! # rfstats core
//!
//! Signal-simulation engine for synthetic RF noise-floor telemetry.
//!
//! ## Contents
//! - [`AnchorDriftGenerator`] - Gaussian samples around a drifting anchor,
//!   with lazily reverted temporary perturbations
//! - [`ModeScheduler`] - NOISE/RFI state machine that perturbs the generator
//! - [`SampleAggregator`] - bounded rolling window and per-batch statistics
//! - [`SensorRecord`] - the per-tick output row
//! - [`Clock`] - time seam shared by the stateful components
//!
//! No I/O and no async here; transports live in `rfstats-emit`, the tick
//! loop in `rfstats-runner`.

pub mod aggregator;
pub mod clock;
pub mod error;
pub mod generator;
pub mod record;
pub mod scheduler;

pub use aggregator::{SampleAggregator, SummaryStats, WINDOW_CAPACITY, kurtosis_proxy};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::SimError;
pub use generator::{AnchorDriftGenerator, PendingRevert};
pub use record::{CREATED_AT_FORMAT, SensorRecord};
pub use scheduler::{InitialTrigger, Mode, ModeScheduler, ScheduleParams, Transition};
