//! # Mode Scheduler
//!
//! Two-state machine alternating between the noise floor and RFI events.
//!
//! ## Transitions (evaluated once per tick, first match wins)
//! 1. `Noise` and `elapsed >= noise_duration`: shift the generator anchor by
//!    `rfi_shift` for `rfi_duration`, enter `Rfi`.
//! 2. `Rfi` and `elapsed >= rfi_duration`: enter `Noise`. The anchor is not
//!    touched here; the generator reverts it on its own.
//!
//! The scheduler keeps its own transition timestamp. It is not the same
//! timer as the generator's pending revert even though both use
//! `rfi_duration`, and the two may disagree by up to one tick.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{SimError, require_finite};
use crate::generator::AnchorDriftGenerator;

/// Simulation regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Noise,
    Rfi,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Noise => write!(f, "noise floor"),
            Mode::Rfi => write!(f, "RFI"),
        }
    }
}

/// When the first RFI event fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialTrigger {
    /// The first evaluation enters RFI straight away.
    #[default]
    Immediate,
    /// The first RFI waits one full noise phase from scheduler start.
    AfterNoisePhase,
}

/// A mode change applied by [`ModeScheduler::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    EnterRfi,
    EnterNoise,
}

impl Transition {
    pub fn target(self) -> Mode {
        match self {
            Transition::EnterRfi => Mode::Rfi,
            Transition::EnterNoise => Mode::Noise,
        }
    }
}

/// Phase timing for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleParams {
    pub noise_duration: Duration,
    pub rfi_duration: Duration,
    /// Anchor offset applied on entering RFI.
    pub rfi_shift: f64,
    pub initial_trigger: InitialTrigger,
}

impl ScheduleParams {
    pub fn validate(&self) -> Result<(), SimError> {
        require_finite("rfi_shift", self.rfi_shift)?;
        Ok(())
    }
}

/// NOISE/RFI state machine driven by elapsed time since the last switch.
pub struct ModeScheduler {
    params: ScheduleParams,
    mode: Mode,
    /// `None` until the first transition under `InitialTrigger::Immediate`.
    last_transition_ns: Option<u64>,
    clock: Arc<dyn Clock>,
}

impl ModeScheduler {
    pub fn new(params: ScheduleParams, clock: Arc<dyn Clock>) -> Result<Self, SimError> {
        params.validate()?;
        let last_transition_ns = match params.initial_trigger {
            InitialTrigger::Immediate => None,
            InitialTrigger::AfterNoisePhase => Some(clock.now_ns()),
        };
        Ok(Self {
            params,
            mode: Mode::Noise,
            last_transition_ns,
            clock,
        })
    }

    /// Apply at most one transition. Returns the transition that fired.
    pub fn evaluate(&mut self, generator: &mut AnchorDriftGenerator) -> Option<Transition> {
        let now_ns = self.clock.now_ns();
        let elapsed = self
            .last_transition_ns
            .map(|t| Duration::from_nanos(now_ns.saturating_sub(t)));

        match self.mode {
            Mode::Noise if elapsed.is_none_or(|e| e >= self.params.noise_duration) => {
                generator.shift_relative(self.params.rfi_shift, self.params.rfi_duration);
                self.mode = Mode::Rfi;
                self.last_transition_ns = Some(now_ns);
                Some(Transition::EnterRfi)
            }
            Mode::Rfi if elapsed.is_none_or(|e| e >= self.params.rfi_duration) => {
                self.mode = Mode::Noise;
                self.last_transition_ns = Some(now_ns);
                Some(Transition::EnterNoise)
            }
            _ => None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn params(&self) -> &ScheduleParams {
        &self.params
    }

    /// Clock reading of the most recent transition, if any has happened.
    pub fn last_transition_ns(&self) -> Option<u64> {
        self.last_transition_ns
    }
}

impl fmt::Debug for ModeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeScheduler")
            .field("params", &self.params)
            .field("mode", &self.mode)
            .field("last_transition_ns", &self.last_transition_ns)
            .finish_non_exhaustive()
    }
}
