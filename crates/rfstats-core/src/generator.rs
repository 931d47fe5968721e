//! # Anchor-Drift Generator
//!
//! Gaussian sample source centred on a mutable anchor.
//!
//! ## Temporary perturbations
//! `shift_relative` / `shift_absolute` move the anchor and arm a pending
//! revert `(start, duration)`. There is no timer: the revert is evaluated
//! lazily at the top of [`AnchorDriftGenerator::generate`]. If nobody calls
//! `generate`, the anchor stays perturbed indefinitely, so staleness is
//! bounded only by the caller's tick cadence.
//!
//! A new perturbation always overwrites the pending revert; the previous
//! one is discarded without being applied.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::clock::Clock;
use crate::error::{SimError, require_finite};

/// Armed revert of a temporary anchor change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRevert {
    /// Clock reading (ns) when the perturbation was applied.
    pub start_ns: u64,
    /// How long the perturbation lasts.
    pub duration: Duration,
}

/// Gaussian generator around a drifting anchor.
pub struct AnchorDriftGenerator {
    original_anchor: f64,
    current_anchor: f64,
    std_dev: f64,
    pending_revert: Option<PendingRevert>,
    /// Zero-mean noise; the anchor is added per sample.
    noise: Normal<f64>,
    rng: StdRng,
    clock: Arc<dyn Clock>,
}

impl AnchorDriftGenerator {
    /// Create a generator seeded from OS entropy.
    pub fn new(anchor: f64, std_dev: f64, clock: Arc<dyn Clock>) -> Result<Self, SimError> {
        Self::build(anchor, std_dev, clock, StdRng::from_entropy())
    }

    /// Create a generator with a fixed seed (reproducible sample streams).
    pub fn with_seed(
        anchor: f64,
        std_dev: f64,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Result<Self, SimError> {
        Self::build(anchor, std_dev, clock, StdRng::seed_from_u64(seed))
    }

    fn build(
        anchor: f64,
        std_dev: f64,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Result<Self, SimError> {
        let anchor = require_finite("anchor", anchor)?;
        let std_dev = require_finite("std_dev", std_dev)?;
        if std_dev < 0.0 {
            return Err(SimError::invalid(
                "std_dev",
                format!("must be >= 0, got {std_dev}"),
            ));
        }
        let noise = Normal::new(0.0, std_dev)
            .map_err(|e| SimError::invalid("std_dev", e.to_string()))?;

        Ok(Self {
            original_anchor: anchor,
            current_anchor: anchor,
            std_dev,
            pending_revert: None,
            noise,
            rng,
            clock,
        })
    }

    /// Draw `n` independent samples from `N(current_anchor, std_dev)`.
    ///
    /// Applies an expired pending revert first. `n = 0` yields an empty vec.
    pub fn generate(&mut self, n: usize) -> Vec<f64> {
        self.apply_expired_revert();

        let anchor = self.current_anchor;
        (0..n)
            .map(|_| anchor + self.noise.sample(&mut self.rng))
            .collect()
    }

    /// Move the anchor by `delta` for `duration`.
    pub fn shift_relative(&mut self, delta: f64, duration: Duration) {
        self.current_anchor += delta;
        self.arm_revert(duration);
    }

    /// Move the anchor to `new_anchor` for `duration`.
    pub fn shift_absolute(&mut self, new_anchor: f64, duration: Duration) {
        self.current_anchor = new_anchor;
        self.arm_revert(duration);
    }

    fn arm_revert(&mut self, duration: Duration) {
        self.pending_revert = Some(PendingRevert {
            start_ns: self.clock.now_ns(),
            duration,
        });
    }

    fn apply_expired_revert(&mut self) {
        let Some(pending) = self.pending_revert else {
            return;
        };
        if self.clock.elapsed_since(pending.start_ns) >= pending.duration {
            tracing::debug!(
                from = self.current_anchor,
                to = self.original_anchor,
                "[GEN] Temporary anchor expired, reverting"
            );
            self.current_anchor = self.original_anchor;
            self.pending_revert = None;
        }
    }

    pub fn original_anchor(&self) -> f64 {
        self.original_anchor
    }

    pub fn current_anchor(&self) -> f64 {
        self.current_anchor
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    pub fn pending_revert(&self) -> Option<PendingRevert> {
        self.pending_revert
    }
}

impl std::fmt::Debug for AnchorDriftGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorDriftGenerator")
            .field("original_anchor", &self.original_anchor)
            .field("current_anchor", &self.current_anchor)
            .field("std_dev", &self.std_dev)
            .field("pending_revert", &self.pending_revert)
            .finish_non_exhaustive()
    }
}
