//! # Sample Aggregator
//!
//! Rolling window of recent batches plus per-batch summary statistics.
//!
//! ## Window vs. statistics
//! The window keeps the last [`WINDOW_CAPACITY`] batches (FIFO eviction).
//! Statistics are computed from the batch passed to [`SampleAggregator::summarize`]
//! only; the window contents never feed into them. Downstream consumers are
//! calibrated against per-batch numbers, so the window is kept as state only.
//!
//! ## Kurtosis proxy
//! Not a statistical kurtosis. It is a clipped linear severity score:
//! `max(0, ((mean - noise_floor) + 2) * 0.6)`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Maximum number of batches retained in the rolling window.
pub const WINDOW_CAPACITY: usize = 20;

/// Offset added to the mean drift before scaling.
const KURTOSIS_OFFSET: f64 = 2.0;
/// Scale applied to the offset drift.
const KURTOSIS_SCALE: f64 = 0.6;

/// Summary statistics for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub average: f64,
    pub max: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub kurtosis_proxy: f64,
}

/// Rolling batch window and summary computation.
#[derive(Debug, Clone)]
pub struct SampleAggregator {
    noise_floor: f64,
    batches: VecDeque<Vec<f64>>,
}

impl SampleAggregator {
    pub fn new(noise_floor: f64) -> Self {
        Self {
            noise_floor,
            batches: VecDeque::with_capacity(WINDOW_CAPACITY + 1),
        }
    }

    /// Append a batch, evicting the oldest beyond capacity.
    pub fn record(&mut self, batch: Vec<f64>) {
        self.batches.push_back(batch);
        while self.batches.len() > WINDOW_CAPACITY {
            self.batches.pop_front();
        }
    }

    /// Statistics for `batch` alone.
    pub fn summarize(&self, batch: &[f64]) -> SummaryStats {
        let average = mean(batch);
        SummaryStats {
            average,
            max: max(batch),
            median: median(batch),
            std_dev: population_std_dev(batch, average),
            kurtosis_proxy: kurtosis_proxy(average, self.noise_floor),
        }
    }

    pub fn noise_floor(&self) -> f64 {
        self.noise_floor
    }

    /// Batches in the window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &[f64]> {
        self.batches.iter().map(Vec::as_slice)
    }

    pub fn window_len(&self) -> usize {
        self.batches.len()
    }

    /// Total samples across the window.
    pub fn combined_len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// All window samples concatenated, oldest first.
    pub fn combined(&self) -> Vec<f64> {
        self.batches.iter().flatten().copied().collect()
    }
}

/// `max(0, ((mean - noise_floor) + 2) * 0.6)`. NaN clips to zero.
pub fn kurtosis_proxy(mean: f64, noise_floor: f64) -> f64 {
    let raw = ((mean - noise_floor) + KURTOSIS_OFFSET) * KURTOSIS_SCALE;
    if raw >= 0.0 { raw } else { 0.0 }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn max(xs: &[f64]) -> f64 {
    xs.iter().copied().reduce(f64::max).unwrap_or(f64::NAN)
}

fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn population_std_dev(xs: &[f64], mean: f64) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_bounded_fifo() {
        let mut agg = SampleAggregator::new(-115.0);
        for i in 0..25 {
            agg.record(vec![i as f64]);
            assert!(agg.window_len() <= WINDOW_CAPACITY);
        }
        assert_eq!(agg.window_len(), 20);
        let firsts: Vec<f64> = agg.window().map(|b| b[0]).collect();
        assert_eq!(firsts.first(), Some(&5.0));
        assert_eq!(firsts.last(), Some(&24.0));
        assert!(!firsts.contains(&4.0));
    }

    #[test]
    fn combined_concatenates_window() {
        let mut agg = SampleAggregator::new(0.0);
        agg.record(vec![1.0, 2.0]);
        agg.record(vec![3.0]);
        assert_eq!(agg.combined(), vec![1.0, 2.0, 3.0]);
        assert_eq!(agg.combined_len(), 3);
    }

    #[test]
    fn summary_ignores_window() {
        let mut agg = SampleAggregator::new(-115.0);
        agg.record(vec![1_000.0; 10]);
        let batch = [-115.0, -113.0, -117.0, -115.0];
        let stats = agg.summarize(&batch);
        assert_eq!(stats.average, -115.0);
        assert_eq!(stats.max, -113.0);
    }

    #[test]
    fn statistics_match_reference_definitions() {
        let agg = SampleAggregator::new(0.0);
        let stats = agg.summarize(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.average, 5.0);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.median, 4.5);
        assert_eq!(stats.std_dev, 2.0);

        let odd = agg.summarize(&[3.0, 1.0, 2.0]);
        assert_eq!(odd.median, 2.0);
    }

    #[test]
    fn kurtosis_proxy_formula_and_clip() {
        // (-95 - -115 + 2) * 0.6
        assert!((kurtosis_proxy(-95.0, -115.0) - 13.2).abs() < 1e-9);
        // (-115 - -115 + 2) * 0.6
        assert!((kurtosis_proxy(-115.0, -115.0) - 1.2).abs() < 1e-9);
        assert_eq!(kurtosis_proxy(-117.0, -115.0), 0.0);
        assert_eq!(kurtosis_proxy(-130.0, -115.0), 0.0);
        assert_eq!(kurtosis_proxy(f64::NAN, -115.0), 0.0);
    }

    #[test]
    fn kurtosis_proxy_never_negative() {
        let agg = SampleAggregator::new(-50.0);
        for k in -200..200 {
            let x = k as f64 * 0.5;
            let stats = agg.summarize(&[x, x + 1.0, x - 1.0]);
            assert!(stats.kurtosis_proxy >= 0.0);
            let expected = ((stats.average + 50.0) + 2.0) * 0.6;
            if expected >= 0.0 {
                assert_eq!(stats.kurtosis_proxy, expected);
            }
        }
    }

    #[test]
    fn empty_batch_does_not_panic() {
        let agg = SampleAggregator::new(-115.0);
        let stats = agg.summarize(&[]);
        assert!(stats.average.is_nan());
        assert!(stats.max.is_nan());
        assert!(stats.median.is_nan());
        assert!(stats.std_dev.is_nan());
        assert_eq!(stats.kurtosis_proxy, 0.0);
    }
}
