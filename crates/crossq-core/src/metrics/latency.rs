//! Latency recording and statistics.
//!
//! A [`LatencyRecorder`] holds exactly as many samples as the measurement
//! phase runs; percentiles use the nearest-rank rule over sorted samples.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Nearest-rank percentile: `sorted[ceil(p * n) - 1]`, clamped to index 0.
///
/// `sorted` must be ascending and non-empty.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    let rank = (p * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len().saturating_sub(1));
    sorted[index]
}

/// Iterations per second, with elapsed time floored to 1 ms.
pub fn throughput(iterations: usize, elapsed_ms: u64) -> f64 {
    iterations as f64 * 1000.0 / elapsed_ms.max(1) as f64
}

/// Summary of one measured workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyStatistics {
    pub label: String,
    pub iterations: usize,
    pub p50_ns: u64,
    pub p95_ns: u64,
    pub p99_ns: u64,
    pub mean_ns: f64,
    /// Iterations per second over the measurement phase.
    pub throughput: f64,
    pub elapsed_ms: u64,
}

impl LatencyStatistics {
    pub fn p50_ms(&self) -> f64 {
        self.p50_ns as f64 / 1e6
    }

    pub fn p95_ms(&self) -> f64 {
        self.p95_ns as f64 / 1e6
    }

    pub fn p99_ms(&self) -> f64 {
        self.p99_ns as f64 / 1e6
    }

    pub fn mean_ms(&self) -> f64 {
        self.mean_ns / 1e6
    }
}

/// Fixed-capacity buffer of per-call latencies in nanoseconds.
#[derive(Debug, Clone)]
pub struct LatencyRecorder {
    samples: Vec<u64>,
    capacity: usize,
}

impl LatencyRecorder {
    /// Create a recorder for exactly `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one sample.
    ///
    /// # Panics
    ///
    /// Panics if the recorder is full: the measurement loop ran more
    /// iterations than it sized the recorder for.
    pub fn record(&mut self, nanos: u64) {
        assert!(
            self.samples.len() < self.capacity,
            "latency recorder capacity {} exceeded",
            self.capacity
        );
        self.samples.push(nanos);
    }

    pub fn record_duration(&mut self, elapsed: Duration) {
        self.record(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Compute statistics given the wall-clock time of the measurement phase.
    pub fn compute(&self, label: &str, elapsed: Duration) -> Result<LatencyStatistics> {
        if self.samples.is_empty() {
            return Err(Error::NoSamples);
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();

        let n = sorted.len();
        let total: u128 = sorted.iter().map(|&s| s as u128).sum();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        Ok(LatencyStatistics {
            label: label.to_string(),
            iterations: n,
            p50_ns: percentile(&sorted, 0.50),
            p95_ns: percentile(&sorted, 0.95),
            p99_ns: percentile(&sorted, 0.99),
            mean_ns: total as f64 / n as f64,
            throughput: throughput(n, elapsed_ms),
            elapsed_ms,
        })
    }
}

/// Times a workload across warm-up and measurement phases.
#[derive(Debug, Clone, Copy)]
pub struct LatencyEngine {
    warm_up_iterations: usize,
    measurement_iterations: usize,
}

impl LatencyEngine {
    pub fn new(warm_up_iterations: usize, measurement_iterations: usize) -> Self {
        Self {
            warm_up_iterations,
            measurement_iterations,
        }
    }

    /// Run `workload` through both phases and summarize the measured calls.
    ///
    /// The first workload error aborts the run and is returned.
    pub fn run<F>(&self, label: &str, mut workload: F) -> Result<LatencyStatistics>
    where
        F: FnMut() -> Result<()>,
    {
        for _ in 0..self.warm_up_iterations {
            workload()?;
        }

        let mut recorder = LatencyRecorder::with_capacity(self.measurement_iterations);
        let started = Instant::now();
        for _ in 0..self.measurement_iterations {
            let call = Instant::now();
            workload()?;
            recorder.record_duration(call.elapsed());
        }
        let stats = recorder.compute(label, started.elapsed())?;

        debug!(
            label,
            iterations = stats.iterations,
            p50_ms = stats.p50_ms(),
            p99_ms = stats.p99_ms(),
            "measured"
        );
        Ok(stats)
    }
}
