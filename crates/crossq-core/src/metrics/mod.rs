//! Latency measurement.
//!
//! # Usage
//!
//! ```ignore
//! use crossq_core::metrics::LatencyEngine;
//!
//! let engine = LatencyEngine::new(10, 100);
//! let stats = engine.run("investors-by-advisor/sql-json", || run_once())?;
//! println!("p99 = {:.3} ms", stats.p99_ms());
//! ```

mod latency;

pub use latency::{percentile, throughput, LatencyEngine, LatencyRecorder, LatencyStatistics};
