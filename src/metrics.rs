//! Throughput and memory counters for the dense engine.
//!
//! Written by the engine's orchestrating thread after each join, readable
//! from anywhere through a shared handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Point-in-time copy of [`PerformanceMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub throughput_cells_per_second: f64,
    /// Percentage of allocated dense buffer bytes that hold cells.
    pub memory_efficiency: f64,
    pub step_count: u64,
    pub cells_processed: u64,
    pub last_step_micros: u64,
}

#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    step_count: AtomicU64,
    cells_processed: AtomicU64,
    last_step_nanos: AtomicU64,
    // f64 values stored as raw bits
    throughput: AtomicU64,
    memory_efficiency: AtomicU64,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one committed step over `cells` cells.
    pub fn record_step(&self, cells: usize, elapsed: Duration) {
        self.step_count.fetch_add(1, Ordering::Relaxed);
        self.cells_processed
            .fetch_add(cells as u64, Ordering::Relaxed);
        let nanos = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        self.last_step_nanos.store(nanos, Ordering::Relaxed);

        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 { cells as f64 / secs } else { 0.0 };
        self.throughput
            .store(throughput.to_bits(), Ordering::Relaxed);
    }

    pub fn set_memory_efficiency(&self, percent: f64) {
        self.memory_efficiency
            .store(percent.to_bits(), Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.step_count.store(0, Ordering::Relaxed);
        self.cells_processed.store(0, Ordering::Relaxed);
        self.last_step_nanos.store(0, Ordering::Relaxed);
        self.throughput.store(0f64.to_bits(), Ordering::Relaxed);
    }

    pub fn step_count(&self) -> u64 {
        self.step_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            throughput_cells_per_second: f64::from_bits(self.throughput.load(Ordering::Relaxed)),
            memory_efficiency: f64::from_bits(self.memory_efficiency.load(Ordering::Relaxed)),
            step_count: self.step_count.load(Ordering::Relaxed),
            cells_processed: self.cells_processed.load(Ordering::Relaxed),
            last_step_micros: self.last_step_nanos.load(Ordering::Relaxed) / 1_000,
        }
    }
}
