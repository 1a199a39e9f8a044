//! Simulation metrics.

use std::collections::VecDeque;

use serde::Serialize;

/// Simulation metrics.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationMetrics {
    /// Operations attempted.
    pub total_operations: u64,
    /// Operations that returned `Ok`.
    pub successful_operations: u64,
    /// Operations that returned an error.
    pub failed_operations: u64,
    /// Latency samples (ms).
    #[serde(skip)]
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    #[serde(skip)]
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_operations: 0,
            successful_operations: 0,
            failed_operations: 0,
            latency_samples: VecDeque::with_capacity(1024),
            max_samples: 1024,
        }
    }

    /// Record a successful operation.
    pub fn record_success(&mut self, latency_ms: u64) {
        self.total_operations += 1;
        self.successful_operations += 1;
        self.push_sample(latency_ms);
    }

    /// Record a failed operation. Failures still took time.
    pub fn record_failure(&mut self, latency_ms: u64) {
        self.total_operations += 1;
        self.failed_operations += 1;
        self.push_sample(latency_ms);
    }

    fn push_sample(&mut self, latency_ms: u64) {
        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_ms);
    }

    /// Get average latency in ms.
    pub fn average_latency_ms(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p50 latency.
    pub fn p50_latency_ms(&self) -> u64 {
        self.percentile_latency(50)
    }

    /// Get p99 latency.
    pub fn p99_latency_ms(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }

        self.successful_operations as f64 / self.total_operations as f64
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_success(100);
        metrics.record_success(200);
        metrics.record_success(150);
        metrics.record_failure(30);

        assert_eq!(metrics.total_operations, 4);
        assert_eq!(metrics.successful_operations, 3);
        assert_eq!(metrics.failed_operations, 1);
        assert_eq!(metrics.average_latency_ms(), 120);
        assert_eq!(metrics.p50_latency_ms(), 150);
        assert_eq!(metrics.p99_latency_ms(), 200);
        assert_eq!(metrics.success_rate(), 0.75);
    }
}
