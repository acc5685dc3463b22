//! Performance monitoring and row conversion scheduling

use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::ExcelOptions;

/// A timing record that crossed the configured threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfObservation {
    pub operation: String,
    pub elapsed: Duration,
}

/// Times pipeline stages and logs the slow ones.
///
/// Monitoring never changes a stage's result, only whether a timing
/// record is produced.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceMonitor {
    enabled: bool,
    threshold: Duration,
}

impl PerformanceMonitor {
    pub fn new(enabled: bool, threshold: Duration) -> Self {
        Self { enabled, threshold }
    }

    pub fn from_options(options: &ExcelOptions) -> Self {
        Self::new(
            options.enable_performance_monitoring,
            Duration::from_millis(options.performance_threshold),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Observation for `elapsed`, if monitoring is on and it exceeds the threshold
    pub fn observe(&self, operation: &str, elapsed: Duration) -> Option<PerfObservation> {
        (self.enabled && elapsed > self.threshold).then(|| PerfObservation {
            operation: operation.to_string(),
            elapsed,
        })
    }

    /// Run `f`, logging its duration when it was slow
    pub fn measure<R>(&self, operation: &str, f: impl FnOnce() -> R) -> R {
        if !self.enabled {
            return f();
        }
        let start = Instant::now();
        let result = f();
        if let Some(observation) = self.observe(operation, start.elapsed()) {
            info!(
                operation = %observation.operation,
                elapsed_ms = observation.elapsed.as_millis() as u64,
                threshold_ms = self.threshold.as_millis() as u64,
                "slow spreadsheet operation"
            );
        }
        result
    }
}

/// Convert every item, in parallel once `items.len()` exceeds `parallel_threshold`.
///
/// Output order always equals input order: each result lands in the slot
/// of its input index. `convert` receives the item's index.
pub fn convert_rows<I, R, E, F>(items: &[I], parallel_threshold: usize, convert: F) -> Result<Vec<R>, E>
where
    I: Sync,
    R: Send,
    E: Send,
    F: Fn(usize, &I) -> Result<R, E> + Sync + Send,
{
    if items.len() > parallel_threshold {
        items
            .par_iter()
            .enumerate()
            .map(|(idx, item)| convert(idx, item))
            .collect()
    } else {
        items
            .iter()
            .enumerate()
            .map(|(idx, item)| convert(idx, item))
            .collect()
    }
}
