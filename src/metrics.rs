//! Per-epoch metric emission.

use tracing::info;

/// Training loss of the final batch of the epoch.
pub const LOSS_TRAIN: &str = "loss_train";
/// Mean validation loss across evaluation chunks.
pub const LOSS_VAL: &str = "loss_val";
/// Average wall-clock seconds per training batch.
pub const BATCH_TIME_AVG: &str = "batch_time_avg";

/// Receives one scalar observation per metric per epoch. The runner's
/// `iteration` counter tracks the epoch index and keeps counting across
/// reruns, so it increases monotonically for a given sink instance; no other
/// format guarantees exist.
pub trait MetricsSink {
    fn emit(&mut self, name: &str, value: f64, iteration: usize);
}

/// Forwards every observation as a structured tracing event. The default
/// sink when nothing needs to consume metrics programmatically.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn emit(&mut self, name: &str, value: f64, iteration: usize) {
        info!(metric = name, value, iteration, "metric observed");
    }
}

/// One recorded observation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub name: String,
    pub value: f64,
    pub iteration: usize,
}

/// Keeps every observation in order. Meant for tests that assert on what a
/// run emitted.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    points: Vec<MetricPoint>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[MetricPoint] {
        &self.points
    }

    /// All recorded values for `name`, in emission order.
    pub fn values_for(&self, name: &str) -> Vec<f64> {
        self.points
            .iter()
            .filter(|p| p.name == name)
            .map(|p| p.value)
            .collect()
    }
}

impl MetricsSink for RecordingSink {
    fn emit(&mut self, name: &str, value: f64, iteration: usize) {
        self.points.push(MetricPoint {
            name: name.to_string(),
            value,
            iteration,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_emission_order() {
        let mut sink = RecordingSink::new();
        sink.emit(LOSS_TRAIN, 0.8, 0);
        sink.emit(LOSS_VAL, 0.9, 0);
        sink.emit(LOSS_VAL, 0.7, 1);

        assert_eq!(sink.points().len(), 3);
        assert_eq!(sink.values_for(LOSS_VAL), vec![0.9, 0.7]);
        assert_eq!(sink.points()[0].iteration, 0);
        assert_eq!(sink.points()[2].iteration, 1);
    }

    #[test]
    fn test_values_for_unknown_metric_is_empty() {
        let sink = RecordingSink::new();
        assert!(sink.values_for(BATCH_TIME_AVG).is_empty());
    }
}
