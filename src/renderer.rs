use burn::train::renderer::{MetricState, MetricsRenderer, TrainingProgress};
use std::collections::BTreeMap;

/// Reports training progress through [log] instead of the terminal dashboard.
///
/// Numeric metrics are kept as they are updated and printed every `interval`
/// iterations, and once more when an epoch completes.
pub struct LogRenderer {
    interval: usize,
    train: BTreeMap<String, f64>,
    valid: BTreeMap<String, f64>,
}

impl LogRenderer {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            train: BTreeMap::new(),
            valid: BTreeMap::new(),
        }
    }

    fn should_log(&self, item: &TrainingProgress) -> bool {
        item.iteration % self.interval == 0
            || item.progress.items_processed >= item.progress.items_total
    }
}

impl Default for LogRenderer {
    fn default() -> Self {
        Self::new(100)
    }
}

fn record(metrics: &mut BTreeMap<String, f64>, state: MetricState) {
    if let MetricState::Numeric(entry, value) = state {
        metrics.insert(entry.name, value);
    }
}

fn summary(metrics: &BTreeMap<String, f64>) -> String {
    metrics
        .iter()
        .map(|(name, value)| format!("{name} {value:.4}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl MetricsRenderer for LogRenderer {
    fn update_train(&mut self, state: MetricState) {
        record(&mut self.train, state);
    }

    fn update_valid(&mut self, state: MetricState) {
        record(&mut self.valid, state);
    }

    fn render_train(&mut self, item: TrainingProgress) {
        if self.should_log(&item) {
            log::info!(
                "[train] epoch {}/{} iteration {} ({}/{} items): {}",
                item.epoch,
                item.epoch_total,
                item.iteration,
                item.progress.items_processed,
                item.progress.items_total,
                summary(&self.train)
            );
        }
    }

    fn render_valid(&mut self, item: TrainingProgress) {
        if self.should_log(&item) {
            log::info!(
                "[valid] epoch {}/{} ({}/{} items): {}",
                item.epoch,
                item.epoch_total,
                item.progress.items_processed,
                item.progress.items_total,
                summary(&self.valid)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_metrics_by_name() {
        let mut metrics = BTreeMap::new();
        metrics.insert("Loss".to_string(), 0.25);
        metrics.insert("Accuracy".to_string(), 97.5);

        assert_eq!(summary(&metrics), "Accuracy 97.5000, Loss 0.2500");
    }

    #[test]
    fn interval_is_at_least_one() {
        assert_eq!(LogRenderer::new(0).interval, 1);
    }
}
