//! Metrics tracking for extraction runs.

use std::time::Duration;

/// Metrics collected during one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMetrics {
    /// Resolver calls made, across all fields that finished.
    pub total_attempts: usize,
    /// Calls that were retries after a transient failure.
    pub retries: usize,
    /// Fields that ended `Ok`.
    pub fields_ok: usize,
    /// Fields that ended `Failed`, including deadline timeouts.
    pub fields_failed: usize,
    /// Wall-clock time of the run.
    pub wall_time: Duration,
}

impl RunMetrics {
    /// Share of fields that succeeded, in `[0, 1]`; `1.0` for an empty schema.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let total = self.fields_ok + self.fields_failed;
        if total == 0 {
            1.0
        } else {
            self.fields_ok as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        assert!((RunMetrics::default().success_rate() - 1.0).abs() < f64::EPSILON);

        let metrics = RunMetrics {
            fields_ok: 3,
            fields_failed: 1,
            ..RunMetrics::default()
        };
        assert!((metrics.success_rate() - 0.75).abs() < f64::EPSILON);
    }
}
