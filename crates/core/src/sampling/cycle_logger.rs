use std::collections::HashMap;
use std::time::Instant;

/// Stage name under which the scheduler records whole-cycle durations.
pub const TOTAL_STAGE: &str = "total";

/// Observer for sampling-cycle internals.
///
/// Decouples the scheduler from where timings end up (log output, a UI,
/// nowhere), so callers can watch per-stage cost without touching the
/// cycle code.
pub trait CycleLogger: Send {
    /// Record how long a named stage of one cycle took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time value (e.g. face count, brightness).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. The scheduler's default.
pub struct NullCycleLogger;

impl CycleLogger for NullCycleLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Aggregates stage timings and metrics and reports them through `log`.
pub struct StatsCycleLogger {
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    messages: Vec<String>,
}

impl StatsCycleLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            messages: Vec::new(),
        }
    }

    /// Number of cycles that reached the end of processing.
    pub fn cycles(&self) -> usize {
        self.timings.get(TOTAL_STAGE).map_or(0, Vec::len)
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() && self.messages.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let cycles = self.cycles();
        let mut lines = vec![format!(
            "Sampling summary ({cycles} cycles, {elapsed_s:.1}s):"
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let worst = durations.iter().copied().fold(0.0, f64::max);
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  max {worst:6.1}ms",
                mean(durations)
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            lines.push(format!("  {name}: avg {:.1}", mean(&self.metrics[name])));
        }

        if cycles > 0 && elapsed_s > 0.0 {
            lines.push(format!("  Rate: {:.2} Hz", cycles as f64 / elapsed_s));
        }

        for message in &self.messages {
            lines.push(format!("  Note: {message}"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }
}

impl Default for StatsCycleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleLogger for StatsCycleLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullCycleLogger;
        logger.timing("detect", 5.0);
        logger.metric("face_count", 1.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = StatsCycleLogger::new();
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("capture", 5.0);

        assert_eq!(logger.timings_for("detect"), Some(&[20.0, 30.0][..]));
        assert_eq!(logger.timings_for("capture"), Some(&[5.0][..]));
        assert!(logger.timings_for("brightness").is_none());
    }

    #[test]
    fn test_cycles_count_total_stage() {
        let mut logger = StatsCycleLogger::new();
        logger.timing("detect", 1.0);
        assert_eq!(logger.cycles(), 0);
        logger.timing(TOTAL_STAGE, 3.0);
        logger.timing(TOTAL_STAGE, 4.0);
        assert_eq!(logger.cycles(), 2);
    }

    #[test]
    fn test_summary_includes_stages_and_metrics() {
        let mut logger = StatsCycleLogger::new();
        logger.timing("detect", 20.0);
        logger.timing("detect", 40.0);
        logger.timing(TOTAL_STAGE, 45.0);
        logger.metric("brightness", 100.0);
        logger.metric("brightness", 120.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Sampling summary (1 cycles"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("max   40.0ms"));
        assert!(summary.contains("brightness: avg 110.0"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StatsCycleLogger::new().summary_string().is_none());
    }

    #[test]
    fn test_info_messages_appear_in_summary() {
        let mut logger = StatsCycleLogger::new();
        logger.info("sampling disabled after 3 overruns");

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Sampling summary (0 cycles"));
        assert!(summary.contains("  Note: sampling disabled after 3 overruns"));
    }
}
