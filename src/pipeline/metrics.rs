use std::time::Duration;

/// Throughput statistics across drive cycles.
#[derive(Debug, Clone, Default)]
pub struct ThroughputStats {
    pub cycles_completed: usize,
    pub cycles_stalled: usize,
    pub detections_routed: usize,
    pub last_cycle_time_us: u64,
    pub average_cycle_time_us: f32,
    pub frames_per_second: f32,
    pub average_frames_per_second: f32,
}

/// Tracks per-cycle timing and produces the summary text handed to sinks.
#[derive(Debug, Clone)]
pub struct ThroughputMonitor {
    stats: ThroughputStats,
    alpha: f32,
}

impl Default for ThroughputMonitor {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl ThroughputMonitor {
    pub fn new(alpha: f32) -> Self {
        Self {
            stats: ThroughputStats::default(),
            alpha: alpha.clamp(f32::EPSILON, 1.0),
        }
    }

    pub fn stats(&self) -> &ThroughputStats {
        &self.stats
    }

    /// Records a finished cycle and returns its summary, e.g. `(24.31 fps)`.
    pub fn record_cycle(&mut self, elapsed: Duration, detections_routed: usize) -> String {
        let elapsed_us = elapsed.as_micros() as u64;
        let fps = frames_per_second(elapsed);
        let stats = &mut self.stats;

        if stats.cycles_completed == 0 {
            stats.average_cycle_time_us = elapsed_us as f32;
            stats.average_frames_per_second = fps;
        } else {
            stats.average_cycle_time_us =
                Self::update_ewma(stats.average_cycle_time_us, elapsed_us as f32, self.alpha);
            stats.average_frames_per_second =
                Self::update_ewma(stats.average_frames_per_second, fps, self.alpha);
        }
        stats.cycles_completed += 1;
        stats.detections_routed += detections_routed;
        stats.last_cycle_time_us = elapsed_us;
        stats.frames_per_second = fps;

        tracing::debug!(
            "ThroughputMonitor: cycle {}, time={}us, avg={:.0}us",
            stats.cycles_completed,
            elapsed_us,
            stats.average_cycle_time_us
        );

        format!("({fps:.2} fps)")
    }

    pub fn record_stall(&mut self) {
        self.stats.cycles_stalled += 1;
    }

    fn update_ewma(current: f32, new_value: f32, alpha: f32) -> f32 {
        current * (1.0 - alpha) + new_value * alpha
    }
}

fn frames_per_second(elapsed: Duration) -> f32 {
    let seconds = elapsed.as_secs_f32();
    if seconds > 0.0 { 1.0 / seconds } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reports_frames_per_second() {
        let mut monitor = ThroughputMonitor::default();
        let summary = monitor.record_cycle(Duration::from_millis(40), 3);
        assert_eq!(summary, "(25.00 fps)");
        assert_eq!(monitor.stats().cycles_completed, 1);
        assert_eq!(monitor.stats().detections_routed, 3);
        assert_eq!(monitor.stats().last_cycle_time_us, 40_000);
    }

    #[test]
    fn averages_are_smoothed() {
        let mut monitor = ThroughputMonitor::new(0.5);
        monitor.record_cycle(Duration::from_millis(10), 0);
        monitor.record_cycle(Duration::from_millis(30), 0);
        assert_eq!(monitor.stats().average_cycle_time_us, 20_000.0);
    }

    #[test]
    fn zero_elapsed_does_not_divide_by_zero() {
        let mut monitor = ThroughputMonitor::default();
        assert_eq!(monitor.record_cycle(Duration::ZERO, 0), "(0.00 fps)");
    }

    #[test]
    fn stalls_are_counted_separately() {
        let mut monitor = ThroughputMonitor::default();
        monitor.record_stall();
        assert_eq!(monitor.stats().cycles_stalled, 1);
        assert_eq!(monitor.stats().cycles_completed, 0);
    }
}
