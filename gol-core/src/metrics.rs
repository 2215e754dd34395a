//! Prometheus metrics for monitoring
//!
//! Counters, gauges and histograms for turn throughput, barrier round
//! latency and pool occupancy, rendered in the Prometheus text format.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

/// Counter metric (monotonically increasing)
pub struct Counter {
    value: AtomicU64,
    name: &'static str,
    help: &'static str,
}

impl Counter {
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            value: AtomicU64::new(0),
            name,
            help,
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {name} {}\n# TYPE {name} counter\n{name} {}\n",
            self.help,
            self.get(),
            name = self.name
        )
    }
}

/// Gauge metric (can go up or down)
pub struct Gauge {
    value: AtomicI64,
    name: &'static str,
    help: &'static str,
}

impl Gauge {
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            value: AtomicI64::new(0),
            name,
            help,
        }
    }

    pub fn set(&self, val: i64) {
        self.value.store(val, Ordering::Relaxed);
    }

    pub fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {name} {}\n# TYPE {name} gauge\n{name} {}\n",
            self.help,
            self.get(),
            name = self.name
        )
    }
}

const DEFAULT_BUCKETS: [f64; 12] = [
    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
];

/// Latency histogram with fixed buckets, in seconds
pub struct Histogram {
    buckets: [AtomicU64; DEFAULT_BUCKETS.len()],
    sum_micros: AtomicU64,
    count: AtomicU64,
    name: &'static str,
    help: &'static str,
}

impl Histogram {
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            buckets: [const { AtomicU64::new(0) }; DEFAULT_BUCKETS.len()],
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
            name,
            help,
        }
    }

    /// Observe a value in seconds
    pub fn observe(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add((value * 1_000_000.0) as u64, Ordering::Relaxed);

        for (bound, count) in DEFAULT_BUCKETS.iter().zip(&self.buckets) {
            if value <= *bound {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Time a closure and record the duration
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.observe(start.elapsed().as_secs_f64());
        result
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        let mut output = format!(
            "# HELP {name} {}\n# TYPE {name} histogram\n",
            self.help,
            name = self.name
        );

        for (bound, count) in DEFAULT_BUCKETS.iter().zip(&self.buckets) {
            let _ = writeln!(
                output,
                "{}_bucket{{le=\"{}\"}} {}",
                self.name,
                bound,
                count.load(Ordering::Relaxed)
            );
        }
        let _ = writeln!(output, "{}_bucket{{le=\"+Inf\"}} {}", self.name, self.count());

        let sum_secs = self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let _ = writeln!(output, "{}_sum {}", self.name, sum_secs);
        let _ = writeln!(output, "{}_count {}", self.name, self.count());

        output
    }
}

/// Process-wide metrics
pub mod standard {
    use super::*;

    pub static TURNS_COMPLETED: Counter =
        Counter::new("gol_turns_completed_total", "Barrier rounds merged by the coordinator");

    pub static CONTROL_SIGNALS: Counter =
        Counter::new("gol_control_signals_total", "Client control signals serviced");

    pub static LIVE_CELL_REPORTS: Counter =
        Counter::new("gol_live_cell_reports_total", "Live cell reports delivered to clients");

    pub static SEGMENT_TURNS: Counter =
        Counter::new("gol_segment_turns_total", "Segment generations computed by this worker");

    pub static ACTIVE_RUNS: Gauge = Gauge::new("gol_active_runs", "Simulation runs in progress");

    pub static REGISTERED_WORKERS: Gauge =
        Gauge::new("gol_registered_workers", "Workers registered in the pool");

    pub static LIVE_CELLS: Gauge =
        Gauge::new("gol_live_cells", "Live cells after the most recent merged turn");

    pub static ROUND_DURATION: Histogram =
        Histogram::new("gol_round_duration_seconds", "Barrier round latency");

    pub static SEGMENT_STEP_DURATION: Histogram =
        Histogram::new("gol_segment_step_duration_seconds", "Segment generation compute time");
}

/// Render every standard metric
pub fn gather_system_metrics() -> String {
    use standard::*;

    [
        TURNS_COMPLETED.to_prometheus(),
        CONTROL_SIGNALS.to_prometheus(),
        LIVE_CELL_REPORTS.to_prometheus(),
        SEGMENT_TURNS.to_prometheus(),
        ACTIVE_RUNS.to_prometheus(),
        REGISTERED_WORKERS.to_prometheus(),
        LIVE_CELLS.to_prometheus(),
        ROUND_DURATION.to_prometheus(),
        SEGMENT_STEP_DURATION.to_prometheus(),
    ]
    .concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new("test_counter", "Test counter");
        counter.inc();
        counter.inc_by(5);
        assert_eq!(counter.get(), 6);
        assert!(counter.to_prometheus().contains("test_counter 6"));
    }

    #[test]
    fn test_gauge() {
        let gauge = Gauge::new("test_gauge", "Test gauge");
        gauge.set(10);
        gauge.add(-1);
        assert_eq!(gauge.get(), 9);
    }

    #[test]
    fn test_histogram() {
        let histogram = Histogram::new("test_histogram", "Test histogram");

        histogram.observe(0.001);
        histogram.observe(0.01);
        let value = histogram.time(|| 7);
        assert_eq!(value, 7);

        let prometheus = histogram.to_prometheus();
        assert!(prometheus.contains("test_histogram_count 3"));
        assert!(prometheus.contains("test_histogram_bucket{le=\"+Inf\"} 3"));
    }

    #[test]
    fn test_gather_includes_standard_metrics() {
        let output = gather_system_metrics();
        assert!(output.contains("gol_turns_completed_total"));
        assert!(output.contains("gol_round_duration_seconds_bucket"));
    }
}
