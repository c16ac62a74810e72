//! Task-wide statistics aggregation
//!
//! [`OverallStats`] is the sink every worker of a task reports to. It keeps
//! running totals for the final summary and a per-second window from which
//! the live display aggregates its recent span.

use chrono::{DateTime, Utc};
use requester_core::{RequestReport, ResponseStatus, StatsSink};
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Seconds of history kept in the window
const WINDOW_SECS: i64 = 60;

/// Seconds covered by the live display
pub const LIVE_SPAN_SECS: i64 = 30;

const BYTES_PER_MEGABIT: f64 = 1024.0 * 1024.0 / 8.0;

/// Count and summed latency for one status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTally {
    /// Requests with this status
    pub count: usize,
    /// Sum of their latencies
    pub latency_sum: Duration,
}

impl StatusTally {
    fn add(&mut self, elapsed: Duration) {
        self.count += 1;
        self.latency_sum += elapsed;
    }

    fn merge(&mut self, other: &StatusTally) {
        self.count += other.count;
        self.latency_sum += other.latency_sum;
    }

    /// Mean latency, zero when empty
    pub fn avg_latency(&self) -> Duration {
        u32::try_from(self.count)
            .ok()
            .filter(|n| *n > 0)
            .map_or(Duration::ZERO, |n| self.latency_sum / n)
    }
}

/// Requests dispatched during one wall-clock second
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondBucket {
    /// Unix timestamp of the second
    pub second: i64,
    /// Tallies per status
    pub by_status: BTreeMap<ResponseStatus, StatusTally>,
    /// Bytes transferred by those requests
    pub bytes: usize,
}

impl SecondBucket {
    fn new(second: i64) -> Self {
        Self {
            second,
            ..Default::default()
        }
    }

    fn record(&mut self, report: &RequestReport) {
        self.by_status.entry(report.status).or_default().add(report.elapsed);
        self.bytes += report.bytes_transferred;
    }
}

/// One row of a per-status breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    /// Status category
    pub status: ResponseStatus,
    /// Requests with this status
    pub count: usize,
    /// Share of all requests in percent
    pub share: f64,
    /// Mean latency
    pub avg_latency: Duration,
}

/// Aggregated counts over a set of requests
#[derive(Debug, Clone, PartialEq)]
pub struct Breakdown {
    /// Requests counted
    pub requests: usize,
    /// Successful requests
    pub successes: usize,
    /// Bytes transferred
    pub bytes: usize,
    /// Rows per status, most frequent first
    pub rows: Vec<StatusRow>,
}

impl Breakdown {
    fn from_tallies(tallies: &BTreeMap<ResponseStatus, StatusTally>, bytes: usize) -> Self {
        let requests: usize = tallies.values().map(|t| t.count).sum();
        let mut rows: Vec<StatusRow> = tallies
            .iter()
            .map(|(status, tally)| StatusRow {
                status: *status,
                count: tally.count,
                share: if requests > 0 {
                    tally.count as f64 * 100.0 / requests as f64
                } else {
                    0.0
                },
                avg_latency: tally.avg_latency(),
            })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then(a.status.cmp(&b.status)));

        Self {
            requests,
            successes: tallies
                .get(&ResponseStatus::Success)
                .map_or(0, |t| t.count),
            bytes,
            rows,
        }
    }

    /// Requests that did not succeed
    pub fn failures(&self) -> usize {
        self.requests - self.successes
    }

    fn write_tables(&self, out: &mut String) {
        let _ = writeln!(out, "| Total | Success | Failure |");
        let _ = writeln!(out, "+-------+---------+---------+");
        let _ = writeln!(
            out,
            "| {:^5} | {:^7} | {:^7} |",
            self.requests,
            self.successes,
            self.failures()
        );
        if self.rows.is_empty() {
            return;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "| Status          | Count | %      | Latency |");
        let _ = writeln!(out, "+-----------------+-------+--------+---------+");
        for row in &self.rows {
            let _ = writeln!(
                out,
                "| {:<15} | {:^5} | {:>5.1}% | {:>5.0}ms |",
                row.status.label(),
                row.count,
                row.share,
                millis(row.avg_latency)
            );
        }
    }
}

#[derive(Debug, Default)]
struct Totals {
    by_status: BTreeMap<ResponseStatus, StatusTally>,
    bytes: usize,
    latency_min: Option<Duration>,
    latency_max: Duration,
    window: VecDeque<SecondBucket>,
}

impl Totals {
    fn record(&mut self, report: &RequestReport) {
        self.by_status.entry(report.status).or_default().add(report.elapsed);
        self.bytes += report.bytes_transferred;
        self.latency_min = Some(
            self.latency_min
                .map_or(report.elapsed, |min| min.min(report.elapsed)),
        );
        self.latency_max = self.latency_max.max(report.elapsed);
        self.record_second(report);
    }

    fn record_second(&mut self, report: &RequestReport) {
        let second = report.reported_at.timestamp();

        // Reports from one worker arrive in order; across workers they may
        // be slightly out of order, so look back through the window.
        if let Some(bucket) = self.window.iter_mut().rev().find(|b| b.second == second) {
            bucket.record(report);
            return;
        }

        let mut bucket = SecondBucket::new(second);
        bucket.record(report);
        let position = self
            .window
            .iter()
            .rposition(|b| b.second < second)
            .map_or(0, |i| i + 1);
        self.window.insert(position, bucket);

        let newest = self.window.back().map_or(second, |b| b.second);
        while self
            .window
            .front()
            .is_some_and(|b| newest - b.second >= WINDOW_SECS)
        {
            self.window.pop_front();
        }
    }
}

/// Point-in-time view of the statistics
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    /// Time since collection started
    pub elapsed: Duration,
    /// Whole-run breakdown
    pub overall: Breakdown,
    /// Fastest request
    pub latency_min: Duration,
    /// Mean request latency
    pub latency_avg: Duration,
    /// Slowest request
    pub latency_max: Duration,
    /// Per-second history, oldest first
    pub window: Vec<SecondBucket>,
}

impl StatsSnapshot {
    /// Requests reported
    pub fn requests(&self) -> usize {
        self.overall.requests
    }

    /// Average requests per second over the whole run
    pub fn qps(&self) -> f64 {
        rate(self.requests() as f64, self.elapsed)
    }

    /// Average bandwidth over the whole run in megabits per second
    pub fn mbps(&self) -> f64 {
        rate(self.overall.bytes as f64 / BYTES_PER_MEGABIT, self.elapsed)
    }

    /// Breakdown of requests dispatched in the last `span` seconds, the
    /// current second included
    pub fn recent(&self, now: DateTime<Utc>, span: i64) -> Breakdown {
        let current = now.timestamp();
        let mut tallies: BTreeMap<ResponseStatus, StatusTally> = BTreeMap::new();
        let mut bytes = 0;
        for bucket in self.window.iter().filter(|b| current - b.second < span) {
            for (status, tally) in &bucket.by_status {
                tallies.entry(*status).or_default().merge(tally);
            }
            bytes += bucket.bytes;
        }
        Breakdown::from_tallies(&tallies, bytes)
    }

    /// Live view over the recent span; `None` until something was reported
    /// in it
    pub fn render_live(&self, now: DateTime<Utc>) -> Option<String> {
        let recent = self.recent(now, LIVE_SPAN_SECS);
        if recent.requests == 0 {
            return None;
        }

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:^30}\n",
            format!("Requests in last {LIVE_SPAN_SECS} seconds")
        );
        recent.write_tables(&mut out);
        let _ = writeln!(out);
        let _ = write!(
            out,
            "[{:.1}s] total {} | qps {:.1} | {:.2} Mbps | avg {:.1} ms",
            self.elapsed.as_secs_f64(),
            self.requests(),
            self.qps(),
            self.mbps(),
            millis(self.latency_avg),
        );
        Some(out)
    }

    /// Multi-line summary printed when a task finishes
    pub fn render_final(&self, task: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Task {task:?} finished in {:.2}s\n", self.elapsed.as_secs_f64());
        self.overall.write_tables(&mut out);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Latency: min {:.2} ms | avg {:.2} ms | max {:.2} ms",
            millis(self.latency_min),
            millis(self.latency_avg),
            millis(self.latency_max)
        );
        let _ = write!(
            out,
            "Throughput: {:.2} qps | {:.1} MB downloaded | {:.2} Mbps",
            self.qps(),
            self.overall.bytes as f64 / 1_048_576.0,
            self.mbps()
        );
        out
    }
}

/// Statistics sink shared by every worker of a task
#[derive(Debug)]
pub struct OverallStats {
    started: Instant,
    totals: Mutex<Totals>,
}

impl Default for OverallStats {
    fn default() -> Self {
        Self::new()
    }
}

impl OverallStats {
    /// Start collecting now
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            totals: Mutex::new(Totals::default()),
        }
    }

    /// Take a snapshot using the time elapsed since creation
    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(self.started.elapsed())
    }

    fn snapshot_at(&self, elapsed: Duration) -> StatsSnapshot {
        let totals = match self.totals.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut all = StatusTally::default();
        for tally in totals.by_status.values() {
            all.merge(tally);
        }

        StatsSnapshot {
            elapsed,
            overall: Breakdown::from_tallies(&totals.by_status, totals.bytes),
            latency_min: totals.latency_min.unwrap_or(Duration::ZERO),
            latency_avg: all.avg_latency(),
            latency_max: totals.latency_max,
            window: totals.window.iter().cloned().collect(),
        }
    }
}

impl StatsSink for OverallStats {
    fn report(&self, report: &RequestReport) {
        let mut totals = match self.totals.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        totals.record(report);
    }
}

fn rate(amount: f64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        amount / secs
    } else {
        0.0
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
