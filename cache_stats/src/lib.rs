// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Atomic counters and timing/byte histograms for the action cache, plus a summary printer.
//!
//! Every counter and histogram increments independently with a relaxed-order atomic add; there
//! are no cross-counter invariants to maintain, so readers never need to synchronize with
//! writers beyond the atomic operations themselves.

mod metric;

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

pub use metric::{Histogram, Metric};

const METRIC_COUNT: usize = 5;
const HISTOGRAM_COUNT: usize = 8;

fn metric_index(metric: Metric) -> usize {
    use Metric::*;
    match metric {
        CacheHit => 0,
        CacheMiss => 1,
        CacheStore => 2,
        RemoteActions => 3,
        RemoteFailures => 4,
    }
}

fn histogram_index(histogram: Histogram) -> usize {
    use Histogram::*;
    match histogram {
        ReadTimeMicros => 0,
        WriteTimeMicros => 1,
        InflateTimeMicros => 2,
        DeflateTimeMicros => 3,
        ReadBytes => 4,
        WriteBytes => 5,
        InflateBytes => 6,
        DeflateBytes => 7,
    }
}

/// A single histogram's running totals: a count of samples and their summed value. Enough to
/// report an average or a throughput; not a full quantile sketch.
#[derive(Default)]
struct HistogramTotals {
    count: AtomicU64,
    sum: AtomicU64,
}

impl HistogramTotals {
    fn record(&self, value: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value, Ordering::Relaxed);
    }

    fn snapshot(&self) -> (u64, u64) {
        (
            self.count.load(Ordering::Relaxed),
            self.sum.load(Ordering::Relaxed),
        )
    }
}

/// Process-wide cache statistics. Cheap to share: clone the `Arc` around it, or keep one behind
/// a static if a single build invocation only ever needs one.
#[derive(Default)]
pub struct CacheStats {
    counters: [AtomicU64; METRIC_COUNT],
    histograms: [HistogramTotals; HISTOGRAM_COUNT],
}

impl CacheStats {
    pub fn new() -> CacheStats {
        CacheStats::default()
    }

    pub fn record(&self, metric: Metric) {
        self.counters[metric_index(metric)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, metric: Metric) -> u64 {
        self.counters[metric_index(metric)].load(Ordering::Relaxed)
    }

    pub fn observe(&self, histogram: Histogram, value: u64) {
        self.histograms[histogram_index(histogram)].record(value);
    }

    /// `(sample_count, sum)` for the given histogram.
    pub fn histogram(&self, histogram: Histogram) -> (u64, u64) {
        self.histograms[histogram_index(histogram)].snapshot()
    }

    /// Writes a human-readable summary: cache hit rate, per-metric totals, and throughput/ratio
    /// derived from the byte and time histograms.
    pub fn write_summary(&self, mut out: impl io::Write) -> io::Result<()> {
        let hit = self.get(Metric::CacheHit);
        let miss = self.get(Metric::CacheMiss);
        let attempts = hit + miss;
        let hit_rate = if attempts == 0 {
            0.0
        } else {
            hit as f64 / attempts as f64 * 100.0
        };

        writeln!(out, "cache hit rate: {hit_rate:.1}% ({hit} hit, {miss} miss)")?;
        writeln!(out, "cache stores: {}", self.get(Metric::CacheStore))?;
        writeln!(
            out,
            "remote actions: {} ({} failed)",
            self.get(Metric::RemoteActions),
            self.get(Metric::RemoteFailures)
        )?;

        write_throughput_line(&mut out, "read", self.histogram(Histogram::ReadTimeMicros), self.histogram(Histogram::ReadBytes))?;
        write_throughput_line(&mut out, "write", self.histogram(Histogram::WriteTimeMicros), self.histogram(Histogram::WriteBytes))?;

        let (inflate_count, inflate_in_bytes) = self.histogram(Histogram::InflateBytes);
        let (deflate_count, deflate_in_bytes) = self.histogram(Histogram::DeflateBytes);
        write_throughput_line(&mut out, "inflate", self.histogram(Histogram::InflateTimeMicros), (inflate_count, inflate_in_bytes))?;
        write_throughput_line(&mut out, "deflate", self.histogram(Histogram::DeflateTimeMicros), (deflate_count, deflate_in_bytes))?;

        if deflate_in_bytes > 0 {
            let ratio = inflate_in_bytes as f64 / deflate_in_bytes as f64;
            writeln!(out, "compression ratio: {ratio:.2}x (inflated/deflated bytes)")?;
        }

        Ok(())
    }
}

fn write_throughput_line(
    out: &mut impl io::Write,
    label: &str,
    time_micros: (u64, u64),
    bytes: (u64, u64),
) -> io::Result<()> {
    let (samples, total_micros) = time_micros;
    let (_, total_bytes) = bytes;
    let mib_per_sec = if total_micros == 0 {
        0.0
    } else {
        let seconds = total_micros as f64 / 1_000_000.0;
        (total_bytes as f64 / (1024.0 * 1024.0)) / seconds
    };
    writeln!(
        out,
        "{label}: {samples} ops, {total_bytes} bytes, {mib_per_sec:.2} MiB/s"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_independently() {
        let stats = CacheStats::new();
        stats.record(Metric::CacheHit);
        stats.record(Metric::CacheHit);
        stats.record(Metric::CacheMiss);

        assert_eq!(stats.get(Metric::CacheHit), 2);
        assert_eq!(stats.get(Metric::CacheMiss), 1);
        assert_eq!(stats.get(Metric::CacheStore), 0);
    }

    #[test]
    fn histograms_accumulate_count_and_sum() {
        let stats = CacheStats::new();
        stats.observe(Histogram::ReadBytes, 100);
        stats.observe(Histogram::ReadBytes, 200);

        assert_eq!(stats.histogram(Histogram::ReadBytes), (2, 300));
    }

    #[test]
    fn summary_reports_hit_rate_and_throughput() {
        let stats = CacheStats::new();
        stats.record(Metric::CacheHit);
        stats.record(Metric::CacheHit);
        stats.record(Metric::CacheHit);
        stats.record(Metric::CacheMiss);

        stats.observe(Histogram::ReadTimeMicros, 1_000_000);
        stats.observe(Histogram::ReadBytes, 1024 * 1024);

        let mut buf = Vec::new();
        stats.write_summary(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("75.0%"));
        assert!(text.contains("1.00 MiB/s"));
    }

    #[test]
    fn summary_reports_compression_ratio_when_deflate_observed() {
        let stats = CacheStats::new();
        stats.observe(Histogram::InflateBytes, 400);
        stats.observe(Histogram::DeflateBytes, 100);

        let mut buf = Vec::new();
        stats.write_summary(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("4.00x"));
    }
}
