//! Periodically reads the shared stats array and prints an incremental
//! throughput/latency line; prints a terminal summary once the deadline
//! passes.

use crate::stats::{Slot, Stats};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Barrier;
use tokio::time::Duration as TokioDuration;

pub struct MonitorConfig {
    pub stats: Arc<Stats>,
    pub barrier: Arc<Barrier>,
    pub epoch: Instant,
    pub report_period_secs: u64,
    pub deadline_ns: i64,
    pub threads: u32,
}

pub struct Monitor {
    stats: Arc<Stats>,
    barrier: Arc<Barrier>,
    epoch: Instant,
    report_period: TokioDuration,
    deadline_ns: i64,
    threads: u32,
}

/// Final accumulated counters, returned by the supervisor after every
/// worker and the monitor have finished, and also printed by the monitor
/// as its own terminal line.
#[derive(Debug, Clone, Copy)]
pub struct Summary {
    pub tx_count: i64,
    pub ops_count: i64,
    pub row_count: i64,
    pub latency_time_ns: i64,
    pub tx_time_ns: i64,
    pub inactive_time_ns: i64,
    pub abort_conflict: i64,
    pub abort_deadlock: i64,
    pub elapsed_ns: i64,
}

impl Monitor {
    pub fn new(cfg: MonitorConfig) -> Monitor {
        Monitor {
            stats: cfg.stats,
            barrier: cfg.barrier,
            epoch: cfg.epoch,
            report_period: TokioDuration::from_secs(cfg.report_period_secs.max(1)),
            deadline_ns: cfg.deadline_ns,
            threads: cfg.threads.max(1),
        }
    }

    pub async fn run(self) -> Summary {
        self.barrier.wait().await;

        loop {
            let now = self.epoch.elapsed().as_nanos() as i64;
            if now >= self.deadline_ns {
                break;
            }
            tokio::time::sleep(self.report_period).await;
            self.emit_incremental();
        }

        let summary = self.summarize();
        self.emit_terminal(&summary);
        summary
    }

    fn emit_incremental(&self) {
        let ops = self.stats.get(Slot::OpsCount);
        let tx = self.stats.get(Slot::TxCount);
        let latency = self.stats.get(Slot::LatencyTime);
        let tx_time = self.stats.get(Slot::TxTime);
        let start = self.stats.get(Slot::StartTime);
        let now = self.epoch.elapsed().as_nanos() as i64;
        let total_ms = if start > 0 { (now - start) / 1_000_000 } else { 0 };
        let ops_per_s = rate_per_second(ops, total_ms);
        let ave_latency_ms = safe_ratio_ms(latency, ops);
        let ave_tx_ms = safe_ratio_ms(tx_time, tx);

        tracing::info!(
            "work={ops_per_s:.2}/s; time={total_ms}ms; ave latency={ave_latency_ms:.3}ms; ave tx={ave_tx_ms:.3}ms"
        );
    }

    fn summarize(&self) -> Summary {
        let start = self.stats.get(Slot::StartTime);
        let end = self.stats.get(Slot::EndTime);
        Summary {
            tx_count: self.stats.get(Slot::TxCount),
            ops_count: self.stats.get(Slot::OpsCount),
            row_count: self.stats.get(Slot::RowCount),
            latency_time_ns: self.stats.get(Slot::LatencyTime),
            tx_time_ns: self.stats.get(Slot::TxTime),
            inactive_time_ns: self.stats.get(Slot::InactiveTime),
            abort_conflict: self.stats.get(Slot::AbortConflict),
            abort_deadlock: self.stats.get(Slot::AbortDeadlock),
            elapsed_ns: if start > 0 { end.saturating_sub(start) } else { 0 },
        }
    }

    fn emit_terminal(&self, summary: &Summary) {
        let sleep_per_thread_ms = summary.inactive_time_ns / (self.threads as i64) / 1_000_000;
        tracing::info!(
            "final: tx={}; ops={}; rows={}; ave latency={:.3}ms; ave tx={:.3}ms; sleep={}ms",
            summary.tx_count,
            summary.ops_count,
            summary.row_count,
            safe_ratio_ms(summary.latency_time_ns, summary.ops_count),
            safe_ratio_ms(summary.tx_time_ns, summary.tx_count),
            sleep_per_thread_ms,
        );
        if summary.abort_conflict > 0 || summary.abort_deadlock > 0 {
            tracing::warn!(
                "aborts: conflict={}; deadlock={}",
                summary.abort_conflict,
                summary.abort_deadlock
            );
        }
    }
}

fn rate_per_second(count: i64, total_ms: i64) -> f64 {
    if total_ms <= 0 {
        0.0
    } else {
        count as f64 / (total_ms as f64 / 1000.0)
    }
}

fn safe_ratio_ms(total_ns: i64, count: i64) -> f64 {
    if count <= 0 {
        0.0
    } else {
        (total_ns as f64 / count as f64) / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_per_second_handles_zero_elapsed() {
        assert_eq!(rate_per_second(100, 0), 0.0);
    }

    #[test]
    fn safe_ratio_handles_zero_count() {
        assert_eq!(safe_ratio_ms(500, 0), 0.0);
    }

    #[test]
    fn safe_ratio_converts_ns_to_ms() {
        assert!((safe_ratio_ms(2_000_000, 1) - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn terminal_summary_reads_final_counters() {
        let stats = Arc::new(Stats::new());
        stats.try_start(0);
        stats.add(Slot::TxCount, 10);
        stats.add(Slot::OpsCount, 20);
        stats.add(Slot::LatencyTime, 4_000_000);
        stats.set_end(1_000_000_000);

        let barrier = Arc::new(Barrier::new(1));
        let monitor = Monitor::new(MonitorConfig {
            stats: stats.clone(),
            barrier,
            epoch: Instant::now(),
            report_period_secs: 1,
            deadline_ns: 0,
            threads: 2,
        });
        let summary = monitor.summarize();
        assert_eq!(summary.tx_count, 10);
        assert_eq!(summary.ops_count, 20);
        assert_eq!(summary.elapsed_ns, 1_000_000_000);
    }
}
