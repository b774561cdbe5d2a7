//! SQL Worker: loops until deadline, running `batch`
//! parametrised statements per transaction against a shared, pooled
//! datasource, updating the stats array and pacing itself per the
//! configured rate/load policy.

use crate::error::{Classification, RetryPolicy};
use crate::generator::TypedValue;
use crate::ring::RingHistory;
use crate::stats::{Slot, Stats};
use crate::template::{StatementTemplate, Verb};
use rand::rngs::StdRng;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Barrier;
use tokio::time::Duration as TokioDuration;

fn now_ns(epoch: Instant) -> i64 {
    epoch.elapsed().as_nanos() as i64
}

/// Per-worker immutable construction parameters.
pub struct WorkerConfig {
    pub id: u32,
    pub pool: PgPool,
    pub barrier: Arc<Barrier>,
    pub stats: Arc<Stats>,
    pub template: StatementTemplate,
    pub rng: StdRng,
    pub epoch: Instant,
    pub deadline_ns: i64,
    pub queries_per_tx: u32,
    pub iterate: bool,
    pub target_tx_time_ns: i64,
    pub desaturation: f64,
    pub ring_capacity: usize,
}

pub struct Worker {
    id: u32,
    pool: PgPool,
    barrier: Arc<Barrier>,
    stats: Arc<Stats>,
    template: StatementTemplate,
    pg_sql: String,
    rng: StdRng,
    epoch: Instant,
    deadline_ns: i64,
    queries_per_tx: u32,
    iterate: bool,
    target_tx_time_ns: i64,
    desaturation: f64,
    ring: RingHistory,
    retry_policy: RetryPolicy,
}

/// What happened after running a full worker — used by the supervisor to
/// log a summary without escalating a single worker's failure into a
/// process-wide abort. Stats from exited workers remain counted up to
/// their exit point.
#[derive(Debug)]
pub struct WorkerOutcome {
    pub id: u32,
    pub exited_early: bool,
    pub reason: Option<String>,
}

enum TxResult {
    Committed,
    RolledBack { deadlock: bool },
    Transient,
    NonTransient,
    Fatal(String),
}

impl Worker {
    pub fn new(cfg: WorkerConfig) -> Worker {
        let pg_sql = to_postgres_placeholders(&cfg.template.rewritten_sql);
        Worker {
            id: cfg.id,
            pool: cfg.pool,
            barrier: cfg.barrier,
            stats: cfg.stats,
            template: cfg.template,
            pg_sql,
            rng: cfg.rng,
            epoch: cfg.epoch,
            deadline_ns: cfg.deadline_ns,
            queries_per_tx: cfg.queries_per_tx,
            iterate: cfg.iterate,
            target_tx_time_ns: cfg.target_tx_time_ns,
            desaturation: cfg.desaturation,
            ring: RingHistory::new(cfg.ring_capacity),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub async fn run(mut self) -> WorkerOutcome {
        self.barrier.wait().await;
        self.stats.try_start(now_ns(self.epoch));

        let retry_attempts = AtomicU32::new(0);
        loop {
            if now_ns(self.epoch) >= self.deadline_ns {
                break;
            }

            match self.run_transaction().await {
                TxResult::Committed => {
                    retry_attempts.store(0, Ordering::Relaxed);
                }
                TxResult::RolledBack { deadlock } => {
                    retry_attempts.store(0, Ordering::Relaxed);
                    bump_abort_counter(&self.stats, deadlock);
                }
                TxResult::Transient => {
                    tracing::info!(worker = self.id, "transient connection loss, retrying next transaction");
                }
                TxResult::NonTransient => {
                    let attempt = retry_attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    if !self.retry_policy.should_retry(attempt) {
                        return WorkerOutcome {
                            id: self.id,
                            exited_early: true,
                            reason: Some("non-transient connection failure: retries exhausted".into()),
                        };
                    }
                    let delay = self.retry_policy.backoff_ms(attempt);
                    tokio::time::sleep(TokioDuration::from_millis(delay)).await;
                }
                TxResult::Fatal(reason) => {
                    tracing::error!(worker = self.id, %reason, "worker exiting after fatal SQL failure");
                    return WorkerOutcome { id: self.id, exited_early: true, reason: Some(reason) };
                }
            }
        }

        WorkerOutcome { id: self.id, exited_early: false, reason: None }
    }

    /// One outer-loop iteration: `begin`, `batch` statements, `commit`,
    /// then the pacing sleep.
    async fn run_transaction(&mut self) -> TxResult {
        let begin = now_ns(self.epoch);

        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => return classification_to_result(&e),
        };

        let mut response_ns: i64 = 0;
        let mut row_count: i64 = 0;

        for _ in 0..self.queries_per_tx {
            let mut query = sqlx::query(&self.pg_sql);
            for generator in &self.template.generators {
                let value = generator.next_value(&mut self.rng);
                query = bind_typed(query, value);
            }

            let start = now_ns(self.epoch);
            let outcome = dispatch(&mut tx, self.template.verb, query, self.iterate).await;
            let elapsed = now_ns(self.epoch) - start;
            response_ns += elapsed;

            match outcome {
                Ok(rows) => row_count += rows,
                Err(e) => return classification_to_result(&e),
            }
        }

        self.stats.add(Slot::LatencyTime, response_ns);
        self.stats.add(Slot::OpsTime, response_ns);
        self.stats.increment(Slot::TxCount);
        self.stats.add(Slot::OpsCount, self.queries_per_tx as i64);
        self.stats.add(Slot::RowCount, row_count);

        if let Err(e) = tx.commit().await {
            return classification_to_result(&e);
        }

        let end = now_ns(self.epoch);
        self.stats.add(Slot::TxTime, end - begin);
        self.ring.add(begin, end);
        self.stats.set_end(end);

        self.pace(response_ns).await;
        TxResult::Committed
    }

    /// Sleeps to hold the configured rate, or to back off proportionally
    /// to observed response time when no explicit rate target is set.
    async fn pace(&mut self, response_ns: i64) {
        if self.target_tx_time_ns > 0 {
            let sleep_ns = self.ring.sleep_time_ns(self.target_tx_time_ns);
            if sleep_ns > 0 {
                self.stats.add(Slot::InactiveTime, sleep_ns);
                tokio::time::sleep(ns_to_duration(sleep_ns)).await;
            }
        } else if self.desaturation > 0.0 && self.ring.len() > 1 {
            let sleep_ns = (response_ns as f64 * self.desaturation) as i64;
            if sleep_ns > 0 {
                self.stats.add(Slot::InactiveTime, sleep_ns);
                tokio::time::sleep(ns_to_duration(sleep_ns)).await;
            }
        }
    }
}

/// Rewrites the template's bare `?` placeholders (kept in `rewritten_sql` so
/// the parameter-site-count invariant stays checkable) into Postgres's
/// positional `$1, $2, ...` bind syntax, which is what `sqlx` sends over
/// the wire for this driver.
fn to_postgres_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut n = 0u32;
    for ch in sql.chars() {
        if ch == '?' {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push(ch);
        }
    }
    out
}

fn ns_to_duration(ns: i64) -> TokioDuration {
    TokioDuration::from_nanos(ns.max(0) as u64)
}

fn classification_to_result(err: &sqlx::Error) -> TxResult {
    match Classification::classify(err) {
        Classification::Rollback { deadlock } => TxResult::RolledBack { deadlock },
        Classification::TransientConnection => TxResult::Transient,
        Classification::NonTransientConnection => TxResult::NonTransient,
        Classification::OtherSql => TxResult::Fatal(err.to_string()),
    }
}

async fn dispatch(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    verb: Verb,
    query: Query<'_, Postgres, PgArguments>,
    iterate: bool,
) -> Result<i64, sqlx::Error> {
    match verb {
        Verb::Select => {
            if iterate {
                let rows = query.fetch_all(&mut **tx).await?;
                Ok(rows.len() as i64)
            } else {
                query.fetch_optional(&mut **tx).await?;
                Ok(0)
            }
        }
        Verb::Insert | Verb::Update | Verb::Delete | Verb::Execute => {
            query.execute(&mut **tx).await?;
            Ok(0)
        }
    }
}

fn bind_typed<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: TypedValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        TypedValue::Int(v) => query.bind(v),
        TypedValue::Long(v) => query.bind(v),
        TypedValue::Str(v) => query.bind(v),
        TypedValue::Bool(v) => query.bind(v),
        TypedValue::Date(v) => query.bind(v),
        TypedValue::DateTime(v) => query.bind(v),
    }
}

fn bump_abort_counter(stats: &Stats, deadlock: bool) {
    if deadlock {
        stats.increment(Slot::AbortDeadlock);
    } else {
        stats.increment(Slot::AbortConflict);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_in_order() {
        assert_eq!(
            to_postgres_placeholders("SELECT * FROM t WHERE a = ? AND b = ?"),
            "SELECT * FROM t WHERE a = $1 AND b = $2"
        );
    }

    #[test]
    fn no_placeholders_is_unchanged() {
        assert_eq!(to_postgres_placeholders("SELECT 1"), "SELECT 1");
    }
}
