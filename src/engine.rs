//! Engine Supervisor: validates configuration, builds the shared connection
//! pool, spawns the worker pool and monitor behind a start barrier, and
//! collects the final summary.

use crate::config::Config;
use crate::data_table::DataTable;
use crate::error::EngineError;
use crate::monitor::{Monitor, MonitorConfig, Summary};
use crate::stats::Stats;
use crate::template::StatementTemplate;
use crate::worker::{Worker, WorkerConfig, WorkerOutcome};
use rand::SeedableRng;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Barrier;

pub struct Engine;

impl Engine {
    pub async fn run(config: Config) -> Result<Summary, EngineError> {
        let data_table = match &config.data_path {
            Some(path) => Arc::new(DataTable::load(path)?),
            None => Arc::new(DataTable::empty()),
        };

        let template = Arc::new(StatementTemplate::parse(
            &config.sql,
            config.params.as_deref(),
            Arc::clone(&data_table),
        )?);

        let pool = build_pool(&config).await?;

        let epoch = Instant::now();
        let deadline_ns = (config.time_secs as i64) * 1_000_000_000;
        let monitor_deadline_ns = deadline_ns + 100_000_000;

        let target_tx_time_ns = match config.rate {
            Some(rate) if rate > 0.0 => (1e9 * config.threads as f64 / rate) as i64,
            _ => 0,
        };
        let desaturation = if config.load > 0 && config.load < 100 {
            (100 - config.load) as f64 / config.load as f64
        } else {
            0.0
        };

        let ring_capacity = crate::ring::capacity_for(
            config.rate.unwrap_or(0.0),
            config.threads,
            config.time_secs,
        );

        let stats = Arc::new(Stats::new());
        let barrier = Arc::new(Barrier::new(config.threads as usize + 1));

        let mut worker_handles = Vec::with_capacity(config.threads as usize);
        for id in 0..config.threads {
            let worker = Worker::new(WorkerConfig {
                id,
                pool: pool.clone(),
                barrier: Arc::clone(&barrier),
                stats: Arc::clone(&stats),
                template: (*template).clone(),
                rng: rand::rngs::StdRng::from_entropy(),
                epoch,
                deadline_ns,
                queries_per_tx: config.batch,
                iterate: config.iterate,
                target_tx_time_ns,
                desaturation,
                ring_capacity,
            });
            worker_handles.push(tokio::spawn(worker.run()));
        }

        let monitor = Monitor::new(MonitorConfig {
            stats: Arc::clone(&stats),
            barrier: Arc::clone(&barrier),
            epoch,
            report_period_secs: config.report_secs,
            deadline_ns: monitor_deadline_ns,
            threads: config.threads,
        });
        let monitor_handle = tokio::spawn(monitor.run());

        for handle in worker_handles {
            match handle.await {
                Ok(outcome) => log_outcome(outcome),
                Err(e) => tracing::error!(error = %e, "worker task panicked"),
            }
        }

        let summary = monitor_handle
            .await
            .map_err(|e| EngineError::MonitorJoin(e.to_string()))?;

        Ok(summary)
    }
}

fn log_outcome(outcome: WorkerOutcome) {
    if outcome.exited_early {
        tracing::warn!(worker = outcome.id, reason = ?outcome.reason, "worker exited before deadline");
    }
}

// Options not recognised by `Config::from_bag` are still present in the
// bag (via `-property`) and pass through to the server as connection-time
// startup options, so database-specific tuning (e.g. a non-default
// `search_path`) is not limited to the fixed option set above.
const CONSUMED_KEYS: &[&str] = &[
    "url", "user", "password", "threads", "time", "batch", "rate", "load",
    "report", "data", "iterate", "sql", "params", "config", "check", "help",
];

async fn build_pool(config: &Config) -> Result<sqlx::PgPool, sqlx::Error> {
    let mut connect_options: sqlx::postgres::PgConnectOptions = config.url.parse()?;
    connect_options = connect_options.username(&config.user).password(&config.password);

    let passthrough: Vec<(&str, &str)> = config
        .bag
        .iter()
        .filter(|(k, _)| !CONSUMED_KEYS.contains(k))
        .collect();
    if !passthrough.is_empty() {
        connect_options = connect_options.options(passthrough);
    }

    PgPoolOptions::new()
        .max_connections(config.threads.max(1))
        .connect_with(connect_options)
        .await
}
