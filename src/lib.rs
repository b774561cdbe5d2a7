//! sqlload — a configurable multi-worker SQL load driver.
//!
//! Drives a relational database through a user-supplied parameterised SQL
//! statement with a pool of concurrent workers, sustaining either a
//! targeted transaction rate or a targeted load percentage, and reporting
//! throughput/latency periodically and at the end of the run.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod data_table;
pub mod engine;
pub mod error;
pub mod generator;
pub mod monitor;
pub mod printf;
pub mod ring;
pub mod stats;
pub mod template;
pub mod worker;
