//! Telemon is the metric ingestion core of a monitoring client. Applications
//! hand it typed samples, it optionally derives rates or running totals from
//! the per-name history of those samples and fans every raw and derived
//! metric out to the configured sinks. A background sampler can report
//! process resource usage through the same path.
//!
//! The moving parts:
//!
//!  * `metric` -- the `MetricValue` sum type and the immutable `Metric`.
//!  * `derived` -- rate and increment computation over per-name history.
//!  * `sink` -- the `Sink` trait and the backends shipped with the crate.
//!  * `sampler` -- the process sampling capability and its sysinfo reader.
//!  * `collector` -- ties the above together behind `Collector::send`.
#![allow(unknown_lints)]
#![deny(trivial_numeric_casts, missing_docs, unstable_features, unused_import_braces)]
extern crate chrono;
extern crate clap;
extern crate hostname;
extern crate serde;
extern crate sysinfo;
extern crate toml;

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
extern crate tempdir;

pub mod collector;
pub mod config;
pub mod derived;
pub mod metric;
pub mod sampler;
pub mod sink;
pub mod thread;
pub mod time;

pub use collector::{Collector, CollectorConfig, SendError};
pub use derived::{DerivedMetrics, Mode};
pub use metric::{Metric, MetricValue, ValueKind};
