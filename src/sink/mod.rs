//! Sinks receive every raw and derived metric the collector produces.
//!
//! Delivery is best-effort. A sink that fails to deliver logs the failure
//! itself; nothing is retried and nothing is reported back to the collector.

use metric::Metric;

mod console;
mod influxdb;
mod null;

pub use self::console::{Console, ConsoleConfig};
pub use self::influxdb::{InfluxDB, InfluxDBConfig};
pub use self::null::{Null, NullConfig};

/// A 'sink' is a consumer of metrics.
///
/// The collector calls `send` from producer threads and from the sampler
/// thread at once, so implementations synchronize their own state.
pub trait Sink: Send + Sync {
    /// Deliver a single metric.
    fn send(&self, metric: &Metric);
}
