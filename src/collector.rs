//! The `Collector`, single entry point for application metrics.

use chrono::{DateTime, Utc};
use derived::{self, DerivedMetrics, Mode};
use metric::{self, Metric, MetricValue};
use sampler::{ProcessSampler, SystemSampler};
use sink::Sink;
use std::error;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use thread::{self, Signal, ThreadHandle};
use time;

/// Construction parameters for a `Collector`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    /// Upper bound on names registered for derivation, zero for none.
    pub max_cache_size: usize,
    /// Poll interval of the background process monitor. `None` disables it;
    /// zero is rejected.
    pub process_monitor_interval: Option<Duration>,
}

impl Default for CollectorConfig {
    fn default() -> CollectorConfig {
        CollectorConfig {
            max_cache_size: 1_000,
            process_monitor_interval: None,
        }
    }
}

/// Failure of `Collector::send`.
///
/// The raw metric has always been delivered by the time this is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum SendError {
    /// The metric's value could not be derived under its registered mode.
    Derivation {
        /// The metric name.
        name: String,
        /// What the derived metrics engine objected to.
        error: derived::Error,
    },
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SendError::Derivation {
                ref name,
                ref error,
            } => write!(f, "derived metrics failed for {}: {}", name, error),
        }
    }
}

impl error::Error for SendError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            SendError::Derivation { ref error, .. } => Some(error),
        }
    }
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State shared between the collector and its process monitor thread.
struct Shared {
    sinks: Vec<Box<dyn Sink>>,
    entity: RwLock<Arc<String>>,
}

impl Shared {
    fn entity(&self) -> Arc<String> {
        match self.entity.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn dispatch(&self, metric: &Metric) {
        for sink in &self.sinks {
            sink.send(metric);
        }
    }

    /// Deliver without consulting the derived metrics engine.
    fn send_raw(&self, value: MetricValue, name: String, timestamp: DateTime<Utc>) {
        let metric = Metric::from_parts(value, name, (*self.entity()).clone(), timestamp);
        self.dispatch(&metric);
    }
}

/// Fans metrics out to sinks, deriving rates and totals on the way.
///
/// A `Collector` is `Sync`: share it between producer threads behind an
/// `Arc`. Every `send` runs through the sinks sequentially on the calling
/// thread, so a slow sink slows every producer.
pub struct Collector {
    shared: Arc<Shared>,
    derived: DerivedMetrics,
    sampler: Arc<Mutex<Box<dyn ProcessSampler>>>,
    monitor: Option<ThreadHandle>,
}

impl Collector {
    /// Create a collector sampling processes through `SystemSampler`.
    pub fn new(sinks: Vec<Box<dyn Sink>>, config: CollectorConfig) -> io::Result<Collector> {
        Collector::with_sampler(sinks, config, Box::new(SystemSampler::new()))
    }

    /// Create a collector sampling processes through `sampler`.
    ///
    /// Starts the process monitor thread if `config` enables it. Fails if
    /// the poll interval is zero or the thread cannot be spawned.
    pub fn with_sampler(
        sinks: Vec<Box<dyn Sink>>,
        config: CollectorConfig,
        sampler: Box<dyn ProcessSampler>,
    ) -> io::Result<Collector> {
        let shared = Arc::new(Shared {
            sinks: sinks,
            entity: RwLock::new(Arc::new(metric::default_entity().to_string())),
        });
        let sampler = Arc::new(Mutex::new(sampler));

        let monitor = match config.process_monitor_interval {
            Some(interval) if interval == Duration::from_secs(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "process monitor interval must be positive",
                ));
            }
            Some(interval) => {
                let shared = Arc::clone(&shared);
                let sampler = Arc::clone(&sampler);
                let handle = thread::spawn("process-monitor", move |signal| {
                    monitor_loop(&shared, &sampler, interval, signal)
                })?;
                info!("process monitor enabled, polling every {:?}", interval);
                Some(handle)
            }
            None => None,
        };

        Ok(Collector {
            shared: shared,
            derived: DerivedMetrics::new(config.max_cache_size),
            sampler: sampler,
            monitor: monitor,
        })
    }

    /// Send `value` under `name`, timestamped now.
    ///
    /// See `send_at`.
    pub fn send<V, S>(&self, value: V, name: S) -> Result<(), SendError>
    where
        V: Into<MetricValue>,
        S: Into<String>,
    {
        self.send_at(value, name, time::now())
    }

    /// Send `value` under `name` with an explicit timestamp.
    ///
    /// The metric is tagged with the current default entity. If the name is
    /// registered for derivation the derived metric, when there is one, goes
    /// to every sink first. The raw metric then goes to every sink
    /// regardless of how derivation went.
    ///
    /// A missing baseline or a repeated timestamp in rate mode is routine and
    /// only logged. Any other derivation failure is returned once the raw
    /// metric has been delivered.
    pub fn send_at<V, S>(&self, value: V, name: S, timestamp: DateTime<Utc>) -> Result<(), SendError>
    where
        V: Into<MetricValue>,
        S: Into<String>,
    {
        let metric = Metric::from_parts(
            value.into(),
            name.into(),
            (*self.shared.entity()).clone(),
            timestamp,
        );

        let mut result = Ok(());
        match self.derived.process(&metric) {
            Ok(Some(derived)) => self.shared.dispatch(&derived),
            Ok(None) => {}
            Err(ref e) if e.is_expected() => {
                trace!("no derived value for {}: {}", metric.name(), e);
            }
            Err(e) => {
                result = Err(SendError::Derivation {
                    name: metric.name().to_string(),
                    error: e,
                });
            }
        }
        self.shared.dispatch(&metric);
        result
    }

    /// Register `name` for derivation under `mode`.
    pub fn add_derived_metric<S>(&self, mode: Mode, name: S) -> Result<(), derived::Error>
    where
        S: Into<String>,
    {
        self.derived.register(mode, name)
    }

    /// Replace the entity tag applied to metrics sent from now on.
    pub fn set_entity<S>(&self, entity: S)
    where
        S: Into<String>,
    {
        let entity = Arc::new(entity.into());
        match self.shared.entity.write() {
            Ok(mut guard) => *guard = entity,
            Err(poisoned) => *poisoned.into_inner() = entity,
        }
    }

    /// The entity tag currently applied to new metrics.
    pub fn entity(&self) -> Arc<String> {
        self.shared.entity()
    }

    /// Add `pid` to the processes reported by the process monitor.
    pub fn add_monitored_pid(&self, pid: u32) {
        lock(&self.sampler).add_pid(pid);
    }

    /// Stop the process monitor, waiting for its current poll to finish.
    ///
    /// No sink receives anything from the monitor once this returns. Called
    /// on drop; calling it more than once is harmless.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.monitor.take() {
            if handle.shutdown() {
                info!("process monitor stopped");
            } else {
                error!("process monitor thread panicked");
            }
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn monitor_loop(
    shared: &Shared,
    sampler: &Mutex<Box<dyn ProcessSampler>>,
    interval: Duration,
    signal: &Signal,
) {
    while !signal.is_stopped() {
        let samples = lock(sampler).sample();
        for sample in samples {
            match sample.value() {
                Ok(value) => shared.send_raw(value, sample.name, time::now()),
                Err(e) => warn!("process monitor: {}", e),
            }
        }
        if signal.wait(interval) {
            break;
        }
    }
}
