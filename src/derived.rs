//! Derived metrics: rates and running totals computed from the history of
//! same-named samples.
//!
//! Names are enrolled with `DerivedMetrics::register`. From then on every
//! sample of that name passed to `DerivedMetrics::process` updates the name's
//! history and, where possible, yields a new metric:
//!
//!  * `Mode::Rate` produces `<name>Rate`, the per-second change between this
//!    sample and the previous one, always as a double.
//!  * `Mode::Increment` produces `<name>` carrying the running total of every
//!    sample seen so far, in the kind of the first sample.
//!
//! Each name's history sits behind its own lock. Updates to one name are
//! serialized, different names proceed in parallel.

use chrono::{DateTime, Utc};
use metric::{Metric, MetricValue, ValueKind};
use std::collections::HashMap;
use std::error;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use time;

/// How a registered name is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Per-second rate of change between consecutive samples.
    Rate,
    /// Running total of all samples.
    Increment,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Mode::Rate => f.write_str("rate"),
            Mode::Increment => f.write_str("increment"),
        }
    }
}

/// Errors from registration and derivation.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A rate was requested with no previous sample to compare against.
    CacheMiss,
    /// Two consecutive rate samples carry the same millisecond timestamp.
    DivisionByZero,
    /// The sample's kind cannot be derived.
    TypeMismatch {
        /// The kind required, or `None` when any numeric kind would do.
        expected: Option<ValueKind>,
        /// The kind of the offending sample.
        found: ValueKind,
    },
    /// The name is already registered under another mode.
    ModeConflict {
        /// The metric name.
        name: String,
        /// The mode the name is registered under.
        registered: Mode,
        /// The mode that was asked for.
        requested: Mode,
    },
    /// Registering the name would exceed the configured capacity.
    CapacityExceeded(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::CacheMiss => f.write_str("not enough values"),
            Error::DivisionByZero => f.write_str("division by zero"),
            Error::TypeMismatch {
                expected: Some(expected),
                found,
            } => write!(f, "type mismatch: expected {}, found {}", expected, found),
            Error::TypeMismatch {
                expected: None,
                found,
            } => write!(f, "type mismatch: expected a numeric value, found {}", found),
            Error::ModeConflict {
                ref name,
                registered,
                requested,
            } => write!(
                f,
                "{} is registered as {}, cannot register as {}",
                name, registered, requested
            ),
            Error::CapacityExceeded(cap) => {
                write!(f, "derived metrics capacity of {} reached", cap)
            }
        }
    }
}

impl error::Error for Error {}

impl Error {
    /// True for the conditions that occur in normal operation -- the first
    /// rate sample of a name and repeated timestamps -- as opposed to misuse
    /// by the caller.
    pub fn is_expected(&self) -> bool {
        match *self {
            Error::CacheMiss | Error::DivisionByZero => true,
            _ => false,
        }
    }
}

enum History {
    Rate(Option<(MetricValue, DateTime<Utc>)>),
    Increment(Option<MetricValue>),
}

struct Entry {
    mode: Mode,
    history: Arc<Mutex<History>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<T> {
    // A panic mid-update leaves at worst a stale baseline, which the next
    // sample overwrites.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The derived metrics engine.
pub struct DerivedMetrics {
    capacity: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl DerivedMetrics {
    /// Create an engine that accepts at most `capacity` registered names.
    ///
    /// A capacity of zero places no bound on registrations.
    pub fn new(capacity: usize) -> DerivedMetrics {
        DerivedMetrics {
            capacity: capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The configured capacity, zero when unbounded.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of registered names.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// True when no name is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enroll `name` for derivation under `mode`.
    ///
    /// Registering a name again under the same mode does nothing and keeps
    /// its history. Registering it under a different mode fails with
    /// `Error::ModeConflict` and also keeps the history. New names past the
    /// capacity are refused with `Error::CapacityExceeded`; nothing is ever
    /// evicted.
    pub fn register<S>(&self, mode: Mode, name: S) -> Result<(), Error>
    where
        S: Into<String>,
    {
        let name = name.into();
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get(&name) {
            if entry.mode == mode {
                return Ok(());
            }
            return Err(Error::ModeConflict {
                name: name,
                registered: entry.mode,
                requested: mode,
            });
        }
        if self.capacity != 0 && entries.len() >= self.capacity {
            return Err(Error::CapacityExceeded(self.capacity));
        }
        let history = match mode {
            Mode::Rate => History::Rate(None),
            Mode::Increment => History::Increment(None),
        };
        debug!("registered {} for derived {}", name, mode);
        entries.insert(
            name,
            Entry {
                mode: mode,
                history: Arc::new(Mutex::new(history)),
            },
        );
        Ok(())
    }

    /// Whether `name` is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        lock(&self.entries).contains_key(name)
    }

    /// The mode `name` is registered under, if any.
    pub fn mode(&self, name: &str) -> Option<Mode> {
        lock(&self.entries).get(name).map(|e| e.mode)
    }

    /// Fold `metric` into its name's history.
    ///
    /// Returns `Ok(None)` when the name is not registered. Otherwise returns
    /// the derived metric, carrying the entity and timestamp of `metric`, or
    /// the reason none could be produced.
    pub fn process(&self, metric: &Metric) -> Result<Option<Metric>, Error> {
        let history = match lock(&self.entries).get(metric.name()) {
            Some(entry) => Arc::clone(&entry.history),
            None => return Ok(None),
        };
        let mut history = lock(&history);
        match *history {
            History::Rate(ref mut last) => rate(last, metric).map(Some),
            History::Increment(ref mut total) => increment(total, metric).map(Some),
        }
    }
}

fn rate(
    last: &mut Option<(MetricValue, DateTime<Utc>)>,
    metric: &Metric,
) -> Result<Metric, Error> {
    let current = metric.value();
    if !current.is_numeric() {
        return Err(Error::TypeMismatch {
            expected: None,
            found: current.kind(),
        });
    }

    let (previous, previous_ts) = match last.replace((current.clone(), *metric.timestamp())) {
        Some(prev) => prev,
        None => return Err(Error::CacheMiss),
    };
    let delta = difference(&previous, current).ok_or(Error::TypeMismatch {
        expected: Some(previous.kind()),
        found: current.kind(),
    })?;
    let millis = time::millis_between(&previous_ts, metric.timestamp());
    if millis == 0 {
        return Err(Error::DivisionByZero);
    }

    Ok(Metric::from_parts(
        1000.0 * delta / millis as f64,
        format!("{}Rate", metric.name()),
        metric.entity().to_string(),
        *metric.timestamp(),
    ))
}

/// `current - previous` as a double, or `None` if the kinds differ or are
/// not numeric. Unsigned kinds are subtracted without underflow.
fn difference(previous: &MetricValue, current: &MetricValue) -> Option<f64> {
    match (previous, current) {
        (&MetricValue::Int(a), &MetricValue::Int(b)) => Some((i64::from(b) - i64::from(a)) as f64),
        (&MetricValue::UInt(a), &MetricValue::UInt(b)) => {
            Some((i64::from(b) - i64::from(a)) as f64)
        }
        (&MetricValue::ULong(a), &MetricValue::ULong(b)) => {
            if b >= a {
                Some((b - a) as f64)
            } else {
                Some(-((a - b) as f64))
            }
        }
        (&MetricValue::Double(a), &MetricValue::Double(b)) => Some(b - a),
        _ => None,
    }
}

fn increment(total: &mut Option<MetricValue>, metric: &Metric) -> Result<Metric, Error> {
    let current = metric.value();
    let next = match *total {
        Some(ref acc) => add(acc, current)?,
        None if current.is_numeric() => current.clone(),
        None => {
            return Err(Error::TypeMismatch {
                expected: None,
                found: current.kind(),
            })
        }
    };
    *total = Some(next.clone());

    Ok(Metric::from_parts(
        next,
        metric.name().to_string(),
        metric.entity().to_string(),
        *metric.timestamp(),
    ))
}

/// Kind-preserving addition. Integer kinds wrap on overflow.
fn add(acc: &MetricValue, value: &MetricValue) -> Result<MetricValue, Error> {
    match (acc, value) {
        (&MetricValue::Int(a), &MetricValue::Int(b)) => Ok(MetricValue::Int(a.wrapping_add(b))),
        (&MetricValue::UInt(a), &MetricValue::UInt(b)) => Ok(MetricValue::UInt(a.wrapping_add(b))),
        (&MetricValue::ULong(a), &MetricValue::ULong(b)) => {
            Ok(MetricValue::ULong(a.wrapping_add(b)))
        }
        (&MetricValue::Double(a), &MetricValue::Double(b)) => Ok(MetricValue::Double(a + b)),
        (_, &MetricValue::Text(_)) => Err(Error::TypeMismatch {
            expected: None,
            found: ValueKind::Text,
        }),
        _ => Err(Error::TypeMismatch {
            expected: Some(acc.kind()),
            found: value.kind(),
        }),
    }
}
