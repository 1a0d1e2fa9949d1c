//! `Metric` and `MetricValue`, the data every other module passes around.

use chrono::{DateTime, Utc};
use hostname;
use std::process;
use time;

mod value;

pub use self::value::{Error, MetricValue, Primitive, ValueKind};

lazy_static! {
    static ref DEFAULT_ENTITY: String = format!("{}.{}", local_hostname(), process::id());
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| String::from("localhost"))
}

/// The process-wide default entity, `<hostname>.<pid>`.
pub fn default_entity() -> &'static str {
    &DEFAULT_ENTITY
}

/// One named, timestamped, entity-tagged sample of a typed value.
///
/// A `Metric` never changes once it has been handed to the collector. The
/// `with_*` methods consume and return the metric so that defaults can be
/// overridden while it is being built.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    name: String,
    value: MetricValue,
    entity: String,
    timestamp: DateTime<Utc>,
}

impl Metric {
    /// Create a new `Metric` stamped with the default entity and the current
    /// time.
    pub fn new<V, S>(value: V, name: S) -> Metric
    where
        V: Into<MetricValue>,
        S: Into<String>,
    {
        Metric {
            name: name.into(),
            value: value.into(),
            entity: default_entity().to_string(),
            timestamp: time::now(),
        }
    }

    /// Create a new `Metric` with every field given explicitly.
    pub fn from_parts<V, S>(value: V, name: S, entity: S, timestamp: DateTime<Utc>) -> Metric
    where
        V: Into<MetricValue>,
        S: Into<String>,
    {
        Metric {
            name: name.into(),
            value: value.into(),
            entity: entity.into(),
            timestamp: timestamp,
        }
    }

    /// Replace the entity tag.
    pub fn with_entity<S>(mut self, entity: S) -> Metric
    where
        S: Into<String>,
    {
        self.entity = entity.into();
        self
    }

    /// Replace the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Metric {
        self.timestamp = timestamp;
        self
    }

    /// The metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The metric value.
    pub fn value(&self) -> &MetricValue {
        &self.value
    }

    /// The originating entity.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The moment the sample was taken.
    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    #[test]
    fn default_entity_is_host_dot_pid() {
        let entity = default_entity();
        let suffix = format!(".{}", process::id());
        assert!(entity.ends_with(&suffix), "{} lacks pid suffix", entity);
        assert!(entity.len() > suffix.len(), "{} lacks hostname", entity);
        assert_eq!(format!("{}{}", local_hostname(), suffix), entity);
    }

    #[test]
    fn local_hostname_matches_system() {
        match hostname::get().ok().and_then(|h| h.into_string().ok()) {
            Some(h) => assert_eq!(h, local_hostname()),
            None => assert_eq!("localhost", local_hostname()),
        }
    }

    #[test]
    fn new_fills_defaults() {
        let before = time::now();
        let m = Metric::new(10, "m");
        let after = time::now();

        assert_eq!("m", m.name());
        assert_eq!(&MetricValue::Int(10), m.value());
        assert_eq!(default_entity(), m.entity());
        assert!(*m.timestamp() >= before && *m.timestamp() <= after);
    }

    #[test]
    fn overrides_replace_defaults() {
        let ts = time::now() - Duration::seconds(30);
        let m = Metric::new(2.5, "load").with_entity("node-1").with_timestamp(ts);

        assert_eq!("node-1", m.entity());
        assert_eq!(&ts, m.timestamp());
        assert_eq!(m, Metric::from_parts(2.5, "load", "node-1", ts));
    }

    #[test]
    fn equality_is_structural() {
        let ts = time::now();
        let a = Metric::from_parts(1u32, "a", "e", ts);

        assert_eq!(a, a.clone());
        assert!(a != Metric::from_parts(1u64, "a", "e", ts));
        assert!(a != Metric::from_parts(1u32, "a", "f", ts));
    }
}
