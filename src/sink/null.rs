use metric::Metric;
use sink::Sink;

/// Null sink
///
/// This sink is intended for testing and demonstration. Every `Metric` it
/// receives is dropped on the floor.
pub struct Null {
    config_path: String,
}

impl Null {
    /// Create a new Null sink
    pub fn new(config: &NullConfig) -> Null {
        Null {
            config_path: config.config_path.clone(),
        }
    }
}

/// Configuration for the `Null` sink
#[derive(Debug, Clone, PartialEq)]
pub struct NullConfig {
    /// The sink's location in the configuration file.
    pub config_path: String,
}

impl NullConfig {
    /// Create a new `NullConfig`
    pub fn new(config_path: String) -> NullConfig {
        NullConfig {
            config_path: config_path,
        }
    }
}

impl Sink for Null {
    fn send(&self, metric: &Metric) {
        trace!("{}: discarded {}", self.config_path, metric.name());
    }
}
