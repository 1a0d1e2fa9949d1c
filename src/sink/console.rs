use metric::Metric;
use sink::Sink;
use std::io::{self, Write};

/// Console sink
///
/// Writes one line per metric to stdout:
///
/// ```text
/// 2018-03-01T10:00:00.250+00:00 myhost.4121 bytesReadRate 2048
/// ```
pub struct Console {
    config_path: String,
}

impl Console {
    /// Create a new Console sink
    pub fn new(config: &ConsoleConfig) -> Console {
        Console {
            config_path: config.config_path.clone(),
        }
    }
}

/// Configuration for the `Console` sink
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    /// The sink's location in the configuration file.
    pub config_path: String,
}

impl ConsoleConfig {
    /// Create a new `ConsoleConfig`
    pub fn new(config_path: String) -> ConsoleConfig {
        ConsoleConfig {
            config_path: config_path,
        }
    }
}

/// Format a single stats line.
fn fmt_line(metric: &Metric) -> String {
    format!(
        "{} {} {} {}",
        metric.timestamp().to_rfc3339(),
        metric.entity(),
        metric.name(),
        metric.value()
    )
}

impl Sink for Console {
    fn send(&self, metric: &Metric) {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        if let Err(e) = writeln!(handle, "{}", fmt_line(metric)) {
            warn!("{}: unable to write {}: {}", self.config_path, metric.name(), e);
        }
    }
}
