//! Provides the CLI option parser
//!
//! Used to parse the argv/config file into a struct that
//! the binary can consume and use as configuration data.

use clap::{App, Arg};
use collector::CollectorConfig;
use sink::{Console, ConsoleConfig, InfluxDB, InfluxDBConfig, Null, NullConfig, Sink};
use std::error;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;
use toml;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

/// Configuration failure.
#[derive(Debug)]
pub enum Error {
    /// The config file could not be read.
    Io(io::Error),
    /// The config file is not valid TOML, or a table does not fit its shape.
    Parse(toml::de::Error),
    /// A key holds a value of the wrong type or range.
    Invalid {
        /// Dotted path of the key.
        key: String,
        /// What the key must hold.
        expected: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "could not read config: {}", e),
            Error::Parse(ref e) => write!(f, "could not parse config: {}", e),
            Error::Invalid {
                ref key,
                expected,
            } => write!(f, "{} must be {}", key, expected),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            Error::Parse(ref e) => Some(e),
            Error::Invalid { .. } => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Error {
        Error::Parse(e)
    }
}

fn invalid(key: &str, expected: &'static str) -> Error {
    Error::Invalid {
        key: key.to_string(),
        expected: expected,
    }
}

/// Configuration of the background process monitor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessMonitorConfig {
    /// Whether the monitor thread runs at all.
    pub enable: bool,
    /// Seconds between polls.
    pub interval: u64,
    /// Processes to report on from start-up.
    pub pids: Vec<u32>,
}

impl Default for ProcessMonitorConfig {
    fn default() -> ProcessMonitorConfig {
        ProcessMonitorConfig {
            enable: true,
            interval: 5,
            pids: Vec::new(),
        }
    }
}

/// Big configuration struct for the telemon executable
///
/// This struct is what we construct from parsing the configuration. Please
/// see documentation on `parse_args` in this module for more details.
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    /// The verbosity setting. The higher the value the more chatty the
    /// binary gets.
    pub verbose: u64,
    /// Version string. This is set automatically.
    pub version: String,
    /// Overrides the `<hostname>.<pid>` default entity.
    pub entity: Option<String>,
    /// Upper bound on names registered for derivation, zero for none.
    pub max_cache_size: usize,
    /// Names derived as per-second rates.
    pub rate: Vec<String>,
    /// Names derived as running totals.
    pub increment: Vec<String>,
    /// See `sampler::SystemSampler` for more. `None` when no section is given.
    pub process_monitor: Option<ProcessMonitorConfig>,
    /// See `sink::Console` for more.
    pub console: Option<ConsoleConfig>,
    /// See `sink::Null` for more.
    pub null: Option<NullConfig>,
    /// See `sink::InfluxDB` for more.
    pub influxdb: Option<InfluxDBConfig>,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            verbose: 0,
            version: VERSION.unwrap_or("unknown").to_string(),
            entity: None,
            max_cache_size: CollectorConfig::default().max_cache_size,
            rate: Vec::new(),
            increment: Vec::new(),
            process_monitor: None,
            console: None,
            null: None,
            influxdb: None,
        }
    }
}

impl Args {
    /// The collector parameters these arguments describe.
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            max_cache_size: self.max_cache_size,
            process_monitor_interval: self.process_monitor
                .as_ref()
                .filter(|pm| pm.enable)
                .map(|pm| Duration::from_secs(pm.interval)),
        }
    }

    /// Pids to monitor from start-up.
    pub fn pids(&self) -> &[u32] {
        match self.process_monitor {
            Some(ref pm) => &pm.pids,
            None => &[],
        }
    }

    /// Build every configured sink.
    ///
    /// Fails if a network sink cannot resolve its host or bind a socket.
    pub fn sinks(&self) -> io::Result<Vec<Box<dyn Sink>>> {
        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
        if let Some(ref config) = self.console {
            sinks.push(Box::new(Console::new(config)));
        }
        if let Some(ref config) = self.null {
            sinks.push(Box::new(Null::new(config)));
        }
        if let Some(ref config) = self.influxdb {
            sinks.push(Box::new(InfluxDB::new(config)?));
        }
        Ok(sinks)
    }
}

/// Parse the configuration arguments
///
/// This function will read the environment arguments and construct an
/// `Args`. Without `--config` a console sink and no derivations are
/// assumed. Pids given with `--pid` join those of the config file and turn
/// the process monitor on. See `telemon --help` for more information.
pub fn parse_args() -> Result<Args, Error> {
    let args = App::new("telemon")
        .version(VERSION.unwrap_or("unknown"))
        .about("application metrics with derived rates and totals")
        .arg(
            Arg::with_name("config-file")
                .long("config")
                .short("C")
                .value_name("config")
                .help("The config file to feed in.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Turn on verbose output."),
        )
        .arg(
            Arg::with_name("pid")
                .long("pid")
                .short("p")
                .value_name("pid")
                .help("A process to monitor. May be repeated.")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .get_matches();

    let verb = args.occurrences_of("verbose");

    let mut res = match args.value_of("config-file") {
        Some(filename) => parse_config_path(filename, verb)?,
        None => {
            let mut res = Args::default();
            res.verbose = verb;
            res.console = Some(ConsoleConfig::new("sinks.console".to_string()));
            res
        }
    };

    if let Some(pids) = args.values_of("pid") {
        let monitor = res.process_monitor.get_or_insert_with(ProcessMonitorConfig::default);
        monitor.enable = true;
        for pid in pids {
            let pid = pid.parse::<u32>().map_err(|_| invalid("--pid", "a process id"))?;
            monitor.pids.push(pid);
        }
    }
    Ok(res)
}

/// Read and parse the config file at `path`.
pub fn parse_config_path<P>(path: P, verbosity: u64) -> Result<Args, Error>
where
    P: AsRef<Path>,
{
    let mut fp = File::open(path)?;
    let mut buffer = String::new();
    fp.read_to_string(&mut buffer)?;
    parse_config_file(&buffer, verbosity)
}

fn names(derived: &toml::Value, key: &str, path: &str) -> Result<Vec<String>, Error> {
    match derived.get(key) {
        None => Ok(Vec::new()),
        Some(v) => {
            let arr = v.as_array().ok_or_else(|| invalid(path, "an array of names"))?;
            arr.iter()
                .map(|n| {
                    n.as_str()
                        .map(|s| s.to_string())
                        .ok_or_else(|| invalid(path, "an array of names"))
                })
                .collect()
        }
    }
}

/// Parse configuration from the text of a TOML file.
pub fn parse_config_file(buffer: &str, verbosity: u64) -> Result<Args, Error> {
    let mut args = Args::default();
    let value: toml::Value = toml::from_str(buffer)?;

    args.verbose = verbosity;

    args.entity = match value.get("entity") {
        Some(e) => Some(e.as_str().ok_or_else(|| invalid("entity", "a string"))?.to_string()),
        None => None,
    };

    // derived metrics
    //
    if let Some(derived) = value.get("derived") {
        if let Some(mcs) = derived.get("max-cache-size") {
            let mcs = mcs.as_integer()
                .ok_or_else(|| invalid("derived.max-cache-size", "a non-negative integer"))?;
            if mcs < 0 {
                return Err(invalid("derived.max-cache-size", "a non-negative integer"));
            }
            args.max_cache_size = mcs as usize;
        }
        args.rate = names(derived, "rate", "derived.rate")?;
        args.increment = names(derived, "increment", "derived.increment")?;
    }

    if let Some(pm) = value.get("process-monitor") {
        let pm = pm.clone().try_into::<ProcessMonitorConfig>()?;
        if pm.interval == 0 {
            return Err(invalid("process-monitor.interval", "a positive integer"));
        }
        args.process_monitor = Some(pm);
    }

    // sinks
    //
    if let Some(sinks) = value.get("sinks") {
        let sinks = sinks
            .as_table()
            .ok_or_else(|| invalid("sinks", "a table"))?;

        args.null = sinks
            .get("null")
            .map(|_| NullConfig::new("sinks.null".to_string()));

        args.console = sinks
            .get("console")
            .map(|_| ConsoleConfig::new("sinks.console".to_string()));

        args.influxdb = match sinks.get("influxdb") {
            Some(snk) => {
                let mut res = snk.clone().try_into::<InfluxDBConfig>()?;
                res.config_path = "sinks.influxdb".to_string();
                Some(res)
            }
            None => None,
        };
    }

    Ok(args)
}
