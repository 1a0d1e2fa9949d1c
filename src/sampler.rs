//! Process resource sampling.
//!
//! The collector's background thread polls a `ProcessSampler` for raw
//! attribute readings of every monitored pid. Readings arrive as text tagged
//! with the kind they are meant to parse into; `Sample::value` does the
//! parsing.

use metric::MetricValue;
use std::error;
use std::fmt;
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System};

/// The kind a `Sample`'s raw text parses into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Parses into `MetricValue::Int`.
    Int,
    /// Parses into `MetricValue::Double`.
    Double,
    /// Kept as `MetricValue::Text`.
    Text,
}

/// One attribute reading for one process.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// The kind `raw` parses into.
    pub kind: SampleKind,
    /// The reading, unparsed.
    pub raw: String,
    /// The metric name to report the reading under.
    pub name: String,
}

/// A `Sample` whose text does not parse into its declared kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// The sample's metric name.
    pub name: String,
    /// The offending text.
    pub raw: String,
    /// The kind the text was declared as.
    pub kind: SampleKind,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: cannot parse {:?} as {:?}", self.name, self.raw, self.kind)
    }
}

impl error::Error for ParseError {}

impl Sample {
    /// Create a new `Sample`.
    pub fn new<R, N>(kind: SampleKind, raw: R, name: N) -> Sample
    where
        R: Into<String>,
        N: Into<String>,
    {
        Sample {
            kind: kind,
            raw: raw.into(),
            name: name.into(),
        }
    }

    /// Parse the raw text into the declared kind.
    pub fn value(&self) -> Result<MetricValue, ParseError> {
        let err = || ParseError {
            name: self.name.clone(),
            raw: self.raw.clone(),
            kind: self.kind,
        };
        match self.kind {
            SampleKind::Int => self.raw.trim().parse::<i32>().map(MetricValue::Int).map_err(|_| err()),
            SampleKind::Double => {
                self.raw.trim().parse::<f64>().map(MetricValue::Double).map_err(|_| err())
            }
            SampleKind::Text => Ok(MetricValue::Text(self.raw.clone())),
        }
    }
}

/// Source of per-process resource readings.
pub trait ProcessSampler: Send {
    /// Start monitoring `pid`.
    fn add_pid(&mut self, pid: u32);

    /// Read every tracked attribute of every monitored pid.
    fn sample(&mut self) -> Vec<Sample>;
}

/// `ProcessSampler` backed by `sysinfo`.
///
/// Reports, per pid:
///
///  * `virtualMemoryKb` -- virtual memory size, as Double
///  * `residentMemoryKb` -- resident set size, as Int
///  * `cpuPercent` -- CPU usage since the previous poll, as Double
///  * `state` -- scheduler state, as Text
///
/// The first poll of a pid always reports zero CPU usage. Pids that no
/// longer exist are skipped for that poll.
pub struct SystemSampler {
    system: System,
    pids: Vec<u32>,
}

impl Default for SystemSampler {
    fn default() -> SystemSampler {
        SystemSampler::new()
    }
}

impl SystemSampler {
    /// Create a sampler monitoring no pids.
    pub fn new() -> SystemSampler {
        SystemSampler {
            system: System::new(),
            pids: Vec::new(),
        }
    }

    /// The monitored pids, in registration order.
    pub fn pids(&self) -> &[u32] {
        &self.pids
    }
}

fn report(process: &Process, samples: &mut Vec<Sample>) {
    samples.push(Sample::new(
        SampleKind::Double,
        (process.virtual_memory() / 1024).to_string(),
        "virtualMemoryKb",
    ));
    samples.push(Sample::new(
        SampleKind::Int,
        (process.memory() / 1024).to_string(),
        "residentMemoryKb",
    ));
    samples.push(Sample::new(
        SampleKind::Double,
        process.cpu_usage().to_string(),
        "cpuPercent",
    ));
    samples.push(Sample::new(
        SampleKind::Text,
        process.status().to_string(),
        "state",
    ));
}

impl ProcessSampler for SystemSampler {
    fn add_pid(&mut self, pid: u32) {
        if !self.pids.contains(&pid) {
            self.pids.push(pid);
        }
    }

    fn sample(&mut self) -> Vec<Sample> {
        let mut samples = Vec::new();
        if self.pids.is_empty() {
            return samples;
        }
        let pids: Vec<Pid> = self.pids.iter().map(|p| Pid::from_u32(*p)).collect();
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&pids),
            true,
            ProcessRefreshKind::everything(),
        );
        for pid in &pids {
            match self.system.process(*pid) {
                Some(process) => report(process, &mut samples),
                None => debug!("no process with pid {}", pid),
            }
        }
        samples
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::process;

    #[test]
    fn sample_parses_declared_kind() {
        assert_eq!(
            Ok(MetricValue::Int(42)),
            Sample::new(SampleKind::Int, "42", "cpuPercent").value()
        );
        assert_eq!(
            Ok(MetricValue::Double(0.5)),
            Sample::new(SampleKind::Double, " 0.5 ", "load").value()
        );
        assert_eq!(
            Ok(MetricValue::Text("Sleeping".into())),
            Sample::new(SampleKind::Text, "Sleeping", "state").value()
        );
    }

    #[test]
    fn sample_rejects_bad_text() {
        let err = Sample::new(SampleKind::Int, "4.2", "cpuPercent").value().unwrap_err();
        assert_eq!("cpuPercent", err.name);
        assert_eq!(SampleKind::Int, err.kind);
        assert!(Sample::new(SampleKind::Double, "lots", "load").value().is_err());
        assert!(Sample::new(SampleKind::Int, "99999999999", "big").value().is_err());
    }

    #[test]
    fn no_pids_no_samples() {
        let mut sampler = SystemSampler::new();
        assert!(sampler.sample().is_empty());
    }

    #[test]
    fn duplicate_pids_are_ignored() {
        let mut sampler = SystemSampler::new();
        sampler.add_pid(7);
        sampler.add_pid(8);
        sampler.add_pid(7);
        assert_eq!(&[7, 8], sampler.pids());
    }

    #[test]
    fn missing_pid_is_skipped() {
        let mut sampler = SystemSampler::new();
        sampler.add_pid(u32::max_value() - 1);
        assert!(sampler.sample().is_empty());
    }

    #[test]
    fn reads_own_process() {
        let mut sampler = SystemSampler::new();
        sampler.add_pid(process::id());

        let samples = sampler.sample();
        let find = |name: &str| {
            samples
                .iter()
                .find(|s| s.name == name)
                .unwrap_or_else(|| panic!("no {} sample in {:?}", name, samples))
                .value()
                .unwrap()
        };
        match find("residentMemoryKb") {
            MetricValue::Int(kb) => assert!(kb > 0),
            other => panic!("unexpected resident memory {:?}", other),
        }
        match find("virtualMemoryKb") {
            MetricValue::Double(kb) => assert!(kb > 0.0),
            other => panic!("unexpected virtual memory {:?}", other),
        }
        match find("cpuPercent") {
            MetricValue::Double(pct) => assert!(pct >= 0.0),
            other => panic!("unexpected cpu usage {:?}", other),
        }
        match find("state") {
            MetricValue::Text(state) => assert!(!state.is_empty()),
            other => panic!("unexpected state {:?}", other),
        }
    }
}
