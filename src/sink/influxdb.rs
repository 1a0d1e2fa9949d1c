use metric::{Metric, MetricValue};
use sink::Sink;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// InfluxDB sink
///
/// Every metric goes out immediately as one line-protocol datagram on the
/// InfluxDB UDP listener:
///
/// ```text
/// <name>,entity=<entity> value=<value> <unix nanoseconds>
/// ```
pub struct InfluxDB {
    config_path: String,
    host: String,
    addrs: Vec<SocketAddr>,
    socket: UdpSocket,
}

/// Configuration for the `InfluxDB` sink
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InfluxDBConfig {
    /// The InfluxDB host, name or address.
    pub host: String,
    /// The port of the InfluxDB UDP listener.
    pub port: u16,
    /// The sink's location in the configuration file.
    pub config_path: String,
}

impl Default for InfluxDBConfig {
    fn default() -> InfluxDBConfig {
        InfluxDBConfig {
            host: String::from("127.0.0.1"),
            port: 8089,
            config_path: String::from("sinks.influxdb"),
        }
    }
}

#[inline]
fn escape_key(s: &str, buf: &mut String) {
    for c in s.chars() {
        if c == ',' || c == ' ' || c == '=' {
            buf.push('\\');
        }
        buf.push(c);
    }
}

#[inline]
fn fmt_value(value: &MetricValue, buf: &mut String) {
    match *value {
        MetricValue::Int(v) => buf.push_str(&format!("{}i", v)),
        MetricValue::UInt(v) => buf.push_str(&format!("{}i", v)),
        MetricValue::ULong(v) => buf.push_str(&format!("{}i", v)),
        MetricValue::Double(v) => buf.push_str(&v.to_string()),
        MetricValue::Text(ref v) => {
            buf.push('"');
            for c in v.chars() {
                if c == '"' || c == '\\' {
                    buf.push('\\');
                }
                buf.push(c);
            }
            buf.push('"');
        }
    }
}

/// Render `metric` as a single line-protocol line, without trailing newline.
///
/// `None` when the timestamp does not fit in signed 64-bit nanoseconds.
fn fmt_line(metric: &Metric) -> Option<String> {
    let ts = metric.timestamp();
    let nanos = ts.timestamp()
        .checked_mul(1_000_000_000)?
        .checked_add(i64::from(ts.timestamp_subsec_nanos()))?;

    let mut line = String::with_capacity(128);
    escape_key(metric.name(), &mut line);
    line.push_str(",entity=");
    escape_key(metric.entity(), &mut line);
    line.push_str(" value=");
    fmt_value(metric.value(), &mut line);
    line.push(' ');
    line.push_str(&nanos.to_string());
    Some(line)
}

impl InfluxDB {
    /// Create a new InfluxDB sink
    ///
    /// The host is resolved once, here. Fails if it does not resolve or if
    /// no local UDP socket can be bound.
    pub fn new(config: &InfluxDBConfig) -> io::Result<InfluxDB> {
        let addrs: Vec<SocketAddr> = (config.host.as_str(), config.port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {}", config.host),
            ));
        }
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(InfluxDB {
            config_path: config.config_path.clone(),
            host: config.host.clone(),
            addrs: addrs,
            socket: socket,
        })
    }
}

impl Sink for InfluxDB {
    fn send(&self, metric: &Metric) {
        let line = match fmt_line(metric) {
            Some(line) => line,
            None => {
                warn!(
                    "{}: dropped {}, timestamp {} out of range",
                    self.config_path,
                    metric.name(),
                    metric.timestamp()
                );
                return;
            }
        };
        for addr in &self.addrs {
            match self.socket.send_to(line.as_bytes(), addr) {
                Ok(_) => return,
                Err(e) => info!(
                    "Unable to send to db at {} using addr {} with error {}",
                    self.host, addr, e
                ),
            }
        }
        warn!(
            "{}: dropped {} after exhausting addresses of {}",
            self.config_path,
            metric.name(),
            self.host
        );
    }
}
