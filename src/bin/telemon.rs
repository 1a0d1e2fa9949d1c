#![allow(unknown_lints)]

extern crate chrono;
extern crate fern;
#[macro_use]
extern crate log;
extern crate telemon;

use chrono::Utc;
use std::io::{self, BufRead};
use std::process;
use telemon::{Collector, MetricValue, Mode};

/// Read a stdin value as the narrowest kind that holds it.
fn parse_value(raw: &str) -> MetricValue {
    if let Ok(v) = raw.parse::<i32>() {
        MetricValue::Int(v)
    } else if let Ok(v) = raw.parse::<u64>() {
        MetricValue::ULong(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        MetricValue::Double(v)
    } else {
        MetricValue::Text(raw.to_string())
    }
}

fn main() {
    let args = match telemon::config::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let level = match args.verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    // stdout belongs to the console sink
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}][{}] {}",
                record.module_path().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                Utc::now().to_rfc3339(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .expect("could not set up logging");

    info!("telemon - {}", args.version);

    let sinks = match args.sinks() {
        Ok(sinks) => sinks,
        Err(e) => {
            error!("could not set up sinks: {}", e);
            process::exit(1);
        }
    };
    if sinks.is_empty() {
        warn!("no sinks configured, every metric will be dropped");
    }

    let mut collector = Collector::new(sinks, args.collector_config())
        .expect("could not start process monitor");
    if let Some(ref entity) = args.entity {
        collector.set_entity(entity.as_str());
    }
    for name in &args.rate {
        if let Err(e) = collector.add_derived_metric(Mode::Rate, name.as_str()) {
            error!("{}", e);
            process::exit(1);
        }
    }
    for name in &args.increment {
        if let Err(e) = collector.add_derived_metric(Mode::Increment, name.as_str()) {
            error!("{}", e);
            process::exit(1);
        }
    }
    for pid in args.pids() {
        collector.add_monitored_pid(*pid);
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("could not read stdin: {}", e);
                break;
            }
        };
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(name), Some(raw)) => {
                if let Err(e) = collector.send(parse_value(raw), name) {
                    warn!("{}", e);
                }
            }
            (None, _) => {}
            (Some(_), None) => warn!("expected '<name> <value>', got {:?}", line),
        }
    }

    collector.shutdown();
}
