#[macro_use]
extern crate criterion;

use criterion::Criterion;

extern crate chrono;
extern crate telemon;

use chrono::{Duration, TimeZone, Utc};
use telemon::{DerivedMetrics, Metric, Mode};

fn experiment_rate(engine: &DerivedMetrics, i: i64) {
    let ts = Utc.ymd(2018, 3, 1).and_hms_milli(10, 0, 0, 0) + Duration::milliseconds(i);
    let _ = engine.process(&Metric::from_parts(i as u64, "bytesRead", "bench.1", ts));
}

fn experiment_increment(engine: &DerivedMetrics) {
    let _ = engine.process(&Metric::new(1, "requests"));
}

fn benchmark(c: &mut Criterion) {
    c.bench_function("derived rate", |b| {
        let engine = DerivedMetrics::new(0);
        engine.register(Mode::Rate, "bytesRead").unwrap();
        let mut i = 0;
        b.iter(|| {
            i += 1;
            experiment_rate(&engine, i)
        })
    });
    c.bench_function("derived increment", |b| {
        let engine = DerivedMetrics::new(0);
        engine.register(Mode::Increment, "requests").unwrap();
        b.iter(|| experiment_increment(&engine))
    });
    c.bench_function("derived unregistered", |b| {
        let engine = DerivedMetrics::new(0);
        b.iter(|| engine.process(&Metric::new(1, "untracked")))
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
