mod integration {
    mod collector {

        extern crate chrono;
        extern crate telemon;

        use self::chrono::{Duration as ChronoDuration, TimeZone, Utc};
        use self::telemon::derived;
        use self::telemon::sink::Sink;
        use self::telemon::{Collector, CollectorConfig, Metric, MetricValue, Mode, SendError,
                            ValueKind};
        use std::sync::{Arc, Mutex};
        use std::thread;

        #[derive(Clone, Default)]
        struct Capture(Arc<Mutex<Vec<Metric>>>);

        impl Capture {
            fn take(&self) -> Vec<Metric> {
                let mut metrics = self.0.lock().unwrap();
                metrics.drain(..).collect()
            }
        }

        impl Sink for Capture {
            fn send(&self, metric: &Metric) {
                self.0.lock().unwrap().push(metric.clone());
            }
        }

        fn setup(sinks: usize) -> (Collector, Vec<Capture>) {
            let captures: Vec<Capture> = (0..sinks).map(|_| Capture::default()).collect();
            let boxed = captures
                .iter()
                .map(|c| Box::new(c.clone()) as Box<dyn Sink>)
                .collect();
            let collector = Collector::new(boxed, CollectorConfig::default()).unwrap();
            (collector, captures)
        }

        #[test]
        fn test_rate_over_three_samples() {
            let (collector, captures) = setup(2);
            collector.add_derived_metric(Mode::Rate, "bytesRead").unwrap();
            collector.set_entity("db-1");
            let t0 = Utc.ymd(2018, 3, 1).and_hms_milli(10, 0, 0, 0);

            collector.send_at(100u32, "bytesRead", t0).unwrap();
            collector
                .send_at(612u32, "bytesRead", t0 + ChronoDuration::milliseconds(250))
                .unwrap();
            collector
                .send_at(100u32, "bytesRead", t0 + ChronoDuration::milliseconds(500))
                .unwrap();

            for capture in &captures {
                let metrics = capture.take();
                let derived: Vec<&Metric> =
                    metrics.iter().filter(|m| m.name() == "bytesReadRate").collect();
                assert_eq!(2, derived.len());
                assert_eq!(&MetricValue::Double(2048.0), derived[0].value());
                assert_eq!(&MetricValue::Double(-2048.0), derived[1].value());
                assert_eq!(
                    &(t0 + ChronoDuration::milliseconds(250)),
                    derived[0].timestamp()
                );
                for m in &metrics {
                    assert_eq!("db-1", m.entity());
                }
                assert_eq!(5, metrics.len());
            }
        }

        #[test]
        fn test_derived_precedes_raw() {
            let (collector, captures) = setup(1);
            collector.add_derived_metric(Mode::Increment, "requests").unwrap();

            collector.send(3, "requests").unwrap();
            let metrics = captures[0].take();
            assert_eq!(2, metrics.len());
            assert_eq!(&MetricValue::Int(3), metrics[0].value());
            assert_eq!(&MetricValue::Int(3), metrics[1].value());
            assert_eq!(metrics[0].timestamp(), metrics[1].timestamp());
        }

        #[test]
        fn test_increment_kind_change_escalates() {
            let (collector, captures) = setup(1);
            collector.add_derived_metric(Mode::Increment, "requests").unwrap();

            collector.send(5, "requests").unwrap();
            match collector.send(1.5, "requests") {
                Err(SendError::Derivation { name, error }) => {
                    assert_eq!("requests", name);
                    assert_eq!(
                        derived::Error::TypeMismatch {
                            expected: Some(ValueKind::Int),
                            found: ValueKind::Double,
                        },
                        error
                    );
                }
                other => panic!("unexpected {:?}", other),
            }
            collector.send(5, "requests").unwrap();

            let values: Vec<MetricValue> =
                captures[0].take().iter().map(|m| m.value().clone()).collect();
            assert_eq!(
                vec![
                    MetricValue::Int(5),
                    MetricValue::Int(5),
                    MetricValue::Double(1.5),
                    MetricValue::Int(10),
                    MetricValue::Int(5),
                ],
                values
            );
        }

        #[test]
        fn test_mode_conflict_keeps_history() {
            let (collector, captures) = setup(1);
            collector.add_derived_metric(Mode::Increment, "requests").unwrap();
            collector.send(5, "requests").unwrap();

            assert_eq!(
                Err(derived::Error::ModeConflict {
                    name: "requests".to_string(),
                    registered: Mode::Increment,
                    requested: Mode::Rate,
                }),
                collector.add_derived_metric(Mode::Rate, "requests")
            );
            collector.add_derived_metric(Mode::Increment, "requests").unwrap();
            captures[0].take();

            collector.send(5, "requests").unwrap();
            assert_eq!(&MetricValue::Int(10), captures[0].take()[0].value());
        }

        #[test]
        fn test_concurrent_producers_lose_no_increments() {
            let (collector, captures) = setup(1);
            collector.add_derived_metric(Mode::Increment, "hits").unwrap();
            let collector = Arc::new(collector);

            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let collector = Arc::clone(&collector);
                    thread::spawn(move || {
                        for _ in 0..250 {
                            collector.send(1u64, "hits").unwrap();
                        }
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }

            let totals: Vec<u64> = captures[0]
                .take()
                .iter()
                .filter_map(|m| match *m.value() {
                    MetricValue::ULong(v) if v > 1 => Some(v),
                    _ => None,
                })
                .collect();
            assert_eq!(Some(&1_000), totals.iter().max());
        }

        #[test]
        fn test_set_entity_races_cleanly() {
            let (collector, captures) = setup(1);
            let collector = Arc::new(collector);

            let writer = {
                let collector = Arc::clone(&collector);
                thread::spawn(move || {
                    for i in 0..100 {
                        collector.set_entity(format!("host-{}", i % 2));
                    }
                })
            };
            for _ in 0..100 {
                collector.send(1, "m").unwrap();
            }
            writer.join().unwrap();

            for m in captures[0].take() {
                assert!(
                    m.entity() == "host-0" || m.entity() == "host-1"
                        || m.entity() == telemon::metric::default_entity()
                );
            }
            assert_eq!("host-1", collector.entity().as_str());
        }
    }
}
