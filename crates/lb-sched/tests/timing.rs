use lb_ir::{Event, SourceType};
use lb_sched::{LookaheadScheduler, SchedulerConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn scheduler(text: &str, step_millis: f64) -> LookaheadScheduler {
    let mut s = LookaheadScheduler::new(SchedulerConfig::default()).unwrap();
    s.evaluate(text).unwrap();
    s.set_tempo(step_millis).unwrap();
    s
}

/// Step on the ideal grid from `from` until wall time `until`.
fn run(s: &mut LookaheadScheduler, from: f64, until: f64, out: &mut Vec<Event>) -> f64 {
    let mut now = from;
    while now <= until {
        match s.step(now, out) {
            Some(delay) => now += delay,
            None => break,
        }
    }
    now
}

#[test]
fn scenario_two_events_in_first_1100ms() {
    let mut s = scheduler("~ bd", 250.0);
    s.start(0.0, Some(0.0));
    let mut events = Vec::new();
    run(&mut s, 0.0, 1.1, &mut events);

    let times: Vec<f64> = events.iter().map(|e| e.timestamp).collect();
    assert_eq!(times, vec![0.25, 0.75]);
    for e in &events {
        assert_eq!(e.source_type, SourceType::Sampler);
        assert_eq!(e.sample_id.as_ref().map(|id| id.as_str()), Some("bd"));
        assert!(e.params.is_empty());
    }
}

#[test]
fn drift_converges_under_jitter() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut s = scheduler("bd", 100.0);
    s.start(0.0, Some(0.0));
    let mut sink = Vec::new();

    let steps = 4000;
    let mut now = 0.0;
    let mut wakeups = Vec::with_capacity(steps);
    for _ in 0..steps {
        wakeups.push(now);
        let delay = s.step(now, &mut sink).unwrap();
        // Timers fire up to 2 ms early or 4 ms late.
        let jitter: f64 = rng.gen_range(-0.002..0.004);
        now += (delay + jitter).max(0.0);
    }

    let period = s.config().period();
    let mean = (wakeups[steps - 1] - wakeups[0]) / (steps - 1) as f64;
    assert!((mean - period).abs() < 1e-5, "mean step {mean}");

    let snapshot = s.metrics().snapshot();
    assert_eq!(snapshot.saturations, 0);
    assert!(snapshot.mean_drift.abs() < 0.004);
    assert!(snapshot.max_drift < 0.005);
}

#[test]
fn long_stall_saturates_without_runaway() {
    let mut s = scheduler("bd", 50.0);
    s.start(0.0, Some(0.0));
    let mut sink = Vec::new();
    let mut now = run(&mut s, 0.0, 1.0, &mut sink);
    // Half a second without a wakeup.
    now += 0.5;
    let delay = s.step(now, &mut sink).unwrap();
    assert_eq!(s.metrics().saturations(), 1);
    assert!(delay > 0.0 && delay <= 0.05);
    let times: Vec<f64> = sink.iter().map(|e| e.timestamp).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

fn random_pattern(rng: &mut StdRng) -> String {
    let names = ["bd", "sn", "hh", "sine;freq=330", "saw", "~", "~"];
    let lanes = rng.gen_range(1..4);
    (0..lanes)
        .map(|_| {
            let steps = rng.gen_range(1..9);
            let body: Vec<&str> = (0..steps)
                .map(|_| names[rng.gen_range(0..names.len())])
                .collect();
            let generator = if rng.gen_bool(0.3) { "rnd" } else { "cyc" };
            format!("{generator} >> {}", body.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn ordered_and_never_retroactive_across_changes() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..20 {
        let mut s = scheduler(&random_pattern(&mut rng), rng.gen_range(20.0..200.0));
        s.start(rng.gen_range(0.0..10.0), Some(0.0));
        let mut events: Vec<Event> = Vec::new();
        let mut now = 0.0;
        for cycle in 0..200 {
            if cycle % 17 == 5 {
                let frontier = s.last_generated().unwrap();
                let from = events.len();
                if rng.gen_bool(0.5) {
                    s.evaluate(&random_pattern(&mut rng)).unwrap();
                } else {
                    s.set_tempo(rng.gen_range(10.0..300.0)).unwrap();
                }
                let delay = s.step(now, &mut events).unwrap();
                now += delay + rng.gen_range(0.0..0.003);
                assert!(events[from..].iter().all(|e| e.timestamp >= frontier));
                continue;
            }
            let delay = s.step(now, &mut events).unwrap();
            now += delay + rng.gen_range(0.0..0.003);
        }
        assert!(
            events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
            "events out of order"
        );
    }
}

#[test]
fn stop_then_start_matches_fresh_start() {
    let text = "bd ~ sn\n~ hh @lvl: ramp >> 0 1 4";

    let mut reused = scheduler(text, 90.0);
    reused.start(3.0, Some(0.0));
    run(&mut reused, 0.0, 0.7, &mut Vec::new());
    reused.stop();
    reused.stop();
    reused.start(1.0, Some(10.0));
    let mut a = Vec::new();
    run(&mut reused, 10.0, 11.0, &mut a);

    let mut fresh = scheduler(text, 90.0);
    fresh.start(1.0, Some(10.0));
    let mut b = Vec::new();
    run(&mut fresh, 10.0, 11.0, &mut b);

    assert!(!a.is_empty());
    assert_eq!(a, b);
    assert!((a[0].timestamp - 1.0).abs() < 1e-12);
}
