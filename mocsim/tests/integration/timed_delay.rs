//! Delays of the timed models of computation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mocsim::event::{Event, Tagged};
use mocsim::moc::{ct, de, dt};
use mocsim::network::Network;
use mocsim::time::{self, MonotonicTime};

use crate::{collector, init_tracing};

fn at_millis(millis: u64) -> MonotonicTime {
    time::at(Duration::from_millis(millis))
}

#[test]
fn de_delay_shifts_without_reordering() {
    init_tracing();

    let mut net = Network::new("top");
    let xs = net.signal("xs");
    let ys = net.signal("ys");
    let (collected, push) = collector();

    de::vsource(
        &mut net,
        "src",
        vec![(Duration::from_secs(1), 10), (Duration::from_secs(3), 20)],
        &xs,
    )
    .unwrap();
    de::delay(&mut net, "late", Duration::from_secs(2), 0, &xs, &ys).unwrap();
    de::sink(&mut net, "snk", push, &ys).unwrap();

    net.elaborate().unwrap().run().unwrap();

    let collected = collected.lock().unwrap();
    assert_eq!(
        *collected,
        [
            Tagged::new(MonotonicTime::EPOCH, 0),
            Tagged::new(at_millis(3000), 10),
            Tagged::new(at_millis(5000), 20),
        ]
    );
    assert!(collected.windows(2).all(|pair| pair[0].time <= pair[1].time));
}

#[test]
fn de_zero_delay_prepends_initial_value() {
    let mut net = Network::new("top");
    let xs = net.signal("xs");
    let ys = net.signal("ys");
    let (collected, push) = collector();

    de::vsource(
        &mut net,
        "src",
        vec![(Duration::from_secs(1), 'a'), (Duration::from_secs(2), 'b')],
        &xs,
    )
    .unwrap();
    de::delay(&mut net, "init", Duration::ZERO, 'z', &xs, &ys).unwrap();
    de::sink(&mut net, "snk", push, &ys).unwrap();

    net.elaborate().unwrap().run().unwrap();

    assert_eq!(
        *collected.lock().unwrap(),
        [
            Tagged::new(MonotonicTime::EPOCH, 'z'),
            Tagged::new(at_millis(1000), 'a'),
            Tagged::new(at_millis(2000), 'b'),
        ]
    );
}

#[test]
fn de_delays_compose() {
    let mut net = Network::new("top");
    let xs = net.signal("xs");
    let ys = net.signal("ys");
    let zs = net.signal("zs");
    let (collected, push) = collector();

    de::vsource(
        &mut net,
        "src",
        vec![(Duration::from_secs(1), 10), (Duration::from_secs(3), 20)],
        &xs,
    )
    .unwrap();
    de::delay(&mut net, "first", Duration::from_secs(2), 0, &xs, &ys).unwrap();
    de::delay(&mut net, "second", Duration::from_secs(1), 5, &ys, &zs).unwrap();
    de::sink(&mut net, "snk", push, &zs).unwrap();

    net.elaborate().unwrap().run().unwrap();

    assert_eq!(
        *collected.lock().unwrap(),
        [
            Tagged::new(MonotonicTime::EPOCH, 5),
            Tagged::new(at_millis(1000), 0),
            Tagged::new(at_millis(4000), 10),
            Tagged::new(at_millis(6000), 20),
        ]
    );
}

#[test]
fn dt_delay_shifts_by_one_tick() {
    let mut net = Network::new("top");
    let xs = net.signal("xs");
    let ys = net.signal("ys");
    let collected = Arc::new(Mutex::new(Vec::new()));
    let sink_collected = collected.clone();

    dt::vsource(
        &mut net,
        "src",
        vec![Event::Present(1), Event::Absent, Event::Present(3)],
        &xs,
    )
    .unwrap();
    dt::delay(&mut net, "late", 0, &xs, &ys).unwrap();
    dt::sink(
        &mut net,
        "snk",
        move |tick, x: &Event<i32>| sink_collected.lock().unwrap().push((tick, *x)),
        &ys,
    )
    .unwrap();

    net.elaborate().unwrap().run().unwrap();

    assert_eq!(
        *collected.lock().unwrap(),
        [
            (0, Event::Present(0)),
            (1, Event::Present(1)),
            (2, Event::Absent),
            (3, Event::Present(3)),
        ]
    );
}

#[test]
fn ct_delay_shifts_scaled_ramp() {
    init_tracing();

    let mut net = Network::new("top");
    let ramp = net.signal("ramp");
    let scaled = net.signal("scaled");
    let delayed = net.signal("delayed");
    let collected = Arc::new(Mutex::new(Vec::new()));
    let sink_collected = collected.clone();

    ct::source(
        &mut net,
        "gen",
        |t| time::since_epoch(t).as_secs_f64(),
        Duration::from_secs(2),
        &ramp,
    )
    .unwrap();
    ct::comb(&mut net, "double", |x: &f64| 2.0 * x, &ramp, &scaled).unwrap();
    ct::delay(&mut net, "late", Duration::from_millis(500), 0.0, &scaled, &delayed).unwrap();
    ct::sink(
        &mut net,
        "sampler",
        Duration::from_millis(500),
        move |t, x: &f64| sink_collected.lock().unwrap().push((t, *x)),
        &delayed,
    )
    .unwrap();

    net.elaborate().unwrap().run().unwrap();

    assert_eq!(
        *collected.lock().unwrap(),
        [
            (at_millis(0), 0.0),
            (at_millis(500), 0.0),
            (at_millis(1000), 1.0),
            (at_millis(1500), 2.0),
            (at_millis(2000), 3.0),
        ]
    );
}
