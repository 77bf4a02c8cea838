//! Propagation of absent events through synchronous processes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mocsim::event::Event;
use mocsim::moc::sy;
use mocsim::network::Network;

use crate::{collector, init_tracing};

#[test]
fn absent_input_skips_function() {
    init_tracing();

    let mut net = Network::new("top");
    let xs = net.signal("xs");
    let ys = net.signal("ys");
    let (collected, push) = collector();
    let calls = Arc::new(AtomicUsize::new(0));
    let comb_calls = calls.clone();

    sy::vsource(
        &mut net,
        "src",
        vec![Event::Present(1), Event::Absent, Event::Present(3)],
        &xs,
    )
    .unwrap();
    sy::comb(
        &mut net,
        "inc",
        move |x: &i32| {
            comb_calls.fetch_add(1, Ordering::Relaxed);
            x + 1
        },
        &xs,
        &ys,
    )
    .unwrap();
    sy::sink(&mut net, "snk", push, &ys).unwrap();

    net.elaborate().unwrap().run().unwrap();

    assert_eq!(
        *collected.lock().unwrap(),
        [Event::Present(2), Event::Absent, Event::Present(4)]
    );
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn absent_operands_are_handed_to_two_input_function() {
    init_tracing();

    let mut net = Network::new("top");
    let a = net.signal("a");
    let b = net.signal("b");
    let sum = net.signal("sum");
    let (collected, push) = collector();
    let calls = Arc::new(AtomicUsize::new(0));
    let comb_calls = calls.clone();

    sy::vsource(
        &mut net,
        "a_src",
        vec![Event::Present(1), Event::Absent, Event::Absent],
        &a,
    )
    .unwrap();
    sy::vsource(
        &mut net,
        "b_src",
        vec![Event::Present(10), Event::Present(20), Event::Absent],
        &b,
    )
    .unwrap();
    sy::comb2(
        &mut net,
        "add",
        move |a: &Event<i32>, b: &Event<i32>| {
            comb_calls.fetch_add(1, Ordering::Relaxed);
            a.value().copied().unwrap_or(0) + b.value().copied().unwrap_or(0)
        },
        &a,
        &b,
        &sum,
    )
    .unwrap();
    sy::sink(&mut net, "snk", push, &sum).unwrap();

    net.elaborate().unwrap().run().unwrap();

    assert_eq!(
        *collected.lock().unwrap(),
        [Event::Present(11), Event::Present(20), Event::Absent]
    );
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn absent_events_cross_delays_unchanged() {
    let mut net = Network::new("top");
    let xs = net.signal("xs");
    let ys = net.signal("ys");
    let (collected, push) = collector();

    sy::vsource(&mut net, "src", vec![Event::Absent, Event::Present(7)], &xs).unwrap();
    sy::delayn(&mut net, "z", 0, 2, &xs, &ys).unwrap();
    sy::sink(&mut net, "snk", push, &ys).unwrap();

    net.elaborate().unwrap().run().unwrap();

    assert_eq!(
        *collected.lock().unwrap(),
        [
            Event::Present(0),
            Event::Present(0),
            Event::Absent,
            Event::Present(7)
        ]
    );
}
