//! Introspection of assembled networks.

use mocsim::moc::{sdf, sy};
use mocsim::network::info::{Endpoint, NetworkInfo};
use mocsim::network::{ChannelId, ElaborationError, Network};

fn assemble() -> Network {
    let mut net = Network::new("app");
    let raw = net.signal("raw");
    let cooked = net.signal("cooked");
    let dangling = net.signal::<u8>("dangling");

    sdf::vsource(&mut net, "src", vec![1u16, 2, 3, 4], &raw).unwrap();
    net.composite("filter", |net| {
        let halves = net.signal("halves");
        sdf::comb(net, "split", 1, 2, |x: &[u16]| vec![x[0] / 2, x[0] - x[0] / 2], &raw, &halves)?;
        sdf::delayn(net, "z", 0, 2, &halves, &cooked)
    })
    .unwrap();
    sdf::sink(&mut net, "snk", |_: &u16| {}, &cooked).unwrap();
    sdf::sink(&mut net, "dangling_snk", |_: &u8| {}, &dangling).unwrap();

    net
}

#[test]
fn introspection_is_repeatable() {
    let net = assemble();

    assert_eq!(net.introspect(), net.introspect());
}

#[test]
fn introspection_records_leaves_and_channels() {
    let info: NetworkInfo = assemble().introspect();

    let names: Vec<_> = info.processes.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["src", "filter.split", "filter.z", "snk", "dangling_snk"]);

    let split = info.process("filter.split").unwrap();
    assert_eq!(split.basename, "split");
    assert_eq!(split.kind, "SDF::comb");
    assert_eq!(split.outputs[0].rate, 2);

    let z = info.process("filter.z").unwrap();
    assert_eq!(z.kind, "SDF::delayn");
    assert_eq!(z.argument("n"), Some("2"));

    // A channel without producer is omitted.
    assert!(info.channel("dangling").is_none());
    assert_eq!(info.channels.len(), 3);

    let halves = info.channel("filter.halves").unwrap();
    assert_eq!(halves.src, Endpoint::new("filter.split", "oport1"));
    assert_eq!(halves.dst, Endpoint::new("filter.z", "iport1"));
    assert_eq!(halves.prod_rate, 2);
    assert_eq!(halves.token_size, 2);
    assert_eq!(info.channels_from("filter.z").count(), 1);
    assert_eq!(info.channels_to("snk").count(), 1);
}

#[test]
fn introspection_matches_elaborated_network() {
    let mut net = Network::new("app");
    let xs = net.signal("xs");
    let ys = net.signal("ys");
    sy::constant(&mut net, "one", 1u8, Some(3), &xs).unwrap();
    sy::comb(&mut net, "neg", |x: &u8| !x, &xs, &ys).unwrap();
    sy::sink(&mut net, "snk", |_| {}, &ys).unwrap();

    let info = net.introspect();
    let simu = net.elaborate().unwrap();

    assert_eq!(*simu.info(), info);
}

#[test]
fn introspection_reports_signal_ids() {
    let mut net = Network::new("app");
    let raw = net.signal("raw");
    let cooked = net.signal("cooked");

    sdf::vsource(&mut net, "src", vec![1u8], &raw).unwrap();
    sdf::comb(&mut net, "copy", 1, 1, |x: &[u8]| x.to_vec(), &raw, &cooked).unwrap();
    sdf::sink(&mut net, "snk", |_: &u8| {}, &cooked).unwrap();

    let ids: Vec<ChannelId> = vec![raw.id(), cooked.id()];
    assert_ne!(ids[0], ids[1]);

    let info = net.introspect();
    assert_eq!(info.channel("raw").unwrap().id, ids[0]);
    assert_eq!(info.channel("cooked").unwrap().id, ids[1]);
    assert_eq!(info.process("copy").unwrap().inputs[0].channels, [ids[0]]);

    let mut other = Network::new("other");
    let foreign = other.signal::<u8>("foreign");
    let foreign_id: ChannelId = foreign.id();
    assert_eq!(
        sdf::sink(&mut net, "stray", |_: &u8| {}, &foreign),
        Err(ElaborationError::ForeignSignal(foreign_id))
    );
}
