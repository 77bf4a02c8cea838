//! Folding of structural processes at export.

use std::fs;

use mocsim::export::{self, fold::fold, ExportConfig};
use mocsim::moc::sdf;
use mocsim::network::info::Endpoint;
use mocsim::network::Network;

use crate::{collector, init_tracing};

#[test]
fn delay_folding_conserves_tokens() {
    init_tracing();

    let mut net = Network::new("app");
    let a = net.signal("a");
    let b = net.signal("b");
    let c = net.signal("c");
    let d = net.signal("d");
    let (collected, push) = collector();

    sdf::vsource(&mut net, "src", vec![1u32, 2], &a).unwrap();
    sdf::comb(&mut net, "scale", 1, 2, |x: &[u32]| vec![x[0]; 2], &a, &b).unwrap();
    net.composite("buffer", |net| sdf::delayn(net, "z", 0, 3, &b, &c))
        .unwrap();
    sdf::comb(&mut net, "sum", 2, 1, |x: &[u32]| vec![x[0] + x[1]], &c, &d).unwrap();
    sdf::sink(&mut net, "snk", push, &d).unwrap();

    let mut simu = net.elaborate().unwrap();
    simu.run().unwrap();

    // Three initial tokens followed by 1, 1, 2, 2.
    assert_eq!(*collected.lock().unwrap(), [0, 1, 3]);

    let folded = fold(simu.info()).unwrap();
    assert!(folded.process("buffer.z").is_none());
    assert!(folded.channel("c").is_none());

    let b = folded.channel("b").unwrap();
    assert_eq!(b.src, Endpoint::new("scale", "oport1"));
    assert_eq!(b.dst, Endpoint::new("sum", "iport1"));
    assert_eq!(b.prod_rate, 2);
    assert_eq!(b.cons_rate, 2);
    assert_eq!(b.initial_tokens, 3);

    let dir = tempfile::tempdir().unwrap();
    let fragment = dir.path().join("app.cpp");
    fs::write(
        &fragment,
        "// BEGIN sum_func\nout1 = inp1[0] + inp1[1];\n// END sum_func\n",
    )
    .unwrap();
    let config = ExportConfig::new(dir.path()).with_source(&fragment);
    let report = export::export(simu.info(), &config).unwrap();

    let document = fs::read_to_string(&report.document).unwrap();
    assert!(document.contains("initialTokens=\"3\""));
    assert!(!document.contains("SDF::delayn"));
    assert_eq!(report.functions, [dir.path().join("sum_func.c")]);

    simu.shutdown().unwrap();
}

#[test]
fn zip_unzip_folding_connects_endpoints() {
    let mut net = Network::new("app");
    let a = net.signal("a");
    let b = net.signal("b");
    let c = net.signal("c");
    let d = net.signal("d");
    let (first, push_first) = collector();
    let (second, push_second) = collector();

    sdf::vsource(&mut net, "src1", vec![1u8], &a).unwrap();
    sdf::vsource(&mut net, "src2", vec![2u8, 3], &b).unwrap();
    net.composite("link", |net| {
        let zipped = net.signal("zipped");
        sdf::zipn(net, "zip", &[1, 1], &[&a, &b], &zipped)?;
        sdf::unzipn(net, "unzip", &[1, 1], &zipped, &[&c, &d])
    })
    .unwrap();
    sdf::sink(&mut net, "snk1", push_first, &c).unwrap();
    sdf::sink(&mut net, "snk2", push_second, &d).unwrap();

    let mut simu = net.elaborate().unwrap();
    simu.run().unwrap();
    assert_eq!(*first.lock().unwrap(), [1]);
    assert_eq!(*second.lock().unwrap(), [2]);

    let dir = tempfile::tempdir().unwrap();
    let report = export::export(simu.info(), &ExportConfig::new(dir.path())).unwrap();
    let document = fs::read_to_string(&report.document).unwrap();
    assert!(!document.contains("link.zip"));
    assert!(!document.contains("link.zipped"));

    let folded = fold(simu.info()).unwrap();
    assert_eq!(folded.channels.len(), 2);
    let endpoints: Vec<_> = folded
        .channels
        .iter()
        .map(|channel| (channel.src.process.as_str(), channel.dst.process.as_str()))
        .collect();
    assert!(endpoints.contains(&("src1", "snk1")));
    assert!(endpoints.contains(&("src2", "snk2")));
}
