//! Scenario-aware dataflow networks.

use mocsim::moc::sadf::{self, ScenarioDomain, ScenarioTable};
use mocsim::moc::sdf;
use mocsim::network::Network;
use mocsim::process::ProcessError;
use mocsim::simulation::SimulationError;

use crate::{collector, init_tracing};

fn select(frame: &[u32]) -> &'static str {
    if frame.iter().sum::<u32>() > 10 {
        "burst"
    } else {
        "idle"
    }
}

#[test]
fn detector_drives_several_kernels() {
    init_tracing();

    let mut net = Network::new("top");
    let frames = net.signal("frames");
    let ctrl_acc = net.signal("ctrl_acc");
    let ctrl_rep = net.signal("ctrl_rep");
    let samples = net.signal("samples");
    let levels = net.signal("levels");
    let sums = net.signal("sums");
    let repeated = net.signal("repeated");
    let (collected_sums, push_sum) = collector();
    let (collected_levels, push_level) = collector();

    let domain = ScenarioDomain::new(["idle", "burst"]);
    let accumulate = ScenarioTable::new()
        .with("idle", &[1], &[1], |xs: &[Vec<u32>]| vec![xs[0].clone()])
        .with("burst", &[3], &[1], |xs: &[Vec<u32>]| {
            vec![vec![xs[0].iter().sum::<u32>()]]
        });
    let repeat = ScenarioTable::new()
        .with("idle", &[1], &[1], |xs: &[Vec<u32>]| vec![xs[0].clone()])
        .with("burst", &[1], &[2], |xs: &[Vec<u32>]| {
            vec![vec![xs[0][0]; 2]]
        });

    sdf::vsource(&mut net, "frame_src", vec![1, 2, 9, 9, 3, 0], &frames).unwrap();
    sdf::vsource(&mut net, "sample_src", vec![1, 2, 3, 4, 5, 6, 7], &samples).unwrap();
    sdf::vsource(&mut net, "level_src", vec![7, 8, 9], &levels).unwrap();
    sadf::detector(
        &mut net,
        "det",
        &domain,
        2,
        select,
        &frames,
        &[&ctrl_acc, &ctrl_rep],
    )
    .unwrap();
    sadf::kernel(
        &mut net,
        "acc",
        &domain,
        accumulate,
        &ctrl_acc,
        &[&samples],
        &[&sums],
    )
    .unwrap();
    sadf::kernel(
        &mut net,
        "rep",
        &domain,
        repeat,
        &ctrl_rep,
        &[&levels],
        &[&repeated],
    )
    .unwrap();
    sdf::sink(&mut net, "sum_snk", push_sum, &sums).unwrap();
    sdf::sink(&mut net, "level_snk", push_level, &repeated).unwrap();

    let mut simu = net.elaborate().unwrap();
    let acc = simu.info().process("acc").unwrap();
    assert_eq!(acc.kind, "SADF::kernel");
    assert_eq!(acc.inputs[1].rate, 3);
    assert_eq!(simu.info().process("rep").unwrap().outputs[0].rate, 2);

    simu.run().unwrap();

    assert_eq!(*collected_sums.lock().unwrap(), [1, 9, 5]);
    assert_eq!(*collected_levels.lock().unwrap(), [7, 8, 8, 9]);
}

#[test]
fn kernel_output_must_match_scenario_rates() {
    let mut net = Network::new("top");
    let frames = net.signal("frames");
    let ctrl = net.signal("ctrl");
    let samples = net.signal("samples");
    let out = net.signal("out");

    let domain = ScenarioDomain::new(["idle", "burst"]);
    let table = ScenarioTable::new()
        .with("idle", &[1], &[1], |xs: &[Vec<u32>]| vec![xs[0].clone()])
        .with("burst", &[1], &[2], |xs: &[Vec<u32>]| vec![xs[0].clone()]);

    sdf::vsource(&mut net, "frame_src", vec![1, 1, 9, 9], &frames).unwrap();
    sdf::vsource(&mut net, "sample_src", vec![1, 2], &samples).unwrap();
    sadf::detector(&mut net, "det", &domain, 2, select, &frames, &[&ctrl]).unwrap();
    sadf::kernel(&mut net, "k", &domain, table, &ctrl, &[&samples], &[&out]).unwrap();
    sdf::sink(&mut net, "snk", |_: &u32| {}, &out).unwrap();

    assert_eq!(
        net.elaborate().unwrap().run(),
        Err(SimulationError::ProcessFailed {
            process: "k".into(),
            error: ProcessError::RateMismatch {
                port: "oport1".into(),
                expected: 2,
                found: 1
            }
        })
    );
}
