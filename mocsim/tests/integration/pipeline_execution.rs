//! Execution of rate-based pipelines.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mocsim::moc::sdf;
use mocsim::network::{ElaborationError, Network, Signal};
use mocsim::process::{InPort, PhaseFuture, PortInfo, Process, ProcessError, TypeTag};
use mocsim::simulation::SimulationError;

use crate::{collector, init_tracing};

#[test]
fn pipeline_increments_values() {
    init_tracing();

    let mut net = Network::new("pipeline");
    let raw = net.signal("raw");
    let cooked = net.signal("cooked");
    let (collected, push) = collector();

    sdf::vsource(&mut net, "src", vec![1, 2, 3], &raw).unwrap();
    sdf::comb(&mut net, "inc", 1, 1, |x: &[i32]| vec![x[0] + 1], &raw, &cooked).unwrap();
    sdf::sink(&mut net, "snk", push, &cooked).unwrap();

    let mut simu = net.elaborate().unwrap();
    simu.run().unwrap();

    assert_eq!(*collected.lock().unwrap(), [2, 3, 4]);
}

#[test]
fn pipeline_within_composite() {
    init_tracing();

    let mut net = Network::new("top");
    let raw = net.signal("raw");
    let cooked = net.signal("cooked");
    let (collected, push) = collector();

    sdf::vsource(&mut net, "src", vec![1, 2, 3, 4], &raw).unwrap();
    net.composite("stage", |net| {
        let doubled: Signal<u64> = net.signal("doubled");
        sdf::comb(net, "double", 1, 1, |x: &[u64]| vec![2 * x[0]], &raw, &doubled)?;
        sdf::comb(net, "pairsum", 2, 1, |x: &[u64]| vec![x[0] + x[1]], &doubled, &cooked)
    })
    .unwrap();
    sdf::sink(&mut net, "snk", push, &cooked).unwrap();

    let mut simu = net.elaborate().unwrap();
    assert!(simu.info().process("stage.double").is_some());
    assert!(simu.info().channel("stage.doubled").is_some());

    simu.run().unwrap();

    assert_eq!(*collected.lock().unwrap(), [6, 14]);
}

#[test]
fn pipeline_rejects_unconnected_signal() {
    let mut net = Network::new("top");
    let raw = net.signal::<u8>("raw");

    sdf::vsource(&mut net, "src", vec![1], &raw).unwrap();

    assert_eq!(
        net.elaborate().map(|_| ()),
        Err(ElaborationError::Unconnected("raw".into()))
    );
}

#[test]
fn pipeline_reports_rate_mismatch() {
    init_tracing();

    let mut net = Network::new("top");
    let raw = net.signal("raw");
    let cooked = net.signal("cooked");

    sdf::vsource(&mut net, "src", vec![1u8, 2], &raw).unwrap();
    sdf::comb(&mut net, "bad", 1, 1, |x: &[u8]| vec![x[0]; x[0] as usize], &raw, &cooked)
        .unwrap();
    sdf::sink(&mut net, "snk", |_: &u8| {}, &cooked).unwrap();

    assert_eq!(
        net.elaborate().unwrap().run(),
        Err(SimulationError::ProcessFailed {
            process: "bad".into(),
            error: ProcessError::RateMismatch {
                port: "oport1".into(),
                expected: 1,
                found: 2
            }
        })
    );
}

#[test]
fn pipeline_with_unbounded_source_runs_in_steps() {
    let mut net = Network::new("top");
    let naturals = net.signal("naturals");
    let (collected, push) = collector();

    sdf::source(&mut net, "nat", |n: &u64| n + 1, 0, None, &naturals).unwrap();
    sdf::sink(&mut net, "snk", push, &naturals).unwrap();

    let mut simu = net.elaborate().unwrap();
    let stalled = simu.run_steps(100).unwrap();

    assert!(!stalled);
    let collected = collected.lock().unwrap();
    assert!(!collected.is_empty());
    assert!(collected.iter().copied().eq(0..collected.len() as u64));
}

#[test]
fn pipeline_stalling_on_last_step_reports_stall() {
    let mut net = Network::new("top");
    let raw = net.signal("raw");
    let (collected, push) = collector();

    sdf::vsource(&mut net, "src", vec![1u8, 2, 3], &raw).unwrap();
    sdf::sink(&mut net, "snk", push, &raw).unwrap();

    // Three activations of the source and three of the sink.
    let mut simu = net.elaborate().unwrap();
    assert!(!simu.run_steps(5).unwrap());
    assert!(simu.run_steps(1).unwrap());
    assert_eq!(*collected.lock().unwrap(), [1, 2, 3]);

    let mut net = Network::new("top");
    let raw = net.signal("raw");
    sdf::vsource(&mut net, "src", vec![1u8, 2, 3], &raw).unwrap();
    sdf::sink(&mut net, "snk", |_: &u8| {}, &raw).unwrap();

    let mut simu = net.elaborate().unwrap();
    assert!(simu.run_steps(6).unwrap());
    assert!(simu.run_steps(6).unwrap());
}

/// A sink counting its activations and finalizations.
struct CountingSink {
    input: InPort<u32>,
    activations: Arc<AtomicUsize>,
    cleanups: Arc<AtomicUsize>,
}

impl Process for CountingSink {
    fn kind(&self) -> &'static str {
        "SDF::counter"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        Vec::new()
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.input.read().await?;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        self.activations.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    fn clean(&mut self) {
        self.cleanups.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn pipeline_shutdown_finalizes_once() {
    init_tracing();

    let mut net = Network::new("top");
    let raw = net.signal("raw");
    let activations = Arc::new(AtomicUsize::new(0));
    let cleanups = Arc::new(AtomicUsize::new(0));

    sdf::vsource(&mut net, "src", vec![1u32, 2, 3], &raw).unwrap();
    let input = net.in_port(&raw, "iport1", 1, TypeTag::of::<u32>()).unwrap();
    net.add_process(
        "counter",
        CountingSink {
            input,
            activations: activations.clone(),
            cleanups: cleanups.clone(),
        },
    )
    .unwrap();

    let mut simu = net.elaborate().unwrap();
    simu.run().unwrap();

    assert_eq!(activations.load(Ordering::Relaxed), 3);
    assert_eq!(cleanups.load(Ordering::Relaxed), 0);
    assert_eq!(simu.active_processes(), 2);

    simu.shutdown().unwrap();

    assert_eq!(cleanups.load(Ordering::Relaxed), 1);
}

#[test]
fn pipeline_stops_on_request() {
    let mut net = Network::new("top");
    let naturals = net.signal("naturals");
    let (collected, push) = collector();

    sdf::source(&mut net, "nat", |n: &u64| n + 1, 0, None, &naturals).unwrap();
    sdf::sink(&mut net, "snk", push, &naturals).unwrap();

    let mut simu = net.elaborate().unwrap();
    let stop = simu.stop_handle();
    assert!(!simu.run_steps(10).unwrap());
    assert_eq!(simu.active_processes(), 2);
    stop.stop();
    assert!(stop.is_stopped());

    let len = collected.lock().unwrap().len();
    simu.run().unwrap();

    // Each process completes at most its current activation, then exits
    // without waiting for a shutdown.
    assert!(collected.lock().unwrap().len() <= len + 1);
    assert_eq!(simu.active_processes(), 0);

    let len = collected.lock().unwrap().len();
    simu.run().unwrap();
    assert_eq!(collected.lock().unwrap().len(), len);
    simu.shutdown().unwrap();
}
