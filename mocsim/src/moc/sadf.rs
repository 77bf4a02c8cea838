//! Scenario-aware dataflow model of computation.
//!
//! A [`detector`] consumes a fixed number of tokens per activation and emits a
//! scenario value on its control signals. Each [`kernel`] reads one scenario
//! per activation on its control port, looks it up in its [`ScenarioTable`]
//! and consumes, computes and produces according to the entry found.
//!
//! Both processes are built against the same [`ScenarioDomain`], which lists
//! the scenarios the detector may emit. A kernel whose table lacks an entry
//! for a scenario of the domain is rejected at construction.
//!
//! # Examples
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use mocsim::moc::{sadf, sdf};
//! use mocsim::moc::sadf::{ScenarioDomain, ScenarioTable};
//! use mocsim::network::Network;
//!
//! let mut net = Network::new("modal");
//! let mode = net.signal("mode");
//! let ctrl = net.signal("ctrl");
//! let data = net.signal("data");
//! let out = net.signal("out");
//!
//! let domain = ScenarioDomain::new(["copy", "drop"]);
//! let table = ScenarioTable::new()
//!     .with("copy", &[1], &[1], |xs: &[Vec<u32>]| vec![xs[0].clone()])
//!     .with("drop", &[1], &[0], |_: &[Vec<u32>]| vec![Vec::new()]);
//!
//! sdf::vsource(&mut net, "modes", vec![true, false, true], &mode).unwrap();
//! sdf::vsource(&mut net, "values", vec![1, 2, 3], &data).unwrap();
//! sadf::detector(
//!     &mut net,
//!     "det",
//!     &domain,
//!     1,
//!     |xs: &[bool]| if xs[0] { "copy" } else { "drop" },
//!     &mode,
//!     &[&ctrl],
//! )
//! .unwrap();
//! sadf::kernel(&mut net, "k", &domain, table, &ctrl, &[&data], &[&out]).unwrap();
//!
//! let received = Arc::new(Mutex::new(Vec::new()));
//! let sink_received = received.clone();
//! sdf::sink(&mut net, "snk", move |x: &u32| sink_received.lock().unwrap().push(*x), &out)
//!     .unwrap();
//!
//! net.elaborate().unwrap().run().unwrap();
//!
//! assert_eq!(*received.lock().unwrap(), [1, 3]);
//! ```
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::mem;

use tracing::trace;

use crate::moc::{check_arity, check_rate, iport, oport};
use crate::network::{ElaborationError, Network, Signal};
use crate::process::{
    Argument, InPort, OutPort, PhaseFuture, PortInfo, Process, ProcessError, TypeTag,
};

/// The set of scenarios a detector may emit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioDomain<Sc> {
    scenarios: BTreeSet<Sc>,
}

impl<Sc: Ord> ScenarioDomain<Sc> {
    /// Creates a domain from a list of scenarios.
    pub fn new(scenarios: impl IntoIterator<Item = Sc>) -> Self {
        Self {
            scenarios: scenarios.into_iter().collect(),
        }
    }

    /// Returns `true` if the domain contains the scenario.
    pub fn contains(&self, scenario: &Sc) -> bool {
        self.scenarios.contains(scenario)
    }

    /// Returns an iterator over the scenarios in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Sc> {
        self.scenarios.iter()
    }

    /// Returns the number of scenarios.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Returns `true` if the domain contains no scenario.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

type KernelFn<I, O> = Box<dyn FnMut(&[Vec<I>]) -> Vec<Vec<O>> + Send>;

struct Entry<I, O> {
    in_rates: Vec<usize>,
    out_rates: Vec<usize>,
    func: KernelFn<I, O>,
}

/// The per-scenario rates and functions of a kernel.
///
/// Each entry gives the number of tokens consumed on each input, the number of
/// tokens produced on each output and the function mapping the consumed
/// batches (one per input) to the produced batches (one per output).
pub struct ScenarioTable<Sc, I, O> {
    entries: BTreeMap<Sc, Entry<I, O>>,
}

impl<Sc: Ord, I, O> ScenarioTable<Sc, I, O> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Adds or replaces the entry of a scenario.
    pub fn with<F>(mut self, scenario: Sc, in_rates: &[usize], out_rates: &[usize], func: F) -> Self
    where
        F: FnMut(&[Vec<I>]) -> Vec<Vec<O>> + Send + 'static,
    {
        self.entries.insert(
            scenario,
            Entry {
                in_rates: in_rates.to_vec(),
                out_rates: out_rates.to_vec(),
                func: Box::new(func),
            },
        );

        self
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the largest rate of each port over all entries.
    fn max_rates(&self, port_count: usize, rates: impl Fn(&Entry<I, O>) -> &[usize]) -> Vec<usize> {
        (0..port_count)
            .map(|i| {
                self.entries
                    .values()
                    .map(|entry| rates(entry).get(i).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

impl<Sc: Ord, I, O> Default for ScenarioTable<Sc, I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Sc: fmt::Debug, I, O> fmt::Debug for ScenarioTable<Sc, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(scenario, entry)| {
                (scenario, (&entry.in_rates, &entry.out_rates))
            }))
            .finish()
    }
}

struct Detector<I, Sc, F> {
    input: InPort<I>,
    output: OutPort<Sc>,
    domain: ScenarioDomain<Sc>,
    select: F,
    ivals: Vec<I>,
    scenario: Option<Sc>,
}

impl<I, Sc, F> Process for Detector<I, Sc, F>
where
    I: Send + 'static,
    Sc: Ord + Clone + fmt::Debug + Send + 'static,
    F: FnMut(&[I]) -> Sc + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "SADF::detector"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn arguments(&self) -> Vec<Argument> {
        vec![Argument::new("scenarios", self.domain.len())]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ivals = self.input.read_rate().await?;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let scenario = (self.select)(&self.ivals);
        if !self.domain.contains(&scenario) {
            return Err(ProcessError::UnknownScenario(format!("{scenario:?}")));
        }
        trace!(?scenario, "scenario selected");
        self.scenario = Some(scenario);

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(scenario) = self.scenario.take() {
                self.output.write(scenario).await?;
            }

            Ok(())
        })
    }
}

/// Builds a detector.
///
/// Each activation consumes `in_rate` tokens and emits the scenario returned
/// by `select` on every control signal. Selecting a scenario outside the
/// domain fails the process.
pub fn detector<I, Sc, F>(
    net: &mut Network,
    name: &str,
    domain: &ScenarioDomain<Sc>,
    in_rate: usize,
    select: F,
    input: &Signal<I>,
    controls: &[&Signal<Sc>],
) -> Result<(), ElaborationError>
where
    I: Send + 'static,
    Sc: Ord + Clone + fmt::Debug + Send + 'static,
    F: FnMut(&[I]) -> Sc + Send + 'static,
{
    check_rate(name, &iport(0), in_rate)?;
    if domain.is_empty() {
        return Err(ElaborationError::InvalidArgument {
            process: name.to_string(),
            reason: "the scenario domain is empty".to_string(),
        });
    }
    let input = net.in_port(input, &iport(0), in_rate, TypeTag::of::<I>())?;
    let output = net.out_port(controls, &oport(0), 1, TypeTag::of::<Sc>())?;

    net.add_process(
        name,
        Detector {
            input,
            output,
            domain: domain.clone(),
            select,
            ivals: Vec::new(),
            scenario: None,
        },
    )
}

struct Kernel<Sc, I, O> {
    control: InPort<Sc>,
    inputs: Vec<InPort<I>>,
    outputs: Vec<OutPort<O>>,
    table: ScenarioTable<Sc, I, O>,
    scenario: Option<Sc>,
    ivals: Vec<Vec<I>>,
    ovals: Vec<Vec<O>>,
}

impl<Sc, I, O> Kernel<Sc, I, O>
where
    Sc: Ord + fmt::Debug,
{
    fn entry(&mut self) -> Result<&mut Entry<I, O>, ProcessError> {
        let scenario = self.scenario.as_ref().ok_or(ProcessError::Exhausted)?;

        self.table
            .entries
            .get_mut(scenario)
            .ok_or_else(|| ProcessError::UnknownScenario(format!("{scenario:?}")))
    }
}

impl<Sc, I, O> Process for Kernel<Sc, I, O>
where
    Sc: Ord + Clone + fmt::Debug + Send + 'static,
    I: Send + 'static,
    O: Clone + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "SADF::kernel"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        let mut ports = vec![self.control.info()];
        ports.extend(self.inputs.iter().map(InPort::info));

        ports
    }

    fn outputs(&self) -> Vec<PortInfo> {
        self.outputs.iter().map(OutPort::info).collect()
    }

    fn arguments(&self) -> Vec<Argument> {
        vec![Argument::new("scenarios", self.table.len())]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.scenario = Some(self.control.read().await?);
            let rates = self.entry()?.in_rates.clone();

            let mut ivals = Vec::with_capacity(rates.len());
            for (input, rate) in self.inputs.iter_mut().zip(rates) {
                ivals.push(input.read_n(rate).await?);
            }
            self.ivals = ivals;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let ivals = mem::take(&mut self.ivals);
        let entry = self.entry()?;
        let ovals = (entry.func)(&ivals);
        let out_rates = entry.out_rates.clone();

        if let Some(extra) = ovals.get(self.outputs.len()) {
            return Err(ProcessError::RateMismatch {
                port: oport(self.outputs.len()),
                expected: 0,
                found: extra.len(),
            });
        }
        for (i, output) in self.outputs.iter().enumerate() {
            let found = ovals.get(i).map_or(0, Vec::len);
            output.check_rate(found, out_rates[i])?;
        }
        self.ovals = ovals;

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            let ovals = mem::take(&mut self.ovals);
            for (output, tokens) in self.outputs.iter().zip(ovals) {
                output.write_all(tokens).await?;
            }

            Ok(())
        })
    }
}

/// Builds a kernel.
///
/// The control port is named `ctrl`. The rate published for each data port is
/// its largest rate over all scenarios. Construction fails if the table is
/// empty, lacks an entry for a scenario of the domain, or has an entry whose
/// rate lists do not match the number of ports.
pub fn kernel<Sc, I, O>(
    net: &mut Network,
    name: &str,
    domain: &ScenarioDomain<Sc>,
    table: ScenarioTable<Sc, I, O>,
    control: &Signal<Sc>,
    inputs: &[&Signal<I>],
    outputs: &[&Signal<O>],
) -> Result<(), ElaborationError>
where
    Sc: Ord + Clone + fmt::Debug + Send + 'static,
    I: Send + 'static,
    O: Clone + Send + 'static,
{
    if table.is_empty() {
        return Err(ElaborationError::EmptyScenarioTable(name.to_string()));
    }
    if let Some(scenario) = domain
        .iter()
        .find(|scenario| !table.entries.contains_key(scenario))
    {
        return Err(ElaborationError::MissingScenario {
            process: name.to_string(),
            scenario: format!("{scenario:?}"),
        });
    }
    for entry in table.entries.values() {
        check_arity(name, inputs.len(), entry.in_rates.len())?;
        check_arity(name, outputs.len(), entry.out_rates.len())?;
    }

    let in_rates = table.max_rates(inputs.len(), |entry| entry.in_rates.as_slice());
    let out_rates = table.max_rates(outputs.len(), |entry| entry.out_rates.as_slice());

    let control = net.in_port(control, "ctrl", 1, TypeTag::of::<Sc>())?;
    let inputs = inputs
        .iter()
        .zip(in_rates)
        .enumerate()
        .map(|(i, (input, rate))| net.in_port(input, &iport(i), rate, TypeTag::of::<I>()))
        .collect::<Result<Vec<_>, _>>()?;
    let outputs = outputs
        .iter()
        .zip(out_rates)
        .enumerate()
        .map(|(i, (output, rate))| net.out_port(&[*output], &oport(i), rate, TypeTag::of::<O>()))
        .collect::<Result<Vec<_>, _>>()?;

    net.add_process(
        name,
        Kernel {
            control,
            inputs,
            outputs,
            table,
            scenario: None,
            ivals: Vec::new(),
            ovals: Vec::new(),
        },
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    use crate::moc::sdf;
    use crate::simulation::SimulationError;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
    enum Mode {
        Single,
        Pair,
    }

    fn select(xs: &[u8]) -> Mode {
        if xs[0] == 0 {
            Mode::Single
        } else {
            Mode::Pair
        }
    }

    #[test]
    fn sadf_kernel_follows_scenarios() {
        let mut net = Network::new("top");
        let mode = net.signal("mode");
        let ctrl = net.signal("ctrl");
        let data = net.signal("data");
        let out = net.signal("out");
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_received = received.clone();

        let domain = ScenarioDomain::new([Mode::Single, Mode::Pair]);
        let table = ScenarioTable::new()
            .with(Mode::Single, &[1], &[1], |xs: &[Vec<u32>]| {
                vec![xs[0].clone()]
            })
            .with(Mode::Pair, &[2], &[1], |xs: &[Vec<u32>]| {
                vec![vec![xs[0].iter().sum::<u32>()]]
            });

        sdf::vsource(&mut net, "modes", vec![0u8, 1, 0], &mode).unwrap();
        sdf::vsource(&mut net, "values", vec![10, 20, 30, 40], &data).unwrap();
        detector(&mut net, "det", &domain, 1, select, &mode, &[&ctrl]).unwrap();
        kernel(&mut net, "k", &domain, table, &ctrl, &[&data], &[&out]).unwrap();
        sdf::sink(
            &mut net,
            "snk",
            move |x: &u32| sink_received.lock().unwrap().push(*x),
            &out,
        )
        .unwrap();

        let mut simu = net.elaborate().unwrap();

        let kernel_info = simu.info().process("k").unwrap();
        assert_eq!(kernel_info.inputs[0].name, "ctrl");
        assert_eq!(kernel_info.inputs[1].rate, 2);

        simu.run().unwrap();

        assert_eq!(*received.lock().unwrap(), [10, 50, 40]);
    }

    #[test]
    fn sadf_kernel_requires_every_scenario() {
        let mut net = Network::new("top");
        let ctrl = net.signal("ctrl");
        let data = net.signal::<u32>("data");
        let out = net.signal::<u32>("out");

        let domain = ScenarioDomain::new([Mode::Single, Mode::Pair]);
        let table = ScenarioTable::new().with(Mode::Single, &[1], &[1], |xs: &[Vec<u32>]| {
            vec![xs[0].clone()]
        });

        assert_eq!(
            kernel(&mut net, "k", &domain, table, &ctrl, &[&data], &[&out]),
            Err(ElaborationError::MissingScenario {
                process: "k".into(),
                scenario: "Pair".into()
            })
        );
    }

    #[test]
    fn sadf_kernel_rejects_empty_table() {
        let mut net = Network::new("top");
        let ctrl = net.signal::<Mode>("ctrl");
        let data = net.signal::<u32>("data");
        let out = net.signal::<u32>("out");

        assert_eq!(
            kernel(
                &mut net,
                "k",
                &ScenarioDomain::new([Mode::Single]),
                ScenarioTable::new(),
                &ctrl,
                &[&data],
                &[&out]
            ),
            Err(ElaborationError::EmptyScenarioTable("k".into()))
        );
    }

    #[test]
    fn sadf_detector_rejects_foreign_scenario() {
        let mut net = Network::new("top");
        let mode = net.signal("mode");
        let ctrl = net.signal("ctrl");

        sdf::vsource(&mut net, "modes", vec![1u8], &mode).unwrap();
        detector(
            &mut net,
            "det",
            &ScenarioDomain::new([Mode::Single]),
            1,
            select,
            &mode,
            &[&ctrl],
        )
        .unwrap();
        sdf::sink(&mut net, "snk", |_: &Mode| {}, &ctrl).unwrap();

        assert_eq!(
            net.elaborate().unwrap().run(),
            Err(SimulationError::ProcessFailed {
                process: "det".into(),
                error: ProcessError::UnknownScenario("Pair".into())
            })
        );
    }
}
