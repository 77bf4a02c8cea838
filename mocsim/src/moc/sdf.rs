//! Synchronous dataflow model of computation.
//!
//! Channels of the synchronous dataflow model carry plain tokens, which are
//! always present. Each port declares at construction how many tokens it
//! consumes or produces per activation, and an activation fires as soon as
//! enough tokens are available on every input.
//!
//! Rates are strictly enforced: a user function that returns a batch whose
//! length differs from the declared production rate makes the process fail
//! without emitting any token of the faulty batch. A zero rate is a
//! construction error.
//!
//! # Examples
//!
//! Pairwise averaging:
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use mocsim::moc::sdf;
//! use mocsim::network::Network;
//!
//! let mut net = Network::new("avg");
//! let xs = net.signal("xs");
//! let means = net.signal("means");
//!
//! sdf::vsource(&mut net, "src", vec![1.0, 3.0, 2.0, 4.0], &xs).unwrap();
//! sdf::comb(&mut net, "mean", 2, 1, |x: &[f64]| vec![(x[0] + x[1]) / 2.0], &xs, &means).unwrap();
//!
//! let collected = Arc::new(Mutex::new(Vec::new()));
//! let sink_collected = collected.clone();
//! sdf::sink(&mut net, "snk", move |x: &f64| sink_collected.lock().unwrap().push(*x), &means)
//!     .unwrap();
//!
//! net.elaborate().unwrap().run().unwrap();
//!
//! assert_eq!(*collected.lock().unwrap(), [2.0, 3.0]);
//! ```
use std::mem;

use crate::moc::{self, check_arity, check_rate, iport, oport};
use crate::network::{ElaborationError, Network, Signal};
use crate::process::{
    Argument, InPort, OutPort, PhaseFuture, PortInfo, Process, ProcessError, TypeTag,
};

struct Comb<I, O, F> {
    kind: &'static str,
    inputs: Vec<InPort<I>>,
    output: OutPort<O>,
    func: F,
    ivals: Vec<Vec<I>>,
    ovals: Vec<O>,
}

impl<I, O, F> Process for Comb<I, O, F>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&[Vec<I>]) -> Vec<O> + Send + 'static,
{
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn inputs(&self) -> Vec<PortInfo> {
        self.inputs.iter().map(|port| port.info()).collect()
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ivals.clear();
            for input in &mut self.inputs {
                self.ivals.push(input.read_rate().await?);
            }

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let ovals = (self.func)(&self.ivals);
        self.output.check_rate(ovals.len(), self.output.rate())?;
        self.ovals = ovals;

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move { self.output.write_all(mem::take(&mut self.ovals)).await })
    }
}

/// Builds the inner combinational process shared by all arities.
#[allow(clippy::too_many_arguments)]
fn comb_n<I, O, F>(
    net: &mut Network,
    name: &str,
    kind: &'static str,
    in_rates: &[usize],
    out_rate: usize,
    func: F,
    inputs: &[&Signal<I>],
    output: &Signal<O>,
) -> Result<(), ElaborationError>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&[Vec<I>]) -> Vec<O> + Send + 'static,
{
    check_arity(name, in_rates.len(), inputs.len())?;
    for (i, &rate) in in_rates.iter().enumerate() {
        check_rate(name, &iport(i), rate)?;
    }
    check_rate(name, &oport(0), out_rate)?;

    let inputs = inputs
        .iter()
        .zip(in_rates)
        .enumerate()
        .map(|(i, (input, &rate))| net.in_port(input, &iport(i), rate, TypeTag::of::<I>()))
        .collect::<Result<Vec<_>, _>>()?;
    let output = net.out_port(&[output], &oport(0), out_rate, TypeTag::of::<O>())?;
    let ivals = Vec::with_capacity(inputs.len());

    net.add_process(
        name,
        Comb {
            kind,
            inputs,
            output,
            func,
            ivals,
            ovals: Vec::new(),
        },
    )
}

/// Builds a combinational process consuming `in_rate` tokens and producing
/// `out_rate` tokens per activation.
pub fn comb<I, O, F>(
    net: &mut Network,
    name: &str,
    in_rate: usize,
    out_rate: usize,
    mut func: F,
    input: &Signal<I>,
    output: &Signal<O>,
) -> Result<(), ElaborationError>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&[I]) -> Vec<O> + Send + 'static,
{
    comb_n(
        net,
        name,
        "SDF::comb",
        &[in_rate],
        out_rate,
        move |ivals: &[Vec<I>]| func(&ivals[0]),
        &[input],
        output,
    )
}

/// Builds a combinational process with two inputs of distinct types.
#[allow(clippy::too_many_arguments)]
pub fn comb2<I1, I2, O, F>(
    net: &mut Network,
    name: &str,
    in_rates: [usize; 2],
    out_rate: usize,
    func: F,
    input1: &Signal<I1>,
    input2: &Signal<I2>,
    output: &Signal<O>,
) -> Result<(), ElaborationError>
where
    I1: Send + 'static,
    I2: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&[I1], &[I2]) -> Vec<O> + Send + 'static,
{
    for (i, &rate) in in_rates.iter().enumerate() {
        check_rate(name, &iport(i), rate)?;
    }
    check_rate(name, &oport(0), out_rate)?;

    let input1 = net.in_port(input1, &iport(0), in_rates[0], TypeTag::of::<I1>())?;
    let input2 = net.in_port(input2, &iport(1), in_rates[1], TypeTag::of::<I2>())?;
    let output = net.out_port(&[output], &oport(0), out_rate, TypeTag::of::<O>())?;

    net.add_process(
        name,
        Comb2 {
            input1,
            input2,
            output,
            func,
            ivals1: Vec::new(),
            ivals2: Vec::new(),
            ovals: Vec::new(),
        },
    )
}

struct Comb2<I1, I2, O, F> {
    input1: InPort<I1>,
    input2: InPort<I2>,
    output: OutPort<O>,
    func: F,
    ivals1: Vec<I1>,
    ivals2: Vec<I2>,
    ovals: Vec<O>,
}

impl<I1, I2, O, F> Process for Comb2<I1, I2, O, F>
where
    I1: Send + 'static,
    I2: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&[I1], &[I2]) -> Vec<O> + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "SDF::comb2"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input1.info(), self.input2.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ivals1 = self.input1.read_rate().await?;
            self.ivals2 = self.input2.read_rate().await?;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let ovals = (self.func)(&self.ivals1, &self.ivals2);
        self.output.check_rate(ovals.len(), self.output.rate())?;
        self.ovals = ovals;

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move { self.output.write_all(mem::take(&mut self.ovals)).await })
    }
}

/// Builds a combinational process with an arbitrary number of inputs of the
/// same type.
///
/// The function receives one batch per input, in port order.
pub fn combn<I, O, F>(
    net: &mut Network,
    name: &str,
    in_rates: &[usize],
    out_rate: usize,
    func: F,
    inputs: &[&Signal<I>],
    output: &Signal<O>,
) -> Result<(), ElaborationError>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&[Vec<I>]) -> Vec<O> + Send + 'static,
{
    comb_n(
        net,
        name,
        "SDF::combN",
        in_rates,
        out_rate,
        func,
        inputs,
        output,
    )
}

/// Builds a delay placing one initial token on its output.
pub fn delay<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    init: T,
    input: &Signal<T>,
    output: &Signal<T>,
) -> Result<(), ElaborationError> {
    moc::delay(net, name, "SDF::delay", init, 1, false, input, output)
}

/// Builds a delay placing `n` copies of an initial token on its output.
pub fn delayn<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    init: T,
    n: usize,
    input: &Signal<T>,
    output: &Signal<T>,
) -> Result<(), ElaborationError> {
    moc::delay(net, name, "SDF::delayn", init, n, true, input, output)
}

/// Builds a source emitting `init`, `generator(init)`, ... , `take` times or
/// forever.
pub fn source<T, G>(
    net: &mut Network,
    name: &str,
    generator: G,
    init: T,
    take: Option<usize>,
    output: &Signal<T>,
) -> Result<(), ElaborationError>
where
    T: Clone + Send + 'static,
    G: FnMut(&T) -> T + Send + 'static,
{
    moc::source(net, name, "SDF::source", generator, init, take, output)
}

/// Builds a source emitting the tokens of a vector.
pub fn vsource<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    tokens: Vec<T>,
    output: &Signal<T>,
) -> Result<(), ElaborationError> {
    moc::vsource(net, name, "SDF::vsource", tokens, output)
}

/// Builds a sink handing every token to `func`.
pub fn sink<T, F>(
    net: &mut Network,
    name: &str,
    func: F,
    input: &Signal<T>,
) -> Result<(), ElaborationError>
where
    T: Send + 'static,
    F: FnMut(&T) + Send + 'static,
{
    moc::sink(net, name, "SDF::sink", func, input)
}

/// Builds a process replicating its input to several outputs.
pub fn fanout<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    input: &Signal<T>,
    outputs: &[&Signal<T>],
) -> Result<(), ElaborationError> {
    moc::fanout(net, name, "SDF::fanout", input, outputs)
}

struct ZipN<T> {
    inputs: Vec<InPort<T>>,
    output: OutPort<Vec<Vec<T>>>,
    ivals: Vec<Vec<T>>,
}

impl<T: Clone + Send + 'static> Process for ZipN<T> {
    fn kind(&self) -> &'static str {
        "SDF::zipN"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        self.inputs.iter().map(|port| port.info()).collect()
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn arguments(&self) -> Vec<Argument> {
        vec![Argument::new("n", self.inputs.len())]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            for input in &mut self.inputs {
                self.ivals.push(input.read_rate().await?);
            }

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move { self.output.write(mem::take(&mut self.ivals)).await })
    }
}

/// Builds a process gathering one batch per input into a single token.
///
/// Input `i` contributes `in_rates[i]` tokens to each emitted token.
pub fn zipn<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    in_rates: &[usize],
    inputs: &[&Signal<T>],
    output: &Signal<Vec<Vec<T>>>,
) -> Result<(), ElaborationError> {
    check_arity(name, in_rates.len(), inputs.len())?;
    for (i, &rate) in in_rates.iter().enumerate() {
        check_rate(name, &iport(i), rate)?;
    }

    let inputs = inputs
        .iter()
        .zip(in_rates)
        .enumerate()
        .map(|(i, (input, &rate))| net.in_port(input, &iport(i), rate, TypeTag::of::<T>()))
        .collect::<Result<Vec<_>, _>>()?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Vec<Vec<T>>>())?;

    net.add_process(
        name,
        ZipN {
            inputs,
            output,
            ivals: Vec::new(),
        },
    )
}

struct UnzipN<T> {
    input: InPort<Vec<Vec<T>>>,
    outputs: Vec<OutPort<T>>,
    ovals: Vec<Vec<T>>,
}

impl<T: Clone + Send + 'static> Process for UnzipN<T> {
    fn kind(&self) -> &'static str {
        "SDF::unzipN"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        self.outputs.iter().map(|port| port.info()).collect()
    }

    fn arguments(&self) -> Vec<Argument> {
        vec![Argument::new("n", self.outputs.len())]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ovals = self.input.read().await?;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        if self.ovals.len() != self.outputs.len() {
            return Err(ProcessError::RateMismatch {
                port: self.input.name().to_string(),
                expected: self.outputs.len(),
                found: self.ovals.len(),
            });
        }
        for (output, batch) in self.outputs.iter().zip(&self.ovals) {
            output.check_rate(batch.len(), output.rate())?;
        }

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            for (output, batch) in self.outputs.iter().zip(self.ovals.drain(..)) {
                output.write_all(batch).await?;
            }

            Ok(())
        })
    }
}

/// Builds a process splitting each token into one batch per output.
///
/// Output `i` emits `out_rates[i]` tokens per activation.
pub fn unzipn<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    out_rates: &[usize],
    input: &Signal<Vec<Vec<T>>>,
    outputs: &[&Signal<T>],
) -> Result<(), ElaborationError> {
    check_arity(name, out_rates.len(), outputs.len())?;
    for (i, &rate) in out_rates.iter().enumerate() {
        check_rate(name, &oport(i), rate)?;
    }

    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<Vec<Vec<T>>>())?;
    let outputs = outputs
        .iter()
        .zip(out_rates)
        .enumerate()
        .map(|(i, (output, &rate))| net.out_port(&[*output], &oport(i), rate, TypeTag::of::<T>()))
        .collect::<Result<Vec<_>, _>>()?;

    net.add_process(
        name,
        UnzipN {
            input,
            outputs,
            ovals: Vec::new(),
        },
    )
}
