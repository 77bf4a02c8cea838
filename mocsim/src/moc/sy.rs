//! Synchronous model of computation.
//!
//! Processes of the synchronous model react instantaneously to their inputs:
//! each activation consumes exactly one [`Event`] from every input and produces
//! exactly one event on every output, all at the same logical instant.
//!
//! Absence is an ordinary event. A combinational process or a state machine
//! only calls its user function if at least one of its inputs is present;
//! otherwise it emits [`Event::Absent`] on all its outputs and its state is
//! left untouched.
//!
//! # Examples
//!
//! A running sum:
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use mocsim::event::Event;
//! use mocsim::moc::sy;
//! use mocsim::network::Network;
//!
//! let mut net = Network::new("acc");
//! let xs = net.signal("xs");
//! let sums = net.signal("sums");
//!
//! let values = vec![Event::Present(1), Event::Absent, Event::Present(4)];
//! sy::vsource(&mut net, "src", values, &xs).unwrap();
//! sy::mealy(&mut net, "acc", |s: &i32, x: &i32| s + x, |s, x| s + x, 0, &xs, &sums).unwrap();
//!
//! let collected = Arc::new(Mutex::new(Vec::new()));
//! let sink_collected = collected.clone();
//! sy::sink(&mut net, "snk", move |e: &Event<i32>| sink_collected.lock().unwrap().push(*e), &sums)
//!     .unwrap();
//!
//! let mut simu = net.elaborate().unwrap();
//! simu.run().unwrap();
//!
//! assert_eq!(
//!     *collected.lock().unwrap(),
//!     [Event::Present(1), Event::Absent, Event::Present(5)]
//! );
//! ```
use std::mem;

use crate::event::Event;
use crate::moc::{self, iport, oport};
use crate::network::{ElaborationError, Network, Signal};
use crate::process::{InPort, OutPort, PhaseFuture, PortInfo, Process, ProcessError, TypeTag};

struct Comb<I, O, F> {
    kind: &'static str,
    input: InPort<Event<I>>,
    output: OutPort<Event<O>>,
    func: F,
    ival: Event<I>,
    oval: Event<O>,
}

impl<I, O, F> Process for Comb<I, O, F>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&I) -> O + Send + 'static,
{
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ival = self.input.read().await?;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        self.oval = self.ival.as_ref().map(&mut self.func);

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move { self.output.write(mem::take(&mut self.oval)).await })
    }
}

/// Builds a combinational process applying `func` to each present input.
pub fn comb<I, O, F>(
    net: &mut Network,
    name: &str,
    func: F,
    input: &Signal<Event<I>>,
    output: &Signal<Event<O>>,
) -> Result<(), ElaborationError>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&I) -> O + Send + 'static,
{
    comb_with_kind(net, name, "SY::comb", func, input, output)
}

/// Builds a combinational process with the specified kind tag.
pub(super) fn comb_with_kind<I, O, F>(
    net: &mut Network,
    name: &str,
    kind: &'static str,
    func: F,
    input: &Signal<Event<I>>,
    output: &Signal<Event<O>>,
) -> Result<(), ElaborationError>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&I) -> O + Send + 'static,
{
    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<Event<I>>())?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Event<O>>())?;

    net.add_process(
        name,
        Comb {
            kind,
            input,
            output,
            func,
            ival: Event::Absent,
            oval: Event::Absent,
        },
    )
}

struct Comb2<I1, I2, O, F> {
    input1: InPort<Event<I1>>,
    input2: InPort<Event<I2>>,
    output: OutPort<Event<O>>,
    func: F,
    ival1: Event<I1>,
    ival2: Event<I2>,
    oval: Event<O>,
}

impl<I1, I2, O, F> Process for Comb2<I1, I2, O, F>
where
    I1: Send + 'static,
    I2: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&Event<I1>, &Event<I2>) -> O + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "SY::comb2"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input1.info(), self.input2.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ival1 = self.input1.read().await?;
            self.ival2 = self.input2.read().await?;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        self.oval = if self.ival1.is_absent() && self.ival2.is_absent() {
            Event::Absent
        } else {
            Event::Present((self.func)(&self.ival1, &self.ival2))
        };

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move { self.output.write(mem::take(&mut self.oval)).await })
    }
}

/// Builds a combinational process with two inputs.
///
/// The function is called whenever at least one input is present and is
/// handed both events, so that it can decide how to treat a missing operand.
pub fn comb2<I1, I2, O, F>(
    net: &mut Network,
    name: &str,
    func: F,
    input1: &Signal<Event<I1>>,
    input2: &Signal<Event<I2>>,
    output: &Signal<Event<O>>,
) -> Result<(), ElaborationError>
where
    I1: Send + 'static,
    I2: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&Event<I1>, &Event<I2>) -> O + Send + 'static,
{
    let input1 = net.in_port(input1, &iport(0), 1, TypeTag::of::<Event<I1>>())?;
    let input2 = net.in_port(input2, &iport(1), 1, TypeTag::of::<Event<I2>>())?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Event<O>>())?;

    net.add_process(
        name,
        Comb2 {
            input1,
            input2,
            output,
            func,
            ival1: Event::Absent,
            ival2: Event::Absent,
            oval: Event::Absent,
        },
    )
}

struct CombN<I, O, F> {
    inputs: Vec<InPort<Event<I>>>,
    output: OutPort<Event<O>>,
    func: F,
    ivals: Vec<Event<I>>,
    oval: Event<O>,
}

impl<I, O, F> Process for CombN<I, O, F>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&[Event<I>]) -> O + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "SY::combN"
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
                self.ivals.push(input.read().await?);
            }

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        self.oval = if self.ivals.iter().all(Event::is_absent) {
            Event::Absent
        } else {
            Event::Present((self.func)(&self.ivals))
        };

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move { self.output.write(mem::take(&mut self.oval)).await })
    }
}

/// Builds a combinational process with an arbitrary number of inputs.
///
/// The function receives the input events in port order.
pub fn combn<I, O, F>(
    net: &mut Network,
    name: &str,
    func: F,
    inputs: &[&Signal<Event<I>>],
    output: &Signal<Event<O>>,
) -> Result<(), ElaborationError>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&[Event<I>]) -> O + Send + 'static,
{
    if inputs.is_empty() {
        return Err(ElaborationError::InvalidArgument {
            process: name.to_string(),
            reason: "at least one input is required".to_string(),
        });
    }
    let inputs = inputs
        .iter()
        .enumerate()
        .map(|(i, input)| net.in_port(input, &iport(i), 1, TypeTag::of::<Event<I>>()))
        .collect::<Result<Vec<_>, _>>()?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Event<O>>())?;
    let ivals = Vec::with_capacity(inputs.len());

    net.add_process(
        name,
        CombN {
            inputs,
            output,
            func,
            ivals,
            oval: Event::Absent,
        },
    )
}

/// Builds a delay emitting `init` before copying its input.
pub fn delay<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    init: T,
    input: &Signal<Event<T>>,
    output: &Signal<Event<T>>,
) -> Result<(), ElaborationError> {
    moc::delay(
        net,
        name,
        "SY::delay",
        Event::Present(init),
        1,
        false,
        input,
        output,
    )
}

/// Builds a delay emitting `n` copies of `init` before copying its input.
pub fn delayn<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    init: T,
    n: usize,
    input: &Signal<Event<T>>,
    output: &Signal<Event<T>>,
) -> Result<(), ElaborationError> {
    moc::delay(
        net,
        name,
        "SY::delayn",
        Event::Present(init),
        n,
        true,
        input,
        output,
    )
}

/// A state machine whose output depends on the state, and optionally on the
/// current input.
struct Fsm<I, S, O, N, D> {
    kind: &'static str,
    input: InPort<Event<I>>,
    output: OutPort<Event<O>>,
    next_state: N,
    decode: D,
    state: S,
    ival: Event<I>,
    oval: Event<O>,
}

impl<I, S, O, N, D> Process for Fsm<I, S, O, N, D>
where
    I: Send + 'static,
    S: Send + 'static,
    O: Clone + Send + 'static,
    N: FnMut(&S, &I) -> S + Send + 'static,
    D: FnMut(&S, &I) -> O + Send + 'static,
{
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ival = self.input.read().await?;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        self.oval = match &self.ival {
            Event::Present(x) => {
                let out = (self.decode)(&self.state, x);
                self.state = (self.next_state)(&self.state, x);

                Event::Present(out)
            }
            Event::Absent => Event::Absent,
        };

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move { self.output.write(mem::take(&mut self.oval)).await })
    }
}

/// Builds a Moore machine.
///
/// On each present input, the machine emits `decode(state)` and then moves to
/// `next_state(state, input)`.
pub fn moore<I, S, O, N, D>(
    net: &mut Network,
    name: &str,
    next_state: N,
    mut decode: D,
    init: S,
    input: &Signal<Event<I>>,
    output: &Signal<Event<O>>,
) -> Result<(), ElaborationError>
where
    I: Send + 'static,
    S: Send + 'static,
    O: Clone + Send + 'static,
    N: FnMut(&S, &I) -> S + Send + 'static,
    D: FnMut(&S) -> O + Send + 'static,
{
    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<Event<I>>())?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Event<O>>())?;

    net.add_process(
        name,
        Fsm {
            kind: "SY::moore",
            input,
            output,
            next_state,
            decode: move |s: &S, _: &I| decode(s),
            state: init,
            ival: Event::Absent,
            oval: Event::Absent,
        },
    )
}

/// Builds a Mealy machine.
///
/// On each present input, the machine emits `decode(state, input)` and then
/// moves to `next_state(state, input)`.
pub fn mealy<I, S, O, N, D>(
    net: &mut Network,
    name: &str,
    next_state: N,
    decode: D,
    init: S,
    input: &Signal<Event<I>>,
    output: &Signal<Event<O>>,
) -> Result<(), ElaborationError>
where
    I: Send + 'static,
    S: Send + 'static,
    O: Clone + Send + 'static,
    N: FnMut(&S, &I) -> S + Send + 'static,
    D: FnMut(&S, &I) -> O + Send + 'static,
{
    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<Event<I>>())?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Event<O>>())?;

    net.add_process(
        name,
        Fsm {
            kind: "SY::mealy",
            input,
            output,
            next_state,
            decode,
            state: init,
            ival: Event::Absent,
            oval: Event::Absent,
        },
    )
}

/// Builds a source emitting a constant value, `take` times or forever.
pub fn constant<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    value: T,
    take: Option<usize>,
    output: &Signal<Event<T>>,
) -> Result<(), ElaborationError> {
    moc::source(
        net,
        name,
        "SY::constant",
        |event: &Event<T>| event.clone(),
        Event::Present(value),
        take,
        output,
    )
}

/// Builds a source emitting `init`, `generator(init)`, ... , `take` times or
/// forever.
pub fn source<T, G>(
    net: &mut Network,
    name: &str,
    mut generator: G,
    init: T,
    take: Option<usize>,
    output: &Signal<Event<T>>,
) -> Result<(), ElaborationError>
where
    T: Clone + Send + 'static,
    G: FnMut(&T) -> T + Send + 'static,
{
    moc::source(
        net,
        name,
        "SY::source",
        move |event: &Event<T>| event.as_ref().map(&mut generator),
        Event::Present(init),
        take,
        output,
    )
}

/// Builds a source emitting the events of a vector.
pub fn vsource<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    events: Vec<Event<T>>,
    output: &Signal<Event<T>>,
) -> Result<(), ElaborationError> {
    moc::vsource(net, name, "SY::vsource", events, output)
}

/// Builds a sink handing every event, present or absent, to `func`.
pub fn sink<T, F>(
    net: &mut Network,
    name: &str,
    func: F,
    input: &Signal<Event<T>>,
) -> Result<(), ElaborationError>
where
    T: Send + 'static,
    F: FnMut(&Event<T>) + Send + 'static,
{
    moc::sink(net, name, "SY::sink", func, input)
}

/// Builds a process replicating its input to several outputs.
pub fn fanout<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    input: &Signal<Event<T>>,
    outputs: &[&Signal<Event<T>>],
) -> Result<(), ElaborationError> {
    moc::fanout(net, name, "SY::fanout", input, outputs)
}

struct Zip<A, B> {
    input1: InPort<Event<A>>,
    input2: InPort<Event<B>>,
    output: OutPort<Event<(Event<A>, Event<B>)>>,
    ivals: (Event<A>, Event<B>),
    oval: Event<(Event<A>, Event<B>)>,
}

impl<A, B> Process for Zip<A, B>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "SY::zip"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input1.info(), self.input2.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ivals = (self.input1.read().await?, self.input2.read().await?);

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let ivals = mem::take(&mut self.ivals);
        self.oval = if ivals.0.is_absent() && ivals.1.is_absent() {
            Event::Absent
        } else {
            Event::Present(ivals)
        };

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move { self.output.write(mem::take(&mut self.oval)).await })
    }
}

/// Builds a process pairing the events of two signals.
///
/// The pair is absent only if both events are absent.
pub fn zip<A, B>(
    net: &mut Network,
    name: &str,
    input1: &Signal<Event<A>>,
    input2: &Signal<Event<B>>,
    output: &Signal<Event<(Event<A>, Event<B>)>>,
) -> Result<(), ElaborationError>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let input1 = net.in_port(input1, &iport(0), 1, TypeTag::of::<Event<A>>())?;
    let input2 = net.in_port(input2, &iport(1), 1, TypeTag::of::<Event<B>>())?;
    let output = net.out_port(
        &[output],
        &oport(0),
        1,
        TypeTag::of::<Event<(Event<A>, Event<B>)>>(),
    )?;

    net.add_process(
        name,
        Zip {
            input1,
            input2,
            output,
            ivals: (Event::Absent, Event::Absent),
            oval: Event::Absent,
        },
    )
}

struct Unzip<A, B> {
    input: InPort<Event<(Event<A>, Event<B>)>>,
    output1: OutPort<Event<A>>,
    output2: OutPort<Event<B>>,
    ival: Event<(Event<A>, Event<B>)>,
}

impl<A, B> Process for Unzip<A, B>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "SY::unzip"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output1.info(), self.output2.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ival = self.input.read().await?;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            let (a, b) = mem::take(&mut self.ival).unwrap_or((Event::Absent, Event::Absent));
            self.output1.write(a).await?;
            self.output2.write(b).await
        })
    }
}

/// Builds a process splitting a signal of pairs into two signals.
pub fn unzip<A, B>(
    net: &mut Network,
    name: &str,
    input: &Signal<Event<(Event<A>, Event<B>)>>,
    output1: &Signal<Event<A>>,
    output2: &Signal<Event<B>>,
) -> Result<(), ElaborationError>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let input = net.in_port(
        input,
        &iport(0),
        1,
        TypeTag::of::<Event<(Event<A>, Event<B>)>>(),
    )?;
    let output1 = net.out_port(&[output1], &oport(0), 1, TypeTag::of::<Event<A>>())?;
    let output2 = net.out_port(&[output2], &oport(1), 1, TypeTag::of::<Event<B>>())?;

    net.add_process(
        name,
        Unzip {
            input,
            output1,
            output2,
            ival: Event::Absent,
        },
    )
}

struct ZipN<T> {
    inputs: Vec<InPort<Event<T>>>,
    output: OutPort<Event<Vec<Event<T>>>>,
    ivals: Vec<Event<T>>,
    oval: Event<Vec<Event<T>>>,
}

impl<T: Clone + Send + 'static> Process for ZipN<T> {
    fn kind(&self) -> &'static str {
        "SY::zipN"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        self.inputs.iter().map(|port| port.info()).collect()
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            for input in &mut self.inputs {
                self.ivals.push(input.read().await?);
            }

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let ivals = mem::take(&mut self.ivals);
        self.oval = if ivals.iter().all(Event::is_absent) {
            Event::Absent
        } else {
            Event::Present(ivals)
        };

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move { self.output.write(mem::take(&mut self.oval)).await })
    }
}

/// Builds a process gathering the events of several signals into vectors.
pub fn zipn<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    inputs: &[&Signal<Event<T>>],
    output: &Signal<Event<Vec<Event<T>>>>,
) -> Result<(), ElaborationError> {
    let inputs = inputs
        .iter()
        .enumerate()
        .map(|(i, input)| net.in_port(input, &iport(i), 1, TypeTag::of::<Event<T>>()))
        .collect::<Result<Vec<_>, _>>()?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Event<Vec<Event<T>>>>())?;

    net.add_process(
        name,
        ZipN {
            inputs,
            output,
            ivals: Vec::new(),
            oval: Event::Absent,
        },
    )
}

struct UnzipN<T> {
    input: InPort<Event<Vec<Event<T>>>>,
    outputs: Vec<OutPort<Event<T>>>,
    ovals: Vec<Event<T>>,
}

impl<T: Clone + Send + 'static> Process for UnzipN<T> {
    fn kind(&self) -> &'static str {
        "SY::unzipN"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        self.outputs.iter().map(|port| port.info()).collect()
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ovals = match self.input.read().await? {
                Event::Present(events) => events,
                Event::Absent => vec![Event::Absent; self.outputs.len()],
            };

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

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            for (output, event) in self.outputs.iter().zip(self.ovals.drain(..)) {
                output.write(event).await?;
            }

            Ok(())
        })
    }
}

/// Builds a process splitting a signal of vectors into several signals.
///
/// Each present vector must hold exactly one event per output.
pub fn unzipn<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    input: &Signal<Event<Vec<Event<T>>>>,
    outputs: &[&Signal<Event<T>>],
) -> Result<(), ElaborationError> {
    if outputs.is_empty() {
        return Err(ElaborationError::InvalidArgument {
            process: name.to_string(),
            reason: "at least one output is required".to_string(),
        });
    }
    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<Event<Vec<Event<T>>>>())?;
    let outputs = outputs
        .iter()
        .enumerate()
        .map(|(i, output)| net.out_port(&[*output], &oport(i), 1, TypeTag::of::<Event<T>>()))
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

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    fn collector<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl FnMut(&T) + Send + 'static) {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink_collected = collected.clone();

        (collected, move |e: &T| sink_collected.lock().unwrap().push(e.clone()))
    }

    #[test]
    fn sy_comb_skips_absent_inputs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let comb_calls = calls.clone();

        let mut net = Network::new("top");
        let a = net.signal("a");
        let b = net.signal("b");
        let (collected, collect) = collector::<Event<i32>>();

        vsource(
            &mut net,
            "src",
            vec![Event::Present(1), Event::Absent, Event::Present(3)],
            &a,
        )
        .unwrap();
        comb(
            &mut net,
            "inc",
            move |x: &i32| {
                comb_calls.fetch_add(1, Ordering::Relaxed);
                x + 1
            },
            &a,
            &b,
        )
        .unwrap();
        sink(&mut net, "snk", collect, &b).unwrap();

        net.elaborate().unwrap().run().unwrap();

        assert_eq!(
            *collected.lock().unwrap(),
            [Event::Present(2), Event::Absent, Event::Present(4)]
        );
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn sy_delay_emits_initial_value_first() {
        let mut net = Network::new("top");
        let a = net.signal("a");
        let b = net.signal("b");
        let (collected, collect) = collector::<Event<u8>>();

        vsource(&mut net, "src", vec![Event::Present(1), Event::Absent], &a).unwrap();
        delayn(&mut net, "del", 0, 2, &a, &b).unwrap();
        sink(&mut net, "snk", collect, &b).unwrap();

        net.elaborate().unwrap().run().unwrap();

        assert_eq!(
            *collected.lock().unwrap(),
            [
                Event::Present(0),
                Event::Present(0),
                Event::Present(1),
                Event::Absent
            ]
        );
    }

    #[test]
    fn sy_comb2_receives_absent_operand() {
        let mut net = Network::new("top");
        let a = net.signal("a");
        let b = net.signal("b");
        let c = net.signal("c");
        let (collected, collect) = collector::<Event<i32>>();

        vsource(
            &mut net,
            "a_src",
            vec![Event::Present(1), Event::Absent, Event::Absent],
            &a,
        )
        .unwrap();
        vsource(
            &mut net,
            "b_src",
            vec![Event::Present(10), Event::Present(20), Event::Absent],
            &b,
        )
        .unwrap();
        comb2(
            &mut net,
            "add",
            |x: &Event<i32>, y: &Event<i32>| x.unwrap_or(0) + y.unwrap_or(0),
            &a,
            &b,
            &c,
        )
        .unwrap();
        sink(&mut net, "snk", collect, &c).unwrap();

        net.elaborate().unwrap().run().unwrap();

        assert_eq!(
            *collected.lock().unwrap(),
            [Event::Present(11), Event::Present(20), Event::Absent]
        );
    }

    #[test]
    fn sy_moore_holds_state_on_absence() {
        let mut net = Network::new("top");
        let a = net.signal("a");
        let b = net.signal("b");
        let (collected, collect) = collector::<Event<u32>>();

        vsource(
            &mut net,
            "src",
            vec![Event::Present(2), Event::Absent, Event::Present(3)],
            &a,
        )
        .unwrap();
        moore(&mut net, "count", |s: &u32, x: &u32| s + x, |s| *s, 0, &a, &b).unwrap();
        sink(&mut net, "snk", collect, &b).unwrap();

        net.elaborate().unwrap().run().unwrap();

        assert_eq!(
            *collected.lock().unwrap(),
            [Event::Present(0), Event::Absent, Event::Present(2)]
        );
    }

    #[test]
    fn sy_zip_unzip_restore_signals() {
        let mut net = Network::new("top");
        let a = net.signal("a");
        let b = net.signal("b");
        let ab = net.signal("ab");
        let a2 = net.signal("a2");
        let b2 = net.signal("b2");
        let (collected_a, collect_a) = collector::<Event<u8>>();
        let (collected_b, collect_b) = collector::<Event<char>>();

        constant(&mut net, "a_src", 7, Some(2), &a).unwrap();
        vsource(&mut net, "b_src", vec![Event::Absent, Event::Present('x')], &b).unwrap();
        zip(&mut net, "zip", &a, &b, &ab).unwrap();
        unzip(&mut net, "unzip", &ab, &a2, &b2).unwrap();
        sink(&mut net, "a_snk", collect_a, &a2).unwrap();
        sink(&mut net, "b_snk", collect_b, &b2).unwrap();

        net.elaborate().unwrap().run().unwrap();

        assert_eq!(*collected_a.lock().unwrap(), [Event::Present(7); 2]);
        assert_eq!(
            *collected_b.lock().unwrap(),
            [Event::Absent, Event::Present('x')]
        );
    }

    #[test]
    fn sy_zipn_is_absent_when_all_inputs_are() {
        let mut net = Network::new("top");
        let a = net.signal("a");
        let b = net.signal("b");
        let ab = net.signal("ab");
        let (collected, collect) = collector::<Event<Vec<Event<i32>>>>();

        vsource(&mut net, "a_src", vec![Event::Absent, Event::Present(1)], &a).unwrap();
        vsource(&mut net, "b_src", vec![Event::Absent, Event::Absent], &b).unwrap();
        zipn(&mut net, "zip", &[&a, &b], &ab).unwrap();
        sink(&mut net, "snk", collect, &ab).unwrap();

        net.elaborate().unwrap().run().unwrap();

        assert_eq!(
            *collected.lock().unwrap(),
            [
                Event::Absent,
                Event::Present(vec![Event::Present(1), Event::Absent])
            ]
        );
    }

    #[test]
    fn sy_source_takes_requested_count() {
        let mut net = Network::new("top");
        let a = net.signal("a");
        let (collected, collect) = collector::<Event<u32>>();

        source(&mut net, "pow", |x: &u32| x * 2, 1, Some(4), &a).unwrap();
        sink(&mut net, "snk", collect, &a).unwrap();

        net.elaborate().unwrap().run().unwrap();

        assert_eq!(
            *collected.lock().unwrap(),
            [1, 2, 4, 8].map(Event::Present)
        );
    }

    #[test]
    fn sy_combn_requires_inputs() {
        let mut net = Network::new("top");
        let out = net.signal::<Event<i32>>("out");

        assert!(matches!(
            combn(&mut net, "sum", |_: &[Event<i32>]| 0, &[], &out),
            Err(ElaborationError::InvalidArgument { .. })
        ));
    }
}
