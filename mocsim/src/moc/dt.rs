//! Discrete-time model of computation.
//!
//! A discrete-time signal carries exactly one [`Event`] per [`Tick`] of a
//! global clock, so that the position of an event in its channel is its time
//! stamp. Absence at a tick is a legitimate, counted event.
//!
//! Unlike the synchronous model, a discrete-time state machine may consume a
//! variable number of ticks per activation, see [`mealy_t`].
//!
//! [`Tick`]: crate::time::Tick
use std::mem;

use crate::event::Event;
use crate::moc::{self, iport, oport, sy};
use crate::network::{ElaborationError, Network, Signal};
use crate::process::{InPort, OutPort, PhaseFuture, PortInfo, Process, ProcessError, TypeTag};
use crate::time::Tick;

/// Builds a combinational process applying `func` to each present event.
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
    sy::comb_with_kind(net, name, "DT::comb", func, input, output)
}

/// Builds a delay shifting its input by one tick, emitting `init` at the
/// first tick.
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
        "DT::delay",
        Event::Present(init),
        1,
        false,
        input,
        output,
    )
}

struct MealyT<I, S, O, P, N, D> {
    input: InPort<Event<I>>,
    output: OutPort<Event<O>>,
    partition: P,
    next_state: N,
    decode: D,
    state: S,
    ivals: Vec<Event<I>>,
    ovals: Vec<Event<O>>,
}

impl<I, S, O, P, N, D> Process for MealyT<I, S, O, P, N, D>
where
    I: Send + 'static,
    S: Send + 'static,
    O: Clone + Send + 'static,
    P: FnMut(&S) -> usize + Send + 'static,
    N: FnMut(&S, &[Event<I>]) -> S + Send + 'static,
    D: FnMut(&S, &[Event<I>]) -> Vec<Event<O>> + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "DT::mealy_t"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            let count = (self.partition)(&self.state);
            if count == 0 {
                return Err(ProcessError::RateMismatch {
                    port: self.input.name().to_string(),
                    expected: 1,
                    found: 0,
                });
            }
            self.ivals = self.input.read_n(count).await?;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let ticks = self.ivals.len();
        let mut ovals = (self.decode)(&self.state, &self.ivals);
        if ovals.len() > ticks {
            return Err(ProcessError::RateMismatch {
                port: self.output.name().to_string(),
                expected: ticks,
                found: ovals.len(),
            });
        }
        ovals.resize(ticks, Event::Absent);
        self.ovals = ovals;
        self.state = (self.next_state)(&self.state, &self.ivals);

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move { self.output.write_all(mem::take(&mut self.ovals)).await })
    }
}

/// Builds a Mealy machine with a variable number of ticks per activation.
///
/// Each activation consumes `partition(state)` ticks, which must be at least
/// one. The outputs computed by `decode` are emitted first and padded with
/// absent events so that the activation produces as many ticks as it
/// consumed; producing more outputs than consumed ticks is an error.
#[allow(clippy::too_many_arguments)]
pub fn mealy_t<I, S, O, P, N, D>(
    net: &mut Network,
    name: &str,
    partition: P,
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
    P: FnMut(&S) -> usize + Send + 'static,
    N: FnMut(&S, &[Event<I>]) -> S + Send + 'static,
    D: FnMut(&S, &[Event<I>]) -> Vec<Event<O>> + Send + 'static,
{
    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<Event<I>>())?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Event<O>>())?;

    net.add_process(
        name,
        MealyT {
            input,
            output,
            partition,
            next_state,
            decode,
            state: init,
            ivals: Vec::new(),
            ovals: Vec::new(),
        },
    )
}

/// Builds a source emitting the events of a vector, one per tick.
pub fn vsource<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    events: Vec<Event<T>>,
    output: &Signal<Event<T>>,
) -> Result<(), ElaborationError> {
    moc::vsource(net, name, "DT::vsource", events, output)
}

/// Builds a sink handing every event to `func` together with its tick.
pub fn sink<T, F>(
    net: &mut Network,
    name: &str,
    mut func: F,
    input: &Signal<Event<T>>,
) -> Result<(), ElaborationError>
where
    T: Send + 'static,
    F: FnMut(Tick, &Event<T>) + Send + 'static,
{
    let mut tick: Tick = 0;

    moc::sink(
        net,
        name,
        "DT::sink",
        move |event: &Event<T>| {
            func(tick, event);
            tick += 1;
        },
        input,
    )
}

/// Builds a process replicating its input to several outputs.
pub fn fanout<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    input: &Signal<Event<T>>,
    outputs: &[&Signal<Event<T>>],
) -> Result<(), ElaborationError> {
    moc::fanout(net, name, "DT::fanout", input, outputs)
}
