//! Discrete-event model of computation.
//!
//! Channels of the discrete-event model carry [`Tagged`] events, i.e. events
//! stamped with the time at which they occur. Between two events a signal
//! keeps the value of the latest one; an absent event clears the value.
//!
//! Events written to a channel must have non-decreasing time stamps. This is
//! guaranteed by every constructor of this module provided that its inputs
//! are themselves ordered, and is not verified at run time.
//!
//! Processes with two inputs merge their inputs conservatively: they wait
//! until the next event of each input is known before reacting to the
//! earliest one. They stop reacting once one of their inputs is exhausted.
//!
//! # Examples
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! use mocsim::event::Tagged;
//! use mocsim::moc::de;
//! use mocsim::network::Network;
//! use mocsim::time::{self, MonotonicTime};
//!
//! let mut net = Network::new("late");
//! let xs = net.signal("xs");
//! let ys = net.signal("ys");
//!
//! de::vsource(&mut net, "src", vec![(Duration::from_secs(1), 'a')], &xs).unwrap();
//! de::delay(&mut net, "late", Duration::from_secs(2), '-', &xs, &ys).unwrap();
//!
//! let collected = Arc::new(Mutex::new(Vec::new()));
//! let sink_collected = collected.clone();
//! de::sink(&mut net, "snk", move |e: &Tagged<char>| sink_collected.lock().unwrap().push(*e), &ys)
//!     .unwrap();
//!
//! net.elaborate().unwrap().run().unwrap();
//!
//! assert_eq!(
//!     *collected.lock().unwrap(),
//!     [
//!         Tagged::new(MonotonicTime::EPOCH, '-'),
//!         Tagged::new(time::at(Duration::from_secs(3)), 'a'),
//!     ]
//! );
//! ```
use std::mem;
use std::time::Duration;

use tracing::debug;

use crate::event::{Event, Tagged};
use crate::moc::{self, iport, oport};
use crate::network::{ElaborationError, Network, Signal};
use crate::process::{
    Argument, InPort, OutPort, PhaseFuture, PortInfo, Process, ProcessError, TypeTag,
};
use crate::time::{self, MonotonicTime};

/// Tracks the current values of two inputs and advances them in time order.
struct Merge2<A, B> {
    input1: InPort<Tagged<A>>,
    input2: InPort<Tagged<B>>,
    next1: Option<Tagged<A>>,
    next2: Option<Tagged<B>>,
    current1: Event<A>,
    current2: Event<B>,
}

impl<A: Send + 'static, B: Send + 'static> Merge2<A, B> {
    fn new(input1: InPort<Tagged<A>>, input2: InPort<Tagged<B>>) -> Self {
        Self {
            input1,
            input2,
            next1: None,
            next2: None,
            current1: Event::Absent,
            current2: Event::Absent,
        }
    }

    fn infos(&self) -> Vec<PortInfo> {
        vec![self.input1.info(), self.input2.info()]
    }

    /// Consumes the earliest pending event(s) and returns their time stamp.
    async fn advance(&mut self) -> Result<MonotonicTime, ProcessError> {
        let next1 = match self.next1.take() {
            Some(event) => event,
            None => self.input1.read().await?,
        };
        let next2 = match self.next2.take() {
            Some(event) => event,
            None => self.input2.read().await?,
        };
        let time = next1.time.min(next2.time);

        if next1.time == time {
            self.current1 = next1.value;
        } else {
            self.next1 = Some(next1);
        }
        if next2.time == time {
            self.current2 = next2.value;
        } else {
            self.next2 = Some(next2);
        }

        Ok(time)
    }
}

struct Comb<I, O, F> {
    input: InPort<Tagged<I>>,
    output: OutPort<Tagged<O>>,
    func: F,
    ival: Option<Tagged<I>>,
    oval: Option<Tagged<O>>,
}

impl<I, O, F> Process for Comb<I, O, F>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&I) -> O + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "DE::comb"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ival = Some(self.input.read().await?);

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let func = &mut self.func;
        self.oval = self
            .ival
            .take()
            .map(|event| Tagged {
                time: event.time,
                value: event.value.as_ref().map(func),
            });

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(event) = self.oval.take() {
                self.output.write(event).await?;
            }

            Ok(())
        })
    }
}

/// Builds a combinational process applying `func` to each present event.
///
/// Output events keep the time stamps of the input events.
pub fn comb<I, O, F>(
    net: &mut Network,
    name: &str,
    func: F,
    input: &Signal<Tagged<I>>,
    output: &Signal<Tagged<O>>,
) -> Result<(), ElaborationError>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&I) -> O + Send + 'static,
{
    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<Tagged<I>>())?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Tagged<O>>())?;

    net.add_process(
        name,
        Comb {
            input,
            output,
            func,
            ival: None,
            oval: None,
        },
    )
}

struct Comb2<I1, I2, O, F> {
    merge: Merge2<I1, I2>,
    output: OutPort<Tagged<O>>,
    func: F,
    time: MonotonicTime,
    oval: Option<Tagged<O>>,
}

impl<I1, I2, O, F> Process for Comb2<I1, I2, O, F>
where
    I1: Send + 'static,
    I2: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&Event<I1>, &Event<I2>) -> O + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "DE::comb2"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        self.merge.infos()
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.time = self.merge.advance().await?;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let merge = &self.merge;
        self.oval = Some(if merge.current1.is_absent() && merge.current2.is_absent() {
            Tagged::absent(self.time)
        } else {
            Tagged::new(self.time, (self.func)(&merge.current1, &merge.current2))
        });

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(event) = self.oval.take() {
                self.output.write(event).await?;
            }

            Ok(())
        })
    }
}

/// Builds a combinational process with two inputs.
///
/// An output event is emitted at each time stamp of either input. The
/// function receives the current values of both inputs and is only called if
/// at least one of them is present.
pub fn comb2<I1, I2, O, F>(
    net: &mut Network,
    name: &str,
    func: F,
    input1: &Signal<Tagged<I1>>,
    input2: &Signal<Tagged<I2>>,
    output: &Signal<Tagged<O>>,
) -> Result<(), ElaborationError>
where
    I1: Send + 'static,
    I2: Send + 'static,
    O: Clone + Send + 'static,
    F: FnMut(&Event<I1>, &Event<I2>) -> O + Send + 'static,
{
    let input1 = net.in_port(input1, &iport(0), 1, TypeTag::of::<Tagged<I1>>())?;
    let input2 = net.in_port(input2, &iport(1), 1, TypeTag::of::<Tagged<I2>>())?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Tagged<O>>())?;

    net.add_process(
        name,
        Comb2 {
            merge: Merge2::new(input1, input2),
            output,
            func,
            time: MonotonicTime::EPOCH,
            oval: None,
        },
    )
}

struct Delay<T> {
    input: InPort<Tagged<T>>,
    output: OutPort<Tagged<T>>,
    delay: Duration,
    init: Option<T>,
    event: Option<Tagged<T>>,
}

impl<T: Clone + Send + 'static> Process for Delay<T> {
    fn kind(&self) -> &'static str {
        "DE::delay"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn arguments(&self) -> Vec<Argument> {
        vec![Argument::new("delay", format!("{:?}", self.delay))]
    }

    fn init(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(init) = self.init.take() {
                debug!("emitting initial event");
                self.output
                    .write(Tagged::new(MonotonicTime::EPOCH, init))
                    .await?;
            }

            Ok(())
        })
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.event = Some(self.input.read().await?);

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        if let Some(event) = &mut self.event {
            event.time = event.time + self.delay;
        }

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(event) = self.event.take() {
                self.output.write(event).await?;
            }

            Ok(())
        })
    }
}

/// Builds a delay.
///
/// The delay emits `init` at [`MonotonicTime::EPOCH`] before reading any
/// input, and then re-emits each input event `delay` later.
pub fn delay<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    delay: Duration,
    init: T,
    input: &Signal<Tagged<T>>,
    output: &Signal<Tagged<T>>,
) -> Result<(), ElaborationError> {
    let tag = TypeTag::of::<Tagged<T>>();
    let input = net.in_port(input, &iport(0), 1, tag)?;
    let output = net.out_port(&[output], &oport(0), 1, tag)?;

    net.add_process(
        name,
        Delay {
            input,
            output,
            delay,
            init: Some(init),
            event: None,
        },
    )
}

/// Builds a source emitting `init`, `generator(init)`, ... , `take` times or
/// forever.
///
/// The generator is responsible for producing non-decreasing time stamps.
pub fn source<T, G>(
    net: &mut Network,
    name: &str,
    generator: G,
    init: Tagged<T>,
    take: Option<usize>,
    output: &Signal<Tagged<T>>,
) -> Result<(), ElaborationError>
where
    T: Clone + Send + 'static,
    G: FnMut(&Tagged<T>) -> Tagged<T> + Send + 'static,
{
    moc::source(net, name, "DE::source", generator, init, take, output)
}

/// Builds a source emitting present events at the specified offsets from
/// [`MonotonicTime::EPOCH`].
pub fn vsource<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    events: Vec<(Duration, T)>,
    output: &Signal<Tagged<T>>,
) -> Result<(), ElaborationError> {
    let events = events
        .into_iter()
        .map(|(offset, value)| Tagged::new(time::at(offset), value))
        .collect();

    moc::vsource(net, name, "DE::vsource", events, output)
}

/// Builds a sink handing every event to `func`.
pub fn sink<T, F>(
    net: &mut Network,
    name: &str,
    func: F,
    input: &Signal<Tagged<T>>,
) -> Result<(), ElaborationError>
where
    T: Send + 'static,
    F: FnMut(&Tagged<T>) + Send + 'static,
{
    moc::sink(net, name, "DE::sink", func, input)
}

/// Builds a process replicating its input to several outputs.
pub fn fanout<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    input: &Signal<Tagged<T>>,
    outputs: &[&Signal<Tagged<T>>],
) -> Result<(), ElaborationError> {
    moc::fanout(net, name, "DE::fanout", input, outputs)
}

struct Hold<T> {
    input: InPort<Tagged<T>>,
    output: OutPort<Event<T>>,
    period: Duration,
    sample: MonotonicTime,
    last: T,
    pending: Option<Tagged<T>>,
    oval: Event<T>,
}

impl<T: Clone + Send + 'static> Process for Hold<T> {
    fn kind(&self) -> &'static str {
        "DE::hold"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn arguments(&self) -> Vec<Argument> {
        vec![Argument::new("period", format!("{:?}", self.period))]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            // Consume all events up to the sampling time; the first later
            // event is kept for the next samples.
            loop {
                let event = match self.pending.take() {
                    Some(event) => event,
                    None => self.input.read().await?,
                };
                if event.time > self.sample {
                    self.pending = Some(event);
                    break;
                }
                if let Event::Present(value) = event.value {
                    self.last = value;
                }
            }

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        self.oval = Event::Present(self.last.clone());
        self.sample = self.sample + self.period;

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move { self.output.write(mem::take(&mut self.oval)).await })
    }
}

/// Builds a process sampling a discrete-event signal every `period`, starting
/// at [`MonotonicTime::EPOCH`].
///
/// Each sample holds the latest present value at or before the sampling time,
/// or `init` if there is none yet. A sample is only emitted once an input
/// event past the sampling time has been received.
pub fn hold<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    period: Duration,
    init: T,
    input: &Signal<Tagged<T>>,
    output: &Signal<Event<T>>,
) -> Result<(), ElaborationError> {
    if period.is_zero() {
        return Err(ElaborationError::InvalidArgument {
            process: name.to_string(),
            reason: "the sampling period cannot be zero".to_string(),
        });
    }
    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<Tagged<T>>())?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Event<T>>())?;

    net.add_process(
        name,
        Hold {
            input,
            output,
            period,
            sample: MonotonicTime::EPOCH,
            last: init,
            pending: None,
            oval: Event::Absent,
        },
    )
}

/// Pair of events at the same time stamp.
pub type Pair<A, B> = (Event<A>, Event<B>);

struct Zip<A, B> {
    merge: Merge2<A, B>,
    output: OutPort<Tagged<Pair<A, B>>>,
    time: MonotonicTime,
    oval: Option<Tagged<Pair<A, B>>>,
}

impl<A, B> Process for Zip<A, B>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "DE::zip"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        self.merge.infos()
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.time = self.merge.advance().await?;

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let merge = &self.merge;
        self.oval = Some(if merge.current1.is_absent() && merge.current2.is_absent() {
            Tagged::absent(self.time)
        } else {
            Tagged::new(self.time, (merge.current1.clone(), merge.current2.clone()))
        });

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(event) = self.oval.take() {
                self.output.write(event).await?;
            }

            Ok(())
        })
    }
}

/// Builds a process pairing the current values of two signals at each time
/// stamp of either signal.
pub fn zip<A, B>(
    net: &mut Network,
    name: &str,
    input1: &Signal<Tagged<A>>,
    input2: &Signal<Tagged<B>>,
    output: &Signal<Tagged<Pair<A, B>>>,
) -> Result<(), ElaborationError>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let input1 = net.in_port(input1, &iport(0), 1, TypeTag::of::<Tagged<A>>())?;
    let input2 = net.in_port(input2, &iport(1), 1, TypeTag::of::<Tagged<B>>())?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<Tagged<Pair<A, B>>>())?;

    net.add_process(
        name,
        Zip {
            merge: Merge2::new(input1, input2),
            output,
            time: MonotonicTime::EPOCH,
            oval: None,
        },
    )
}

struct Unzip<A, B> {
    input: InPort<Tagged<Pair<A, B>>>,
    output1: OutPort<Tagged<A>>,
    output2: OutPort<Tagged<B>>,
    ival: Option<Tagged<Pair<A, B>>>,
}

impl<A, B> Process for Unzip<A, B>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "DE::unzip"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output1.info(), self.output2.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.ival = Some(self.input.read().await?);

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(Tagged { time, value }) = self.ival.take() {
                let (a, b) = value.unwrap_or((Event::Absent, Event::Absent));
                self.output1.write(Tagged { time, value: a }).await?;
                self.output2.write(Tagged { time, value: b }).await?;
            }

            Ok(())
        })
    }
}

/// Builds a process splitting a signal of pairs into two signals.
pub fn unzip<A, B>(
    net: &mut Network,
    name: &str,
    input: &Signal<Tagged<Pair<A, B>>>,
    output1: &Signal<Tagged<A>>,
    output2: &Signal<Tagged<B>>,
) -> Result<(), ElaborationError>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<Tagged<Pair<A, B>>>())?;
    let output1 = net.out_port(&[output1], &oport(0), 1, TypeTag::of::<Tagged<A>>())?;
    let output2 = net.out_port(&[output2], &oport(1), 1, TypeTag::of::<Tagged<B>>())?;

    net.add_process(
        name,
        Unzip {
            input,
            output1,
            output2,
            ival: None,
        },
    )
}
