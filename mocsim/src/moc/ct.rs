//! Continuous-time model of computation.
//!
//! A continuous-time signal is a sequence of [`SubSignal`]s, i.e. functions of
//! time each valid over a half-open [`Interval`]. The intervals of a signal
//! tile the time axis: each sub-signal starts where the previous one ends.
//!
//! Processes with several inputs align their inputs by intersecting the
//! intervals of the current sub-signals, so that the output of an activation
//! is valid over the intersection. Processes never evaluate a sub-signal;
//! evaluation is deferred to the consumer, e.g. a sampling [`sink`].
//!
//! # Examples
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! use mocsim::moc::ct;
//! use mocsim::network::Network;
//!
//! let mut net = Network::new("wave");
//! let wave = net.signal("wave");
//! let scaled = net.signal("scaled");
//!
//! ct::sine(&mut net, "sine", Duration::from_secs(1), Duration::from_secs(4), 1.0, &wave).unwrap();
//! ct::comb(&mut net, "gain", |x: &f64| 10.0 * x, &wave, &scaled).unwrap();
//!
//! let samples = Arc::new(Mutex::new(Vec::new()));
//! let sink_samples = samples.clone();
//! ct::sink(
//!     &mut net,
//!     "sampler",
//!     Duration::from_millis(500),
//!     move |_, x: &f64| sink_samples.lock().unwrap().push(*x),
//!     &scaled,
//! )
//! .unwrap();
//!
//! net.elaborate().unwrap().run().unwrap();
//!
//! let samples = samples.lock().unwrap();
//! assert_eq!(samples.len(), 2);
//! assert!((samples[1] - 10.0 * std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
//! ```
use std::f64::consts::TAU;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::moc::{self, iport, oport};
use crate::network::{ElaborationError, Network, Signal};
use crate::process::{
    Argument, InPort, OutPort, PhaseFuture, PortInfo, Process, ProcessError, TypeTag,
};
use crate::time::{self, MonotonicTime};

/// A half-open time interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    start: MonotonicTime,
    end: MonotonicTime,
}

impl Interval {
    /// Creates the interval `[start, end)`.
    ///
    /// # Panics
    ///
    /// This constructor will panic if `end` precedes `start`.
    pub fn new(start: MonotonicTime, end: MonotonicTime) -> Self {
        assert!(start <= end, "an interval cannot end before it starts");

        Self { start, end }
    }

    /// Creates an interval from offsets relative to
    /// [`MonotonicTime::EPOCH`].
    pub fn from_offsets(start: Duration, end: Duration) -> Self {
        Self::new(time::at(start), time::at(end))
    }

    /// Returns the inclusive lower bound.
    pub fn start(&self) -> MonotonicTime {
        self.start
    }

    /// Returns the exclusive upper bound.
    pub fn end(&self) -> MonotonicTime {
        self.end
    }

    /// Returns `true` if the interval contains no instant.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns `true` if the interval contains the specified instant.
    pub fn contains(&self, time: MonotonicTime) -> bool {
        self.start <= time && time < self.end
    }

    /// Returns the non-empty intersection of two intervals, if any.
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);

        (start < end).then_some(Interval { start, end })
    }

    /// Returns the interval shifted later by `offset`.
    pub fn shift(&self, offset: Duration) -> Interval {
        Interval {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

/// A function of time valid over an interval.
pub struct SubSignal<T> {
    interval: Interval,
    func: Arc<dyn Fn(MonotonicTime) -> T + Send + Sync>,
}

impl<T> SubSignal<T> {
    /// Creates a sub-signal.
    pub fn new<F>(interval: Interval, func: F) -> Self
    where
        F: Fn(MonotonicTime) -> T + Send + Sync + 'static,
    {
        Self {
            interval,
            func: Arc::new(func),
        }
    }

    /// Creates a sub-signal with a constant value.
    pub fn constant(interval: Interval, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        Self::new(interval, move |_| value.clone())
    }

    /// Returns the interval of validity.
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Evaluates the function at the specified time, if it lies within the
    /// interval of validity.
    pub fn value_at(&self, time: MonotonicTime) -> Option<T> {
        self.interval.contains(time).then(|| (self.func)(time))
    }

    /// Returns a sub-signal restricted to a sub-interval, sharing the same
    /// function.
    fn restrict(&self, interval: Interval) -> Self {
        Self {
            interval,
            func: self.func.clone(),
        }
    }
}

impl<T> Clone for SubSignal<T> {
    fn clone(&self) -> Self {
        self.restrict(self.interval)
    }
}

impl<T> fmt::Debug for SubSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubSignal")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

struct Comb<I, O, F> {
    input: InPort<SubSignal<I>>,
    output: OutPort<SubSignal<O>>,
    func: Arc<F>,
    ival: Option<SubSignal<I>>,
    oval: Option<SubSignal<O>>,
}

impl<I, O, F> Process for Comb<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(&I) -> O + Send + Sync + 'static,
{
    fn kind(&self) -> &'static str {
        "CT::comb"
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
        self.oval = self.ival.take().map(|piece| {
            let func = self.func.clone();
            let inner = piece.func;

            SubSignal::new(piece.interval, move |t| func(&inner(t)))
        });

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(piece) = self.oval.take() {
                self.output.write(piece).await?;
            }

            Ok(())
        })
    }
}

/// Builds a combinational process applying `func` pointwise.
pub fn comb<I, O, F>(
    net: &mut Network,
    name: &str,
    func: F,
    input: &Signal<SubSignal<I>>,
    output: &Signal<SubSignal<O>>,
) -> Result<(), ElaborationError>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(&I) -> O + Send + Sync + 'static,
{
    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<SubSignal<I>>())?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<SubSignal<O>>())?;

    net.add_process(
        name,
        Comb {
            input,
            output,
            func: Arc::new(func),
            ival: None,
            oval: None,
        },
    )
}

struct Comb2<I1, I2, O, F> {
    input1: InPort<SubSignal<I1>>,
    input2: InPort<SubSignal<I2>>,
    output: OutPort<SubSignal<O>>,
    func: Arc<F>,
    current1: Option<SubSignal<I1>>,
    current2: Option<SubSignal<I2>>,
    oval: Option<SubSignal<O>>,
}

impl<I1, I2, O, F> Process for Comb2<I1, I2, O, F>
where
    I1: Send + 'static,
    I2: Send + 'static,
    O: Send + 'static,
    F: Fn(&I1, &I2) -> O + Send + Sync + 'static,
{
    fn kind(&self) -> &'static str {
        "CT::comb2"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input1.info(), self.input2.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            // Read new sub-signals until the current ones overlap.
            loop {
                let piece1 = match self.current1.take() {
                    Some(piece) => piece,
                    None => self.input1.read().await?,
                };
                let piece2 = match self.current2.take() {
                    Some(piece) => piece,
                    None => self.input2.read().await?,
                };
                let overlap = piece1.interval.intersection(&piece2.interval);
                let (end1, end2) = (piece1.interval.end, piece2.interval.end);
                if overlap.is_some() || end1 > end2 {
                    self.current1 = Some(piece1);
                }
                if overlap.is_some() || end2 > end1 {
                    self.current2 = Some(piece2);
                }
                if overlap.is_some() {
                    return Ok(());
                }
            }
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let (Some(piece1), Some(piece2)) = (&self.current1, &self.current2) else {
            return Ok(());
        };
        let Some(overlap) = piece1.interval.intersection(&piece2.interval) else {
            return Ok(());
        };

        let func = self.func.clone();
        let (inner1, inner2) = (piece1.func.clone(), piece2.func.clone());
        self.oval = Some(SubSignal::new(overlap, move |t| func(&inner1(t), &inner2(t))));

        // Retire the sub-signals that end with the overlap.
        if piece1.interval.end == overlap.end {
            self.current1 = None;
        }
        if self
            .current2
            .as_ref()
            .is_some_and(|piece| piece.interval.end == overlap.end)
        {
            self.current2 = None;
        }

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(piece) = self.oval.take() {
                self.output.write(piece).await?;
            }

            Ok(())
        })
    }
}

/// Builds a combinational process with two inputs.
///
/// An output sub-signal is produced for each non-empty intersection of the
/// input sub-signals.
pub fn comb2<I1, I2, O, F>(
    net: &mut Network,
    name: &str,
    func: F,
    input1: &Signal<SubSignal<I1>>,
    input2: &Signal<SubSignal<I2>>,
    output: &Signal<SubSignal<O>>,
) -> Result<(), ElaborationError>
where
    I1: Send + 'static,
    I2: Send + 'static,
    O: Send + 'static,
    F: Fn(&I1, &I2) -> O + Send + Sync + 'static,
{
    let input1 = net.in_port(input1, &iport(0), 1, TypeTag::of::<SubSignal<I1>>())?;
    let input2 = net.in_port(input2, &iport(1), 1, TypeTag::of::<SubSignal<I2>>())?;
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<SubSignal<O>>())?;

    net.add_process(
        name,
        Comb2 {
            input1,
            input2,
            output,
            func: Arc::new(func),
            current1: None,
            current2: None,
            oval: None,
        },
    )
}

struct Delay<T> {
    input: InPort<SubSignal<T>>,
    output: OutPort<SubSignal<T>>,
    delay: Duration,
    init: Option<T>,
    piece: Option<SubSignal<T>>,
}

impl<T: Clone + Send + Sync + 'static> Process for Delay<T> {
    fn kind(&self) -> &'static str {
        "CT::delay"
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
                if !self.delay.is_zero() {
                    debug!("emitting initial sub-signal");
                    let interval = Interval::new(MonotonicTime::EPOCH, time::at(self.delay));
                    self.output.write(SubSignal::constant(interval, init)).await?;
                }
            }

            Ok(())
        })
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.piece = Some(self.input.read().await?);

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        let delay = self.delay;
        self.piece = self.piece.take().map(|piece| {
            let inner = piece.func;

            SubSignal::new(piece.interval.shift(delay), move |t| {
                inner(time::saturating_sub(t, delay))
            })
        });

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(piece) = self.piece.take() {
                self.output.write(piece).await?;
            }

            Ok(())
        })
    }
}

/// Builds a delay.
///
/// The delay first emits a constant sub-signal equal to `init` over
/// `[EPOCH, EPOCH + delay)` and then shifts each input sub-signal by `delay`.
pub fn delay<T: Clone + Send + Sync + 'static>(
    net: &mut Network,
    name: &str,
    delay: Duration,
    init: T,
    input: &Signal<SubSignal<T>>,
    output: &Signal<SubSignal<T>>,
) -> Result<(), ElaborationError> {
    let tag = TypeTag::of::<SubSignal<T>>();
    let input = net.in_port(input, &iport(0), 1, tag)?;
    let output = net.out_port(&[output], &oport(0), 1, tag)?;

    net.add_process(
        name,
        Delay {
            input,
            output,
            delay,
            init: Some(init),
            piece: None,
        },
    )
}

/// Builds a source emitting a single sub-signal over `[EPOCH, EPOCH +
/// duration)`.
pub fn source<T, F>(
    net: &mut Network,
    name: &str,
    func: F,
    duration: Duration,
    output: &Signal<SubSignal<T>>,
) -> Result<(), ElaborationError>
where
    T: Send + 'static,
    F: Fn(MonotonicTime) -> T + Send + Sync + 'static,
{
    let piece = SubSignal::new(Interval::from_offsets(Duration::ZERO, duration), func);

    moc::vsource(net, name, "CT::source", vec![piece], output)
}

/// Builds a source emitting `amplitude * sin(2π t / period)` over `[EPOCH,
/// EPOCH + duration)`.
pub fn sine(
    net: &mut Network,
    name: &str,
    duration: Duration,
    period: Duration,
    amplitude: f64,
    output: &Signal<SubSignal<f64>>,
) -> Result<(), ElaborationError> {
    if period.is_zero() {
        return Err(ElaborationError::InvalidArgument {
            process: name.to_string(),
            reason: "the period cannot be zero".to_string(),
        });
    }
    let period = period.as_secs_f64();
    let piece = SubSignal::new(Interval::from_offsets(Duration::ZERO, duration), move |t| {
        amplitude * (TAU * time::since_epoch(t).as_secs_f64() / period).sin()
    });

    moc::vsource(net, name, "CT::sine", vec![piece], output)
}

/// Builds a sink sampling its input every `period`, starting at
/// [`MonotonicTime::EPOCH`].
///
/// `func` receives each sampling time that lies within a sub-signal, together
/// with the value of the sub-signal at that time.
pub fn sink<T, F>(
    net: &mut Network,
    name: &str,
    period: Duration,
    mut func: F,
    input: &Signal<SubSignal<T>>,
) -> Result<(), ElaborationError>
where
    T: Send + 'static,
    F: FnMut(MonotonicTime, &T) + Send + 'static,
{
    if period.is_zero() {
        return Err(ElaborationError::InvalidArgument {
            process: name.to_string(),
            reason: "the sampling period cannot be zero".to_string(),
        });
    }
    let mut sample = MonotonicTime::EPOCH;

    moc::sink(
        net,
        name,
        "CT::sink",
        move |piece: &SubSignal<T>| {
            while sample < piece.interval.end {
                if let Some(value) = piece.value_at(sample) {
                    func(sample, &value);
                }
                sample = sample + period;
            }
        },
        input,
    )
}

/// Builds a process replicating its input to several outputs.
pub fn fanout<T: Send + 'static>(
    net: &mut Network,
    name: &str,
    input: &Signal<SubSignal<T>>,
    outputs: &[&Signal<SubSignal<T>>],
) -> Result<(), ElaborationError> {
    moc::fanout(net, name, "CT::fanout", input, outputs)
}
