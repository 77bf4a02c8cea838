//! Process lifecycle.
//!
//! # Process trait
//!
//! Every leaf of a process network implements the [`Process`] trait, which
//! splits the behavior of a process into five phases executed in a fixed
//! order:
//!
//! ```text
//! init ─▶ ┌─▶ prep ─▶ exec ─▶ prod ─┐ ─▶ clean
//!         └───────────────────────────┘
//! ```
//!
//! * [`Process::init`] runs exactly once and may emit preamble outputs such as
//!   the initial tokens of a delay,
//! * [`Process::prep`] blocks on the input ports until the tokens needed by the
//!   next activation are available,
//! * [`Process::exec`] applies the user function to the acquired inputs and
//!   updates the internal state,
//! * [`Process::prod`] writes the results to every channel bound to each
//!   output port,
//! * [`Process::clean`] runs exactly once on controlled shutdown.
//!
//! The phases are the only contract between a process and the network: a
//! process never needs to know which model of computation its neighbors obey.
//!
//! # Ports
//!
//! Processes communicate through [`InPort`]s and [`OutPort`]s created by the
//! [`Network`](crate::network::Network) builder. An output port may be bound to
//! several channels, in which case every written value is replicated.
//!
//! # Examples
//!
//! A custom rate-based process that sums pairs of tokens:
//!
//! ```
//! use mocsim::network::{Network, Signal};
//! use mocsim::process::{InPort, OutPort, PhaseFuture, PortInfo, Process, ProcessError, TypeTag};
//!
//! struct PairSum {
//!     input: InPort<u32>,
//!     output: OutPort<u32>,
//!     pair: Vec<u32>,
//!     sum: u32,
//! }
//!
//! impl Process for PairSum {
//!     fn kind(&self) -> &'static str {
//!         "SDF::pairsum"
//!     }
//!     fn inputs(&self) -> Vec<PortInfo> {
//!         vec![self.input.info()]
//!     }
//!     fn outputs(&self) -> Vec<PortInfo> {
//!         vec![self.output.info()]
//!     }
//!     fn prep(&mut self) -> PhaseFuture<'_> {
//!         Box::pin(async move {
//!             self.pair = self.input.read_rate().await?;
//!             Ok(())
//!         })
//!     }
//!     fn exec(&mut self) -> Result<(), ProcessError> {
//!         self.sum = self.pair.iter().sum();
//!         Ok(())
//!     }
//!     fn prod(&mut self) -> PhaseFuture<'_> {
//!         Box::pin(async move { self.output.write(self.sum).await })
//!     }
//! }
//!
//! let mut net = Network::new("top");
//! let a: Signal<u32> = net.signal("a");
//! let b: Signal<u32> = net.signal("b");
//! let input = net.in_port(&a, "iport1", 2, TypeTag::of::<u32>()).unwrap();
//! let output = net.out_port(&[&b], "oport1", 1, TypeTag::of::<u32>()).unwrap();
//! net.add_process("pairsum", PairSum { input, output, pair: Vec::new(), sum: 0 })
//!     .unwrap();
//! ```
use std::any;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;

use crate::channel::{ChannelId, Receiver, Sender};

pub use crate::network::info::{Argument, PortInfo};

/// Boxed future returned by the asynchronous lifecycle phases.
///
/// *Note*: it is currently necessary to box the returned futures so that
/// processes can be stored as trait objects.
pub type PhaseFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ProcessError>> + Send + 'a>>;

/// Trait to be implemented by all leaf processes.
pub trait Process: Send + 'static {
    /// Returns the kind tag of the process, in the form `"<MoC>::<constructor>"`.
    ///
    /// Kind tags are the sole basis on which the export pass recognizes
    /// structural processes such as `SDF::delay`, `SDF::zipN` or
    /// `SDF::unzipN`.
    fn kind(&self) -> &'static str;

    /// Returns the introspection records of the input ports, in port order.
    fn inputs(&self) -> Vec<PortInfo>;

    /// Returns the introspection records of the output ports, in port order.
    fn outputs(&self) -> Vec<PortInfo>;

    /// Returns the construction arguments worth publishing, such as the
    /// number of initial tokens of a delay.
    fn arguments(&self) -> Vec<Argument> {
        Vec::new()
    }

    /// Initializes the process.
    ///
    /// The default implementation does nothing.
    fn init(&mut self) -> PhaseFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    /// Acquires the inputs of the next activation.
    fn prep(&mut self) -> PhaseFuture<'_>;

    /// Computes the outputs of the current activation.
    fn exec(&mut self) -> Result<(), ProcessError>;

    /// Emits the outputs of the current activation.
    fn prod(&mut self) -> PhaseFuture<'_>;

    /// Releases resources on controlled shutdown.
    ///
    /// The default implementation does nothing.
    fn clean(&mut self) {}
}

/// A payload type tag.
///
/// The tag is assigned once when a port is declared and carries the name and
/// the size in bytes of the payload type; the size becomes the token size of
/// the channels in the exported platform-mapping document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeTag {
    name: &'static str,
    size: usize,
}

impl TypeTag {
    /// Creates the tag of type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            name: any::type_name::<T>(),
            size: mem::size_of::<T>(),
        }
    }

    /// Creates a tag with an explicit name and size.
    pub const fn new(name: &'static str, size: usize) -> Self {
        Self { name, size }
    }

    /// Returns the name of the payload type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the size of the payload type, in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.size)
    }
}

/// An input port bound to a single channel.
pub struct InPort<T> {
    name: String,
    channel: ChannelId,
    receiver: Receiver<T>,
    rate: usize,
    type_tag: TypeTag,
}

impl<T: Send + 'static> InPort<T> {
    pub(crate) fn new(
        name: String,
        channel: ChannelId,
        receiver: Receiver<T>,
        rate: usize,
        type_tag: TypeTag,
    ) -> Self {
        Self {
            name,
            channel,
            receiver,
            rate,
            type_tag,
        }
    }

    /// Returns the name of the port.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of tokens declared to be consumed per activation.
    pub fn rate(&self) -> usize {
        self.rate
    }

    /// Returns the identifier of the bound channel.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Reads one token, waiting until it becomes available.
    pub async fn read(&mut self) -> Result<T, ProcessError> {
        self.receiver
            .recv()
            .await
            .map_err(|_| ProcessError::Disconnected(self.channel))
    }

    /// Reads exactly `count` tokens, waiting until they become available.
    pub async fn read_n(&mut self, count: usize) -> Result<Vec<T>, ProcessError> {
        let mut tokens = Vec::with_capacity(count);
        for _ in 0..count {
            tokens.push(self.read().await?);
        }

        Ok(tokens)
    }

    /// Reads as many tokens as the declared rate.
    pub async fn read_rate(&mut self) -> Result<Vec<T>, ProcessError> {
        self.read_n(self.rate).await
    }

    /// Returns the introspection record of the port.
    pub fn info(&self) -> PortInfo {
        PortInfo {
            name: self.name.clone(),
            channels: vec![self.channel],
            rate: self.rate,
            type_tag: self.type_tag,
        }
    }
}

impl<T> fmt::Debug for InPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InPort")
            .field("name", &self.name)
            .field("channel", &self.channel)
            .field("rate", &self.rate)
            .finish_non_exhaustive()
    }
}

/// An output port bound to one or more channels.
pub struct OutPort<T> {
    name: String,
    bindings: Vec<(ChannelId, Sender<T>)>,
    rate: usize,
    type_tag: TypeTag,
}

impl<T: Clone + Send + 'static> OutPort<T> {
    pub(crate) fn new(
        name: String,
        bindings: Vec<(ChannelId, Sender<T>)>,
        rate: usize,
        type_tag: TypeTag,
    ) -> Self {
        Self {
            name,
            bindings,
            rate,
            type_tag,
        }
    }

    /// Returns the name of the port.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of tokens declared to be produced per activation.
    pub fn rate(&self) -> usize {
        self.rate
    }

    /// Writes one token to every bound channel, waiting for free capacity
    /// when necessary.
    pub async fn write(&self, token: T) -> Result<(), ProcessError> {
        if let Some(((last_channel, last_sender), others)) = self.bindings.split_last() {
            for (channel, sender) in others {
                sender
                    .send(token.clone())
                    .await
                    .map_err(|_| ProcessError::Disconnected(*channel))?;
            }
            last_sender
                .send(token)
                .await
                .map_err(|_| ProcessError::Disconnected(*last_channel))?;
        }

        Ok(())
    }

    /// Writes a batch of tokens in order.
    pub async fn write_all(&self, tokens: Vec<T>) -> Result<(), ProcessError> {
        for token in tokens {
            self.write(token).await?;
        }

        Ok(())
    }

    /// Writes a batch of tokens after checking that its length matches the
    /// declared rate.
    ///
    /// Nothing is written if the length does not match.
    pub async fn write_rate(&self, tokens: Vec<T>) -> Result<(), ProcessError> {
        self.check_rate(tokens.len(), self.rate)?;

        self.write_all(tokens).await
    }

    /// Checks that `found` tokens were produced where `expected` are due.
    pub fn check_rate(&self, found: usize, expected: usize) -> Result<(), ProcessError> {
        if found != expected {
            return Err(ProcessError::RateMismatch {
                port: self.name.clone(),
                expected,
                found,
            });
        }

        Ok(())
    }

    /// Returns the introspection record of the port.
    pub fn info(&self) -> PortInfo {
        PortInfo {
            name: self.name.clone(),
            channels: self.bindings.iter().map(|(channel, _)| *channel).collect(),
            rate: self.rate,
            type_tag: self.type_tag,
        }
    }
}

impl<T> fmt::Debug for OutPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OutPort {} ({} bound channels)",
            self.name,
            self.bindings.len()
        )
    }
}

/// Error returned by a lifecycle phase.
///
/// [`ProcessError::Exhausted`] and [`ProcessError::Disconnected`] end the
/// activity of a process gracefully; the other variants are reported as
/// failures by the simulation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessError {
    /// The process has completed its finite activity, e.g. a source that has
    /// emitted all its values. The process then waits for the simulation to
    /// stop.
    Exhausted,
    /// A bound channel was closed.
    Disconnected(ChannelId),
    /// An activation produced a number of tokens other than the declared rate.
    RateMismatch {
        /// Name of the offending port.
        port: String,
        /// Declared number of tokens.
        expected: usize,
        /// Number of tokens actually produced.
        found: usize,
    },
    /// A scenario value has no entry in a kernel's scenario table.
    UnknownScenario(String),
    /// An external transport failed.
    Transport(String),
}

impl ProcessError {
    /// Returns `true` if the error ends the process without being a failure.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Disconnected(_))
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => fmt.write_str("the process has completed its activity"),
            Self::Disconnected(channel) => write!(fmt, "channel {channel} is closed"),
            Self::RateMismatch {
                port,
                expected,
                found,
            } => write!(
                fmt,
                "port '{port}' produced {found} tokens where {expected} were declared"
            ),
            Self::UnknownScenario(scenario) => {
                write!(fmt, "no table entry for scenario '{scenario}'")
            }
            Self::Transport(reason) => write!(fmt, "transport failure: {reason}"),
        }
    }
}

impl Error for ProcessError {}
