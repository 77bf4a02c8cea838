//! Introspection records.
//!
//! These records are read-only projections of an assembled network, computed
//! by [`Network::introspect`](crate::network::Network::introspect) once all
//! processes and channels are connected. They carry no reference to the live
//! network and can be freely cloned, compared and rewritten.
use std::fmt;

use crate::channel::ChannelId;
use crate::process::TypeTag;

/// Introspection record of a port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name, unique within its process and direction.
    pub name: String,
    /// Bound channels; an input port is always bound to exactly one channel.
    pub channels: Vec<ChannelId>,
    /// Tokens consumed or produced per activation.
    ///
    /// Ports with scenario-dependent rates publish the largest rate of their
    /// scenario table.
    pub rate: usize,
    /// Payload type tag.
    pub type_tag: TypeTag,
}

/// A named construction argument published by a process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Argument {
    /// Argument name.
    pub name: String,
    /// Textual value.
    pub value: String,
}

impl Argument {
    /// Creates an argument from any displayable value.
    pub fn new(name: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// Introspection record of a leaf process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessInfo {
    /// Hierarchical name, composite names separated by dots.
    pub name: String,
    /// Name of the process within its parent composite.
    pub basename: String,
    /// Kind tag, e.g. `"SDF::comb"`.
    pub kind: String,
    /// Input ports, in port order.
    pub inputs: Vec<PortInfo>,
    /// Output ports, in port order.
    pub outputs: Vec<PortInfo>,
    /// Published construction arguments.
    pub arguments: Vec<Argument>,
}

impl ProcessInfo {
    /// Returns the constructor part of the kind tag, e.g. `"comb"` for
    /// `"SDF::comb"`.
    pub fn constructor(&self) -> &str {
        self.kind
            .rsplit_once("::")
            .map(|(_, constructor)| constructor)
            .unwrap_or(&self.kind)
    }

    /// Returns the value of a published argument.
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| arg.value.as_str())
    }
}

/// A process port designated by process and port names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Hierarchical name of the process.
    pub process: String,
    /// Name of the port.
    pub port: String,
}

impl Endpoint {
    /// Creates a new endpoint.
    pub fn new(process: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.process, self.port)
    }
}

/// Introspection record of a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Channel identifier.
    pub id: ChannelId,
    /// Hierarchical name.
    pub name: String,
    /// Producing endpoint.
    pub src: Endpoint,
    /// Consuming endpoint.
    pub dst: Endpoint,
    /// Tokens produced per activation of the producer.
    pub prod_rate: usize,
    /// Tokens consumed per activation of the consumer.
    pub cons_rate: usize,
    /// Size of a token, in bytes.
    pub token_size: usize,
    /// Tokens present in the channel before the first activation.
    pub initial_tokens: usize,
}

/// Introspection record of a whole network, flattened to its leaves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Name of the top-level network.
    pub name: String,
    /// Leaf processes, in depth-first construction order.
    pub processes: Vec<ProcessInfo>,
    /// Fully connected channels, ordered by identifier.
    pub channels: Vec<ChannelInfo>,
}

impl NetworkInfo {
    /// Returns the process with the specified hierarchical name.
    pub fn process(&self, name: &str) -> Option<&ProcessInfo> {
        self.processes.iter().find(|p| p.name == name)
    }

    /// Returns the channel with the specified hierarchical name.
    pub fn channel(&self, name: &str) -> Option<&ChannelInfo> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Returns an iterator over the channels produced by a process.
    pub fn channels_from<'a>(&'a self, process: &'a str) -> impl Iterator<Item = &'a ChannelInfo> {
        self.channels.iter().filter(move |c| c.src.process == process)
    }

    /// Returns an iterator over the channels consumed by a process.
    pub fn channels_to<'a>(&'a self, process: &'a str) -> impl Iterator<Item = &'a ChannelInfo> {
        self.channels.iter().filter(move |c| c.dst.process == process)
    }
}
