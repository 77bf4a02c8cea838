//! Process network assembly.
//!
//! # Network lifecycle
//!
//! The lifecycle of a process network comprises the following stages:
//!
//! 1. creation of a [`Network`] builder and of the [`Signal`]s that will
//!    connect its processes,
//! 2. instantiation of processes with the constructors of the
//!    [`moc`](crate::moc) modules, which bind process ports to signals and
//!    register the processes with the builder, possibly inside named
//!    [composites](Network::composite),
//! 3. optionally, [introspection](Network::introspect) of the assembled
//!    network,
//! 4. [elaboration](Network::elaborate), which checks that every channel has
//!    exactly one producer and one consumer, freezes the topology and returns
//!    a runnable [`Simulation`].
//!
//! # Channel capacity
//!
//! Each signal is a bounded channel. Its capacity defaults to
//! [`Network::DEFAULT_CAPACITY`] and can be changed network-wide with
//! [`Network::with_capacity`] or per signal with
//! [`Network::signal_with_capacity`]. A producer blocks while the channel is
//! full, so feedback loops must be given enough capacity to hold their initial
//! tokens.
//!
//! # Examples
//!
//! ```
//! use mocsim::event::Event;
//! use mocsim::moc::sy;
//! use mocsim::network::Network;
//!
//! let mut net = Network::new("top");
//! let a = net.signal::<Event<i32>>("a");
//! let b = net.signal::<Event<i32>>("b");
//!
//! sy::vsource(&mut net, "src", vec![Event::Present(1), Event::Absent], &a).unwrap();
//! net.composite("stage", |net| {
//!     sy::comb(net, "double", |x: &i32| 2 * x, &a, &b)
//! })
//! .unwrap();
//! sy::sink(&mut net, "sink", |_: &Event<i32>| {}, &b).unwrap();
//!
//! let info = net.introspect();
//! assert_eq!(info.processes.len(), 3);
//! assert_eq!(info.process("stage.double").unwrap().kind, "SY::comb");
//! ```
pub mod info;

pub use crate::channel::ChannelId;

use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use slab::Slab;
use tracing::info;

use crate::channel::{Channel, Close};
use crate::process::{InPort, OutPort, Process, TypeTag};
use crate::simulation::Simulation;

use info::{ChannelInfo, Endpoint, NetworkInfo, PortInfo, ProcessInfo};

/// Source of unique network identifiers.
static NEXT_NETWORK_ID: AtomicUsize = AtomicUsize::new(0);

/// A typed handle to a channel of a network.
///
/// Signals are created by [`Network::signal`] and passed to process
/// constructors, which bind them to process ports. Cloning a signal yields
/// another handle to the same channel.
pub struct Signal<T> {
    network_id: usize,
    id: ChannelId,
    channel: Channel<T>,
}

impl<T> Signal<T> {
    /// Returns the identifier of the underlying channel.
    pub fn id(&self) -> ChannelId {
        self.id
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            network_id: self.network_id,
            id: self.id,
            channel: self.channel.clone(),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Book-keeping of a channel during assembly.
///
/// A channel is bound once the process owning its port has been added to the
/// network.
struct ChannelRecord {
    name: String,
    closer: Arc<dyn Close>,
    has_producer: bool,
    has_consumer: bool,
}

/// A named leaf process.
struct Leaf {
    name: String,
    process: Box<dyn Process>,
}

/// A named container of processes and composites.
struct Composite {
    name: String,
    children: Vec<Node>,
}

impl Composite {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.children.iter().any(|child| match child {
            Node::Leaf(leaf) => leaf.name == name,
            Node::Composite(composite) => composite.name == name,
        })
    }

    /// Visits all leaves depth-first with their hierarchical names.
    fn visit_leaves<'a>(&'a self, prefix: &str, visitor: &mut impl FnMut(String, &'a Leaf)) {
        for child in &self.children {
            match child {
                Node::Leaf(leaf) => visitor(join(prefix, &leaf.name), leaf),
                Node::Composite(composite) => {
                    composite.visit_leaves(&join(prefix, &composite.name), visitor)
                }
            }
        }
    }

    /// Moves all leaves out of the hierarchy, depth-first.
    fn into_leaves(self, prefix: &str, leaves: &mut Vec<(String, Box<dyn Process>)>) {
        for child in self.children {
            match child {
                Node::Leaf(leaf) => leaves.push((join(prefix, &leaf.name), leaf.process)),
                Node::Composite(composite) => {
                    let prefix = join(prefix, &composite.name);
                    composite.into_leaves(&prefix, leaves);
                }
            }
        }
    }
}

enum Node {
    Leaf(Leaf),
    Composite(Composite),
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Builder for a process network.
pub struct Network {
    id: usize,
    name: String,
    capacity: usize,
    root: Composite,
    /// Child indices leading from the root to the composite being built.
    cursor: Vec<usize>,
    channels: Slab<ChannelRecord>,
}

impl Network {
    /// Default capacity of a channel.
    pub const DEFAULT_CAPACITY: usize = 16;

    /// Creates an empty network with the default channel capacity.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, Self::DEFAULT_CAPACITY)
    }

    /// Creates an empty network with the specified default channel capacity.
    ///
    /// # Panics
    ///
    /// The constructor will panic if the requested capacity is 0.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        assert!(capacity > 0, "the channel capacity cannot be zero");

        Self {
            id: NEXT_NETWORK_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            capacity,
            root: Composite::new(""),
            cursor: Vec::new(),
            channels: Slab::new(),
        }
    }

    /// Returns the name of the network.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a signal with the default capacity.
    ///
    /// The name of the signal is qualified with the names of the enclosing
    /// composites.
    pub fn signal<T: Send + 'static>(&mut self, name: &str) -> Signal<T> {
        self.signal_with_capacity(name, self.capacity)
    }

    /// Creates a signal with the specified capacity.
    ///
    /// # Panics
    ///
    /// This method will panic if the requested capacity is 0.
    pub fn signal_with_capacity<T: Send + 'static>(
        &mut self,
        name: &str,
        capacity: usize,
    ) -> Signal<T> {
        let channel = Channel::new(capacity);
        let name = join(&self.scope(), name);
        let key = self.channels.insert(ChannelRecord {
            name,
            closer: channel.closer(),
            has_producer: false,
            has_consumer: false,
        });

        Signal {
            network_id: self.id,
            id: ChannelId(key),
            channel,
        }
    }

    /// Creates an input port reading from a signal.
    ///
    /// A signal can be consumed by a single input port. The signal is bound
    /// when the process owning the port is [added](Network::add_process); if
    /// the port is dropped beforehand, the signal can be bound again.
    pub fn in_port<T: Send + 'static>(
        &mut self,
        signal: &Signal<T>,
        name: &str,
        rate: usize,
        type_tag: TypeTag,
    ) -> Result<InPort<T>, ElaborationError> {
        let record = self.record(signal)?;
        if record.has_consumer || signal.channel.has_receiver() {
            return Err(ElaborationError::ConsumerAlreadyBound(record.name.clone()));
        }

        Ok(InPort::new(
            name.to_string(),
            signal.id,
            signal.channel.receiver(),
            rate,
            type_tag,
        ))
    }

    /// Creates an output port writing to one or more signals.
    ///
    /// Values written to the port are replicated to every signal. A signal can
    /// be produced by a single output port. As for input ports, the signals
    /// are bound when the process owning the port is added.
    pub fn out_port<T: Clone + Send + 'static>(
        &mut self,
        signals: &[&Signal<T>],
        name: &str,
        rate: usize,
        type_tag: TypeTag,
    ) -> Result<OutPort<T>, ElaborationError> {
        if signals.is_empty() {
            return Err(ElaborationError::EmptyBinding(name.to_string()));
        }

        let mut ids = HashSet::new();
        for signal in signals {
            let record = self.record(signal)?;
            if record.has_producer || signal.channel.has_sender() || !ids.insert(signal.id) {
                return Err(ElaborationError::ProducerAlreadyBound(record.name.clone()));
            }
        }

        let bindings = signals
            .iter()
            .map(|signal| (signal.id, signal.channel.sender()))
            .collect();

        Ok(OutPort::new(name.to_string(), bindings, rate, type_tag))
    }

    /// Adds a leaf process to the composite being built and binds the
    /// signals of its ports.
    ///
    /// The name must be unique within the enclosing composite. On error the
    /// process is dropped and none of its signals is bound.
    pub fn add_process(
        &mut self,
        name: &str,
        process: impl Process,
    ) -> Result<(), ElaborationError> {
        self.check_unique(name)?;
        self.bind(&process.inputs(), &process.outputs())?;
        self.current().children.push(Node::Leaf(Leaf {
            name: name.to_string(),
            process: Box::new(process),
        }));

        Ok(())
    }

    /// Builds a named composite process.
    ///
    /// Processes and signals created by the closure are placed within the
    /// composite, whose name must be unique within the enclosing composite.
    pub fn composite<R, F>(&mut self, name: &str, build: F) -> Result<R, ElaborationError>
    where
        F: FnOnce(&mut Network) -> Result<R, ElaborationError>,
    {
        self.check_unique(name)?;
        let current = self.current();
        current.children.push(Node::Composite(Composite::new(name)));
        let index = current.children.len() - 1;

        self.cursor.push(index);
        let result = build(self);
        self.cursor.pop();

        result
    }

    /// Collects the static structure of the network.
    ///
    /// Composites are flattened: only leaf processes are recorded. Channels
    /// are discovered from the ports of the leaves; channels lacking a
    /// producer or a consumer are omitted. This method does not modify the
    /// network and always yields identical results for an unchanged network.
    pub fn introspect(&self) -> NetworkInfo {
        let mut processes = Vec::new();
        self.root.visit_leaves("", &mut |name, leaf| {
            processes.push(ProcessInfo {
                name,
                basename: leaf.name.clone(),
                kind: leaf.process.kind().to_string(),
                inputs: leaf.process.inputs(),
                outputs: leaf.process.outputs(),
                arguments: leaf.process.arguments(),
            });
        });

        let channels = {
            let mut producers: BTreeMap<ChannelId, (Endpoint, &PortInfo)> = BTreeMap::new();
            let mut consumers: BTreeMap<ChannelId, (Endpoint, &PortInfo)> = BTreeMap::new();
            for process in &processes {
                for port in &process.outputs {
                    for channel in &port.channels {
                        let src = Endpoint::new(&process.name, &port.name);
                        producers.insert(*channel, (src, port));
                    }
                }
                for port in &process.inputs {
                    for channel in &port.channels {
                        let dst = Endpoint::new(&process.name, &port.name);
                        consumers.insert(*channel, (dst, port));
                    }
                }
            }

            producers
                .into_iter()
                .filter_map(|(id, (src, src_port))| {
                    let (dst, dst_port) = consumers.remove(&id)?;
                    let record = self.channels.get(id.0)?;

                    Some(ChannelInfo {
                        id,
                        name: record.name.clone(),
                        src,
                        dst,
                        prod_rate: src_port.rate,
                        cons_rate: dst_port.rate,
                        token_size: src_port.type_tag.size(),
                        initial_tokens: 0,
                    })
                })
                .collect()
        };

        NetworkInfo {
            name: self.name.clone(),
            processes,
            channels,
        }
    }

    /// Freezes the topology and returns a runnable simulation.
    ///
    /// Elaboration fails if a channel lacks a producer or a consumer, or if
    /// two channels share the same hierarchical name.
    pub fn elaborate(self) -> Result<Simulation, ElaborationError> {
        let mut names = HashSet::new();
        for (_, record) in &self.channels {
            if !record.has_producer || !record.has_consumer {
                return Err(ElaborationError::Unconnected(record.name.clone()));
            }
            if !names.insert(record.name.as_str()) {
                return Err(ElaborationError::DuplicateName(record.name.clone()));
            }
        }

        let info = self.introspect();
        info!(
            target: "mocsim",
            network = %info.name,
            processes = info.processes.len(),
            channels = info.channels.len(),
            "network elaborated"
        );

        let closers = self
            .channels
            .iter()
            .map(|(_, record)| record.closer.clone())
            .collect();
        let mut leaves = Vec::new();
        self.root.into_leaves("", &mut leaves);

        Ok(Simulation::new(info, leaves, closers))
    }

    /// Returns the dot-separated path of the composite being built.
    fn scope(&self) -> String {
        let mut scope = String::new();
        let mut composite = &self.root;
        for &index in &self.cursor {
            if let Node::Composite(child) = &composite.children[index] {
                scope = join(&scope, &child.name);
                composite = child;
            }
        }

        scope
    }

    /// Returns the composite being built.
    fn current(&mut self) -> &mut Composite {
        let mut composite = &mut self.root;
        for &index in &self.cursor {
            composite = match &mut composite.children[index] {
                Node::Composite(child) => child,
                Node::Leaf(_) => unreachable!("the cursor only designates composites"),
            };
        }

        composite
    }

    fn check_unique(&mut self, name: &str) -> Result<(), ElaborationError> {
        if self.current().contains(name) {
            return Err(ElaborationError::DuplicateName(join(&self.scope(), name)));
        }

        Ok(())
    }

    /// Marks the channels of the ports as bound, checking all of them first.
    fn bind(
        &mut self,
        inputs: &[PortInfo],
        outputs: &[PortInfo],
    ) -> Result<(), ElaborationError> {
        let consumed: Vec<ChannelId> = ports_channels(inputs).collect();
        let produced: Vec<ChannelId> = ports_channels(outputs).collect();

        let mut seen = HashSet::new();
        for &id in &consumed {
            let record = self.channels.get(id.0).ok_or(ElaborationError::ForeignSignal(id))?;
            if record.has_consumer || !seen.insert(id) {
                return Err(ElaborationError::ConsumerAlreadyBound(record.name.clone()));
            }
        }
        seen.clear();
        for &id in &produced {
            let record = self.channels.get(id.0).ok_or(ElaborationError::ForeignSignal(id))?;
            if record.has_producer || !seen.insert(id) {
                return Err(ElaborationError::ProducerAlreadyBound(record.name.clone()));
            }
        }

        for id in consumed {
            self.channels[id.0].has_consumer = true;
        }
        for id in produced {
            self.channels[id.0].has_producer = true;
        }

        Ok(())
    }

    fn record<T>(&mut self, signal: &Signal<T>) -> Result<&mut ChannelRecord, ElaborationError> {
        if signal.network_id != self.id {
            return Err(ElaborationError::ForeignSignal(signal.id));
        }

        self.channels
            .get_mut(signal.id.0)
            .ok_or(ElaborationError::ForeignSignal(signal.id))
    }
}

/// Iterates over the channels of a list of ports.
fn ports_channels(ports: &[PortInfo]) -> impl Iterator<Item = ChannelId> + '_ {
    ports.iter().flat_map(|port| port.channels.iter().copied())
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("name", &self.name)
            .field("channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}

/// Error raised while assembling or elaborating a network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElaborationError {
    /// A process, composite or channel name is already used in its scope.
    DuplicateName(String),
    /// The signal already has a producer.
    ProducerAlreadyBound(String),
    /// The signal already has a consumer.
    ConsumerAlreadyBound(String),
    /// The signal lacks a producer or a consumer.
    Unconnected(String),
    /// The signal was created by another network.
    ForeignSignal(ChannelId),
    /// An output port was bound to no signal.
    EmptyBinding(String),
    /// The number of ports does not match the number of declared rates or
    /// lanes.
    ArityMismatch {
        /// Name of the process.
        process: String,
        /// Expected number of ports.
        expected: usize,
        /// Actual number of ports.
        found: usize,
    },
    /// A rate-based port was declared with a zero rate.
    ZeroRate {
        /// Name of the process.
        process: String,
        /// Name of the port.
        port: String,
    },
    /// A scenario table lacks an entry for a scenario that can be produced by
    /// the paired detector.
    MissingScenario {
        /// Name of the process.
        process: String,
        /// Scenario lacking an entry.
        scenario: String,
    },
    /// A scenario table is empty.
    EmptyScenarioTable(String),
    /// A process constructor argument is invalid.
    InvalidArgument {
        /// Name of the process.
        process: String,
        /// Reason for the rejection.
        reason: String,
    },
}

impl fmt::Display for ElaborationError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName(name) => write!(fmt, "the name '{name}' is already in use"),
            Self::ProducerAlreadyBound(name) => {
                write!(fmt, "signal '{name}' is already bound to a producer")
            }
            Self::ConsumerAlreadyBound(name) => {
                write!(fmt, "signal '{name}' is already bound to a consumer")
            }
            Self::Unconnected(name) => {
                write!(fmt, "signal '{name}' lacks a producer or a consumer")
            }
            Self::ForeignSignal(id) => {
                write!(fmt, "signal {id} does not belong to this network")
            }
            Self::EmptyBinding(port) => write!(fmt, "output port '{port}' is bound to no signal"),
            Self::ArityMismatch {
                process,
                expected,
                found,
            } => write!(
                fmt,
                "process '{process}' expects {expected} ports but {found} were provided"
            ),
            Self::ZeroRate { process, port } => {
                write!(fmt, "port '{port}' of process '{process}' has a zero rate")
            }
            Self::MissingScenario { process, scenario } => write!(
                fmt,
                "the scenario table of process '{process}' has no entry for scenario '{scenario}'"
            ),
            Self::EmptyScenarioTable(process) => {
                write!(fmt, "the scenario table of process '{process}' is empty")
            }
            Self::InvalidArgument { process, reason } => {
                write!(fmt, "invalid argument for process '{process}': {reason}")
            }
        }
    }
}

impl Error for ElaborationError {}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::Event;
    use crate::moc::{sdf, sy};

    #[test]
    fn network_rejects_duplicate_names() {
        let mut net = Network::new("top");
        let a = net.signal::<u32>("a");
        let b = net.signal::<u32>("b");

        sdf::vsource(&mut net, "p", vec![1], &a).unwrap();
        assert_eq!(
            sdf::sink(&mut net, "p", |_: &u32| {}, &b),
            Err(ElaborationError::DuplicateName("p".into()))
        );
    }

    #[test]
    fn network_failed_constructor_leaves_signals_unbound() {
        let mut net = Network::new("top");
        let a = net.signal::<u32>("a");
        let b = net.signal::<u32>("b");
        let collected = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink_collected = collected.clone();

        sdf::vsource(&mut net, "src", vec![1, 2], &a).unwrap();
        sdf::vsource(&mut net, "other", vec![3], &b).unwrap();
        assert_eq!(
            sdf::sink(&mut net, "src", |_: &u32| {}, &a),
            Err(ElaborationError::DuplicateName("src".into()))
        );
        assert_eq!(
            sdf::comb(&mut net, "f", 1, 1, |x: &[u32]| x.to_vec(), &a, &b),
            Err(ElaborationError::ProducerAlreadyBound("b".into()))
        );
        sdf::sink(
            &mut net,
            "snk",
            move |x: &u32| sink_collected.lock().unwrap().push(*x),
            &a,
        )
        .unwrap();
        sdf::sink(&mut net, "snk2", |_: &u32| {}, &b).unwrap();

        net.elaborate().unwrap().run().unwrap();
        assert_eq!(*collected.lock().unwrap(), [1, 2]);
    }

    #[test]
    fn network_binds_ports_when_process_is_added() {
        let mut net = Network::new("top");
        let a = net.signal::<u32>("a");

        let port = net.in_port(&a, "iport1", 1, TypeTag::of::<u32>()).unwrap();
        assert_eq!(
            net.in_port(&a, "iport1", 1, TypeTag::of::<u32>()).map(|_| ()),
            Err(ElaborationError::ConsumerAlreadyBound("a".into()))
        );
        drop(port);
        assert!(net.in_port(&a, "iport1", 1, TypeTag::of::<u32>()).is_ok());

        let port = net.out_port(&[&a], "oport1", 1, TypeTag::of::<u32>()).unwrap();
        assert!(net.out_port(&[&a], "oport1", 1, TypeTag::of::<u32>()).is_err());
        drop(port);
        assert!(net.introspect().channels.is_empty());
        assert!(matches!(
            net.elaborate(),
            Err(ElaborationError::Unconnected(name)) if name == "a"
        ));
    }

    #[test]
    fn network_rejects_double_binding() {
        let mut net = Network::new("top");
        let a = net.signal::<u32>("a");

        sdf::sink(&mut net, "s1", |_: &u32| {}, &a).unwrap();
        assert_eq!(
            sdf::sink(&mut net, "s2", |_: &u32| {}, &a),
            Err(ElaborationError::ConsumerAlreadyBound("a".into()))
        );
    }

    #[test]
    fn network_rejects_foreign_signal() {
        let mut other = Network::new("other");
        let foreign = other.signal::<u32>("x");

        let mut net = Network::new("top");
        assert!(matches!(
            sdf::sink(&mut net, "s", |_: &u32| {}, &foreign),
            Err(ElaborationError::ForeignSignal(_))
        ));
    }

    #[test]
    fn network_elaboration_requires_connected_signals() {
        let mut net = Network::new("top");
        let a = net.signal::<u32>("a");
        sdf::vsource(&mut net, "src", vec![1, 2], &a).unwrap();

        assert!(matches!(
            net.elaborate(),
            Err(ElaborationError::Unconnected(name)) if name == "a"
        ));
    }

    #[test]
    fn network_composites_are_flattened() {
        let mut net = Network::new("top");
        let a = net.signal::<Event<i32>>("a");
        let c = net.signal::<Event<i32>>("c");

        sy::constant(&mut net, "src", 3, Some(2), &a).unwrap();
        net.composite("outer", |net| {
            let b = net.signal::<Event<i32>>("b");
            sy::comb(net, "first", |x: &i32| x + 1, &a, &b)?;
            net.composite("inner", |net| sy::comb(net, "second", |x: &i32| x * 2, &b, &c))
        })
        .unwrap();
        sy::sink(&mut net, "snk", |_: &Event<i32>| {}, &c).unwrap();

        let info = net.introspect();
        let names: Vec<_> = info.processes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["src", "outer.first", "outer.inner.second", "snk"]);
        assert_eq!(info.process("outer.inner.second").unwrap().basename, "second");

        let b = info.channel("outer.b").unwrap();
        assert_eq!(b.src, Endpoint::new("outer.first", "oport1"));
        assert_eq!(b.dst, Endpoint::new("outer.inner.second", "iport1"));
        assert_eq!(b.token_size, std::mem::size_of::<i32>());
    }

    #[test]
    fn network_composite_names_are_scoped() {
        let mut net = Network::new("top");
        let a = net.signal::<u32>("a");
        let b = net.signal::<u32>("b");

        sdf::vsource(&mut net, "p", vec![1], &a).unwrap();
        net.composite("sub", |net| sdf::sink(net, "p", |_: &u32| {}, &a))
            .unwrap();
        assert_eq!(
            net.composite("sub", |net| sdf::sink(net, "q", |_: &u32| {}, &b)),
            Err(ElaborationError::DuplicateName("sub".into()))
        );
    }
}
