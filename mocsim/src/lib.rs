//! Process networks under multiple models of computation.
//!
//! Mocsim is a framework for describing and executing networks of concurrent
//! processes whose communication obeys precisely defined models of
//! computation (MoC): a synchronous model, a static dataflow model, timed
//! discrete-event and discrete-time models, a continuous-time model driven by
//! piecewise functions and a scenario-aware dataflow model whose rates depend
//! on a detected mode.
//!
//! Processes are assembled into hierarchical networks from a library of
//! process constructors (combinational maps, delays, zips and unzips, sources,
//! sinks, state machines...) and connected through typed point-to-point
//! channels. An assembled network can be executed, introspected, and exported
//! as a platform-mapping description for deployment.
//!
//! # A practical overview
//!
//! Working with a process network typically involves three activities:
//!
//! 1. the assembly of a network from process constructors,
//! 2. the execution of the network,
//! 3. optionally, the export of the network for a target platform.
//!
//! ## Assembling a network
//!
//! A [`Network`](network::Network) is a builder which creates the signals
//! connecting processes and records the processes created by the constructors
//! of the [`moc`] submodules. A signal has a single producer and a single
//! consumer; fan-out is made explicit by a `fanout` process.
//!
//! Each constructor checks its arguments, binds its ports to the signals it is
//! given and registers a leaf process under a name that must be unique within
//! its enclosing composite:
//!
//! ```
//! use mocsim::moc::sdf;
//! use mocsim::network::Network;
//!
//! let mut net = Network::new("pipeline");
//! let raw = net.signal("raw");
//! let cooked = net.signal("cooked");
//!
//! sdf::vsource(&mut net, "src", vec![1, 2, 3], &raw).unwrap();
//! sdf::comb(&mut net, "inc", 1, 1, |x: &[i32]| vec![x[0] + 1], &raw, &cooked).unwrap();
//! sdf::sink(&mut net, "snk", |x: &i32| println!("{x}"), &cooked).unwrap();
//! ```
//!
//! Composites are built with [`Network::composite`](network::Network::composite),
//! which nests the processes and signals created within a closure under a
//! common name.
//!
//! ## Running a network
//!
//! [Elaborating](network::Network::elaborate) a network checks that every
//! signal is connected and yields a [`Simulation`](simulation::Simulation).
//! Each process then runs through its lifecycle (see the [`process`] module)
//! until it blocks on an empty or full channel. A call to
//! [`Simulation::run`](simulation::Simulation::run) returns when all processes
//! are blocked, which is the regular end of a network with finite sources:
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use mocsim::moc::sdf;
//! use mocsim::network::Network;
//!
//! let mut net = Network::new("pipeline");
//! let raw = net.signal("raw");
//! let cooked = net.signal("cooked");
//! let collected = Arc::new(Mutex::new(Vec::new()));
//! let sink_collected = collected.clone();
//!
//! sdf::vsource(&mut net, "src", vec![1, 2, 3], &raw).unwrap();
//! sdf::comb(&mut net, "inc", 1, 1, |x: &[i32]| vec![x[0] + 1], &raw, &cooked).unwrap();
//! sdf::sink(&mut net, "snk", move |x: &i32| sink_collected.lock().unwrap().push(*x), &cooked)
//!     .unwrap();
//!
//! let mut simu = net.elaborate().unwrap();
//! simu.run().unwrap();
//! simu.shutdown().unwrap();
//!
//! assert_eq!(*collected.lock().unwrap(), [2, 3, 4]);
//! ```
//!
//! ## Exporting a network
//!
//! The introspection records of a network, obtained with
//! [`Network::introspect`](network::Network::introspect) or
//! [`Simulation::info`](simulation::Simulation::info), describe its leaf
//! processes and channels. The [`export`] module folds structural processes
//! away and writes a platform-mapping document along with the actor functions
//! extracted from source fragments.
//!
//! # Logging
//!
//! Mocsim emits [`tracing`] events. Each process runs within a `process` span
//! carrying its hierarchical name, so that the activity of a single process
//! can be selected with a filter such as
//! `RUST_LOG="warn,[process{name=inc}]=debug"`.
//!
//! # Modules documentation
//!
//! * the [`process`] module details the process lifecycle and how to write
//!   custom processes,
//! * the [`moc`] module lists the models of computation and their firing
//!   rules,
//! * the [`simulation`] module discusses stalls, failures and shutdown,
//! * the [`transport`] module discusses the bridging of networks through
//!   external transports.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub(crate) mod channel;
pub mod event;
pub mod export;
pub mod moc;
pub mod network;
pub mod process;
pub mod simulation;
pub mod time;
pub mod transport;
