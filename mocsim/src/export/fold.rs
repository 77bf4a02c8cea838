//! Removal of structural processes.
//!
//! Delays, zips and unzips only exist to shape token streams: a delay
//! prepends initial tokens and zips and unzips bundle and unbundle lanes. None
//! of them performs any computation, so they are folded into the channels
//! that surround them before a network is mapped to a platform.
//!
//! Folding proceeds in three passes over immutable snapshots of the channel
//! list: all delays first, then all zips, then all unzips. A zip leaves behind
//! one channel per lane, each tagged with its lane index, so that a subsequent
//! unzip can pair lane `i` with its `i`-th output.
use crate::network::info::{ChannelInfo, NetworkInfo, ProcessInfo};

use super::ExportError;

/// Structural process categories, recognized by the constructor part of the
/// kind tag regardless of the model of computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Structural {
    Delay,
    Zip,
    Unzip,
}

impl Structural {
    pub(crate) fn of(process: &ProcessInfo) -> Option<Self> {
        match process.constructor() {
            "delay" | "delayn" => Some(Self::Delay),
            "zip" | "zipN" => Some(Self::Zip),
            "unzip" | "unzipN" => Some(Self::Unzip),
            _ => None,
        }
    }
}

/// A channel under rewriting.
#[derive(Clone, Debug)]
struct Edge {
    info: ChannelInfo,
    /// Index of the zip input this channel was attached to, if it was folded
    /// into a zip destination.
    lane: Option<usize>,
}

/// Returns a copy of the network without its structural processes.
///
/// The surviving channels carry the initial tokens of the folded delays and
/// the rates of the folded zips and unzips. Port records are updated to
/// reference the surviving channels.
pub fn fold(info: &NetworkInfo) -> Result<NetworkInfo, ExportError> {
    let mut edges: Vec<Edge> = info
        .channels
        .iter()
        .map(|channel| Edge {
            info: channel.clone(),
            lane: None,
        })
        .collect();

    for pass in [Structural::Delay, Structural::Zip, Structural::Unzip] {
        for process in &info.processes {
            if Structural::of(process) != Some(pass) {
                continue;
            }
            edges = match pass {
                Structural::Delay => fold_delay(process, edges)?,
                Structural::Zip => fold_zip(process, edges)?,
                Structural::Unzip => fold_unzip(process, edges)?,
            };
        }
    }

    let mut channels: Vec<ChannelInfo> = edges.into_iter().map(|edge| edge.info).collect();
    channels.sort_by_key(|channel| channel.id);

    let processes = info
        .processes
        .iter()
        .filter(|process| Structural::of(process).is_none())
        .map(|process| rebind(process, &channels))
        .collect();

    Ok(NetworkInfo {
        name: info.name.clone(),
        processes,
        channels,
    })
}

/// Splits the channels into those consumed by the process, those produced by
/// the process and the others.
fn partition(process: &ProcessInfo, edges: Vec<Edge>) -> (Vec<Edge>, Vec<Edge>, Vec<Edge>) {
    let mut incoming = Vec::new();
    let mut outgoing = Vec::new();
    let mut others = Vec::new();
    for edge in edges {
        if edge.info.dst.process == process.name {
            incoming.push(edge);
        } else if edge.info.src.process == process.name {
            outgoing.push(edge);
        } else {
            others.push(edge);
        }
    }

    (incoming, outgoing, others)
}

fn fold_delay(process: &ProcessInfo, edges: Vec<Edge>) -> Result<Vec<Edge>, ExportError> {
    let (mut incoming, mut outgoing, mut edges) = partition(process, edges);
    if incoming.len() != 1 || outgoing.len() != 1 {
        return Err(malformed(
            process,
            format!(
                "expected one incoming and one outgoing channel, found {} and {}",
                incoming.len(),
                outgoing.len()
            ),
        ));
    }
    let (input, output) = (incoming.swap_remove(0), outgoing.swap_remove(0));

    let count = process
        .argument("n")
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(1);

    edges.push(Edge {
        info: ChannelInfo {
            dst: output.info.dst,
            cons_rate: output.info.cons_rate,
            initial_tokens: input.info.initial_tokens + output.info.initial_tokens + count,
            ..input.info
        },
        lane: input.lane,
    });

    Ok(edges)
}

fn fold_zip(process: &ProcessInfo, edges: Vec<Edge>) -> Result<Vec<Edge>, ExportError> {
    let (incoming, outgoing, mut edges) = partition(process, edges);
    let Ok([output]) = <[Edge; 1]>::try_from(outgoing) else {
        return Err(malformed(process, "expected exactly one outgoing channel".into()));
    };

    for input in incoming {
        let lane = port_index(process, &input.info.dst.port, true)?;
        edges.push(Edge {
            info: ChannelInfo {
                dst: output.info.dst.clone(),
                cons_rate: input.info.cons_rate * output.info.cons_rate,
                initial_tokens: input.info.initial_tokens
                    + output.info.initial_tokens * input.info.cons_rate,
                ..input.info
            },
            lane: Some(lane),
        });
    }

    Ok(edges)
}

fn fold_unzip(process: &ProcessInfo, edges: Vec<Edge>) -> Result<Vec<Edge>, ExportError> {
    let (incoming, outgoing, mut edges) = partition(process, edges);

    match incoming.as_slice() {
        [] => return Err(malformed(process, "no incoming channel".into())),

        // A single bundled input is split across all outputs.
        [input] if input.lane.is_none() => {
            for output in outgoing {
                edges.push(Edge {
                    info: ChannelInfo {
                        src: input.info.src.clone(),
                        prod_rate: input.info.prod_rate * output.info.prod_rate,
                        initial_tokens: output.info.initial_tokens
                            + input.info.initial_tokens * output.info.prod_rate,
                        ..output.info
                    },
                    lane: None,
                });
            }
        }

        // The lanes of a folded zip are paired with the outputs.
        inputs => {
            for output in outgoing {
                let index = port_index(process, &output.info.src.port, false)?;
                let mut lanes = inputs.iter().filter(|input| input.lane == Some(index));
                let (Some(input), None) = (lanes.next(), lanes.next()) else {
                    return Err(malformed(
                        process,
                        format!("output {} has no unique matching lane", output.info.src.port),
                    ));
                };
                edges.push(Edge {
                    info: ChannelInfo {
                        src: input.info.src.clone(),
                        prod_rate: input.info.prod_rate,
                        initial_tokens: input.info.initial_tokens + output.info.initial_tokens,
                        ..output.info
                    },
                    lane: None,
                });
            }
            if let Some(input) = inputs
                .iter()
                .find(|input| input.lane.map_or(true, |lane| lane >= process.outputs.len()))
            {
                return Err(malformed(
                    process,
                    format!("channel {} matches no output", input.info.name),
                ));
            }
        }
    }

    Ok(edges)
}

/// Returns the position of a port within the inputs or outputs of a process.
fn port_index(process: &ProcessInfo, port: &str, input: bool) -> Result<usize, ExportError> {
    let ports = if input {
        &process.inputs
    } else {
        &process.outputs
    };

    ports
        .iter()
        .position(|p| p.name == port)
        .ok_or_else(|| malformed(process, format!("unknown port {port}")))
}

/// Updates the channel references of the ports of a process.
fn rebind(process: &ProcessInfo, channels: &[ChannelInfo]) -> ProcessInfo {
    let mut process = process.clone();
    for port in &mut process.inputs {
        port.channels = channels
            .iter()
            .filter(|c| c.dst.process == process.name && c.dst.port == port.name)
            .map(|c| c.id)
            .collect();
    }
    for port in &mut process.outputs {
        port.channels = channels
            .iter()
            .filter(|c| c.src.process == process.name && c.src.port == port.name)
            .map(|c| c.id)
            .collect();
    }

    process
}

fn malformed(process: &ProcessInfo, reason: String) -> ExportError {
    ExportError::Malformed {
        process: process.name.clone(),
        kind: process.kind.clone(),
        reason,
    }
}
