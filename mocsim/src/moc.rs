//! Process constructors.
//!
//! Each submodule gathers the constructors of one model of computation:
//!
//! | Module   | Channel payload            | Firing rule                                     |
//! |----------|----------------------------|-------------------------------------------------|
//! | [`sy`]   | [`Event<T>`]               | one event per port and per logical instant      |
//! | [`sdf`]  | `T`                        | fixed number of tokens per port and activation  |
//! | [`de`]   | [`Tagged<T>`]              | events ordered by time stamp                    |
//! | [`dt`]   | [`Event<T>`]               | one event per port and per tick                 |
//! | [`ct`]   | [`SubSignal<T>`]           | piecewise functions over half-open intervals    |
//! | [`sadf`] | `T`                        | scenario-dependent number of tokens             |
//!
//! A constructor binds the ports of a new process to the signals it is given
//! and registers the process with the [`Network`]. Input ports are named
//! `iport1`, `iport2`, ... and output ports `oport1`, `oport2`, ... in the
//! order of the signal arguments.
//!
//! Processes of different models can be connected as long as the channel
//! payload types agree; conversion between models is the responsibility of
//! dedicated processes such as [`de::hold`].
//!
//! [`Event<T>`]: crate::event::Event
//! [`Tagged<T>`]: crate::event::Tagged
//! [`SubSignal<T>`]: ct::SubSignal
pub mod ct;
pub mod de;
pub mod dt;
pub mod sadf;
pub mod sdf;
pub mod sy;

use std::mem;

use tracing::debug;

use crate::network::{ElaborationError, Network, Signal};
use crate::process::{
    Argument, InPort, OutPort, PhaseFuture, PortInfo, Process, ProcessError, TypeTag,
};

/// Returns the name of the input port with the specified 0-based index.
pub(crate) fn iport(index: usize) -> String {
    format!("iport{}", index + 1)
}

/// Returns the name of the output port with the specified 0-based index.
pub(crate) fn oport(index: usize) -> String {
    format!("oport{}", index + 1)
}

/// Replicates each input token to all outputs.
struct Fanout<T> {
    kind: &'static str,
    input: InPort<T>,
    output: OutPort<T>,
    token: Option<T>,
}

impl<T: Clone + Send + 'static> Process for Fanout<T> {
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
            self.token = Some(self.input.read().await?);

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(token) = self.token.take() {
                self.output.write(token).await?;
            }

            Ok(())
        })
    }
}

pub(crate) fn fanout<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    kind: &'static str,
    input: &Signal<T>,
    outputs: &[&Signal<T>],
) -> Result<(), ElaborationError> {
    let tag = TypeTag::of::<T>();
    let input = net.in_port(input, &iport(0), 1, tag)?;
    let output = net.out_port(outputs, &oport(0), 1, tag)?;

    net.add_process(
        name,
        Fanout {
            kind,
            input,
            output,
            token: None,
        },
    )
}

/// Hands each input token to a user callback.
struct Sink<T, F> {
    kind: &'static str,
    input: InPort<T>,
    func: F,
    token: Option<T>,
}

impl<T, F> Process for Sink<T, F>
where
    T: Send + 'static,
    F: FnMut(&T) + Send + 'static,
{
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        Vec::new()
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.token = Some(self.input.read().await?);

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        if let Some(token) = &self.token {
            (self.func)(token);
        }

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

pub(crate) fn sink<T, F>(
    net: &mut Network,
    name: &str,
    kind: &'static str,
    func: F,
    input: &Signal<T>,
) -> Result<(), ElaborationError>
where
    T: Send + 'static,
    F: FnMut(&T) + Send + 'static,
{
    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<T>())?;

    net.add_process(
        name,
        Sink {
            kind,
            input,
            func,
            token: None,
        },
    )
}

/// Emits the successive states of a generator function.
///
/// The first emitted token is the initial state. With a `take` count the
/// source completes after that many tokens.
struct Source<T, G> {
    kind: &'static str,
    output: OutPort<T>,
    generator: G,
    state: T,
    remaining: Option<usize>,
    token: Option<T>,
}

impl<T, G> Process for Source<T, G>
where
    T: Clone + Send + 'static,
    G: FnMut(&T) -> T + Send + 'static,
{
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn inputs(&self) -> Vec<PortInfo> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        let exhausted = self.remaining == Some(0);

        Box::pin(async move {
            if exhausted {
                return Err(ProcessError::Exhausted);
            }

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        if let Some(remaining) = &mut self.remaining {
            *remaining -= 1;
        }
        let next = (self.generator)(&self.state);
        self.token = Some(mem::replace(&mut self.state, next));

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(token) = self.token.take() {
                self.output.write(token).await?;
            }

            Ok(())
        })
    }
}

pub(crate) fn source<T, G>(
    net: &mut Network,
    name: &str,
    kind: &'static str,
    generator: G,
    init: T,
    take: Option<usize>,
    output: &Signal<T>,
) -> Result<(), ElaborationError>
where
    T: Clone + Send + 'static,
    G: FnMut(&T) -> T + Send + 'static,
{
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<T>())?;

    net.add_process(
        name,
        Source {
            kind,
            output,
            generator,
            state: init,
            remaining: take,
            token: None,
        },
    )
}

/// Emits the tokens of a vector, one per activation.
struct VSource<T> {
    kind: &'static str,
    output: OutPort<T>,
    tokens: std::vec::IntoIter<T>,
    token: Option<T>,
}

impl<T: Clone + Send + 'static> Process for VSource<T> {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn inputs(&self) -> Vec<PortInfo> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        let exhausted = self.tokens.as_slice().is_empty();

        Box::pin(async move {
            if exhausted {
                return Err(ProcessError::Exhausted);
            }

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        self.token = self.tokens.next();

        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(token) = self.token.take() {
                self.output.write(token).await?;
            }

            Ok(())
        })
    }
}

pub(crate) fn vsource<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    kind: &'static str,
    tokens: Vec<T>,
    output: &Signal<T>,
) -> Result<(), ElaborationError> {
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<T>())?;

    net.add_process(
        name,
        VSource {
            kind,
            output,
            tokens: tokens.into_iter(),
            token: None,
        },
    )
}

/// Emits initial tokens and then copies its input to its output.
struct Delay<T> {
    kind: &'static str,
    input: InPort<T>,
    output: OutPort<T>,
    initial: Vec<T>,
    arguments: Vec<Argument>,
    token: Option<T>,
}

impl<T: Clone + Send + 'static> Process for Delay<T> {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn inputs(&self) -> Vec<PortInfo> {
        vec![self.input.info()]
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn arguments(&self) -> Vec<Argument> {
        self.arguments.clone()
    }

    fn init(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            let initial = mem::take(&mut self.initial);
            debug!(count = initial.len(), "emitting initial tokens");

            self.output.write_all(initial).await
        })
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.token = Some(self.input.read().await?);

            Ok(())
        })
    }

    fn exec(&mut self) -> Result<(), ProcessError> {
        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(token) = self.token.take() {
                self.output.write(token).await?;
            }

            Ok(())
        })
    }
}

/// Builds a delay emitting `count` copies of `init`.
///
/// The count is published as argument `n` when `publish_count` is set.
#[allow(clippy::too_many_arguments)]
pub(crate) fn delay<T: Clone + Send + 'static>(
    net: &mut Network,
    name: &str,
    kind: &'static str,
    init: T,
    count: usize,
    publish_count: bool,
    input: &Signal<T>,
    output: &Signal<T>,
) -> Result<(), ElaborationError> {
    let tag = TypeTag::of::<T>();
    let input = net.in_port(input, &iport(0), 1, tag)?;
    let output = net.out_port(&[output], &oport(0), 1, tag)?;
    let arguments = if publish_count {
        vec![Argument::new("n", count)]
    } else {
        Vec::new()
    };

    net.add_process(
        name,
        Delay {
            kind,
            input,
            output,
            initial: vec![init; count],
            arguments,
            token: None,
        },
    )
}

/// Checks that a list of signals has the expected arity.
pub(crate) fn check_arity(
    process: &str,
    expected: usize,
    found: usize,
) -> Result<(), ElaborationError> {
    if expected != found {
        return Err(ElaborationError::ArityMismatch {
            process: process.to_string(),
            expected,
            found,
        });
    }

    Ok(())
}

/// Checks that a rate-based port has a non-zero rate.
pub(crate) fn check_rate(process: &str, port: &str, rate: usize) -> Result<(), ElaborationError> {
    if rate == 0 {
        return Err(ElaborationError::ZeroRate {
            process: process.to_string(),
            port: port.to_string(),
        });
    }

    Ok(())
}
