//! Bridges to external transports.
//!
//! A [`Transport`] is an opaque, bidirectional message link to another
//! simulation, possibly running in another thread or process. Its
//! implementation is left to the embedding application; the [`sender`] and
//! [`receiver`] processes only rely on its blocking send and receive
//! contract.
//!
//! A receiver ends gracefully when its transport reports
//! [`TransportError::Closed`], so that a simulation fed by a remote peer
//! stalls once the peer has shut down. Any other transport error fails the
//! process.
//!
//! [`loopback`] creates a pair of in-memory endpoints, which is mostly useful
//! to connect two simulations within the same program.
//!
//! # Examples
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use mocsim::moc::sdf;
//! use mocsim::network::Network;
//! use mocsim::transport;
//!
//! let (near, far) = transport::loopback(4);
//!
//! let mut producer = Network::new("producer");
//! let values = producer.signal("values");
//! sdf::vsource(&mut producer, "src", vec![1u32, 2, 3], &values).unwrap();
//! transport::sender(&mut producer, "tx", near, &values).unwrap();
//!
//! let mut consumer = Network::new("consumer");
//! let values = consumer.signal("values");
//! let received = Arc::new(Mutex::new(Vec::new()));
//! let sink_received = received.clone();
//! transport::receiver(&mut consumer, "rx", far, &values).unwrap();
//! sdf::sink(&mut consumer, "snk", move |x: &u32| sink_received.lock().unwrap().push(*x), &values)
//!     .unwrap();
//!
//! let mut producer = producer.elaborate().unwrap();
//! producer.run().unwrap();
//! producer.shutdown().unwrap();
//! consumer.elaborate().unwrap().run().unwrap();
//!
//! assert_eq!(*received.lock().unwrap(), [1, 2, 3]);
//! ```
use std::error::Error;
use std::fmt;
use std::future::{poll_fn, Future};
use std::pin::Pin;

use futures_channel::mpsc;
use futures_util::StreamExt;

use crate::moc::{iport, oport};
use crate::network::{ElaborationError, Network, Signal};
use crate::process::{InPort, OutPort, PhaseFuture, PortInfo, Process, ProcessError, TypeTag};

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, R> =
    Pin<Box<dyn Future<Output = Result<R, TransportError>> + Send + 'a>>;

/// A message link to a remote peer.
pub trait Transport<T>: Send + 'static {
    /// Sends a message, waiting until the transport accepts it.
    fn send(&mut self, item: T) -> TransportFuture<'_, ()>;

    /// Receives a message, waiting until one is available.
    fn recv(&mut self) -> TransportFuture<'_, T>;
}

/// Error returned by a transport operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The link was closed by the peer.
    Closed,
    /// The transport failed.
    Failed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => fmt.write_str("the transport link is closed"),
            Self::Failed(reason) => write!(fmt, "transport failure: {reason}"),
        }
    }
}

impl Error for TransportError {}

impl From<TransportError> for ProcessError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Closed => ProcessError::Exhausted,
            TransportError::Failed(reason) => ProcessError::Transport(reason),
        }
    }
}

struct SenderProcess<T, R> {
    input: InPort<T>,
    transport: R,
    token: Option<T>,
}

impl<T, R> Process for SenderProcess<T, R>
where
    T: Send + 'static,
    R: Transport<T>,
{
    fn kind(&self) -> &'static str {
        "IO::sender"
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
        Ok(())
    }

    fn prod(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            if let Some(token) = self.token.take() {
                self.transport.send(token).await?;
            }

            Ok(())
        })
    }
}

/// Builds a process forwarding its input to a transport.
pub fn sender<T, R>(
    net: &mut Network,
    name: &str,
    transport: R,
    input: &Signal<T>,
) -> Result<(), ElaborationError>
where
    T: Send + 'static,
    R: Transport<T>,
{
    let input = net.in_port(input, &iport(0), 1, TypeTag::of::<T>())?;

    net.add_process(
        name,
        SenderProcess {
            input,
            transport,
            token: None,
        },
    )
}

struct ReceiverProcess<T, R> {
    output: OutPort<T>,
    transport: R,
    token: Option<T>,
}

impl<T, R> Process for ReceiverProcess<T, R>
where
    T: Clone + Send + 'static,
    R: Transport<T>,
{
    fn kind(&self) -> &'static str {
        "IO::receiver"
    }

    fn inputs(&self) -> Vec<PortInfo> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PortInfo> {
        vec![self.output.info()]
    }

    fn prep(&mut self) -> PhaseFuture<'_> {
        Box::pin(async move {
            self.token = Some(self.transport.recv().await?);

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

/// Builds a process emitting the messages received from a transport.
pub fn receiver<T, R>(
    net: &mut Network,
    name: &str,
    transport: R,
    output: &Signal<T>,
) -> Result<(), ElaborationError>
where
    T: Clone + Send + 'static,
    R: Transport<T>,
{
    let output = net.out_port(&[output], &oport(0), 1, TypeTag::of::<T>())?;

    net.add_process(
        name,
        ReceiverProcess {
            output,
            transport,
            token: None,
        },
    )
}

/// An in-memory transport endpoint.
///
/// See [`loopback`].
pub struct Loopback<T> {
    sender: mpsc::Sender<T>,
    receiver: mpsc::Receiver<T>,
}

impl<T: Send + 'static> Transport<T> for Loopback<T> {
    fn send(&mut self, item: T) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            poll_fn(|cx| self.sender.poll_ready(cx))
                .await
                .map_err(|_| TransportError::Closed)?;

            self.sender
                .start_send(item)
                .map_err(|_| TransportError::Closed)
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, T> {
        Box::pin(async move { self.receiver.next().await.ok_or(TransportError::Closed) })
    }
}

impl<T> fmt::Debug for Loopback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loopback").finish_non_exhaustive()
    }
}

/// Creates two connected in-memory endpoints.
///
/// Messages sent on one endpoint are received on the other. Each direction
/// buffers at least `capacity` messages. Dropping an endpoint closes the link.
pub fn loopback<T: Send + 'static>(capacity: usize) -> (Loopback<T>, Loopback<T>) {
    let (forward_sender, forward_receiver) = mpsc::channel(capacity);
    let (backward_sender, backward_receiver) = mpsc::channel(capacity);

    (
        Loopback {
            sender: forward_sender,
            receiver: backward_receiver,
        },
        Loopback {
            sender: backward_sender,
            receiver: forward_receiver,
        },
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures_executor::block_on;

    use super::*;

    use crate::moc::sdf;
    use crate::simulation::SimulationError;

    #[test]
    fn transport_loopback_is_bidirectional() {
        let (mut a, mut b) = loopback(1);

        block_on(async {
            a.send(1u8).await.unwrap();
            b.send(2u8).await.unwrap();
            assert_eq!(b.recv().await, Ok(1));
            assert_eq!(a.recv().await, Ok(2));

            drop(b);
            assert_eq!(a.recv().await, Err(TransportError::Closed));
        });
    }

    struct Failing;

    impl Transport<u8> for Failing {
        fn send(&mut self, _: u8) -> TransportFuture<'_, ()> {
            Box::pin(async { Err(TransportError::Failed("link down".into())) })
        }

        fn recv(&mut self) -> TransportFuture<'_, u8> {
            Box::pin(async { Err(TransportError::Failed("link down".into())) })
        }
    }

    #[test]
    fn transport_failure_fails_process() {
        let mut net = Network::new("top");
        let a = net.signal("a");

        sdf::vsource(&mut net, "src", vec![1u8], &a).unwrap();
        sender(&mut net, "tx", Failing, &a).unwrap();

        assert_eq!(
            net.elaborate().unwrap().run(),
            Err(SimulationError::ProcessFailed {
                process: "tx".into(),
                error: ProcessError::Transport("link down".into())
            })
        );
    }

    #[test]
    fn transport_receiver_ends_on_closed_link() {
        let (mut near, far) = loopback(4);
        let mut net = Network::new("top");
        let a = net.signal("a");
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_received = received.clone();

        receiver(&mut net, "rx", far, &a).unwrap();
        sdf::sink(
            &mut net,
            "snk",
            move |x: &u16| sink_received.lock().unwrap().push(*x),
            &a,
        )
        .unwrap();

        block_on(async {
            near.send(7).await.unwrap();
            near.send(8).await.unwrap();
        });
        drop(near);

        let mut simu = net.elaborate().unwrap();
        simu.run().unwrap();

        assert_eq!(*received.lock().unwrap(), [7, 8]);
        assert_eq!(simu.active_processes(), 2);
    }
}
