//! Bounded point-to-point channel between process ports.
//!
//! A channel is an ordered, capacity-bounded FIFO with exactly one [`Sender`]
//! and one [`Receiver`]. Sending blocks (asynchronously) while the channel is
//! full and receiving blocks while it is empty; these blocking operations are
//! the only synchronization between processes.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

use std::collections::VecDeque;
use std::error;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_event::Event;
use diatomic_waker::primitives::DiatomicWaker;

/// Data shared between the receiver and the sender.
struct Inner<T> {
    /// Buffered items.
    queue: Mutex<VecDeque<T>>,
    /// Maximum number of buffered items.
    capacity: usize,
    /// Set once the channel is closed.
    closed: AtomicBool,
    /// Number of live senders.
    senders: AtomicUsize,
    /// Number of live receivers.
    receivers: AtomicUsize,
    /// Signalling primitive used to notify the receiver.
    receiver_signal: DiatomicWaker,
    /// Signalling primitive used to notify the sender.
    sender_signal: Event,
}

impl<T> Inner<T> {
    fn close_and_notify(&self) {
        self.closed.store(true, Ordering::Release);

        // Notify the receiver and the blocked sender that the channel is
        // closed.
        self.receiver_signal.notify();
        self.sender_signal.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// The shared state of a channel, from which both endpoints are created.
pub(crate) struct Channel<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> Channel<T> {
    /// Creates a new channel with the specified capacity.
    ///
    /// # Panic
    ///
    /// The constructor will panic if the requested capacity is 0.
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "the channel capacity cannot be zero");

        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                closed: AtomicBool::new(false),
                senders: AtomicUsize::new(0),
                receivers: AtomicUsize::new(0),
                receiver_signal: DiatomicWaker::new(),
                sender_signal: Event::new(),
            }),
        }
    }

    /// Creates the sending endpoint.
    ///
    /// The network builder guarantees that at most one sender per channel is
    /// alive at any time.
    pub(crate) fn sender(&self) -> Sender<T> {
        self.inner.senders.fetch_add(1, Ordering::AcqRel);

        Sender {
            inner: self.inner.clone(),
        }
    }

    /// Creates the receiving endpoint.
    ///
    /// The network builder guarantees that at most one receiver per channel is
    /// alive at any time, which is required for the soundness of
    /// [`Receiver::recv`].
    pub(crate) fn receiver(&self) -> Receiver<T> {
        self.inner.receivers.fetch_add(1, Ordering::AcqRel);

        Receiver {
            inner: self.inner.clone(),
        }
    }

    /// Checks if a sender of this channel is alive.
    pub(crate) fn has_sender(&self) -> bool {
        self.inner.senders.load(Ordering::Acquire) != 0
    }

    /// Checks if a receiver of this channel is alive.
    pub(crate) fn has_receiver(&self) -> bool {
        self.inner.receivers.load(Ordering::Acquire) != 0
    }

    /// Returns a type-erased handle that can close the channel.
    pub(crate) fn closer(&self) -> Arc<dyn Close> {
        self.inner.clone()
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("capacity", &self.inner.capacity)
            .finish_non_exhaustive()
    }
}

/// Type-erased channel operations used during shutdown.
pub(crate) trait Close: Send + Sync {
    /// Closes the channel, waking up any blocked endpoint.
    fn close(&self);
}

impl<T: Send> Close for Inner<T> {
    fn close(&self) {
        self.close_and_notify();
    }
}

/// The receiving endpoint of a channel.
pub(crate) struct Receiver<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Receiver<T> {
    /// Receives an item, if necessary waiting until one becomes available.
    ///
    /// Items that were sent before the channel was closed can still be
    /// received; an error is returned once the channel is closed and empty.
    pub(crate) async fn recv(&mut self) -> Result<T, RecvError> {
        // Safety: a channel has a single receiver and `recv` takes `&mut
        // self`, so `wait_until` is never called concurrently.
        let item = unsafe {
            self.inner
                .receiver_signal
                .wait_until(|| {
                    let mut queue = self.inner.queue.lock().unwrap();
                    match queue.pop_front() {
                        Some(item) => Some(Some(item)),
                        None if self.inner.is_closed() => Some(None),
                        None => None,
                    }
                })
                .await
        };

        match item {
            Some(item) => {
                // Signal to the sender that one slot is available.
                self.inner.sender_signal.notify_one();

                Ok(item)
            }
            None => Err(RecvError),
        }
    }

    /// Returns the number of buffered items.
    #[allow(unused)]
    pub(crate) fn len(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        // Dropping an endpoint does not close the channel.
        self.inner.receivers.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver").finish_non_exhaustive()
    }
}

/// The sending endpoint of a channel.
pub(crate) struct Sender<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Sender<T> {
    /// Sends an item, if necessary waiting until enough capacity becomes
    /// available in the channel.
    pub(crate) async fn send(&self, item: T) -> Result<(), SendError> {
        let mut item = Some(item);

        let success = self
            .inner
            .sender_signal
            .wait_until(|| {
                if self.inner.is_closed() {
                    return Some(false);
                }
                let mut queue = self.inner.queue.lock().unwrap();
                if queue.len() < self.inner.capacity {
                    queue.push_back(item.take().unwrap());

                    Some(true)
                } else {
                    None
                }
            })
            .await;

        if success {
            self.inner.receiver_signal.notify();

            Ok(())
        } else {
            Err(SendError)
        }
    }

    /// Checks if the channel is closed.
    #[allow(unused)]
    pub(crate) fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.inner.senders.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender").finish_non_exhaustive()
    }
}

/// Unique identifier for a channel within a network.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(pub(crate) usize);

impl ChannelId {
    /// Returns the numerical value of the identifier.
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An error returned when an attempt to send an item is unsuccessful because
/// the channel is closed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct SendError;

impl error::Error for SendError {}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "sending to a closed channel".fmt(f)
    }
}

/// An error returned when an attempt to receive an item is unsuccessful
/// because the channel is closed and empty.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct RecvError;

impl error::Error for RecvError {}

impl fmt::Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "receiving from a closed channel".fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use futures_executor::{block_on, LocalPool};
    use futures_util::task::LocalSpawnExt;

    use super::*;

    #[test]
    fn channel_fifo_order() {
        let channel = Channel::new(4);
        let sender = channel.sender();
        let mut receiver = channel.receiver();

        block_on(async {
            for i in 0..4 {
                sender.send(i).await.unwrap();
            }
            for i in 0..4 {
                assert_eq!(receiver.recv().await, Ok(i));
            }
        });
    }

    #[test]
    fn channel_send_blocks_when_full() {
        let channel = Channel::new(2);
        let sender = channel.sender();
        let mut receiver = channel.receiver();
        let sent = Arc::new(AtomicUsize::new(0));

        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        let sent_count = sent.clone();
        spawner
            .spawn_local(async move {
                for i in 0..5 {
                    sender.send(i).await.unwrap();
                    sent_count.fetch_add(1, Ordering::Relaxed);
                }
            })
            .unwrap();

        // The sender stalls once the capacity is exhausted.
        pool.run_until_stalled();
        assert_eq!(sent.load(Ordering::Relaxed), 2);
        assert_eq!(receiver.len(), 2);

        // Receiving frees slots and lets the sender resume.
        assert_eq!(pool.run_until(receiver.recv()), Ok(0));
        pool.run_until_stalled();
        assert_eq!(sent.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn channel_drains_after_close() {
        let channel = Channel::new(4);
        let sender = channel.sender();
        let mut receiver = channel.receiver();

        block_on(async {
            sender.send(1).await.unwrap();
            channel.closer().close();
            assert_eq!(receiver.recv().await, Ok(1));
            assert_eq!(receiver.recv().await, Err(RecvError));
        });
    }

    #[test]
    fn channel_outlives_dropped_endpoints() {
        let channel = Channel::new(4);
        drop(channel.receiver());
        drop(channel.sender());
        assert!(!channel.has_receiver());
        assert!(!channel.has_sender());

        let sender = channel.sender();
        let mut receiver = channel.receiver();
        assert!(channel.has_receiver());
        assert!(channel.has_sender());
        block_on(async {
            sender.send(7).await.unwrap();
            assert_eq!(receiver.recv().await, Ok(7));
        });
        assert!(!sender.is_closed());
    }

    #[test]
    fn channel_close_fails_sender() {
        let channel = Channel::new(1);
        let sender = channel.sender();
        let receiver = channel.receiver();

        channel.closer().close();
        assert!(sender.is_closed());
        assert_eq!(block_on(sender.send(1)), Err(SendError));
        drop(receiver);
    }
}
