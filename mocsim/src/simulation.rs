//! Process network execution.
//!
//! A [`Simulation`] is obtained by [elaborating](crate::network::Network::elaborate)
//! a network. Each leaf process then runs as an independent sequential
//! activity driven through its lifecycle:
//!
//! 1. [`init`](crate::process::Process::init), once,
//! 2. [`prep`](crate::process::Process::prep),
//!    [`exec`](crate::process::Process::exec) and
//!    [`prod`](crate::process::Process::prod), repeatedly,
//! 3. [`clean`](crate::process::Process::clean), once, on controlled
//!    shutdown.
//!
//! Processes are multiplexed over the calling thread. Their only
//! synchronization is the blocking of reads on empty channels and of writes on
//! full channels, so a call to [`Simulation::run`] returns once every process
//! is blocked, i.e. when the network has stalled. A stall is the regular end
//! of a simulation whose sources are finite.
//!
//! # Stopping a simulation
//!
//! A [`StopHandle`] can request all processes to stop at the end of their
//! current activation, even from another thread. Processes blocked waiting for
//! inputs are released as well, and the request takes effect on the next call
//! to [`Simulation::run`]. [`Simulation::shutdown`] additionally closes all
//! channels, so that processes blocked on writes are released and every
//! started process is finalized exactly once.
//!
//! # Failures
//!
//! A process whose activation fails, e.g. because an output batch does not
//! match the declared rate, stops firing and the failure is reported by the
//! next call to [`Simulation::run`].
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_executor::LocalPool;
use futures_util::future::{self, Either};
use futures_util::pin_mut;
use futures_util::task::LocalSpawnExt;
use tracing::{debug, error, info, info_span, Instrument};

use crate::channel::Close;
use crate::network::info::NetworkInfo;
use crate::process::{Process, ProcessError};

/// A process failure.
type Failures = Arc<Mutex<Vec<(String, ProcessError)>>>;

/// An elaborated, runnable process network.
pub struct Simulation {
    info: NetworkInfo,
    pool: LocalPool,
    pending: Vec<(String, Box<dyn Process>)>,
    closers: Vec<Arc<dyn Close>>,
    stop: StopSignal,
    budget: Budget,
    failures: Failures,
    active: Arc<AtomicUsize>,
}

impl Simulation {
    /// Creates a new `Simulation`.
    pub(crate) fn new(
        info: NetworkInfo,
        processes: Vec<(String, Box<dyn Process>)>,
        closers: Vec<Arc<dyn Close>>,
    ) -> Self {
        Self {
            info,
            pool: LocalPool::new(),
            pending: processes,
            closers,
            stop: StopSignal::new(),
            budget: Budget::new(),
            failures: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the introspection records collected at elaboration.
    pub fn info(&self) -> &NetworkInfo {
        &self.info
    }

    /// Returns a handle that can request all processes to stop.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            signal: self.stop.clone(),
        }
    }

    /// Returns the number of processes that have not been finalized yet.
    pub fn active_processes(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Runs all processes until the network stalls.
    ///
    /// The first call initializes every process. Subsequent calls resume a
    /// stalled network, which is only useful if its state was changed from
    /// outside, e.g. by a transport adapter.
    pub fn run(&mut self) -> Result<(), SimulationError> {
        self.budget.set(Budget::UNLIMITED);
        self.spawn_pending()?;
        self.pool.run_until_stalled();

        info!(
            target: "mocsim",
            network = %self.info.name,
            active = self.active_processes(),
            "network stalled"
        );

        self.take_failure()
    }

    /// Runs at most `max_steps` activations, all processes combined, and
    /// returns `true` if the network stalled, i.e. if no process ready to
    /// fire is held back by the exhausted budget.
    ///
    /// This makes it possible to advance networks with unbounded sources.
    pub fn run_steps(&mut self, max_steps: u64) -> Result<bool, SimulationError> {
        self.budget.set(max_steps);
        self.spawn_pending()?;
        self.pool.run_until_stalled();
        self.take_failure()?;

        Ok(self.budget.waiting() == 0)
    }

    /// Stops all processes, finalizing each of them exactly once.
    ///
    /// Processes that were never run are dropped without being initialized
    /// nor finalized.
    pub fn shutdown(mut self) -> Result<(), SimulationError> {
        self.stop.set();
        self.budget.set(Budget::UNLIMITED);
        for closer in &self.closers {
            closer.close();
        }
        self.pending.clear();
        self.pool.run_until_stalled();

        info!(
            target: "mocsim",
            network = %self.info.name,
            "network shut down"
        );

        self.take_failure()
    }

    fn spawn_pending(&mut self) -> Result<(), SimulationError> {
        let spawner = self.pool.spawner();
        for (name, process) in self.pending.drain(..) {
            let span = info_span!(target: "mocsim", "process", name = %name);
            let driver = drive(
                name,
                process,
                self.stop.clone(),
                self.budget.clone(),
                self.failures.clone(),
                self.active.clone(),
            );
            spawner
                .spawn_local(driver.instrument(span))
                .map_err(|e| SimulationError::Spawn(e.to_string()))?;
        }

        Ok(())
    }

    fn take_failure(&self) -> Result<(), SimulationError> {
        let mut failures = self.failures.lock().unwrap();
        if failures.is_empty() {
            return Ok(());
        }
        let (process, error) = failures.remove(0);

        Err(SimulationError::ProcessFailed { process, error })
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("network", &self.info.name)
            .field("active", &self.active_processes())
            .finish_non_exhaustive()
    }
}

/// Drives a process through its lifecycle.
async fn drive(
    name: String,
    mut process: Box<dyn Process>,
    stop: StopSignal,
    budget: Budget,
    failures: Failures,
    active: Arc<AtomicUsize>,
) {
    active.fetch_add(1, Ordering::Relaxed);

    match activate(process.as_mut(), &stop, &budget).await {
        None => debug!("stop requested"),
        Some(ProcessError::Exhausted) => debug!("activity completed"),
        Some(ProcessError::Disconnected(channel)) => debug!(%channel, "channel closed"),
        Some(error) => {
            error!(%error, "process failed");
            failures.lock().unwrap().push((name, error));
        }
    }

    // A process that has ended keeps its ports, and thus its channels, open
    // until the simulation stops.
    stop.wait().await;
    process.clean();

    active.fetch_sub(1, Ordering::Relaxed);
}

/// Runs the init phase and then activations until an error occurs or a stop
/// is requested.
///
/// A process waiting for its inputs or for the activation budget is released
/// by a stop request; a process that has started its exec phase completes its
/// activation.
async fn activate(
    process: &mut dyn Process,
    stop: &StopSignal,
    budget: &Budget,
) -> Option<ProcessError> {
    if let Err(error) = process.init().await {
        return Some(error);
    }

    let mut activation: u64 = 0;
    loop {
        if stop.is_set() {
            return None;
        }
        if let Err(error) = unless_stopped(process.prep(), stop).await? {
            return Some(error);
        }
        unless_stopped(budget.acquire(), stop).await?;
        if let Err(error) = process.exec() {
            return Some(error);
        }
        if let Err(error) = process.prod().await {
            return Some(error);
        }

        activation += 1;
        debug!(activation, "activation completed");
    }
}

/// Awaits a future, or returns `None` if a stop is requested first.
async fn unless_stopped<F: Future>(fut: F, stop: &StopSignal) -> Option<F::Output> {
    let stopped = stop.wait();
    pin_mut!(fut, stopped);

    match future::select(fut, stopped).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(_) => None,
    }
}

/// Signal requesting processes to stop.
#[derive(Clone)]
pub(crate) struct StopSignal {
    inner: Arc<StopInner>,
}

struct StopInner {
    is_set: AtomicBool,
    event: async_event::Event,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(StopInner {
                is_set: AtomicBool::new(false),
                event: async_event::Event::new(),
            }),
        }
    }

    pub(crate) fn set(&self) {
        self.inner.is_set.store(true, Ordering::Release);
        self.inner.event.notify_all();
    }

    pub(crate) fn is_set(&self) -> bool {
        self.inner.is_set.load(Ordering::Acquire)
    }

    pub(crate) async fn wait(&self) {
        self.inner
            .event
            .wait_until(|| self.is_set().then_some(()))
            .await
    }
}

/// Number of activations processes may still start.
#[derive(Clone)]
pub(crate) struct Budget {
    inner: Arc<BudgetInner>,
}

struct BudgetInner {
    remaining: AtomicU64,
    /// Number of processes blocked on an exhausted budget.
    waiting: AtomicUsize,
    event: async_event::Event,
}

impl Budget {
    pub(crate) const UNLIMITED: u64 = u64::MAX;

    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(BudgetInner {
                remaining: AtomicU64::new(Self::UNLIMITED),
                waiting: AtomicUsize::new(0),
                event: async_event::Event::new(),
            }),
        }
    }

    pub(crate) fn set(&self, activations: u64) {
        self.inner.remaining.store(activations, Ordering::Release);
        self.inner.event.notify_all();
    }

    pub(crate) fn waiting(&self) -> usize {
        self.inner.waiting.load(Ordering::Acquire)
    }

    /// Waits until one activation can be taken from the budget.
    pub(crate) async fn acquire(&self) {
        if self.try_take().is_some() {
            return;
        }

        let _waiting = WaitingGuard::new(&self.inner.waiting);
        self.inner.event.wait_until(|| self.try_take()).await
    }

    fn try_take(&self) -> Option<()> {
        self.inner
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
                match remaining {
                    0 => None,
                    Self::UNLIMITED => Some(Self::UNLIMITED),
                    remaining => Some(remaining - 1),
                }
            })
            .ok()
            .map(|_| ())
    }
}

/// Counts a process as blocked on the budget for as long as it lives.
struct WaitingGuard<'a> {
    waiting: &'a AtomicUsize,
}

impl<'a> WaitingGuard<'a> {
    fn new(waiting: &'a AtomicUsize) -> Self {
        waiting.fetch_add(1, Ordering::AcqRel);

        Self { waiting }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A handle requesting all processes of a simulation to stop.
///
/// Processes stop at the end of their current activation, or as soon as they
/// are blocked waiting for inputs. The handle can be sent to and used from
/// another thread.
#[derive(Clone)]
pub struct StopHandle {
    signal: StopSignal,
}

impl StopHandle {
    /// Requests all processes to stop.
    pub fn stop(&self) {
        self.signal.set();
    }

    /// Returns `true` if a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.signal.is_set()
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("is_stopped", &self.is_stopped())
            .finish()
    }
}

/// Error returned by a simulation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulationError {
    /// A process could not be spawned.
    Spawn(String),
    /// A process failed during an activation.
    ProcessFailed {
        /// Hierarchical name of the process.
        process: String,
        /// Cause of the failure.
        error: ProcessError,
    },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(reason) => write!(fmt, "a process could not be spawned: {reason}"),
            Self::ProcessFailed { process, error } => {
                write!(fmt, "process '{process}' failed: {error}")
            }
        }
    }
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(_) => None,
            Self::ProcessFailed { error, .. } => Some(error),
        }
    }
}
