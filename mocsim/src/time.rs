//! Simulation time.
//!
//! Time stamps of the discrete-event model and interval bounds of the
//! continuous-time model are expressed with [`MonotonicTime`], a monotonic
//! timestamp based on the [TAI] time standard. By convention a process network
//! starts at [`MonotonicTime::EPOCH`], so the initial value emitted by a
//! discrete-event delay is stamped with the epoch.
//!
//! The discrete-time model counts logical ticks with [`Tick`].
//!
//! [TAI]: https://en.wikipedia.org/wiki/International_Atomic_Time

use std::time::Duration;

pub use tai_time::MonotonicTime;

/// Index of a discrete-time slot.
pub type Tick = u64;

/// Returns the time elapsed since [`MonotonicTime::EPOCH`].
///
/// Times preceding the epoch saturate to zero.
pub fn since_epoch(time: MonotonicTime) -> Duration {
    let delta_secs = time.as_secs() - MonotonicTime::EPOCH.as_secs();
    if delta_secs < 0 {
        return Duration::ZERO;
    }

    Duration::new(delta_secs as u64, time.subsec_nanos())
}

/// Returns the time stamp lying `offset` after [`MonotonicTime::EPOCH`].
pub fn at(offset: Duration) -> MonotonicTime {
    MonotonicTime::EPOCH + offset
}

/// Returns the time stamp lying `offset` before `time`, saturating at
/// [`MonotonicTime::EPOCH`].
pub fn saturating_sub(time: MonotonicTime, offset: Duration) -> MonotonicTime {
    at(since_epoch(time).saturating_sub(offset))
}
