//! Present/absent events.
//!
//! Channels of the synchronous, discrete-time and discrete-event models of
//! computation carry [`Event`]s rather than plain values: at any instant a
//! signal either holds a payload or is explicitly *absent*. Absence is an
//! ordinary value and is never coerced into a payload behind the user's back;
//! only the firing rules of each model decide how it propagates.
//!
//! The discrete-event model additionally stamps each event with the time at
//! which it occurs, see [`Tagged`].
//!
//! # Examples
//!
//! ```
//! use mocsim::event::{from_event, Event};
//!
//! let sample = Event::Present(3);
//! let missing: Event<i32> = Event::Absent;
//!
//! assert_eq!(from_event(sample, 0), 3);
//! assert_eq!(from_event(missing, 0), 0);
//! assert_eq!(sample.map(|v| v * 2), Event::Present(6));
//! assert!(missing.map(|v| v * 2).is_absent());
//! ```
use std::fmt;

use crate::time::{self, MonotonicTime};

/// A value that is either present or explicitly absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event<T> {
    /// No value at this instant.
    Absent,
    /// A value is present.
    Present(T),
}

impl<T> Event<T> {
    /// Returns `true` if the event carries a value.
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Returns `true` if the event is absent.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns a reference to the payload, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }

    /// Converts from `&Event<T>` to `Event<&T>`.
    pub fn as_ref(&self) -> Event<&T> {
        match self {
            Self::Present(value) => Event::Present(value),
            Self::Absent => Event::Absent,
        }
    }

    /// Returns the payload or the provided default if the event is absent.
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Present(value) => value,
            Self::Absent => default,
        }
    }

    /// Maps the payload with the provided closure, leaving absent events
    /// untouched.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Event<U> {
        match self {
            Self::Present(value) => Event::Present(f(value)),
            Self::Absent => Event::Absent,
        }
    }

    /// Converts the event into an `Option`.
    pub fn into_option(self) -> Option<T> {
        self.into()
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> From<Option<T>> for Event<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Present(value),
            None => Self::Absent,
        }
    }
}

impl<T> From<Event<T>> for Option<T> {
    fn from(event: Event<T>) -> Self {
        match event {
            Event::Present(value) => Some(value),
            Event::Absent => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present(value) => value.fmt(f),
            Self::Absent => f.write_str("⊥"),
        }
    }
}

/// Returns the payload of an event or `default` if the event is absent.
pub fn from_event<T>(event: Event<T>, default: T) -> T {
    event.unwrap_or(default)
}

/// An event stamped with the simulation time at which it occurs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tagged<T> {
    /// Time stamp.
    pub time: MonotonicTime,
    /// Value, possibly absent.
    pub value: Event<T>,
}

impl<T> Tagged<T> {
    /// Creates a present event at the specified time.
    pub fn new(time: MonotonicTime, value: T) -> Self {
        Self {
            time,
            value: Event::Present(value),
        }
    }

    /// Creates an absent event at the specified time.
    pub fn absent(time: MonotonicTime) -> Self {
        Self {
            time,
            value: Event::Absent,
        }
    }

    /// Maps the payload, keeping the time stamp.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Tagged<U> {
        Tagged {
            time: self.time,
            value: self.value.map(f),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Tagged<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {})", time::since_epoch(self.time), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_absent_is_never_coerced() {
        let absent: Event<u8> = Event::default();

        assert!(absent.is_absent());
        assert_eq!(absent.value(), None);
        assert_eq!(absent.map(|v| v + 1), Event::Absent);
        assert_eq!(from_event(absent, 7), 7);
    }

    #[test]
    fn event_option_conversions() {
        assert_eq!(Event::from(Some(3)), Event::Present(3));
        assert_eq!(Event::<i32>::from(None), Event::Absent);
        assert_eq!(Event::Present("a").into_option(), Some("a"));
    }

    #[test]
    fn tagged_map_keeps_time() {
        let t = MonotonicTime::EPOCH + std::time::Duration::from_secs(2);
        let e = Tagged::new(t, 4).map(|v| v * 10);

        assert_eq!(e.time, t);
        assert_eq!(e.value, Event::Present(40));
        assert!(Tagged::<i32>::absent(t).value.is_absent());
    }
}
