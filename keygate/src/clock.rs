//! Time sources for expiry decisions
//!
//! Validation logic never consults the wall clock directly; it asks a
//! [`Clock`]. Production callers use [`System`], tests use [`TestClock`].

use std::time::SystemTime;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seconds elapsed since the Unix epoch (1970-01-01T00:00:00Z)
///
/// Serializes as a bare integer, the form used by `iat` and `exp` claims.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct UnixTime(pub u64);

impl From<SystemTime> for UnixTime {
    #[inline]
    fn from(t: SystemTime) -> Self {
        let secs = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("times before the Unix epoch are not expected")
            .as_secs();

        UnixTime(secs)
    }
}

impl Serialize for UnixTime {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UnixTime {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(u64::deserialize(deserializer)?))
    }
}

/// A source of the current time
pub trait Clock {
    /// The current time according to this clock
    fn now(&self) -> UnixTime;
}

/// The system wall clock, backed by `std::time::SystemTime`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A clock whose current time is plain state
///
/// ```
/// use keygate::clock::{Clock, TestClock, UnixTime};
///
/// let mut clock = TestClock::new(UnixTime(100));
/// clock.advance(25);
/// assert_eq!(clock.now(), UnixTime(125));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TestClock(UnixTime);

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> UnixTime {
        self.0
    }
}

impl TestClock {
    /// A test clock reading the given time
    #[inline]
    pub const fn new(time: UnixTime) -> Self {
        Self(time)
    }

    /// Moves the clock to `time`
    pub fn set(&mut self, time: UnixTime) {
        self.0 = time;
    }

    /// Moves the clock forward by `secs` seconds
    pub fn advance(&mut self, secs: u64) {
        (self.0).0 += secs;
    }
}
