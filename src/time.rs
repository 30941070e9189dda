//! Logical time.
//!
//! [`Time`] is a totally-ordered nanosecond timestamp shared by every node in a
//! [`Graph`](crate::graph::Graph). It doubles as wall-clock time (nanos since the unix
//! epoch) in [`RunMode::RealTime`](crate::engine::RunMode::RealTime) and as a purely
//! logical counter in [`RunMode::Simulation`](crate::engine::RunMode::Simulation).

use derive_more::Display;
use derive_new::new;
use once_cell::sync::Lazy;
use quanta::Clock;
use std::ops::{Add, Sub};
use std::time::Duration;

type Raw = u64;

static CLOCK: Lazy<Clock> = Lazy::new(Clock::new);

/// A point in logical time, measured in nanoseconds since the unix epoch.
#[derive(new, Display, Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Time(Raw);

impl Time {
    /// Before any real time could have occurred; the sentinel for "never set".
    pub const MIN_DT: Self = Self(0);
    /// Never; the sentinel used for "no wakeup scheduled".
    pub const MAX_DT: Self = Self(Raw::MAX);
    /// The smallest representable forward step, used to nudge a time strictly forward.
    pub const MIN_TD: Self = Self(1);
    pub const ZERO: Self = Self(0);

    pub fn now() -> Self {
        Self(CLOCK.now().as_u64())
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn pretty(&self) -> String {
        format!("{:.6}", self.0 as f64 * 1e-9)
    }
}

impl From<u64> for Time {
    fn from(t: u64) -> Self {
        Time(t)
    }
}

impl From<Duration> for Time {
    fn from(dur: Duration) -> Self {
        Self(dur.as_nanos() as Raw)
    }
}

impl From<Time> for Duration {
    fn from(t: Time) -> Self {
        Duration::from_nanos(t.0)
    }
}

impl Add<Time> for Time {
    type Output = Self;
    fn add(self, other: Self) -> Self::Output {
        Self(self.0 + other.0)
    }
}

impl Add<Duration> for Time {
    type Output = Self;
    fn add(self, other: Duration) -> Self::Output {
        Self(self.0 + other.as_nanos() as Raw)
    }
}

impl Sub<Time> for Time {
    type Output = Self;
    fn sub(self, other: Self) -> Self::Output {
        Self(self.0.saturating_sub(other.0))
    }
}
