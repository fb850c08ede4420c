use core::{
    fmt::Display,
    ops::{Add, AddAssign, Sub, SubAssign},
};

use fixed::{
    traits::{LosslessTryInto, LossyInto, ToFixed},
    types::{U112F16, U96F32},
};

use super::Duration;
use crate::datastructures::common::{TimeInterval, WireTimestamp};

/// A specific moment on the local timestamping timescale.
///
/// The zero point is whatever the hardware timestamper uses; only
/// differences between two values are meaningful to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Time {
    /// Nanoseconds since the origin
    inner: U96F32,
}

impl Time {
    /// Create an instance with the given amount of seconds from the origin
    pub fn from_secs(secs: u64) -> Self {
        let inner = secs.to_fixed::<U96F32>() * 1_000_000_000.to_fixed::<U96F32>();
        Self { inner }
    }

    /// Create an instance with the given amount of milliseconds from the origin
    pub fn from_millis(millis: u64) -> Self {
        let inner = millis.to_fixed::<U96F32>() * 1_000_000.to_fixed::<U96F32>();
        Self { inner }
    }

    /// Create an instance with the given amount of microseconds from the origin
    pub fn from_micros(micros: u64) -> Self {
        let inner = micros.to_fixed::<U96F32>() * 1_000.to_fixed::<U96F32>();
        Self { inner }
    }

    /// Create an instance with the given amount of nanoseconds from the origin
    pub fn from_nanos(nanos: u64) -> Self {
        Self {
            inner: nanos.to_fixed::<U96F32>(),
        }
    }

    /// Create an instance from a fixed point nanosecond count, so
    /// subnanoseconds can be represented as well
    pub fn from_fixed_nanos<F: ToFixed>(nanos: F) -> Self {
        Self {
            inner: nanos.to_fixed(),
        }
    }

    /// Nanoseconds since the origin
    pub fn nanos(&self) -> U96F32 {
        self.inner
    }

    /// Whole seconds since the origin
    pub fn secs(&self) -> u64 {
        (self.inner / 1_000_000_000.to_fixed::<U96F32>()).to_num()
    }

    /// The nanoseconds part below one second
    pub fn subsec_nanos(&self) -> u32 {
        (self.inner % 1_000_000_000.to_fixed::<U96F32>()).to_num()
    }

    /// The fraction below one nanosecond, as a wire correction value
    pub fn subnano(&self) -> TimeInterval {
        let inter: U112F16 = self.inner.frac().lossy_into();
        // always less than one, so the conversion cannot fail
        TimeInterval(inter.lossless_try_into().unwrap())
    }
}

impl From<WireTimestamp> for Time {
    fn from(ts: WireTimestamp) -> Self {
        Self::from_fixed_nanos(ts.seconds as i128 * 1_000_000_000i128 + ts.nanos as i128)
    }
}

impl From<Time> for WireTimestamp {
    fn from(instant: Time) -> Self {
        WireTimestamp {
            seconds: instant.secs(),
            nanos: instant.subsec_nanos(),
        }
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    fn add(self, rhs: Duration) -> Self::Output {
        if rhs.nanos().is_negative() {
            Time {
                inner: self.nanos() - rhs.nanos().unsigned_abs(),
            }
        } else {
            Time {
                inner: self.nanos() + rhs.nanos().unsigned_abs(),
            }
        }
    }
}

impl AddAssign<Duration> for Time {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Duration> for Time {
    type Output = Time;

    fn sub(self, rhs: Duration) -> Self::Output {
        self + -rhs
    }
}

impl SubAssign<Duration> for Time {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Sub for Time {
    type Output = Duration;

    fn sub(self, rhs: Time) -> Self::Output {
        Duration::from_fixed_nanos(self.inner) - Duration::from_fixed_nanos(rhs.inner)
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values() {
        assert_eq!(Time::from_secs(10).nanos(), 10_000_000_000u64);
        assert_eq!(Time::from_millis(10).nanos(), 10_000_000u64);
        assert_eq!(Time::from_micros(10).nanos(), 10_000u64);
        assert_eq!(Time::from_nanos(10).nanos(), 10u64);
        assert_eq!(Time::from_secs(10).secs(), 10);
        assert_eq!(Time::from_millis(1001).subsec_nanos(), 1_000_000);
    }

    #[test]
    fn arithmetic() {
        let base = Time::from_nanos(1000);
        assert_eq!(base + Duration::from_nanos(100), Time::from_nanos(1100));
        assert_eq!(base + Duration::from_nanos(-100), Time::from_nanos(900));
        assert_eq!(
            Time::from_nanos(1100) - base,
            Duration::from_nanos(100)
        );
        assert_eq!(base - Time::from_nanos(1100), Duration::from_nanos(-100));
    }

    #[test]
    fn wire_round_trip() {
        let ts = WireTimestamp {
            seconds: 12,
            nanos: 500,
        };
        assert_eq!(WireTimestamp::from(Time::from(ts)), ts);
    }
}
