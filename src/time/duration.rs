use core::{
    fmt::Display,
    ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign},
};

use fixed::{
    traits::{LossyInto, ToFixed},
    types::I96F32,
};

use super::Interval;
use crate::datastructures::common::TimeInterval;

/// A signed span of time.
///
/// The difference between two [`Time`](super::Time) values is a duration,
/// and a time plus a duration is another time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Duration {
    /// Nanoseconds
    inner: I96F32,
}

impl Duration {
    pub const ZERO: Duration = Duration {
        inner: I96F32::ZERO,
    };

    /// Create an instance with the given amount of seconds
    pub fn from_secs(secs: i64) -> Self {
        let inner = secs.to_fixed::<I96F32>() * 1_000_000_000.to_fixed::<I96F32>();
        Self { inner }
    }

    /// Create an instance with the given amount of milliseconds
    pub fn from_millis(millis: i64) -> Self {
        let inner = millis.to_fixed::<I96F32>() * 1_000_000.to_fixed::<I96F32>();
        Self { inner }
    }

    /// Create an instance with the given amount of microseconds
    pub fn from_micros(micros: i64) -> Self {
        let inner = micros.to_fixed::<I96F32>() * 1_000.to_fixed::<I96F32>();
        Self { inner }
    }

    /// Create an instance with the given amount of nanoseconds
    pub fn from_nanos(nanos: i64) -> Self {
        Self {
            inner: nanos.to_fixed::<I96F32>(),
        }
    }

    /// Create an instance from a fixed point nanosecond count, so
    /// subnanoseconds can be represented as well
    pub fn from_fixed_nanos<F: ToFixed>(nanos: F) -> Self {
        Self {
            inner: nanos.to_fixed(),
        }
    }

    /// Converts a log message interval to the duration it denotes
    pub fn from_log_interval(log_interval: i8) -> Self {
        Self::from_interval(Interval::from_log_2(log_interval))
    }

    /// Converts an [`Interval`] to a duration
    pub fn from_interval(interval: Interval) -> Self {
        let nanos = interval.seconds() * 1_000_000_000.0;
        Self::from_fixed_nanos(nanos)
    }

    /// The total amount of nanoseconds
    pub fn nanos(&self) -> I96F32 {
        self.inner
    }

    /// The total amount of nanoseconds, losing the sub-nanosecond part
    pub fn nanos_lossy(&self) -> f64 {
        self.inner.lossy_into()
    }

    /// The total amount of whole seconds
    pub fn secs(&self) -> i64 {
        (self.inner / 1_000_000_000.to_fixed::<I96F32>()).to_num()
    }

    /// The absolute (non-negative) value of the duration
    pub fn abs(self) -> Duration {
        Duration::from_fixed_nanos(self.inner.abs())
    }
}

impl From<TimeInterval> for Duration {
    fn from(interval: TimeInterval) -> Self {
        Self::from_fixed_nanos(interval.0)
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Self::Output {
        Self::from_fixed_nanos(-self.inner)
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Self::Output {
        Duration {
            inner: self.inner + rhs.inner,
        }
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Self::Output {
        self + -rhs
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl<TF: ToFixed> Mul<TF> for Duration {
    type Output = Duration;

    fn mul(self, rhs: TF) -> Self::Output {
        Duration::from_fixed_nanos(self.inner * rhs.to_fixed::<I96F32>())
    }
}

impl<TF: ToFixed> MulAssign<TF> for Duration {
    fn mul_assign(&mut self, rhs: TF) {
        *self = *self * rhs;
    }
}

impl<TF: ToFixed> Div<TF> for Duration {
    type Output = Duration;

    fn div(self, rhs: TF) -> Self::Output {
        Duration::from_fixed_nanos(self.inner / rhs.to_fixed::<I96F32>())
    }
}

impl<TF: ToFixed> DivAssign<TF> for Duration {
    fn div_assign(&mut self, rhs: TF) {
        *self = *self / rhs;
    }
}

impl Display for Duration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values() {
        assert_eq!(Duration::from_secs(10).nanos(), 10_000_000_000i64);
        assert_eq!(Duration::from_secs(-10).nanos(), -10_000_000_000i64);
        assert_eq!(Duration::from_millis(10).nanos(), 10_000_000i64);
        assert_eq!(Duration::from_micros(10).nanos(), 10_000i64);
        assert_eq!(Duration::from_nanos(10).nanos(), 10i64);
        assert_eq!(Duration::from_secs(10).secs(), 10);
        assert_eq!(Duration::from_millis(1001).secs(), 1);
    }

    #[test]
    fn log_interval() {
        assert_eq!(Duration::from_log_interval(0), Duration::from_secs(1));
        assert_eq!(Duration::from_log_interval(-1), Duration::from_millis(500));
        assert_eq!(Duration::from_log_interval(1), Duration::from_secs(2));
    }

    #[test]
    fn interval_conversion() {
        assert_eq!(
            Duration::from_fixed_nanos(2.25f64),
            Duration::from(TimeInterval(2.25f64.to_fixed()))
        );
        assert_eq!(
            TimeInterval(2.25f64.to_fixed()),
            Duration::from_fixed_nanos(2.25f64).into()
        );
    }

    #[test]
    fn scaling() {
        let d = Duration::from_nanos(1000);
        assert_eq!(d * 2, Duration::from_nanos(2000));
        assert_eq!(d * 1.5f64, Duration::from_nanos(1500));
        assert_eq!(d / 2, Duration::from_nanos(500));
    }
}
