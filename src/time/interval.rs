/// A message rate as the wire carries it: log base 2 of the period in
/// seconds.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Interval(i8);

impl core::fmt::Debug for Interval {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Interval")
            .field("seconds", &self.seconds())
            .field("log_base_2", &self.0)
            .finish()
    }
}

impl Interval {
    pub const ONE_SECOND: Self = Self(0);
    pub const TWO_SECONDS: Self = Self(1);

    /// The sentinel carried in a message-interval request when the field
    /// is to stay unchanged.
    pub const UNCHANGED: i8 = -128;
    /// The sentinel that selects the configured initial value.
    pub const INITIAL: i8 = 126;
    /// The sentinel that disables transmission entirely.
    pub const STOPPED: i8 = 127;

    pub const fn from_log_2(log_2: i8) -> Self {
        Self(log_2)
    }

    pub fn seconds(self) -> f64 {
        2.0f64.powi(self.0 as i32)
    }

    pub fn as_duration(self) -> super::Duration {
        super::Duration::from_interval(self)
    }

    pub fn as_core_duration(self) -> core::time::Duration {
        core::time::Duration::from_secs_f64(self.seconds())
    }

    pub fn as_log_2(self) -> i8 {
        self.0
    }
}

impl From<i8> for Interval {
    fn from(value: i8) -> Self {
        Self::from_log_2(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two() {
        assert_eq!(Interval::TWO_SECONDS.seconds(), 2.0f64)
    }

    #[test]
    fn half() {
        assert_eq!(Interval::from_log_2(-1).seconds(), 0.5f64)
    }
}
