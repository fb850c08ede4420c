use crate::time::{Duration, Time};

/// A single offset measurement as produced by the slave logic.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Measurement {
    /// Time this measurement was made.
    pub event_time: Time,
    /// Offset to the remote master.
    pub master_offset: Duration,
}
