use crate::datastructures::common::{ClockIdentity, ClockQuality, PortIdentity};

/// What the instance knows about its current parent (the clock one hop
/// upstream) and the grandmaster behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentDS {
    pub parent_port_identity: PortIdentity,
    pub grandmaster_identity: ClockIdentity,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority_1: u8,
    pub grandmaster_priority_2: u8,
    /// The accumulated rate offset between the grandmaster and this node,
    /// in units of 2^-41, as carried in the follow-up information TLV.
    pub cumulative_rate_ratio: i32,
    /// The sync rate the upstream master currently advertises; refreshed
    /// from every Sync taken in on the slave port.
    pub parent_log_sync_interval: i8,
}

impl Default for ParentDS {
    fn default() -> Self {
        Self {
            parent_port_identity: PortIdentity::default(),
            grandmaster_identity: ClockIdentity::default(),
            grandmaster_clock_quality: ClockQuality::default(),
            grandmaster_priority_1: 128,
            grandmaster_priority_2: 128,
            cumulative_rate_ratio: 0,
            parent_log_sync_interval: 0,
        }
    }
}
