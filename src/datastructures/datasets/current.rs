use crate::time::Duration;

/// Dynamic knowledge about the instance's place in the synchronization
/// tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentDS {
    pub steps_removed: u16,
    pub offset_from_master: Duration,
    pub mean_path_delay: Duration,
    /// True once a complete delay measurement backs the offset.
    pub delay_ok: bool,
}
