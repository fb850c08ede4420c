//! Per-port protocol state.

use core::fmt::{Display, Formatter};

use crate::config::PortConfig;
use crate::datastructures::common::PortIdentity;

mod interval;
pub(crate) mod master;
mod measurement;
mod sequence_id;
mod slave;
mod statistics;

pub use interval::MessageIntervalState;
pub(crate) use master::MasterState;
pub use measurement::Measurement;
pub(crate) use sequence_id::SequenceIdGenerator;
pub(crate) use slave::SlaveState;
pub use statistics::PortStatistics;

/// The role a port currently plays.
///
/// `Disabled` and `Faulty` are the recoverable non-operational states; the
/// transparent and front-end states are fixed by the device role and never
/// move once entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortState {
    #[default]
    Disabled,
    Initializing,
    Faulty,
    Listening,
    Passive,
    Uncalibrated,
    Slave,
    Master,
    P2pTransparent,
    E2eTransparent,
    FrontEnd,
}

impl Display for PortState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            PortState::Disabled => write!(f, "Disabled"),
            PortState::Initializing => write!(f, "Initializing"),
            PortState::Faulty => write!(f, "Faulty"),
            PortState::Listening => write!(f, "Listening"),
            PortState::Passive => write!(f, "Passive"),
            PortState::Uncalibrated => write!(f, "Uncalibrated"),
            PortState::Slave => write!(f, "Slave"),
            PortState::Master => write!(f, "Master"),
            PortState::P2pTransparent => write!(f, "P2P-Transparent"),
            PortState::E2eTransparent => write!(f, "E2E-Transparent"),
            PortState::FrontEnd => write!(f, "Front-End"),
        }
    }
}

/// One port of the clock instance.
///
/// The current state only ever changes through
/// [`BridgeClock::transition`](crate::clock::BridgeClock), so the leave
/// and enter side effects of a state change always run as a pair.
pub struct Port<P> {
    pub(crate) config: PortConfig,
    pub(crate) identity: PortIdentity,
    pub(crate) state: PortState,

    pub(crate) link_up: bool,
    pub(crate) designated_enabled: bool,

    pub(crate) statistics: PortStatistics,
    pub(crate) intervals: MessageIntervalState,
    pub(crate) peer_delay: P,

    /// Sequence bookkeeping for the Sync/Follow_Up pairing rules.
    pub(crate) last_sync_sequence_id: Option<u16>,
    pub(crate) last_follow_up_sequence_id: Option<u16>,
    pub(crate) awaiting_follow_up: bool,

    /// True while the port's own sync interval equals the upstream
    /// master's, so relayed Syncs can stand in for locally generated ones.
    pub(crate) sync_locked: bool,
    pub(crate) neighbor_gptp_capable: bool,

    /// Present while the port is MASTER and generates its own messages.
    pub(crate) master: Option<MasterState>,

    pub(crate) signaling_seq_ids: SequenceIdGenerator,
}

impl<P> Port<P> {
    pub(crate) fn new(config: PortConfig, identity: PortIdentity, peer_delay: P) -> Self {
        Self {
            config,
            identity,
            state: PortState::Disabled,
            link_up: false,
            designated_enabled: false,
            statistics: PortStatistics::default(),
            intervals: MessageIntervalState::default(),
            peer_delay,
            last_sync_sequence_id: None,
            last_follow_up_sequence_id: None,
            awaiting_follow_up: false,
            sync_locked: false,
            neighbor_gptp_capable: false,
            master: None,
            signaling_seq_ids: SequenceIdGenerator::new(),
        }
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn identity(&self) -> PortIdentity {
        self.identity
    }

    pub fn statistics(&self) -> &PortStatistics {
        &self.statistics
    }

    pub fn intervals(&self) -> &MessageIntervalState {
        &self.intervals
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn peer_delay(&self) -> &P {
        &self.peer_delay
    }

    /// True between a received Sync and its matching Follow_Up.
    pub fn awaiting_follow_up(&self) -> bool {
        self.awaiting_follow_up
    }

    /// Whether the link peer currently confirms gPTP capability.
    pub fn neighbor_gptp_capable(&self) -> bool {
        self.neighbor_gptp_capable
    }

    pub(crate) fn is_operational_master(&self) -> bool {
        self.state == PortState::Master && !self.config.virtual_port
    }
}
