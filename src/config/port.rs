use rand::Rng;

use crate::datastructures::common::TimeInterval;
use crate::time::Interval;

/// Which delay mechanism a port is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayMechanism {
    /// End to end delay measurement directly to the chosen master.
    E2E,
    /// Per-link peer delay measurement, the 802.1AS model.
    P2P,
    /// Peer delay measured once per link by the common link delay service
    /// and shared between domains. Ports using it do not negotiate their
    /// own pdelay rate.
    CommonP2p,
    /// No delay measurement on this port.
    NoMechanism,
}

/// Which multicast destination transmitted messages use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestAddressSelect {
    /// The default (forwardable) PTP address.
    #[default]
    Default,
    /// The link-local (pdelay) address.
    LinkLocal,
}

/// The 802.1AS specific part of a port's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GptpPortConfig {
    /// Selects the 802.1AS-2020 encodings (flag bit positions, zero
    /// control field, minor version 1) over the 2011 ones.
    pub as2020: bool,
    /// Multiplied with the sync interval to form the sync receipt timeout.
    pub sync_receipt_timeout: u8,
    pub initial_log_sync_interval: i8,
    pub initial_log_pdelay_req_interval: i8,
    pub initial_log_gptp_capable_message_interval: i8,
    pub gptp_capable_receipt_timeout: u8,
    /// Administrative pins. A pinned interval wins over anything a
    /// message-interval request asks for.
    pub mgt_settable_log_announce_interval: Option<i8>,
    pub mgt_settable_log_sync_interval: Option<i8>,
    pub mgt_settable_log_pdelay_req_interval: Option<i8>,
    pub mgt_settable_log_gptp_capable_message_interval: Option<i8>,
}

impl Default for GptpPortConfig {
    fn default() -> Self {
        Self {
            as2020: true,
            sync_receipt_timeout: 3,
            initial_log_sync_interval: -3,
            initial_log_pdelay_req_interval: 0,
            initial_log_gptp_capable_message_interval: 3,
            gptp_capable_receipt_timeout: 9,
            mgt_settable_log_announce_interval: None,
            mgt_settable_log_sync_interval: None,
            mgt_settable_log_pdelay_req_interval: None,
            mgt_settable_log_gptp_capable_message_interval: None,
        }
    }
}

/// Per-port configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    pub log_announce_interval: i8,
    pub log_sync_interval: i8,
    pub log_min_delay_req_interval: i8,
    pub log_min_pdelay_req_interval: i8,
    /// How many announce intervals without an Announce before the port
    /// decides the master went away.
    pub announce_receipt_timeout: u8,
    pub delay_mechanism: DelayMechanism,
    /// Added to every forwarded correction to compensate an asymmetric
    /// link.
    pub delay_asymmetry: TimeInterval,
    pub dest_address: DestAddressSelect,
    /// An internal port connects to another instance in the same chassis;
    /// it counts as link-down while the local clock is still locking.
    pub internal: bool,
    /// A virtual port is fed by an external reference (1-PPS) rather than
    /// a physical network port.
    pub virtual_port: bool,
    pub gptp: GptpPortConfig,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            log_announce_interval: 0,
            log_sync_interval: -3,
            log_min_delay_req_interval: 0,
            log_min_pdelay_req_interval: 0,
            announce_receipt_timeout: 3,
            delay_mechanism: DelayMechanism::P2P,
            delay_asymmetry: TimeInterval::default(),
            dest_address: DestAddressSelect::Default,
            internal: false,
            virtual_port: false,
            gptp: GptpPortConfig::default(),
        }
    }
}

impl PortConfig {
    pub fn announce_interval(&self) -> Interval {
        Interval::from_log_2(self.log_announce_interval)
    }

    pub fn sync_interval(&self) -> Interval {
        Interval::from_log_2(self.log_sync_interval)
    }

    // section 9.2.6.12
    pub fn announce_duration(&self, rng: &mut impl Rng) -> core::time::Duration {
        // add some randomness so that not all timers expire at the same time
        let factor = 1.0 + rng.sample::<f64, _>(rand::distributions::Open01);
        let duration = self.announce_interval().as_core_duration();

        duration.mul_f64(factor * self.announce_receipt_timeout as u32 as f64)
    }
}
