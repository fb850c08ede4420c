use crate::datastructures::common::{ClockIdentity, ClockQuality};
use crate::datastructures::messages::SdoId;

/// What kind of PTP device this instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Ordinary,
    Boundary,
    P2pTransparent,
    E2eTransparent,
    SlaveOnly,
    MasterOnly,
    FrontEnd,
}

/// The PTP profile the instance operates under.
///
/// Resolved once at clock creation; profile-specific constants and
/// behavior hang off this enum instead of being re-derived at each call
/// site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Ieee1588,
    G8265Dot1,
    G8275Dot1,
    G8275Dot2,
    Ieee802Dot1As,
    Aed802Dot1As,
}

impl Profile {
    /// True for both gPTP flavors; they share the site-sync relay and the
    /// interval negotiation.
    pub fn is_802_1as(self) -> bool {
        matches!(self, Profile::Ieee802Dot1As | Profile::Aed802Dot1As)
    }

    /// Profile default log intervals (announce, sync, pdelay), used when a
    /// configured interval carries the 126 "initial" sentinel.
    pub fn default_log_intervals(self) -> (i8, i8, i8) {
        match self {
            Profile::Ieee802Dot1As | Profile::Aed802Dot1As => (0, -3, 0),
            Profile::G8275Dot1 => (-3, -4, 0),
            _ => (1, 0, 0),
        }
    }

    pub fn default_log_gptp_capable_interval(self) -> i8 {
        3
    }
}

/// How frames reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProtocol {
    Ethernet,
    EthernetMixed,
    Ipv4Multicast,
    Ipv4Unicast,
    /// A 1-PPS reference feeding a virtual port. Link state is meaningless
    /// for it and is ignored by the state machine.
    OnePps,
}

/// Per-instance configuration, fixed at clock creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceConfig {
    pub clock_identity: ClockIdentity,
    pub clock_quality: ClockQuality,
    pub priority_1: u8,
    pub priority_2: u8,
    pub domain_number: u8,
    pub sdo_id: SdoId,
    pub device_role: DeviceRole,
    pub profile: Profile,
    pub protocol: TransportProtocol,
    /// Whether the instance generates and relays two-step Sync.
    pub two_step: bool,
    /// Whether Announce path-trace loop detection is active.
    pub path_trace_enabled: bool,
    /// True when the instance's clock domain is not served by the
    /// timestamping hardware, so relayed residence times must be scaled by
    /// the neighbor rate ratio into the grandmaster time base.
    pub scale_residence_time: bool,
    /// Keeps the configured VLAN id for transmitted frames.
    pub vlan_id: Option<u16>,
}

impl InstanceConfig {
    /// A boundary clock speaking plain gPTP; the common case this engine
    /// is deployed in.
    pub fn gptp_boundary(clock_identity: ClockIdentity) -> Self {
        Self {
            clock_identity,
            clock_quality: ClockQuality::default(),
            priority_1: 246,
            priority_2: 248,
            domain_number: 0,
            sdo_id: SdoId::GPTP,
            device_role: DeviceRole::Boundary,
            profile: Profile::Ieee802Dot1As,
            protocol: TransportProtocol::Ethernet,
            two_step: true,
            path_trace_enabled: true,
            scale_residence_time: false,
            vlan_id: None,
        }
    }
}
