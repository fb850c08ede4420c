use crate::config::InstanceConfig;
use crate::datastructures::common::{ClockIdentity, ClockQuality};
use crate::datastructures::messages::SdoId;

/// The static description of the local clock instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultDS {
    pub clock_identity: ClockIdentity,
    pub number_ports: u16,
    pub clock_quality: ClockQuality,
    pub priority_1: u8,
    pub priority_2: u8,
    pub domain_number: u8,
    pub sdo_id: SdoId,
}

impl DefaultDS {
    pub fn new(config: &InstanceConfig, number_ports: u16) -> Self {
        Self {
            clock_identity: config.clock_identity,
            number_ports,
            clock_quality: config.clock_quality,
            priority_1: config.priority_1,
            priority_2: config.priority_2,
            domain_number: config.domain_number,
            sdo_id: config.sdo_id,
        }
    }
}
