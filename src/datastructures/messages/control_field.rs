use super::MessageType;

/// The legacy control field, IEEE 1588-2019 Table 42.
///
/// 802.1AS-2020 writes zero here for every message type; the pre-2020
/// encoding is kept for interworking with 2011 peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlField {
    Sync,
    DelayReq,
    FollowUp,
    DelayResp,
    Management,
    AllOthers,
}

impl ControlField {
    pub fn to_primitive(self) -> u8 {
        match self {
            Self::Sync => 0x00,
            Self::DelayReq => 0x01,
            Self::FollowUp => 0x02,
            Self::DelayResp => 0x03,
            Self::Management => 0x04,
            Self::AllOthers => 0x05,
        }
    }

    pub fn from_primitive(value: u8) -> Self {
        match value {
            0x00 => Self::Sync,
            0x01 => Self::DelayReq,
            0x02 => Self::FollowUp,
            0x03 => Self::DelayResp,
            0x04 => Self::Management,
            _ => Self::AllOthers,
        }
    }
}

impl From<MessageType> for ControlField {
    fn from(message_type: MessageType) -> Self {
        match message_type {
            MessageType::Sync => ControlField::Sync,
            MessageType::DelayReq => ControlField::DelayReq,
            MessageType::FollowUp => ControlField::FollowUp,
            MessageType::DelayResp => ControlField::DelayResp,
            MessageType::Management => ControlField::Management,
            MessageType::PDelayReq
            | MessageType::PDelayResp
            | MessageType::PDelayRespFollowUp
            | MessageType::Announce
            | MessageType::Signaling => ControlField::AllOthers,
        }
    }
}
