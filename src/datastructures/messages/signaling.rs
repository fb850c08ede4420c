use super::{follow_up::ScaledNs, FollowUpTlvInfo, Header};
use crate::datastructures::{
    common::{PortIdentity, Tlv, TlvType, TLV_HEADER_SIZE},
    WireFormat, WireFormatError,
};

/// Offset of the first TLV in a Signaling message: common header plus the
/// target port identity.
pub(crate) const SIGNALING_TLV_OFFSET: usize = 44;

/// The IEEE 802.1 organization identifier carried by gPTP organization
/// extension TLVs.
pub const ORGANIZATION_ID_802_1: [u8; 3] = [0x00, 0x80, 0xc2];

const SUBTYPE_FOLLOW_UP_INFORMATION: u32 = 1;
const SUBTYPE_MESSAGE_INTERVAL_REQUEST: u32 = 2;
const SUBTYPE_GPTP_CAPABLE: u32 = 4;
const SUBTYPE_GPTP_CAPABLE_INTERVAL_REQUEST: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalingMessage {
    pub header: Header,
    pub target_port_identity: PortIdentity,
}

impl SignalingMessage {
    pub(crate) fn content_size(&self) -> usize {
        10
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.target_port_identity.serialize(
            buffer
                .get_mut(0..10)
                .ok_or(WireFormatError::BufferTooShort)?,
        )
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        let slice = buffer.get(0..10).ok_or(WireFormatError::BufferTooShort)?;
        Ok(Self {
            header,
            target_port_identity: PortIdentity::deserialize(slice)?,
        })
    }
}

/// The flags byte of a message-interval request.
///
/// The bit positions moved between 802.1AS-2011 and -2020, so conversion
/// to and from the wire byte needs to know which revision the port speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntervalRequestFlags {
    pub compute_neighbor_rate_ratio: bool,
    pub compute_mean_link_delay: bool,
    pub one_step_receive_capable: bool,
}

impl IntervalRequestFlags {
    pub fn to_byte(self, as2020: bool) -> u8 {
        if as2020 {
            (self.compute_neighbor_rate_ratio as u8)
                | ((self.compute_mean_link_delay as u8) << 1)
                | ((self.one_step_receive_capable as u8) << 2)
        } else {
            ((self.compute_neighbor_rate_ratio as u8) << 1)
                | ((self.compute_mean_link_delay as u8) << 2)
        }
    }

    pub fn from_byte(byte: u8, as2020: bool) -> Self {
        if as2020 {
            Self {
                compute_neighbor_rate_ratio: byte & 0x01 != 0,
                compute_mean_link_delay: byte & 0x02 != 0,
                one_step_receive_capable: byte & 0x04 != 0,
            }
        } else {
            Self {
                compute_neighbor_rate_ratio: byte & 0x02 != 0,
                compute_mean_link_delay: byte & 0x04 != 0,
                one_step_receive_capable: false,
            }
        }
    }
}

/// The message-interval request TLV (organization subtype 2).
///
/// Every interval field is a log message interval or one of the
/// sentinels: -128 leaves the peer's rate unchanged, 126 selects the
/// configured initial value, 127 stops transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageIntervalRequest {
    pub link_delay_interval: i8,
    pub time_sync_interval: i8,
    pub announce_interval: i8,
    pub flags: u8,
}

impl MessageIntervalRequest {
    pub(crate) fn value_size() -> usize {
        12
    }

    pub fn serialize_tlv(&self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        let mut value = [0u8; 12];
        value[0..3].copy_from_slice(&ORGANIZATION_ID_802_1);
        value[3..6].copy_from_slice(&SUBTYPE_MESSAGE_INTERVAL_REQUEST.to_be_bytes()[1..4]);
        value[6] = self.link_delay_interval as u8;
        value[7] = self.time_sync_interval as u8;
        value[8] = self.announce_interval as u8;
        value[9] = self.flags;

        let tlv = Tlv {
            tlv_type: TlvType::OrganizationExtension,
            value: &value,
        };
        tlv.serialize(buffer)?;
        Ok(TLV_HEADER_SIZE + Self::value_size())
    }

    fn deserialize_value(value: &[u8]) -> Result<Self, WireFormatError> {
        if value.len() < 12 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            link_delay_interval: value[6] as i8,
            time_sync_interval: value[7] as i8,
            announce_interval: value[8] as i8,
            flags: value[9],
        })
    }
}

/// The gPTP-capable TLV (subtype 4) and the gPTP-capable message-interval
/// request TLV (subtype 5) share this payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GptpCapableTlv {
    pub log_gptp_capable_message_interval: i8,
    pub flags: u8,
}

impl GptpCapableTlv {
    fn value_size() -> usize {
        12
    }

    fn serialize_tlv_with_subtype(
        &self,
        subtype: u32,
        buffer: &mut [u8],
    ) -> Result<usize, WireFormatError> {
        let mut value = [0u8; 12];
        value[0..3].copy_from_slice(&ORGANIZATION_ID_802_1);
        value[3..6].copy_from_slice(&subtype.to_be_bytes()[1..4]);
        value[6] = self.log_gptp_capable_message_interval as u8;
        value[7] = self.flags;

        let tlv = Tlv {
            tlv_type: TlvType::OrganizationExtension,
            value: &value,
        };
        tlv.serialize(buffer)?;
        Ok(TLV_HEADER_SIZE + Self::value_size())
    }

    pub fn serialize_capable_tlv(&self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        self.serialize_tlv_with_subtype(SUBTYPE_GPTP_CAPABLE, buffer)
    }

    pub fn serialize_interval_request_tlv(
        &self,
        buffer: &mut [u8],
    ) -> Result<usize, WireFormatError> {
        self.serialize_tlv_with_subtype(SUBTYPE_GPTP_CAPABLE_INTERVAL_REQUEST, buffer)
    }

    fn deserialize_value(value: &[u8]) -> Result<Self, WireFormatError> {
        if value.len() < 8 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            log_gptp_capable_message_interval: value[6] as i8,
            flags: value[7],
        })
    }
}

/// A decoded 802.1 organization extension TLV, as found in Signaling (and
/// Follow_Up) message tails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizationExtension {
    FollowUpInformation(FollowUpTlvInfo),
    MessageIntervalRequest(MessageIntervalRequest),
    GptpCapable(GptpCapableTlv),
    GptpCapableIntervalRequest(GptpCapableTlv),
    /// Another organization, or a subtype this engine does not consume.
    Unhandled,
}

impl OrganizationExtension {
    /// Decodes an organization extension TLV value. TLVs of other
    /// organizations decode as [`OrganizationExtension::Unhandled`];
    /// truncated values of known subtypes are errors.
    pub fn decode(tlv: &Tlv<'_>) -> Result<Self, WireFormatError> {
        if !matches!(
            tlv.tlv_type,
            TlvType::OrganizationExtension | TlvType::OrganizationExtensionDoNotPropagate
        ) {
            return Ok(Self::Unhandled);
        }
        let value = tlv.value;
        if value.len() < 6 {
            return Err(WireFormatError::BufferTooShort);
        }
        if value[0..3] != ORGANIZATION_ID_802_1 {
            return Ok(Self::Unhandled);
        }

        let subtype = u32::from_be_bytes([0, value[3], value[4], value[5]]);
        match subtype {
            SUBTYPE_FOLLOW_UP_INFORMATION => {
                if value.len() < 28 {
                    return Err(WireFormatError::BufferTooShort);
                }
                Ok(Self::FollowUpInformation(FollowUpTlvInfo {
                    cumulative_scaled_rate_offset: i32::from_be_bytes(
                        value[6..10].try_into().unwrap(),
                    ),
                    gm_time_base_indicator: u16::from_be_bytes(value[10..12].try_into().unwrap()),
                    last_gm_phase_change: ScaledNs {
                        high: u32::from_be_bytes(value[12..16].try_into().unwrap()),
                        low: u64::from_be_bytes(value[16..24].try_into().unwrap()),
                    },
                    scaled_last_gm_freq_change: i32::from_be_bytes(
                        value[24..28].try_into().unwrap(),
                    ),
                }))
            }
            SUBTYPE_MESSAGE_INTERVAL_REQUEST => Ok(Self::MessageIntervalRequest(
                MessageIntervalRequest::deserialize_value(value)?,
            )),
            SUBTYPE_GPTP_CAPABLE => Ok(Self::GptpCapable(GptpCapableTlv::deserialize_value(
                value,
            )?)),
            SUBTYPE_GPTP_CAPABLE_INTERVAL_REQUEST => Ok(Self::GptpCapableIntervalRequest(
                GptpCapableTlv::deserialize_value(value)?,
            )),
            _ => Ok(Self::Unhandled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::tlv_walk;

    #[test]
    fn interval_request_round_trip() {
        let request = MessageIntervalRequest {
            link_delay_interval: 0,
            time_sync_interval: -3,
            announce_interval: 1,
            flags: 0x03,
        };

        let mut buffer = [0u8; 32];
        let n = request.serialize_tlv(&mut buffer).unwrap();
        assert_eq!(n, 16);

        let tlv = Tlv::deserialize(&buffer[..n]).unwrap();
        match OrganizationExtension::decode(&tlv).unwrap() {
            OrganizationExtension::MessageIntervalRequest(parsed) => {
                assert_eq!(parsed, request);
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn sentinel_values_survive_the_wire() {
        let request = MessageIntervalRequest {
            link_delay_interval: -128,
            time_sync_interval: 126,
            announce_interval: 127,
            flags: 0,
        };

        let mut buffer = [0u8; 32];
        let n = request.serialize_tlv(&mut buffer).unwrap();
        let tlv = Tlv::deserialize(&buffer[..n]).unwrap();
        let OrganizationExtension::MessageIntervalRequest(parsed) =
            OrganizationExtension::decode(&tlv).unwrap()
        else {
            panic!("wrong subtype");
        };
        assert_eq!(parsed.link_delay_interval, -128);
        assert_eq!(parsed.time_sync_interval, 126);
        assert_eq!(parsed.announce_interval, 127);
    }

    #[test]
    fn flags_layout_differs_by_revision() {
        let flags = IntervalRequestFlags {
            compute_neighbor_rate_ratio: true,
            compute_mean_link_delay: true,
            one_step_receive_capable: true,
        };
        assert_eq!(flags.to_byte(true), 0b0000_0111);
        assert_eq!(flags.to_byte(false), 0b0000_0110);

        assert_eq!(
            IntervalRequestFlags::from_byte(0b0000_0111, true),
            flags
        );
        assert_eq!(
            IntervalRequestFlags::from_byte(0b0000_0110, false),
            IntervalRequestFlags {
                one_step_receive_capable: false,
                ..flags
            }
        );
    }

    #[test]
    fn foreign_organization_is_skipped() {
        let value = [0xde, 0xad, 0xbe, 0x00, 0x00, 0x02, 0, 0, 0, 0, 0, 0];
        let tlv = Tlv {
            tlv_type: TlvType::OrganizationExtension,
            value: &value,
        };
        assert_eq!(
            OrganizationExtension::decode(&tlv).unwrap(),
            OrganizationExtension::Unhandled
        );
    }

    #[test]
    fn gptp_capable_round_trip() {
        let body = GptpCapableTlv {
            log_gptp_capable_message_interval: 3,
            flags: 0,
        };

        let mut buffer = [0u8; 32];
        let n = body.serialize_capable_tlv(&mut buffer).unwrap();
        let mut walk = tlv_walk(&buffer[..n]);
        let tlv = walk.next().unwrap().unwrap();
        assert_eq!(
            OrganizationExtension::decode(&tlv).unwrap(),
            OrganizationExtension::GptpCapable(body)
        );
    }
}
