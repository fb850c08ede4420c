use super::Header;
use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// Offsets from the start of the message of the fields the site relay
/// rewrites when it re-emits a Follow_Up carrying the 802.1AS follow-up
/// information TLV.
pub(crate) const FOLLOW_UP_TLV_OFFSET: usize = 44;
pub(crate) const CUMULATIVE_RATE_OFFSET_OFFSET: usize = 54;
pub(crate) const GM_TIME_BASE_INDICATOR_OFFSET: usize = 58;
pub(crate) const GM_PHASE_CHANGE_OFFSET: usize = 60;
pub(crate) const GM_FREQ_CHANGE_OFFSET: usize = 72;

/// Full wire size of a Follow_Up carrying the information TLV.
pub(crate) const FOLLOW_UP_WITH_TLV_LENGTH: usize = 76;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpMessage {
    pub header: Header,
    pub precise_origin_timestamp: WireTimestamp,
}

impl FollowUpMessage {
    pub(crate) fn content_size(&self) -> usize {
        10
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.precise_origin_timestamp.serialize(
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
            precise_origin_timestamp: WireTimestamp::deserialize(slice)?,
        })
    }
}

/// A 96-bit scaled-nanosecond value, as the follow-up information TLV
/// carries the last grandmaster phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScaledNs {
    pub high: u32,
    pub low: u64,
}

/// The grandmaster change metadata a boundary clock stamps into every
/// Follow_Up it forwards. Written when the grandmaster changes, read-only
/// to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FollowUpTlvInfo {
    pub cumulative_scaled_rate_offset: i32,
    pub gm_time_base_indicator: u16,
    pub last_gm_phase_change: ScaledNs,
    pub scaled_last_gm_freq_change: i32,
}

impl FollowUpTlvInfo {
    /// Appends the follow-up information TLV to a serialized Follow_Up and
    /// fixes up the message length.
    pub(crate) fn append_tlv(&self, frame: &mut Vec<u8>) -> Result<(), WireFormatError> {
        use super::signaling::ORGANIZATION_ID_802_1;
        use crate::datastructures::common::{Tlv, TlvType};

        let mut value = [0u8; 28];
        value[0..3].copy_from_slice(&ORGANIZATION_ID_802_1);
        value[3..6].copy_from_slice(&[0, 0, 1]);
        value[6..10].copy_from_slice(&self.cumulative_scaled_rate_offset.to_be_bytes());
        value[10..12].copy_from_slice(&self.gm_time_base_indicator.to_be_bytes());
        value[12..16].copy_from_slice(&self.last_gm_phase_change.high.to_be_bytes());
        value[16..24].copy_from_slice(&self.last_gm_phase_change.low.to_be_bytes());
        value[24..28].copy_from_slice(&self.scaled_last_gm_freq_change.to_be_bytes());

        let tlv = Tlv {
            tlv_type: TlvType::OrganizationExtension,
            value: &value,
        };
        let start = frame.len();
        frame.resize(start + tlv.wire_size(), 0);
        tlv.serialize(&mut frame[start..])?;
        super::update_message_length(frame);
        Ok(())
    }
}

/// In-place edits on a serialized Follow_Up that carries the information
/// TLV. Frames without the TLV are left alone.
pub(crate) mod patch {
    use super::*;

    pub fn has_information_tlv(frame: &[u8]) -> bool {
        frame.len() >= FOLLOW_UP_WITH_TLV_LENGTH
            && frame[FOLLOW_UP_TLV_OFFSET..][..2] == 0x0003u16.to_be_bytes()
            && frame[FOLLOW_UP_TLV_OFFSET + 4..][..3] == [0x00, 0x80, 0xc2]
    }

    pub fn set_cumulative_rate_offset(frame: &mut [u8], offset: i32) {
        if has_information_tlv(frame) {
            frame[CUMULATIVE_RATE_OFFSET_OFFSET..][..4].copy_from_slice(&offset.to_be_bytes());
        }
    }

    pub fn set_gm_change(frame: &mut [u8], info: &FollowUpTlvInfo) {
        if has_information_tlv(frame) {
            frame[GM_TIME_BASE_INDICATOR_OFFSET..][..2]
                .copy_from_slice(&info.gm_time_base_indicator.to_be_bytes());
            frame[GM_PHASE_CHANGE_OFFSET..][..4]
                .copy_from_slice(&info.last_gm_phase_change.high.to_be_bytes());
            frame[GM_PHASE_CHANGE_OFFSET + 4..][..8]
                .copy_from_slice(&info.last_gm_phase_change.low.to_be_bytes());
            frame[GM_FREQ_CHANGE_OFFSET..][..4]
                .copy_from_slice(&info.scaled_last_gm_freq_change.to_be_bytes());
        }
    }
}
