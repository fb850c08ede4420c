use arrayvec::ArrayVec;
use getset::CopyGetters;

use super::Header;
use crate::datastructures::{
    common::{tlv_walk, ClockIdentity, ClockQuality, TlvType, WireTimestamp},
    WireFormat, WireFormatError,
};

/// Most path-trace lists a bridged network produces stay well below this;
/// longer lists are rejected as malformed.
pub const MAX_PATH_TRACE_HOPS: usize = 32;

/// Offset of the first TLV in an Announce message: common header plus the
/// fixed body.
pub(crate) const ANNOUNCE_BODY_END: usize = 64;

/// The clock identities an Announce message has visited, from its
/// path-trace TLV.
pub type PathTrace = ArrayVec<ClockIdentity, MAX_PATH_TRACE_HOPS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct AnnounceMessage {
    pub(crate) header: Header,
    pub(crate) origin_timestamp: WireTimestamp,
    pub(crate) current_utc_offset: i16,
    pub(crate) grandmaster_priority_1: u8,
    pub(crate) grandmaster_clock_quality: ClockQuality,
    pub(crate) grandmaster_priority_2: u8,
    pub(crate) grandmaster_identity: ClockIdentity,
    pub(crate) steps_removed: u16,
    pub(crate) time_source: u8,
}

impl AnnounceMessage {
    pub(crate) fn content_size(&self) -> usize {
        30
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 30 {
            return Err(WireFormatError::BufferTooShort);
        }
        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..12].copy_from_slice(&self.current_utc_offset.to_be_bytes());
        buffer[12] = 0;
        buffer[13] = self.grandmaster_priority_1;
        self.grandmaster_clock_quality
            .serialize(&mut buffer[14..18])?;
        buffer[18] = self.grandmaster_priority_2;
        self.grandmaster_identity.serialize(&mut buffer[19..27])?;
        buffer[27..29].copy_from_slice(&self.steps_removed.to_be_bytes());
        buffer[29] = self.time_source;
        Ok(())
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        if buffer.len() < 30 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            header,
            origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
            current_utc_offset: i16::from_be_bytes(buffer[10..12].try_into().unwrap()),
            grandmaster_priority_1: buffer[13],
            grandmaster_clock_quality: ClockQuality::deserialize(&buffer[14..18])?,
            grandmaster_priority_2: buffer[18],
            grandmaster_identity: ClockIdentity::deserialize(&buffer[19..27])?,
            steps_removed: u16::from_be_bytes(buffer[27..29].try_into().unwrap()),
            time_source: buffer[29],
        })
    }
}

/// Extracts the path-trace list from the TLV tail of an Announce message.
///
/// `tlv_buffer` is the frame content after the fixed Announce body. A walk
/// that overruns the buffer, or a path-trace value whose length is not a
/// multiple of a clock identity, is malformed.
pub(crate) fn parse_path_trace(tlv_buffer: &[u8]) -> Result<PathTrace, WireFormatError> {
    let mut path = PathTrace::new();

    for tlv in tlv_walk(tlv_buffer) {
        let tlv = tlv?;
        if tlv.tlv_type != TlvType::PathTrace {
            log::debug!("skipping announce tlv {:?}", tlv.tlv_type);
            continue;
        }
        if tlv.value.len() % 8 != 0 {
            return Err(WireFormatError::Invalid);
        }
        for identity in tlv.value.chunks_exact(8) {
            path.try_push(ClockIdentity(identity.try_into().unwrap()))
                .map_err(|_| WireFormatError::Invalid)?;
        }
    }

    Ok(path)
}
