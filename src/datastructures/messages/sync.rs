use super::Header;
use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMessage {
    pub header: Header,
    pub origin_timestamp: WireTimestamp,
}

impl SyncMessage {
    pub(crate) fn content_size(&self) -> usize {
        10
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.origin_timestamp.serialize(
            buffer
                .get_mut(0..10)
                .ok_or(WireFormatError::BufferTooShort)?,
        )
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        match buffer.get(0..10) {
            None => Err(WireFormatError::BufferTooShort),
            Some(slice) => Ok(Self {
                header,
                origin_timestamp: WireTimestamp::deserialize(slice)?,
            }),
        }
    }
}
