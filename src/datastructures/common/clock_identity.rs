use crate::datastructures::{WireFormat, WireFormatError};

/// The unique 8-byte identity of a clock, usually derived from a MAC
/// address of the device.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ClockIdentity(pub [u8; 8]);

impl WireFormat for ClockIdentity {
    fn wire_size(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        buffer
            .get_mut(0..8)
            .ok_or(WireFormatError::BufferTooShort)?
            .copy_from_slice(&self.0);
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        Ok(Self(
            buffer
                .get(0..8)
                .ok_or(WireFormatError::BufferTooShort)?
                .try_into()
                .unwrap(),
        ))
    }
}
