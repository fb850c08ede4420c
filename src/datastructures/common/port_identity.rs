use super::ClockIdentity;
use crate::datastructures::{WireFormat, WireFormatError};

/// Identifies one port of one clock: the clock identity plus a 1-based
/// port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct PortIdentity {
    pub clock_identity: ClockIdentity,
    pub port_number: u16,
}

impl WireFormat for PortIdentity {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        self.clock_identity.serialize(&mut buffer[0..8])?;
        buffer[8..10].copy_from_slice(&self.port_number.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            clock_identity: ClockIdentity::deserialize(&buffer[0..8])?,
            port_number: u16::from_be_bytes(buffer[8..10].try_into().unwrap()),
        })
    }
}
