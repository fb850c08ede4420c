use crate::datastructures::WireFormatError;

/// Size of the type and length fields every TLV starts with.
pub const TLV_HEADER_SIZE: usize = 4;

/// One TLV as found in the tail of general messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tlv_type: TlvType,
    pub value: &'a [u8],
}

impl<'a> Tlv<'a> {
    pub fn wire_size(&self) -> usize {
        TLV_HEADER_SIZE + self.value.len()
    }

    pub fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.wire_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..2].copy_from_slice(&self.tlv_type.to_primitive().to_be_bytes());
        buffer[2..4].copy_from_slice(&(self.value.len() as u16).to_be_bytes());
        buffer[4..][..self.value.len()].copy_from_slice(self.value);
        Ok(())
    }

    pub fn deserialize(buffer: &'a [u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < TLV_HEADER_SIZE {
            return Err(WireFormatError::BufferTooShort);
        }

        let tlv_type = TlvType::from_primitive(u16::from_be_bytes([buffer[0], buffer[1]]));
        let length = u16::from_be_bytes([buffer[2], buffer[3]]) as usize;

        let value = buffer
            .get(TLV_HEADER_SIZE..TLV_HEADER_SIZE + length)
            .ok_or(WireFormatError::BufferTooShort)?;

        Ok(Self { tlv_type, value })
    }
}

/// Walks the TLV sequence in `buffer`.
///
/// Each step advances by exactly the TLV header size plus the declared
/// length. A buffer too short for a declared length yields an error and
/// ends the walk; the caller must treat the message as malformed rather
/// than read past the end.
pub fn tlv_walk(buffer: &[u8]) -> impl Iterator<Item = Result<Tlv<'_>, WireFormatError>> + '_ {
    let mut remaining = buffer;
    let mut poisoned = false;

    core::iter::from_fn(move || {
        if poisoned || remaining.is_empty() {
            return None;
        }

        match Tlv::deserialize(remaining) {
            Ok(tlv) => {
                remaining = &remaining[tlv.wire_size()..];
                Some(Ok(tlv))
            }
            Err(e) => {
                poisoned = true;
                Some(Err(e))
            }
        }
    })
}

/// See IEEE 1588-2019, 14.1.1 / Table 52
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvType {
    Reserved(u16),
    Management,
    ManagementErrorStatus,
    OrganizationExtension,
    RequestUnicastTransmission,
    GrantUnicastTransmission,
    CancelUnicastTransmission,
    AcknowledgeCancelUnicastTransmission,
    PathTrace,
    AlternateTimeOffsetIndicator,
    Legacy(u16),
    Experimental(u16),
    OrganizationExtensionPropagate,
    OrganizationExtensionDoNotPropagate,
}

impl TlvType {
    pub fn to_primitive(self) -> u16 {
        match self {
            Self::Reserved(value) => value,
            Self::Management => 0x0001,
            Self::ManagementErrorStatus => 0x0002,
            Self::OrganizationExtension => 0x0003,
            Self::RequestUnicastTransmission => 0x0004,
            Self::GrantUnicastTransmission => 0x0005,
            Self::CancelUnicastTransmission => 0x0006,
            Self::AcknowledgeCancelUnicastTransmission => 0x0007,
            Self::PathTrace => 0x0008,
            Self::AlternateTimeOffsetIndicator => 0x0009,
            Self::Legacy(value) => value,
            Self::Experimental(value) => value,
            Self::OrganizationExtensionPropagate => 0x4000,
            Self::OrganizationExtensionDoNotPropagate => 0x8000,
        }
    }

    pub fn from_primitive(value: u16) -> Self {
        match value {
            0x2000..=0x2003 => Self::Legacy(value),
            0x2004..=0x202f | 0x7f00..=0x7fff => Self::Experimental(value),
            0x0001 => Self::Management,
            0x0002 => Self::ManagementErrorStatus,
            0x0003 => Self::OrganizationExtension,
            0x0004 => Self::RequestUnicastTransmission,
            0x0005 => Self::GrantUnicastTransmission,
            0x0006 => Self::CancelUnicastTransmission,
            0x0007 => Self::AcknowledgeCancelUnicastTransmission,
            0x0008 => Self::PathTrace,
            0x0009 => Self::AlternateTimeOffsetIndicator,
            0x4000 => Self::OrganizationExtensionPropagate,
            0x8000 => Self::OrganizationExtensionDoNotPropagate,
            other => Self::Reserved(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_round_trip() {
        let tlv = Tlv {
            tlv_type: TlvType::PathTrace,
            value: &[1, 2, 3, 4, 5, 6, 7, 8],
        };

        let mut buffer = [0; 64];
        tlv.serialize(&mut buffer).unwrap();

        let n = tlv.wire_size();
        assert_eq!(n, 12);

        let decoded = Tlv::deserialize(&buffer[..n]).unwrap();
        assert_eq!(tlv, decoded);
    }

    #[test]
    fn walk_advances_by_declared_length() {
        let mut buffer = [0u8; 32];
        let first = Tlv {
            tlv_type: TlvType::PathTrace,
            value: &[0xaa; 8],
        };
        let second = Tlv {
            tlv_type: TlvType::OrganizationExtension,
            value: &[0xbb; 4],
        };
        first.serialize(&mut buffer).unwrap();
        second.serialize(&mut buffer[first.wire_size()..]).unwrap();

        let total = first.wire_size() + second.wire_size();
        let mut walk = tlv_walk(&buffer[..total]);
        assert_eq!(walk.next(), Some(Ok(first)));
        assert_eq!(walk.next(), Some(Ok(second)));
        assert_eq!(walk.next(), None);
    }

    #[test]
    fn walk_aborts_on_overrun() {
        // declared length of 20 but only 4 value bytes present
        let mut buffer = [0u8; 8];
        buffer[0..2].copy_from_slice(&0x0008u16.to_be_bytes());
        buffer[2..4].copy_from_slice(&20u16.to_be_bytes());

        let mut walk = tlv_walk(&buffer);
        assert_eq!(walk.next(), Some(Err(WireFormatError::BufferTooShort)));
        assert_eq!(walk.next(), None);
    }

    #[test]
    fn walk_aborts_on_truncated_header() {
        let buffer = [0u8; 2];
        let mut walk = tlv_walk(&buffer);
        assert_eq!(walk.next(), Some(Err(WireFormatError::BufferTooShort)));
        assert_eq!(walk.next(), None);
    }
}
