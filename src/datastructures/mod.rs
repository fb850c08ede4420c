//! Wire-level data structures as the PTP specification defines them

use core::fmt::Debug;

pub mod common;
pub mod datasets;
pub mod messages;

/// Error returned by the codec layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireFormatError {
    #[error("a field value does not map to any enum variant")]
    EnumConversionError,
    #[error("the buffer is too short for the data")]
    BufferTooShort,
    #[error("the encoded data is invalid")]
    Invalid,
}

impl<Enum: num_enum::TryFromPrimitive> From<num_enum::TryFromPrimitiveError<Enum>>
    for WireFormatError
{
    fn from(_: num_enum::TryFromPrimitiveError<Enum>) -> Self {
        Self::EnumConversionError
    }
}

pub(crate) trait WireFormat: Debug + Clone + Eq {
    /// The byte size on the wire of this object
    fn wire_size(&self) -> usize;

    /// Serializes the object into the PTP wire format.
    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError>;

    /// Deserializes the object from the PTP wire format.
    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError>;
}
