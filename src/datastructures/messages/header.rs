use getset::CopyGetters;

use super::{control_field::ControlField, MessageType};
use crate::datastructures::{
    common::{PortIdentity, TimeInterval},
    WireFormat, WireFormatError,
};

/// Fixed size of the common message header.
pub const HEADER_LENGTH: usize = 34;

pub(crate) const CORRECTION_FIELD_OFFSET: usize = 8;
pub(crate) const SOURCE_PORT_IDENTITY_OFFSET: usize = 20;
pub(crate) const CONTROL_FIELD_OFFSET: usize = 32;
pub(crate) const LOG_MESSAGE_INTERVAL_OFFSET: usize = 33;

/// The common header of every PTP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Header {
    pub(crate) sdo_id: SdoId,
    pub(crate) version: PtpVersion,
    pub(crate) domain_number: u8,
    pub(crate) alternate_master_flag: bool,
    pub(crate) two_step_flag: bool,
    pub(crate) unicast_flag: bool,
    pub(crate) ptp_profile_specific_1: bool,
    pub(crate) ptp_profile_specific_2: bool,
    pub(crate) leap61: bool,
    pub(crate) leap59: bool,
    pub(crate) current_utc_offset_valid: bool,
    pub(crate) ptp_timescale: bool,
    pub(crate) time_tracable: bool,
    pub(crate) frequency_tracable: bool,
    pub(crate) synchronization_uncertain: bool,
    pub(crate) correction_field: TimeInterval,
    pub(crate) source_port_identity: PortIdentity,
    pub(crate) sequence_id: u16,
    pub(crate) control_field: ControlField,
    pub(crate) log_message_interval: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeserializedHeader {
    pub header: Header,
    pub message_type: MessageType,
    pub message_length: u16,
}

impl Header {
    pub(crate) fn new() -> Self {
        Self {
            sdo_id: SdoId(0),
            version: PtpVersion { major: 2, minor: 1 },
            domain_number: 0,
            alternate_master_flag: false,
            two_step_flag: false,
            unicast_flag: false,
            ptp_profile_specific_1: false,
            ptp_profile_specific_2: false,
            leap59: false,
            leap61: false,
            current_utc_offset_valid: false,
            ptp_timescale: false,
            time_tracable: false,
            frequency_tracable: false,
            synchronization_uncertain: false,
            correction_field: TimeInterval::default(),
            source_port_identity: PortIdentity::default(),
            sequence_id: 0,
            control_field: ControlField::AllOthers,
            log_message_interval: 0,
        }
    }

    pub fn wire_size(&self) -> usize {
        HEADER_LENGTH
    }

    pub fn serialize_header(
        &self,
        content_type: MessageType,
        content_length: usize,
        buffer: &mut [u8],
    ) -> Result<(), WireFormatError> {
        if buffer.len() < HEADER_LENGTH {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0] = (self.sdo_id.high_byte() << 4) | ((content_type as u8) & 0x0f);
        buffer[1] = self.version.as_byte();
        buffer[2..4].copy_from_slice(&((content_length + HEADER_LENGTH) as u16).to_be_bytes());
        buffer[4] = self.domain_number;
        buffer[5] = self.sdo_id.low_byte();
        buffer[6] = 0;
        buffer[7] = 0;
        buffer[6] |= self.alternate_master_flag as u8;
        buffer[6] |= (self.two_step_flag as u8) << 1;
        buffer[6] |= (self.unicast_flag as u8) << 2;
        buffer[6] |= (self.ptp_profile_specific_1 as u8) << 5;
        buffer[6] |= (self.ptp_profile_specific_2 as u8) << 6;
        buffer[7] |= self.leap61 as u8;
        buffer[7] |= (self.leap59 as u8) << 1;
        buffer[7] |= (self.current_utc_offset_valid as u8) << 2;
        buffer[7] |= (self.ptp_timescale as u8) << 3;
        buffer[7] |= (self.time_tracable as u8) << 4;
        buffer[7] |= (self.frequency_tracable as u8) << 5;
        buffer[7] |= (self.synchronization_uncertain as u8) << 6;
        self.correction_field
            .serialize(&mut buffer[CORRECTION_FIELD_OFFSET..16])?;
        buffer[16..20].copy_from_slice(&[0, 0, 0, 0]);
        self.source_port_identity
            .serialize(&mut buffer[SOURCE_PORT_IDENTITY_OFFSET..30])?;
        buffer[30..32].copy_from_slice(&self.sequence_id.to_be_bytes());
        buffer[CONTROL_FIELD_OFFSET] = self.control_field.to_primitive();
        buffer[LOG_MESSAGE_INTERVAL_OFFSET] = self.log_message_interval as u8;

        Ok(())
    }

    pub fn deserialize_header(buffer: &[u8]) -> Result<DeserializedHeader, WireFormatError> {
        if buffer.len() < HEADER_LENGTH {
            return Err(WireFormatError::BufferTooShort);
        }

        let version = PtpVersion::from_byte(buffer[1]);
        let sdo_id = SdoId((((buffer[0] & 0xf0) as u16) << 4) | (buffer[5] as u16));

        Ok(DeserializedHeader {
            header: Self {
                sdo_id,
                version,
                domain_number: buffer[4],
                alternate_master_flag: (buffer[6] & (1 << 0)) > 0,
                two_step_flag: (buffer[6] & (1 << 1)) > 0,
                unicast_flag: (buffer[6] & (1 << 2)) > 0,
                ptp_profile_specific_1: (buffer[6] & (1 << 5)) > 0,
                ptp_profile_specific_2: (buffer[6] & (1 << 6)) > 0,
                leap61: (buffer[7] & (1 << 0)) > 0,
                leap59: (buffer[7] & (1 << 1)) > 0,
                current_utc_offset_valid: (buffer[7] & (1 << 2)) > 0,
                ptp_timescale: (buffer[7] & (1 << 3)) > 0,
                time_tracable: (buffer[7] & (1 << 4)) > 0,
                frequency_tracable: (buffer[7] & (1 << 5)) > 0,
                synchronization_uncertain: (buffer[7] & (1 << 6)) > 0,
                correction_field: TimeInterval::deserialize(&buffer[8..16])?,
                source_port_identity: PortIdentity::deserialize(&buffer[20..30])?,
                sequence_id: u16::from_be_bytes(buffer[30..32].try_into().unwrap()),
                control_field: ControlField::from_primitive(buffer[CONTROL_FIELD_OFFSET]),
                log_message_interval: buffer[LOG_MESSAGE_INTERVAL_OFFSET] as i8,
            },
            message_type: (buffer[0] & 0x0f).try_into()?,
            message_length: u16::from_be_bytes(buffer[2..4].try_into().unwrap()),
        })
    }
}

/// In-place edits on an already serialized header, used when a received
/// frame is re-emitted on another port with a handful of fields replaced.
pub(crate) mod patch {
    use super::{
        ControlField, CONTROL_FIELD_OFFSET, CORRECTION_FIELD_OFFSET, LOG_MESSAGE_INTERVAL_OFFSET,
        SOURCE_PORT_IDENTITY_OFFSET,
    };
    use crate::datastructures::{
        common::{PortIdentity, TimeInterval},
        WireFormat, WireFormatError,
    };

    pub fn set_source_port_identity(
        frame: &mut [u8],
        identity: PortIdentity,
    ) -> Result<(), WireFormatError> {
        identity.serialize(
            frame
                .get_mut(SOURCE_PORT_IDENTITY_OFFSET..SOURCE_PORT_IDENTITY_OFFSET + 10)
                .ok_or(WireFormatError::BufferTooShort)?,
        )
    }

    pub fn add_to_correction_field(
        frame: &mut [u8],
        correction: TimeInterval,
    ) -> Result<(), WireFormatError> {
        let field = frame
            .get_mut(CORRECTION_FIELD_OFFSET..CORRECTION_FIELD_OFFSET + 8)
            .ok_or(WireFormatError::BufferTooShort)?;
        let current = TimeInterval::deserialize(field)?;
        TimeInterval(current.0 + correction.0).serialize(field)
    }

    pub fn set_minor_version(frame: &mut [u8], minor: u8) -> Result<(), WireFormatError> {
        let byte = frame.get_mut(1).ok_or(WireFormatError::BufferTooShort)?;
        *byte = (minor << 4) | (*byte & 0x0f);
        Ok(())
    }

    pub fn set_control_field(frame: &mut [u8], control: ControlField) -> Result<(), WireFormatError> {
        *frame
            .get_mut(CONTROL_FIELD_OFFSET)
            .ok_or(WireFormatError::BufferTooShort)? = control.to_primitive();
        Ok(())
    }

    pub fn set_log_message_interval(frame: &mut [u8], log: i8) -> Result<(), WireFormatError> {
        *frame
            .get_mut(LOG_MESSAGE_INTERVAL_OFFSET)
            .ok_or(WireFormatError::BufferTooShort)? = log as u8;
        Ok(())
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// A wrapper type for PTP Sdo identifiers.
///
/// Identifiers must be in the range 0-4095. The 802.1AS transport carries
/// major sdo id 1, minor 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SdoId(u16);

impl core::fmt::Display for SdoId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

impl SdoId {
    /// The sdo id tagging 802.1AS (gPTP) traffic.
    pub const GPTP: Self = Self(0x100);

    /// Create a new sdo id, `None` if out of range.
    pub fn new(sdo_id: u16) -> Option<Self> {
        (0..=0xfff).contains(&sdo_id).then_some(Self(sdo_id))
    }

    const fn high_byte(self) -> u8 {
        (self.0 >> 8) as u8
    }

    const fn low_byte(self) -> u8 {
        self.0 as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtpVersion {
    pub(crate) major: u8,
    pub(crate) minor: u8,
}

impl PtpVersion {
    pub fn new(major: u8, minor: u8) -> Option<Self> {
        if major >= 0x10 || minor >= 0x10 {
            None
        } else {
            Some(Self { major, minor })
        }
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    fn as_byte(&self) -> u8 {
        self.minor << 4 | self.major
    }

    fn from_byte(byte: u8) -> Self {
        Self {
            major: byte & 0x0f,
            minor: byte >> 4,
        }
    }
}
