//! PTP network messages

use num_enum::{IntoPrimitive, TryFromPrimitive};

mod announce;
mod control_field;
mod delay_req;
mod delay_resp;
pub(crate) mod follow_up;
pub(crate) mod header;
mod p_delay;
pub(crate) mod signaling;
mod sync;

pub use announce::*;
pub use control_field::*;
pub use delay_req::*;
pub use delay_resp::*;
pub use follow_up::*;
pub use header::*;
pub use p_delay::*;
pub use signaling::*;
pub use sync::*;

use super::WireFormatError;

#[derive(Debug, Clone, Copy, TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    DelayReq = 0x1,
    PDelayReq = 0x2,
    PDelayResp = 0x3,
    FollowUp = 0x8,
    DelayResp = 0x9,
    PDelayRespFollowUp = 0xA,
    Announce = 0xB,
    Signaling = 0xC,
    Management = 0xD,
}

impl MessageType {
    /// The smallest valid frame of this type. A shorter received frame is
    /// malformed and forces the receiving port into the faulty state.
    pub fn min_message_length(self) -> usize {
        match self {
            MessageType::Sync | MessageType::DelayReq => 44,
            MessageType::FollowUp => 44,
            MessageType::DelayResp => 54,
            MessageType::PDelayReq | MessageType::PDelayResp | MessageType::PDelayRespFollowUp => {
                54
            }
            MessageType::Announce => 64,
            MessageType::Signaling => 44,
            MessageType::Management => HEADER_LENGTH,
        }
    }
}

/// Rewrites the header message-length field to the actual frame length,
/// after TLVs were appended to a serialized message.
pub(crate) fn update_message_length(frame: &mut [u8]) {
    let length = frame.len() as u16;
    frame[2..4].copy_from_slice(&length.to_be_bytes());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Sync(SyncMessage),
    DelayReq(DelayReqMessage),
    PDelayReq(PDelayReqMessage),
    PDelayResp(PDelayRespMessage),
    FollowUp(FollowUpMessage),
    DelayResp(DelayRespMessage),
    PDelayRespFollowUp(PDelayRespFollowUpMessage),
    Announce(AnnounceMessage),
    Signaling(SignalingMessage),
    Management(Header),
}

impl Message {
    pub fn header(&self) -> &Header {
        match self {
            Message::Sync(m) => &m.header,
            Message::DelayReq(m) => &m.header,
            Message::PDelayReq(m) => &m.header,
            Message::PDelayResp(m) => &m.header,
            Message::FollowUp(m) => &m.header,
            Message::DelayResp(m) => &m.header,
            Message::PDelayRespFollowUp(m) => &m.header,
            Message::Announce(m) => &m.header,
            Message::Signaling(m) => &m.header,
            Message::Management(h) => h,
        }
    }

    /// The byte size on the wire of this message, without trailing TLVs
    pub fn wire_size(&self) -> usize {
        HEADER_LENGTH + self.content_size()
    }

    fn content_size(&self) -> usize {
        match self {
            Message::Sync(m) => m.content_size(),
            Message::DelayReq(m) => m.content_size(),
            Message::PDelayReq(m) => m.content_size(),
            Message::PDelayResp(m) => m.content_size(),
            Message::FollowUp(m) => m.content_size(),
            Message::DelayResp(m) => m.content_size(),
            Message::PDelayRespFollowUp(m) => m.content_size(),
            Message::Announce(m) => m.content_size(),
            Message::Signaling(m) => m.content_size(),
            Message::Management(_) => 0,
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Sync(_) => MessageType::Sync,
            Message::DelayReq(_) => MessageType::DelayReq,
            Message::PDelayReq(_) => MessageType::PDelayReq,
            Message::PDelayResp(_) => MessageType::PDelayResp,
            Message::FollowUp(_) => MessageType::FollowUp,
            Message::DelayResp(_) => MessageType::DelayResp,
            Message::PDelayRespFollowUp(_) => MessageType::PDelayRespFollowUp,
            Message::Announce(_) => MessageType::Announce,
            Message::Signaling(_) => MessageType::Signaling,
            Message::Management(_) => MessageType::Management,
        }
    }

    /// Serializes the message into the PTP wire format.
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.wire_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        self.header().serialize_header(
            self.message_type(),
            self.content_size(),
            &mut buffer[0..HEADER_LENGTH],
        )?;
        let content = &mut buffer[HEADER_LENGTH..];
        match self {
            Message::Sync(m) => m.serialize_content(content),
            Message::DelayReq(m) => m.serialize_content(content),
            Message::PDelayReq(m) => m.serialize_content(content),
            Message::PDelayResp(m) => m.serialize_content(content),
            Message::FollowUp(m) => m.serialize_content(content),
            Message::DelayResp(m) => m.serialize_content(content),
            Message::PDelayRespFollowUp(m) => m.serialize_content(content),
            Message::Announce(m) => m.serialize_content(content),
            Message::Signaling(m) => m.serialize_content(content),
            Message::Management(_) => Ok(()),
        }
    }

    /// Serializes the message into a freshly allocated buffer.
    pub fn serialize_vec(&self) -> Result<Vec<u8>, WireFormatError> {
        let mut buffer = vec![0; self.wire_size()];
        self.serialize(&mut buffer)?;
        Ok(buffer)
    }

    /// Deserializes a message from the PTP wire format. Trailing TLVs are
    /// not consumed here; they stay in the frame for the interested
    /// component to walk.
    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let header_data = Header::deserialize_header(buffer)?;

        if buffer.len() < header_data.message_type.min_message_length() {
            return Err(WireFormatError::BufferTooShort);
        }

        let content_buffer = &buffer[HEADER_LENGTH..];

        Ok(match header_data.message_type {
            MessageType::Sync => Message::Sync(SyncMessage::deserialize_content(
                header_data.header,
                content_buffer,
            )?),
            MessageType::DelayReq => Message::DelayReq(DelayReqMessage::deserialize_content(
                header_data.header,
                content_buffer,
            )?),
            MessageType::PDelayReq => Message::PDelayReq(PDelayReqMessage::deserialize_content(
                header_data.header,
                content_buffer,
            )?),
            MessageType::PDelayResp => Message::PDelayResp(PDelayRespMessage::deserialize_content(
                header_data.header,
                content_buffer,
            )?),
            MessageType::FollowUp => Message::FollowUp(FollowUpMessage::deserialize_content(
                header_data.header,
                content_buffer,
            )?),
            MessageType::DelayResp => Message::DelayResp(DelayRespMessage::deserialize_content(
                header_data.header,
                content_buffer,
            )?),
            MessageType::PDelayRespFollowUp => Message::PDelayRespFollowUp(
                PDelayRespFollowUpMessage::deserialize_content(header_data.header, content_buffer)?,
            ),
            MessageType::Announce => Message::Announce(AnnounceMessage::deserialize_content(
                header_data.header,
                content_buffer,
            )?),
            MessageType::Signaling => Message::Signaling(SignalingMessage::deserialize_content(
                header_data.header,
                content_buffer,
            )?),
            MessageType::Management => Message::Management(header_data.header),
        })
    }
}
