//! TETRA control channel PDU decoding: a simplified table-driven parser over
//! demodulated bits, tagging unrecognized PDU types rather than failing.

use crate::utils::extract_bits;

const PDU_TYPE_CHANNEL_GRANT: u32 = 0x01;
const PDU_TYPE_CHANNEL_RELEASE: u32 = 0x02;
const PDU_TYPE_GROUP_CALL: u32 = 0x03;
const PDU_TYPE_UNIT_TO_UNIT: u32 = 0x04;
const PDU_TYPE_REGISTRATION: u32 = 0x05;
const PDU_TYPE_EMERGENCY: u32 = 0x06;
const PDU_TYPE_AFFILIATION: u32 = 0x07;
const PDU_TYPE_STATUS: u32 = 0x08;

const MIN_BITS: usize = 64;

/// TETRA control channels are allocated 25 kHz apart, starting at a base
/// carrier frequency; the encoded offset is relative to that base.
const CHANNEL_BASE_FREQ_HZ: u32 = 420_000_000;
const CHANNEL_SPACING_HZ: u32 = 25_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    ChannelGrant,
    ChannelRelease,
    Registration,
    GroupCall,
    UnitToUnit,
    Emergency,
    Status,
    Affiliation,
    Unknown,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::ChannelGrant => "CHANNEL_GRANT",
            MessageType::ChannelRelease => "CHANNEL_RELEASE",
            MessageType::Registration => "REGISTRATION",
            MessageType::GroupCall => "GROUP_CALL",
            MessageType::UnitToUnit => "UNIT_TO_UNIT",
            MessageType::Emergency => "EMERGENCY",
            MessageType::Status => "STATUS",
            MessageType::Affiliation => "AFFILIATION",
            MessageType::Unknown => "UNKNOWN",
        }
    }
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlMessage {
    pub talk_group_id: u32,
    pub source_id: u32,
    pub dest_id: u32,
    pub channel_freq: u32,
    pub encrypted: bool,
    pub emergency: bool,
}

/// Decode a control-channel PDU from a one-bit-per-element bit array.
///
/// Too-short input or an unrecognized PDU type both yield
/// `MessageType::Unknown` with a default-valued body rather than an error —
/// the control channel carries plenty of PDU types this receiver doesn't
/// model, and that's an expected, not exceptional, condition.
pub fn parse(bits: &[u8]) -> (MessageType, ControlMessage) {
    if bits.len() < MIN_BITS {
        return (MessageType::Unknown, ControlMessage::default());
    }

    let pdu_type = extract_bits(bits, 0, 8);
    let mut msg = ControlMessage::default();

    let msg_type = match pdu_type {
        PDU_TYPE_CHANNEL_GRANT => {
            msg.talk_group_id = extract_bits(bits, 8, 16);
            msg.source_id = extract_bits(bits, 24, 24);
            let freq_offset = extract_bits(bits, 48, 12);
            msg.channel_freq = CHANNEL_BASE_FREQ_HZ + freq_offset * CHANNEL_SPACING_HZ;
            msg.encrypted = extract_bits(bits, 60, 1) != 0;
            msg.emergency = extract_bits(bits, 61, 1) != 0;
            MessageType::ChannelGrant
        }
        PDU_TYPE_CHANNEL_RELEASE => {
            msg.talk_group_id = extract_bits(bits, 8, 16);
            MessageType::ChannelRelease
        }
        PDU_TYPE_GROUP_CALL => {
            msg.talk_group_id = extract_bits(bits, 8, 16);
            msg.source_id = extract_bits(bits, 24, 24);
            msg.emergency = extract_bits(bits, 48, 1) != 0;
            MessageType::GroupCall
        }
        PDU_TYPE_UNIT_TO_UNIT => {
            msg.source_id = extract_bits(bits, 8, 24);
            msg.dest_id = extract_bits(bits, 32, 24);
            msg.encrypted = extract_bits(bits, 56, 1) != 0;
            MessageType::UnitToUnit
        }
        PDU_TYPE_REGISTRATION => {
            msg.source_id = extract_bits(bits, 8, 24);
            msg.talk_group_id = extract_bits(bits, 32, 16);
            MessageType::Registration
        }
        PDU_TYPE_EMERGENCY => {
            msg.source_id = extract_bits(bits, 8, 24);
            msg.talk_group_id = extract_bits(bits, 32, 16);
            msg.emergency = true;
            MessageType::Emergency
        }
        PDU_TYPE_AFFILIATION => {
            msg.source_id = extract_bits(bits, 8, 24);
            msg.talk_group_id = extract_bits(bits, 32, 16);
            MessageType::Affiliation
        }
        PDU_TYPE_STATUS => {
            msg.source_id = extract_bits(bits, 8, 24);
            MessageType::Status
        }
        _ => return (MessageType::Unknown, ControlMessage::default()),
    };

    (msg_type, msg)
}
