// Fronthaul Common - eCPRI framing types shared across the analyzer
//
// The fronthaul link between DU and RU carries eCPRI messages with a fixed
// 8-byte header. Byte 3 is reserved and ignored on parse.

use serde::{Deserialize, Serialize};

/// Fixed size of the eCPRI common header in bytes
pub const ECPRI_HEADER_LEN: usize = 8;

/// eCPRI message types (low 3 bits of byte 0)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EcpriMessageType {
    /// Type 0: IQ Data Transfer
    IqData,
    /// Type 1: Bit Sequence
    BitSequence,
    /// Type 2: Real-Time Control Data
    RealTimeControl,
    /// Type 3: Generic Data Transfer
    GenericData,
    /// Type 4: Remote Memory Access
    RemoteMemoryAccess,
    /// Type 5: One-Way Delay Measurement
    OneWayDelay,
    /// Type 6: Remote Reset
    RemoteReset,
    /// Type 7: Event Indication
    EventIndication,
}

impl EcpriMessageType {
    /// Decode the 3-bit message type field. The field is masked to 3 bits,
    /// so every wire value maps to one of the eight types.
    pub fn from_wire(value: u8) -> Self {
        match value & 0x07 {
            0 => Self::IqData,
            1 => Self::BitSequence,
            2 => Self::RealTimeControl,
            3 => Self::GenericData,
            4 => Self::RemoteMemoryAccess,
            5 => Self::OneWayDelay,
            6 => Self::RemoteReset,
            _ => Self::EventIndication,
        }
    }

    /// Human-readable name used in reports and statistics
    pub fn name(&self) -> &'static str {
        match self {
            Self::IqData => "IQ Data Transfer",
            Self::BitSequence => "Bit Sequence",
            Self::RealTimeControl => "Real-Time Control Data",
            Self::GenericData => "Generic Data Transfer",
            Self::RemoteMemoryAccess => "Remote Memory Access",
            Self::OneWayDelay => "One-Way Delay Measurement",
            Self::RemoteReset => "Remote Reset",
            Self::EventIndication => "Event Indication",
        }
    }
}

/// Parsed eCPRI common header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcpriHeader {
    /// Protocol revision (top nibble of byte 0)
    pub revision: u8,
    /// Concatenation flag (bit 3 of byte 0)
    pub concatenated: bool,
    /// Message type (low 3 bits of byte 0)
    pub message_type: EcpriMessageType,
    /// Payload size in bytes (bytes 1-2, big endian)
    pub payload_size: u16,
    /// Flow / connection identifier (bytes 4-5, big endian)
    pub flow_id: u16,
    /// Sequence number (bytes 6-7, big endian)
    pub sequence_id: u16,
}

impl EcpriHeader {
    /// Parse the common header from the start of a packet buffer.
    ///
    /// Returns `None` when the buffer is shorter than the fixed header;
    /// callers skip such packets without treating them as errors.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ECPRI_HEADER_LEN {
            return None;
        }

        Some(Self {
            revision: (bytes[0] & 0xF0) >> 4,
            concatenated: (bytes[0] & 0x08) != 0,
            message_type: EcpriMessageType::from_wire(bytes[0]),
            payload_size: u16::from_be_bytes([bytes[1], bytes[2]]),
            flow_id: u16::from_be_bytes([bytes[4], bytes[5]]),
            sequence_id: u16::from_be_bytes([bytes[6], bytes[7]]),
        })
    }

    /// Header plus payload size, used as the bandwidth contribution of a message
    pub fn total_size(&self) -> u32 {
        self.payload_size as u32 + ECPRI_HEADER_LEN as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(
        revision: u8,
        concatenated: bool,
        message_type: u8,
        payload_size: u16,
        flow_id: u16,
        sequence_id: u16,
    ) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0] = (revision << 4) | ((concatenated as u8) << 3) | (message_type & 0x07);
        bytes[1..3].copy_from_slice(&payload_size.to_be_bytes());
        bytes[4..6].copy_from_slice(&flow_id.to_be_bytes());
        bytes[6..8].copy_from_slice(&sequence_id.to_be_bytes());
        bytes
    }

    #[test]
    fn test_parse_roundtrip() {
        let bytes = header_bytes(1, false, 2, 640, 7, 4242);
        let header = EcpriHeader::parse(&bytes).unwrap();

        assert_eq!(header.revision, 1);
        assert!(!header.concatenated);
        assert_eq!(header.message_type, EcpriMessageType::RealTimeControl);
        assert_eq!(header.payload_size, 640);
        assert_eq!(header.flow_id, 7);
        assert_eq!(header.sequence_id, 4242);
        assert_eq!(header.total_size(), 648);
    }

    #[test]
    fn test_parse_short_buffer() {
        assert!(EcpriHeader::parse(&[]).is_none());
        assert!(EcpriHeader::parse(&[0x10, 0x00, 0x40]).is_none());
        assert!(EcpriHeader::parse(&[0u8; 7]).is_none());
    }

    #[test]
    fn test_concatenation_flag() {
        let bytes = header_bytes(1, true, 0, 64, 0, 0);
        let header = EcpriHeader::parse(&bytes).unwrap();
        assert!(header.concatenated);
    }

    #[test]
    fn test_all_message_types_decode() {
        for raw in 0u8..=7 {
            let decoded = EcpriMessageType::from_wire(raw);
            assert_eq!(decoded, EcpriMessageType::from_wire(raw | 0xF8));
            assert!(!decoded.name().is_empty());
        }
    }

    #[test]
    fn test_trailing_payload_ignored() {
        let mut packet = header_bytes(1, false, 0, 100, 3, 9).to_vec();
        packet.extend_from_slice(&[0x55; 100]);
        let header = EcpriHeader::parse(&packet).unwrap();
        assert_eq!(header.payload_size, 100);
    }
}
