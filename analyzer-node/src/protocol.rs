// Fronthaul Protocol Rule Detector
//
// Stateful, rule-based checks over parsed eCPRI headers, independent of the
// ML path. Each flow is expected to carry strictly increasing sequence
// numbers modulo the configured counter width; payloads above the size
// limit are flagged regardless of sequencing. Per-flow state lives inside
// one scanner instance and is discarded with it at end of stream.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use fronthaul_common::{EcpriHeader, EcpriMessageType};

use crate::classify::Severity;
use crate::config::ProtocolConfig;

/// Rule that fired for a protocol anomaly
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum ProtocolAnomalyKind {
    /// Sequence continuity broken within a flow
    SequenceGap { expected: u16, observed: u16 },
    /// Payload size above the configured limit
    OversizedMessage { payload_size: u16 },
}

/// A rule-based protocol finding
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolAnomaly {
    pub kind: ProtocolAnomalyKind,
    /// Flow the packet belongs to
    pub flow_id: u16,
    /// Position of the packet in the scanned stream
    pub packet_index: usize,
    /// Message type carried by the offending packet
    pub message_type: EcpriMessageType,
    /// Severity pinned by the rule, not recomputed downstream
    pub severity: Severity,
}

/// Aggregate statistics over one scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct FronthaulStats {
    /// Headers successfully parsed
    pub total_messages: u64,
    /// Message count per eCPRI type
    pub message_type_counts: BTreeMap<EcpriMessageType, u64>,
    /// Cumulative header+payload bytes, a bandwidth proxy
    pub bandwidth_bytes: u64,
}

/// Per-flow sequence-continuity and size-bound scanner
pub struct ProtocolScanner {
    oversized_threshold: u32,
    sequence_modulus: u32,
    /// Last seen sequence number per flow
    last_sequence: HashMap<u16, u16>,
    stats: FronthaulStats,
}

impl ProtocolScanner {
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            oversized_threshold: config.oversized_message_threshold_bytes,
            sequence_modulus: 1u32 << config.sequence_width_bits,
            last_sequence: HashMap::new(),
            stats: FronthaulStats::default(),
        }
    }

    /// Inspect one packet in arrival order.
    ///
    /// Packets shorter than the fixed header, or otherwise unparsable, are
    /// skipped silently: not counted, not an error. A single packet can
    /// produce both a sequence gap and an oversize finding.
    pub fn inspect(&mut self, packet_index: usize, packet: &[u8]) -> Vec<ProtocolAnomaly> {
        let header = match EcpriHeader::parse(packet) {
            Some(header) => header,
            None => return Vec::new(),
        };

        self.stats.total_messages += 1;
        *self
            .stats
            .message_type_counts
            .entry(header.message_type)
            .or_insert(0) += 1;
        self.stats.bandwidth_bytes += header.total_size() as u64;

        let mut anomalies = Vec::new();

        if let Some(&last) = self.last_sequence.get(&header.flow_id) {
            let expected = ((last as u32 + 1) % self.sequence_modulus) as u16;
            if header.sequence_id != expected {
                anomalies.push(ProtocolAnomaly {
                    kind: ProtocolAnomalyKind::SequenceGap {
                        expected,
                        observed: header.sequence_id,
                    },
                    flow_id: header.flow_id,
                    packet_index,
                    message_type: header.message_type,
                    severity: Severity::High,
                });
            }
        }
        // State advances even across a gap
        self.last_sequence.insert(header.flow_id, header.sequence_id);

        if header.payload_size as u32 > self.oversized_threshold {
            anomalies.push(ProtocolAnomaly {
                kind: ProtocolAnomalyKind::OversizedMessage {
                    payload_size: header.payload_size,
                },
                flow_id: header.flow_id,
                packet_index,
                message_type: header.message_type,
                severity: Severity::Medium,
            });
        }

        anomalies
    }

    /// Scan a packet stream in order, collecting every finding.
    pub fn scan<'a, I>(&mut self, packets: I) -> Vec<ProtocolAnomaly>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        packets
            .into_iter()
            .enumerate()
            .flat_map(|(index, packet)| self.inspect(index, packet))
            .collect()
    }

    /// Aggregate statistics for the packets scanned so far
    pub fn stats(&self) -> &FronthaulStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(message_type: u8, payload_size: u16, flow_id: u16, sequence_id: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; 8];
        bytes[0] = 0x10 | (message_type & 0x07); // revision 1
        bytes[1..3].copy_from_slice(&payload_size.to_be_bytes());
        bytes[4..6].copy_from_slice(&flow_id.to_be_bytes());
        bytes[6..8].copy_from_slice(&sequence_id.to_be_bytes());
        bytes
    }

    fn scanner() -> ProtocolScanner {
        ProtocolScanner::new(&ProtocolConfig::default())
    }

    #[test]
    fn test_single_gap_detected() {
        let packets: Vec<Vec<u8>> = [0u16, 1, 2, 5]
            .iter()
            .map(|&seq| packet(0, 64, 1, seq))
            .collect();

        let mut scanner = scanner();
        let anomalies = scanner.scan(packets.iter().map(|p| p.as_slice()));

        assert_eq!(anomalies.len(), 1);
        let anomaly = &anomalies[0];
        assert_eq!(anomaly.packet_index, 3);
        assert_eq!(anomaly.flow_id, 1);
        assert_eq!(anomaly.severity, Severity::High);
        assert!(matches!(
            anomaly.kind,
            ProtocolAnomalyKind::SequenceGap {
                expected: 3,
                observed: 5
            }
        ));
    }

    #[test]
    fn test_wraparound_is_valid_continuity() {
        let packets: Vec<Vec<u8>> = [65534u16, 65535, 0, 1]
            .iter()
            .map(|&seq| packet(0, 64, 9, seq))
            .collect();

        let mut scanner = scanner();
        let anomalies = scanner.scan(packets.iter().map(|p| p.as_slice()));
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_oversize_boundary_is_exclusive() {
        let mut scanner = scanner();
        assert!(scanner.inspect(0, &packet(3, 9600, 2, 0)).is_empty());

        let anomalies = scanner.inspect(1, &packet(3, 9601, 2, 1));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::Medium);
        assert!(matches!(
            anomalies[0].kind,
            ProtocolAnomalyKind::OversizedMessage { payload_size: 9601 }
        ));
    }

    #[test]
    fn test_gap_and_oversize_on_one_packet() {
        let mut scanner = scanner();
        assert!(scanner.inspect(0, &packet(0, 64, 4, 10)).is_empty());

        let anomalies = scanner.inspect(1, &packet(0, 10000, 4, 20));
        assert_eq!(anomalies.len(), 2);
        assert!(matches!(
            anomalies[0].kind,
            ProtocolAnomalyKind::SequenceGap { .. }
        ));
        assert!(matches!(
            anomalies[1].kind,
            ProtocolAnomalyKind::OversizedMessage { .. }
        ));
    }

    #[test]
    fn test_flows_are_independent() {
        let packets: Vec<Vec<u8>> = vec![
            packet(0, 64, 1, 0),
            packet(0, 64, 2, 100),
            packet(0, 64, 1, 1),
            packet(0, 64, 2, 101),
        ];

        let mut scanner = scanner();
        let anomalies = scanner.scan(packets.iter().map(|p| p.as_slice()));
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_state_advances_across_a_gap() {
        let packets: Vec<Vec<u8>> = [0u16, 5, 6]
            .iter()
            .map(|&seq| packet(0, 64, 1, seq))
            .collect();

        let mut scanner = scanner();
        let anomalies = scanner.scan(packets.iter().map(|p| p.as_slice()));
        // One gap at 0 -> 5; 5 -> 6 is continuous again
        assert_eq!(anomalies.len(), 1);
    }

    #[test]
    fn test_short_packets_are_skipped_silently() {
        let mut scanner = scanner();
        assert!(scanner.inspect(0, &[0x10, 0x00]).is_empty());
        assert!(scanner.inspect(1, &[]).is_empty());
        assert_eq!(scanner.stats().total_messages, 0);

        // The stream continues normally afterwards
        assert!(scanner.inspect(2, &packet(0, 64, 1, 0)).is_empty());
        assert_eq!(scanner.stats().total_messages, 1);
    }

    #[test]
    fn test_stats_accumulate() {
        let packets: Vec<Vec<u8>> = vec![
            packet(0, 100, 1, 0),
            packet(0, 200, 1, 1),
            packet(5, 50, 2, 7),
        ];

        let mut scanner = scanner();
        scanner.scan(packets.iter().map(|p| p.as_slice()));

        let stats = scanner.stats();
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.bandwidth_bytes, 100 + 200 + 50 + 3 * 8);
        assert_eq!(stats.message_type_counts[&EcpriMessageType::IqData], 2);
        assert_eq!(stats.message_type_counts[&EcpriMessageType::OneWayDelay], 1);
    }

    #[test]
    fn test_narrow_sequence_width() {
        let config = ProtocolConfig {
            sequence_width_bits: 8,
            ..ProtocolConfig::default()
        };
        let packets: Vec<Vec<u8>> = [254u16, 255, 0]
            .iter()
            .map(|&seq| packet(0, 64, 1, seq))
            .collect();

        let mut scanner = ProtocolScanner::new(&config);
        let anomalies = scanner.scan(packets.iter().map(|p| p.as_slice()));
        // 255 -> 0 wraps at 2^8
        assert!(anomalies.is_empty());
    }
}
