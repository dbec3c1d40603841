// Feature Extraction Module
//
// Turns raw log lines (or, for packet captures, a synthetic stand-in batch)
// into fixed-length numeric vectors for the detector ensemble. A batch is
// always built from a single source kind; log and capture vectors have
// different dimensionality and never mix.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Number of features extracted from a log line
pub const LINE_FEATURE_COUNT: usize = 18;

/// Number of features in a synthetic capture sample
pub const CAPTURE_FEATURE_COUNT: usize = 8;

/// Lines shorter than this after trimming carry no signal and are skipped
const MIN_INFORMATIVE_LEN: usize = 5;

/// Upper bound on the synthetic batch size for one capture file
const MAX_SYNTHETIC_SAMPLES: u64 = 100;

/// Source kind a feature batch was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Text log file, one sample per informative line
    LogText,
    /// Packet capture, synthetic stand-in samples
    PacketCapture,
}

/// Features extracted from a single log line
///
/// The vector captures how much structure and how many failure keywords a
/// line carries, plus a handful of binary fronthaul-domain indicators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineFeatures {
    /// Raw line length in bytes
    pub line_length: usize,
    /// Zero-based position of the line in its file
    pub line_position: usize,
    /// Space character count
    pub whitespace_count: usize,
    /// Colon count (structured key/value indicators)
    pub colon_count: usize,
    /// Opening bracket count (configuration/parameter indicators)
    pub bracket_count: usize,
    /// Occurrences of "error"
    pub error_mentions: usize,
    /// Occurrences of "warning"
    pub warning_mentions: usize,
    /// Occurrences of "critical"
    pub critical_mentions: usize,
    /// Occurrences of "timeout"
    pub timeout_mentions: usize,
    /// Occurrences of "failed"
    pub failed_mentions: usize,
    /// Occurrences of "lost"
    pub lost_mentions: usize,
    /// Occurrences of "retry"
    pub retry_mentions: usize,
    /// ASCII digit count (numerical data density)
    pub digit_count: usize,
    /// Line mentions both DU and RU roles
    pub du_ru_mention: bool,
    /// Line mentions a UE (subscriber) identifier
    pub ue_mention: bool,
    /// Line mentions jitter, latency or delay
    pub timing_issues: bool,
    /// Line mentions packet or frame
    pub packet_mention: bool,
    /// Line mentions an attach or detach event
    pub ue_events: bool,
}

impl LineFeatures {
    /// Extract features from one log line.
    ///
    /// Returns `None` for non-informative lines (empty or shorter than 5
    /// characters after trimming); such lines are excluded from the batch
    /// entirely rather than zero-filled.
    pub fn from_line(line: &str, position: usize) -> Option<Self> {
        let lower = line.trim().to_lowercase();
        if lower.len() < MIN_INFORMATIVE_LEN {
            return None;
        }

        let contains_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        Some(Self {
            line_length: line.len(),
            line_position: position,
            whitespace_count: count_occurrences(line, " "),
            colon_count: count_occurrences(line, ":"),
            bracket_count: count_occurrences(line, "["),
            error_mentions: count_occurrences(line, "error"),
            warning_mentions: count_occurrences(line, "warning"),
            critical_mentions: count_occurrences(line, "critical"),
            timeout_mentions: count_occurrences(line, "timeout"),
            failed_mentions: count_occurrences(line, "failed"),
            lost_mentions: count_occurrences(line, "lost"),
            retry_mentions: count_occurrences(line, "retry"),
            digit_count: line.chars().filter(|c| c.is_ascii_digit()).count(),
            du_ru_mention: lower.contains("du") && lower.contains("ru"),
            ue_mention: lower.contains("ue"),
            timing_issues: contains_any(&["jitter", "latency", "delay"]),
            packet_mention: contains_any(&["packet", "frame"]),
            ue_events: contains_any(&["attach", "detach"]),
        })
    }

    /// Convert features to a vector for model input.
    ///
    /// Order matters and must stay consistent with `feature_names`.
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.line_length as f64,
            self.line_position as f64,
            self.whitespace_count as f64,
            self.colon_count as f64,
            self.bracket_count as f64,
            self.error_mentions as f64,
            self.warning_mentions as f64,
            self.critical_mentions as f64,
            self.timeout_mentions as f64,
            self.failed_mentions as f64,
            self.lost_mentions as f64,
            self.retry_mentions as f64,
            self.digit_count as f64,
            self.du_ru_mention as u8 as f64,
            self.ue_mention as u8 as f64,
            self.timing_issues as u8 as f64,
            self.packet_mention as u8 as f64,
            self.ue_events as u8 as f64,
        ]
    }

    /// Feature names, in vector order (used by the explanation seam)
    pub fn feature_names() -> [&'static str; LINE_FEATURE_COUNT] {
        [
            "line_length",
            "line_position",
            "whitespace_count",
            "colon_count",
            "bracket_count",
            "error_mentions",
            "warning_mentions",
            "critical_mentions",
            "timeout_mentions",
            "failed_mentions",
            "lost_mentions",
            "retry_mentions",
            "digit_count",
            "du_ru_mention",
            "ue_mention",
            "timing_issues",
            "packet_mention",
            "ue_events",
        ]
    }
}

/// Non-overlapping substring occurrence count, matching on the raw line
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// A batch of feature vectors from one file, ready for normalization
#[derive(Debug, Clone)]
pub struct FeatureBatch {
    kind: SourceKind,
    records: Array2<f64>,
    sample_indices: Vec<usize>,
}

impl FeatureBatch {
    /// Build a batch from the lines of a log file.
    ///
    /// Non-informative lines are dropped; `sample_indices` maps each batch
    /// row back to the original line position.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut vectors = Vec::new();
        let mut sample_indices = Vec::new();

        for (position, line) in lines.iter().enumerate() {
            if let Some(features) = LineFeatures::from_line(line.as_ref(), position) {
                vectors.push(features.to_vector());
                sample_indices.push(position);
            }
        }

        let mut records = Array2::zeros((vectors.len(), LINE_FEATURE_COUNT));
        for (row, vector) in vectors.iter().enumerate() {
            for (col, value) in vector.iter().enumerate() {
                records[[row, col]] = *value;
            }
        }

        Self {
            kind: SourceKind::LogText,
            records,
            sample_indices,
        }
    }

    /// Build a synthetic stand-in batch for a packet capture.
    ///
    /// Per-packet structural decoding is the capture decoder's job; this
    /// path only exercises the scoring pipeline and carries no packet
    /// semantics. The batch is bounded to `min(100, file_size / 1000)`
    /// samples and seeded from the file size so repeated runs agree.
    pub fn synthetic_capture(file_size: u64) -> Self {
        let sample_count = MAX_SYNTHETIC_SAMPLES.min(file_size / 1000) as usize;
        let mut rng = StdRng::seed_from_u64(file_size);

        let mut records = Array2::zeros((sample_count, CAPTURE_FEATURE_COUNT));
        for row in 0..sample_count {
            records[[row, 0]] = rng.gen_range(40.0..1500.0); // packet size
            records[[row, 1]] = rng.gen_range(0.0..1000.0); // inter-arrival time
            records[[row, 2]] = rng.gen_range(0..255) as f64; // protocol type
            records[[row, 3]] = rng.gen_range(0.0..100.0); // header length
            records[[row, 4]] = rng.gen_range(0..2) as f64; // error flag
            records[[row, 5]] = rng.gen_range(0.0..10.0); // jitter estimate
            records[[row, 6]] = row as f64; // packet sequence
            records[[row, 7]] = rng.gen_range(0.0..1.0); // quality score
        }

        Self {
            kind: SourceKind::PacketCapture,
            records,
            sample_indices: (0..sample_count).collect(),
        }
    }

    /// Source kind this batch was built from
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Batch matrix, samples by features
    pub fn records(&self) -> &Array2<f64> {
        &self.records
    }

    /// Original record positions, one per batch row
    pub fn sample_indices(&self) -> &[usize] {
        &self.sample_indices
    }

    /// Number of samples in the batch
    pub fn len(&self) -> usize {
        self.records.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.records.nrows() == 0
    }
}
