// Persistence sink seam
//
// The external persistence collaborator consumes anomaly records that pass
// the agreement gate, protocol anomalies, and file/session summaries. Sink
// failures are logged and swallowed: a failed write never discards the
// in-memory record or stops analysis of subsequent samples and files.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::analyzer::{FileReport, FileSummary, SessionSummary};
use crate::error::{AnalyzerError, Result};
use crate::protocol::ProtocolAnomaly;
use crate::voting::AnomalyRecord;

/// Destination for analyzer findings
pub trait AnomalySink {
    fn persist_record(&mut self, source_file: &str, record: &AnomalyRecord) -> Result<()>;

    fn persist_protocol_anomaly(
        &mut self,
        source_file: &str,
        anomaly: &ProtocolAnomaly,
    ) -> Result<()>;

    fn persist_file_summary(&mut self, summary: &FileSummary) -> Result<()>;

    fn persist_session_summary(&mut self, summary: &SessionSummary) -> Result<()>;
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_file: Option<&'a str>,
    payload: &'a T,
}

/// JSON-lines file sink, one finding per line
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_line<T: Serialize>(
        &mut self,
        kind: &'static str,
        source_file: Option<&str>,
        payload: &T,
    ) -> Result<()> {
        let envelope = Envelope {
            kind,
            source_file,
            payload,
        };
        serde_json::to_writer(&mut self.writer, &envelope)?;
        self.writer.write_all(b"\n")?;
        self.writer
            .flush()
            .map_err(|e| AnalyzerError::Storage(e.to_string()))
    }
}

impl AnomalySink for JsonlSink {
    fn persist_record(&mut self, source_file: &str, record: &AnomalyRecord) -> Result<()> {
        self.write_line("anomaly", Some(source_file), record)
    }

    fn persist_protocol_anomaly(
        &mut self,
        source_file: &str,
        anomaly: &ProtocolAnomaly,
    ) -> Result<()> {
        self.write_line("protocol_anomaly", Some(source_file), anomaly)
    }

    fn persist_file_summary(&mut self, summary: &FileSummary) -> Result<()> {
        self.write_line("file_summary", None, summary)
    }

    fn persist_session_summary(&mut self, summary: &SessionSummary) -> Result<()> {
        self.write_line("session_summary", None, summary)
    }
}

/// In-memory sink, a stand-in for the external store in tests and demos
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<(String, AnomalyRecord)>,
    pub protocol_anomalies: Vec<(String, ProtocolAnomaly)>,
    pub file_summaries: Vec<FileSummary>,
    pub session_summaries: Vec<SessionSummary>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnomalySink for MemorySink {
    fn persist_record(&mut self, source_file: &str, record: &AnomalyRecord) -> Result<()> {
        self.records.push((source_file.to_string(), record.clone()));
        Ok(())
    }

    fn persist_protocol_anomaly(
        &mut self,
        source_file: &str,
        anomaly: &ProtocolAnomaly,
    ) -> Result<()> {
        self.protocol_anomalies
            .push((source_file.to_string(), anomaly.clone()));
        Ok(())
    }

    fn persist_file_summary(&mut self, summary: &FileSummary) -> Result<()> {
        self.file_summaries.push(summary.clone());
        Ok(())
    }

    fn persist_session_summary(&mut self, summary: &SessionSummary) -> Result<()> {
        self.session_summaries.push(summary.clone());
        Ok(())
    }
}

/// Persist a file report through the sink, fire-and-forget.
///
/// Only records that passed the agreement gate are written; protocol
/// anomalies are always written. Returns how many writes succeeded.
pub fn persist_report<S: AnomalySink>(sink: &mut S, report: &FileReport) -> usize {
    let mut written = 0;

    for record in report.records.iter().filter(|r| r.persist) {
        match sink.persist_record(&report.source_file, record) {
            Ok(()) => written += 1,
            Err(e) => warn!(
                file = %report.source_file,
                sample = record.sample_index,
                error = %e,
                "Failed to persist anomaly record, continuing"
            ),
        }
    }

    for anomaly in &report.protocol_anomalies {
        match sink.persist_protocol_anomaly(&report.source_file, anomaly) {
            Ok(()) => written += 1,
            Err(e) => warn!(
                file = %report.source_file,
                packet = anomaly.packet_index,
                error = %e,
                "Failed to persist protocol anomaly, continuing"
            ),
        }
    }

    if let Err(e) = sink.persist_file_summary(&report.summary()) {
        warn!(file = %report.source_file, error = %e, "Failed to persist file summary");
    } else {
        written += 1;
    }

    debug!(file = %report.source_file, written, "Report persisted");
    written
}
