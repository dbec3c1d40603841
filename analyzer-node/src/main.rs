use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use analyzer_node::config::{AnalyzerConfig, LoggingConfig};
use analyzer_node::storage::{persist_report, AnomalySink, JsonlSink};
use analyzer_node::{AnalysisEngine, AnalysisSession, FileReport};

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if config.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Recursively collect analyzable files under a folder, sorted for a
/// reproducible processing order.
fn collect_input_files(folder: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![folder.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("failed to read input folder {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if matches_extension(&path, extensions) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn is_capture(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("pcap") || ext.eq_ignore_ascii_case("cap")
    )
}

fn analyze_file(engine: &AnalysisEngine, path: &Path) -> Result<FileReport> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    if is_capture(path) {
        let size = std::fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        // Structural packet decoding belongs to the capture decoder
        // collaborator; without it the capture path runs the stand-in batch
        // only and no protocol scan.
        Ok(engine.analyze_capture(&name, size, &[]))
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let lines: Vec<&str> = content.lines().collect();
        Ok(engine.analyze_lines(&name, &lines))
    }
}

fn main() -> Result<()> {
    let config_path =
        std::env::var("ANALYZER_CONFIG").unwrap_or_else(|_| "config/analyzer.toml".to_string());

    let mut config = if Path::new(&config_path).exists() {
        AnalyzerConfig::from_file(&config_path)
            .with_context(|| format!("failed to load config from {config_path}"))?
    } else {
        AnalyzerConfig::default()
    };
    config.apply_environment_overrides();
    config.validate().context("invalid configuration")?;

    init_tracing(&config.logging);
    info!(config = %config_path, "Fronthaul anomaly analyzer starting");

    let folder = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.input.folder.clone());

    let files = collect_input_files(&folder, &config.input.extensions)?;
    if files.is_empty() {
        warn!(folder = %folder.display(), "No supported input files found");
        return Ok(());
    }
    info!(count = files.len(), folder = %folder.display(), "Input files discovered");

    let mut sink = if config.storage.enabled {
        match JsonlSink::create(&config.storage.output_path) {
            Ok(sink) => Some(sink),
            Err(e) => {
                // Persistence is fire-and-forget; analysis continues without it
                warn!(error = %e, "Could not open persistence sink, findings will not be stored");
                None
            }
        }
    } else {
        None
    };

    let engine = AnalysisEngine::new(&config);
    let mut session = AnalysisSession::new();

    for path in &files {
        let report = match analyze_file(&engine, path) {
            Ok(report) => report,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable file");
                continue;
            }
        };

        info!(
            file = %report.source_file,
            samples = report.total_samples,
            anomalies = report.records.len(),
            persisted = report.persisted_count(),
            protocol_anomalies = report.protocol_anomalies.len(),
            models = report.executed_models.len(),
            "File analyzed"
        );
        for (model, reason) in &report.skipped_models {
            warn!(file = %report.source_file, model = *model, %reason, "Detector skipped");
        }

        if let Some(sink) = sink.as_mut() {
            persist_report(sink, &report);
        }
        session.record(&report);
    }

    let summary = session.finish();
    if let Some(sink) = sink.as_mut() {
        if let Err(e) = sink.persist_session_summary(&summary) {
            warn!(error = %e, "Failed to persist session summary");
        }
    }

    info!(
        session = %summary.session_id,
        files = summary.files_processed,
        samples = summary.total_samples,
        anomalies = summary.anomalies_detected,
        persisted = summary.anomalies_persisted,
        "Analysis session complete"
    );

    Ok(())
}
