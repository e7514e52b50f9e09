use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use printfit_core::{TelemetryEvent, TelemetrySink};
use reqwest::blocking::Client;
use serde::Serialize;

pub const SINK_ENV: &str = "PRINTFIT_TELEMETRY_SINK";
pub const FILE_ENV: &str = "PRINTFIT_TELEMETRY_FILE";
pub const ENDPOINT_ENV: &str = "PRINTFIT_TELEMETRY_ENDPOINT";

pub fn sink_from_env() -> Option<Box<dyn TelemetrySink>> {
    let mode = std::env::var(SINK_ENV).ok()?;
    match mode.trim().to_ascii_lowercase().as_str() {
        "stderr" => Some(Box::new(StderrSink)),
        "file" => {
            let path = std::env::var(FILE_ENV).ok().filter(|v| !v.trim().is_empty())?;
            Some(Box::new(FileSink::new(PathBuf::from(path))))
        }
        "http" => {
            let endpoint = std::env::var(ENDPOINT_ENV).ok().filter(|v| !v.trim().is_empty())?;
            Some(Box::new(HttpSink::new(endpoint)))
        }
        _ => None,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryEnvelope {
    event_type: String,
    width_px: i64,
    height_px: i64,
    orientation: Option<String>,
    duration_us: Option<u64>,
    detail: Option<String>,
}

impl From<&TelemetryEvent> for TelemetryEnvelope {
    fn from(event: &TelemetryEvent) -> Self {
        Self {
            event_type: format!("{:?}", event.event_type),
            width_px: event.width_px,
            height_px: event.height_px,
            orientation: event.orientation.map(|o| o.label().to_string()),
            duration_us: event.duration_us,
            detail: event.detail.clone(),
        }
    }
}

/// Writes one JSON line per event to stderr; stdout carries reports.
pub struct StderrSink;

impl TelemetrySink for StderrSink {
    fn emit(&self, event: TelemetryEvent) {
        if let Ok(line) = serde_json::to_string(&TelemetryEnvelope::from(&event)) {
            eprintln!("{}", line);
        }
    }
}

pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn write_line(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("creating telemetry log parent directory")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("opening telemetry file")?;
        writeln!(file, "{}", line).context("writing telemetry line")?;
        Ok(())
    }
}

impl TelemetrySink for FileSink {
    fn emit(&self, event: TelemetryEvent) {
        if let Ok(line) = serde_json::to_string(&TelemetryEnvelope::from(&event)) {
            let _ = self.write_line(&line);
        }
    }
}

pub struct HttpSink {
    endpoint: String,
    client: Client,
}

impl HttpSink {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: Client::new(),
        }
    }
}

impl TelemetrySink for HttpSink {
    fn emit(&self, event: TelemetryEvent) {
        let payload = TelemetryEnvelope::from(&event);
        let _ = self.client.post(&self.endpoint).json(&payload).send();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printfit_core::analyze_with_telemetry;

    #[test]
    fn file_sink_appends_one_json_line_per_event() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("events.jsonl");
        let sink = FileSink::new(path.clone());
        analyze_with_telemetry(3000, 2000, Some(&sink)).expect("analysis should succeed");

        let contents = std::fs::read_to_string(&path).expect("telemetry file");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let success: serde_json::Value = serde_json::from_str(lines[1]).expect("valid json");
        assert_eq!(success["eventType"], "AnalyzeSuccess");
        assert_eq!(success["orientation"], "landscape");
        assert_eq!(success["widthPx"], 3000);
    }
}
