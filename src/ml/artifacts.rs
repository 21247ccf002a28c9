use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::debug;

use super::features::FeatureRow;
use crate::error::{PipelineError, PipelineResult};
use crate::indicators::IndicatorSet;
use crate::types::SignalClass;

/// Replaces `path` with `bytes` via a temp file in the same directory,
/// so readers see either the old file or the complete new one
pub fn persist_bytes(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| PipelineError::persistence(path, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PipelineError::persistence(path, e))?;
    tmp.write_all(bytes).map_err(|e| PipelineError::persistence(path, e))?;
    tmp.flush().map_err(|e| PipelineError::persistence(path, e))?;
    tmp.persist(path).map_err(|e| PipelineError::persistence(path, e.error))?;
    Ok(())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn csv_bytes(header: &[String], rows: impl IntoIterator<Item = Vec<String>>) -> csv::Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    if !header.is_empty() {
        wtr.write_record(header)?;
    }
    for row in rows {
        wtr.write_record(&row)?;
    }
    wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

pub fn dataset_header() -> Vec<String> {
    std::iter::once("timestamp")
        .chain(IndicatorSet::FEATURE_NAMES)
        .chain(std::iter::once("label"))
        .map(String::from)
        .collect()
}

/// Writes the labeled dataset; f64 values use shortest round-trip formatting
/// so re-reading yields bit-identical features
pub fn write_dataset(path: &Path, rows: &[FeatureRow]) -> PipelineResult<()> {
    let body = rows.iter().map(|row| {
        std::iter::once(format_timestamp(&row.timestamp))
            .chain(row.features.to_array().iter().map(|v| v.to_string()))
            .chain(std::iter::once(row.label.map(|l| l.to_string()).unwrap_or_default()))
            .collect::<Vec<String>>()
    });

    let bytes = csv_bytes(&dataset_header(), body).map_err(|e| PipelineError::persistence(path, e))?;
    persist_bytes(path, &bytes)?;
    debug!("Wrote {} dataset rows to {}", rows.len(), path.display());
    Ok(())
}

/// Reads a dataset written by `write_dataset`, checking layout and ordering
pub fn read_dataset(path: &Path) -> PipelineResult<Vec<FeatureRow>> {
    if !path.exists() {
        return Err(PipelineError::DatasetMissing(path.to_path_buf()));
    }

    let mut reader = csv::Reader::from_path(path).map_err(|e| PipelineError::malformed(path, e.to_string()))?;
    let header: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::malformed(path, e.to_string()))?
        .iter()
        .map(String::from)
        .collect();
    if header != dataset_header() {
        return Err(PipelineError::malformed(path, format!("unexpected header {:?}", header)));
    }

    let mut rows: Vec<FeatureRow> = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let record = record.map_err(|e| PipelineError::malformed(path, e.to_string()))?;
        let bad = |what: String| PipelineError::malformed(path, format!("line {}: {}", line, what));

        let timestamp = DateTime::parse_from_rfc3339(&record[0])
            .map_err(|e| bad(format!("timestamp: {}", e)))?
            .with_timezone(&Utc);

        let mut values = [0.0; IndicatorSet::NUM_FEATURES];
        for (i, value) in values.iter_mut().enumerate() {
            let raw = &record[i + 1];
            *value = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| bad(format!("{} = '{}'", IndicatorSet::FEATURE_NAMES[i], raw)))?;
        }

        let raw_label = &record[IndicatorSet::NUM_FEATURES + 1];
        let label = if raw_label.is_empty() {
            None
        } else {
            Some(SignalClass::from_str(raw_label).map_err(|e| bad(e.to_string()))?)
        };

        if let Some(prev) = rows.last() {
            if timestamp <= prev.timestamp {
                return Err(bad(format!("timestamp {} is not after {}", timestamp, prev.timestamp)));
            }
        }

        rows.push(FeatureRow { timestamp, features: IndicatorSet::from_array(values), label });
    }

    debug!("Read {} dataset rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// One row of the forward-test results artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardTestRecord {
    pub timestamp: DateTime<Utc>,
    pub prediction: SignalClass,
    pub actual: SignalClass,
    pub confidence: f64,
    pub correct: bool,
}

pub fn write_results(path: &Path, records: &[ForwardTestRecord]) -> PipelineResult<()> {
    let header: Vec<String> = ["timestamp", "prediction", "actual", "confidence", "correct"]
        .into_iter()
        .map(String::from)
        .collect();
    let body = records.iter().map(|r| {
        vec![
            format_timestamp(&r.timestamp),
            r.prediction.to_string(),
            r.actual.to_string(),
            r.confidence.to_string(),
            r.correct.to_string(),
        ]
    });

    let bytes = csv_bytes(&header, body).map_err(|e| PipelineError::persistence(path, e))?;
    persist_bytes(path, &bytes)
}

/// One row of the append-only live predictions log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveLogEntry {
    pub timestamp: DateTime<Utc>,
    pub bar_time: DateTime<Utc>,
    pub prediction: SignalClass,
    pub confidence: f64,
    pub current_price: Decimal,
    pub indicators: IndicatorSet,
}

fn live_log_header() -> Vec<String> {
    ["timestamp", "bar_time", "prediction", "confidence", "current_price"]
        .into_iter()
        .chain(IndicatorSet::FEATURE_NAMES)
        .map(String::from)
        .collect()
}

/// Appends one entry, writing the header first when the file is new or empty.
/// The row is rendered in memory and written with a single call.
pub fn append_live_entry(path: &Path, entry: &LiveLogEntry) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(path, e))?;
    }

    let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let header = if needs_header { live_log_header() } else { Vec::new() };

    let row: Vec<String> = [
        format_timestamp(&entry.timestamp),
        format_timestamp(&entry.bar_time),
        entry.prediction.to_string(),
        entry.confidence.to_string(),
        entry.current_price.to_string(),
    ]
    .into_iter()
    .chain(entry.indicators.to_array().iter().map(|v| v.to_string()))
    .collect();

    let bytes = csv_bytes(&header, std::iter::once(row)).map_err(|e| PipelineError::persistence(path, e))?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PipelineError::persistence(path, e))?;
    file.write_all(&bytes).map_err(|e| PipelineError::persistence(path, e))?;
    file.flush().map_err(|e| PipelineError::persistence(path, e))?;
    Ok(())
}
