//! # Log Buffer & Rotation
//!
//! Samples are held in memory and written to the live log file
//! `<name>.<ext>` in batches of `in_memory_records`. Once the live file has
//! received `max_file_records` records it is renamed to
//! `<name>_<unix_epoch_seconds>.<ext>` and the next flush starts a new file.
//!
//! Two formats are supported:
//!
//! - **CSV**: one row per sample, header made of the tag names. Rows written
//!   to an existing file follow that file's header.
//! - **JSON**: one object keyed by `timestamp_utc`. Every flush merges the
//!   buffer into the existing document and rewrites the file through a
//!   sibling temporary file, so the cost of a flush grows with the file.
//!
//! A failed write leaves the buffer untouched: nothing is counted as logged
//! until it is on disk.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::LogResult;
use crate::value::Sample;

/// On-disk representation of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Csv,
    /// Pretty-printed with `indent` spaces, compact when `None`.
    Json { indent: Option<usize> },
}

impl LogFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            LogFormat::Csv => "csv",
            LogFormat::Json { .. } => "json",
        }
    }
}

/// Parameters of a [`LogBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    /// File stem of the live log file.
    pub file_name: String,
    pub format: LogFormat,
    /// Samples held in memory before a flush.
    pub in_memory_records: usize,
    /// Records written to the live file before it is rotated.
    pub max_file_records: usize,
}

/// Bounded sample buffer with threshold flush and record-count rotation.
#[derive(Debug)]
pub struct LogBuffer {
    directory: PathBuf,
    settings: LogSettings,
    written_to_live_file_count: usize,
    data: Vec<Sample>,
}

impl LogBuffer {
    /// Create an empty buffer writing into `directory`.
    ///
    /// Thresholds of zero are treated as one.
    pub fn new(directory: impl Into<PathBuf>, mut settings: LogSettings) -> Self {
        settings.in_memory_records = settings.in_memory_records.max(1);
        settings.max_file_records = settings.max_file_records.max(1);
        Self {
            directory: directory.into(),
            data: Vec::with_capacity(settings.in_memory_records),
            settings,
            written_to_live_file_count: 0,
        }
    }

    pub fn live_path(&self) -> PathBuf {
        self.directory.join(format!(
            "{}.{}",
            self.settings.file_name,
            self.settings.format.extension()
        ))
    }

    pub fn in_memory_count(&self) -> usize {
        self.data.len()
    }

    pub fn written_to_live_file_count(&self) -> usize {
        self.written_to_live_file_count
    }

    pub fn settings(&self) -> &LogSettings {
        &self.settings
    }

    /// Buffer one sample, flushing the full buffer first when it is at the
    /// threshold.
    ///
    /// The flush happens on the `threshold + 1`-th append and writes exactly
    /// `threshold` records; the new sample then starts the next batch. If
    /// the write fails the new sample is still buffered and the error is
    /// returned, so the next flush retries everything.
    pub fn append(&mut self, sample: Sample) -> LogResult<()> {
        if self.data.len() < self.settings.in_memory_records {
            self.data.push(sample);
            return Ok(());
        }

        if let Err(e) = self.write_buffer() {
            self.data.push(sample);
            return Err(e);
        }
        self.written_to_live_file_count += self.data.len();
        self.data.clear();
        self.data.push(sample);

        if self.written_to_live_file_count >= self.settings.max_file_records {
            self.rotate()?;
        }
        Ok(())
    }

    /// Write whatever is buffered, then rotate the live file.
    ///
    /// An empty buffer writes nothing and creates no file; rotation is a
    /// no-op when there is no live file, so calling this twice is harmless.
    /// Returns the path of the rotated file, if one was produced.
    pub fn flush_now(&mut self) -> LogResult<Option<PathBuf>> {
        if !self.data.is_empty() {
            self.write_buffer()?;
            self.written_to_live_file_count += self.data.len();
            self.data.clear();
        }
        self.rotate()
    }

    fn write_buffer(&self) -> LogResult<()> {
        fs::create_dir_all(&self.directory)?;
        let path = self.live_path();
        match self.settings.format {
            LogFormat::Csv => write_csv(&path, &self.data)?,
            LogFormat::Json { indent } => write_json(&path, &self.data, indent)?,
        }
        info!("Flushed {} records to {}", self.data.len(), path.display());
        Ok(())
    }

    /// Rename the live file out of the way and reset the record counter.
    fn rotate(&mut self) -> LogResult<Option<PathBuf>> {
        let live = self.live_path();
        if !live.exists() {
            debug!("No live file at {}, nothing to rotate", live.display());
            self.written_to_live_file_count = 0;
            return Ok(None);
        }

        let target = rotation_target(
            &self.directory,
            &self.settings.file_name,
            self.settings.format.extension(),
            Utc::now().timestamp(),
        );
        fs::rename(&live, &target)?;
        self.written_to_live_file_count = 0;
        info!("Rotated {} to {}", live.display(), target.display());
        Ok(Some(target))
    }
}

/// `<stem>_<epoch>.<ext>`, or `<stem>_<epoch>_<n>.<ext>` if that is taken.
pub fn rotation_target(directory: &Path, stem: &str, extension: &str, epoch: i64) -> PathBuf {
    let mut candidate = directory.join(format!("{}_{}.{}", stem, epoch, extension));
    let mut n = 1;
    while candidate.exists() {
        candidate = directory.join(format!("{}_{}_{}.{}", stem, epoch, n, extension));
        n += 1;
    }
    candidate
}

/// Tag names in first-seen order across `samples`.
fn union_header(samples: &[Sample]) -> Vec<String> {
    let mut header: Vec<String> = Vec::new();
    for sample in samples {
        for key in sample.keys() {
            if !header.iter().any(|h| h == key) {
                header.push(key.to_string());
            }
        }
    }
    header
}

fn write_csv(path: &Path, samples: &[Sample]) -> LogResult<()> {
    let existing = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);

    let (header, mut writer) = if existing {
        let header: Vec<String> = csv::Reader::from_path(path)?
            .headers()?
            .iter()
            .map(str::to_string)
            .collect();
        let file = OpenOptions::new().append(true).open(path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        (header, writer)
    } else {
        let header = union_header(samples);
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&header)?;
        (header, writer)
    };

    if existing {
        let dropped: Vec<String> = union_header(samples)
            .into_iter()
            .filter(|tag| !header.contains(tag))
            .collect();
        if !dropped.is_empty() {
            warn!(
                "{}: tags not in the existing header are not logged: {}",
                path.display(),
                dropped.join(", ")
            );
        }
    }

    for sample in samples {
        let record = header.iter().map(|tag| {
            sample
                .get(tag)
                .map(|value| value.to_string())
                .unwrap_or_default()
        });
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json(path: &Path, samples: &[Sample], indent: Option<usize>) -> LogResult<()> {
    let mut document: Map<String, Value> = match fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => serde_json::from_str(&text)?,
        Ok(_) => Map::new(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
        Err(e) => return Err(e.into()),
    };

    for sample in samples {
        document.insert(
            sample.timestamp_utc().to_string(),
            serde_json::to_value(sample)?,
        );
    }

    let temp_path = path.with_extension("json.tmp");
    {
        let file = File::create(&temp_path)?;
        let mut out = BufWriter::new(file);
        match indent {
            Some(width) => {
                let indent = " ".repeat(width);
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
                document.serialize(&mut serializer)?;
            }
            None => serde_json::to_writer(&mut out, &document)?,
        }
        out.flush()?;
        out.get_ref().sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}
