//! Persistence and reporting for reconstruction results.
//!
//! Timeline records go to JSON (optionally gzip-compressed), per-trip
//! summaries are appended to a CSV file, and pass statistics are logged.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::{debug, info};

use crate::stats::{ReconstructionStats, TripSummary};
use crate::timeline::TimelineRecord;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Logs reconstruction statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &ReconstructionStats) {
    debug!("{:#?}", stats);
}

/// Logs reconstruction statistics as pretty-printed JSON.
pub fn print_json(stats: &ReconstructionStats) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// Writes all records as one JSON array, gzip-compressed when `gzip` is set.
pub fn write_records(path: &str, records: &[TimelineRecord], gzip: bool) -> Result<()> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("creating {path}"))?;
    let writer = BufWriter::new(file);

    if gzip {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        serde_json::to_writer(&mut encoder, records)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = writer;
        serde_json::to_writer(&mut writer, records)?;
        writer.flush()?;
    }

    debug!(path, records = records.len(), gzip, "Timeline records written");
    Ok(())
}

/// Reads records written by [`write_records`], compressed or not.
pub fn read_records(path: &str) -> Result<Vec<TimelineRecord>> {
    let mut bytes = Vec::new();
    File::open(path)
        .with_context(|| format!("opening {path}"))?
        .read_to_end(&mut bytes)?;
    decode_records(&bytes)
}

/// Decodes a record array, detecting gzip by its magic bytes.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<TimelineRecord>> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let reader = BufReader::new(GzDecoder::new(bytes));
        Ok(serde_json::from_reader(reader)?)
    } else {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Appends one [`TripSummary`] row per record to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_summaries(path: &str, records: &[TimelineRecord]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = records.len(), "Appending trip summaries");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for record in records {
        writer.serialize(TripSummary::from_record(record))?;
    }
    writer.flush()?;

    Ok(())
}
