//! Station coordinate lookup.
//!
//! The engine never resolves stations itself; consumers that need map
//! positions for stops pass a [`StationLookup`] in explicitly.

use std::collections::HashMap;
use std::io::Read;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::geometry::Coord;
use crate::ingest::StationId;

/// Resolves a normalized station id to `[lon, lat]`.
pub trait StationLookup {
    fn coord(&self, id: &StationId) -> Option<Coord>;
}

impl StationLookup for HashMap<StationId, Coord> {
    fn coord(&self, id: &StationId) -> Option<Coord> {
        self.get(id).copied()
    }
}

/// Station table loaded from CSV exports.
///
/// Every row is reachable under its upper-cased raw id and its normalized
/// id, so `"S101"` and `"101"` both resolve.
#[derive(Debug, Default, Clone)]
pub struct StationCoords {
    by_id: HashMap<String, Coord>,
}

#[derive(Debug, Deserialize)]
struct StationRow {
    #[serde(rename = "StationID", alias = "stationId", alias = "id")]
    station_id: Option<String>,
    #[serde(rename = "StationLon", alias = "lon")]
    lon: Option<String>,
    #[serde(rename = "StationLat", alias = "lat")]
    lat: Option<String>,
}

impl StationCoords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a CSV file. Later calls on the same table overwrite earlier ids.
    pub fn load_csv(&mut self, path: &str) -> Result<usize> {
        let file = std::fs::File::open(path).with_context(|| format!("opening {path}"))?;
        let added = self.extend_from_csv(file)?;
        info!(path, stations = added, "Station table loaded");
        Ok(added)
    }

    /// Reads `StationID,StationLon,StationLat` rows; rows without an id or
    /// with unreadable coordinates are skipped.
    pub fn extend_from_csv<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut added = 0;

        for (line, result) in rdr.deserialize::<StationRow>().enumerate() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    debug!(line, error = %e, "Skipping station row");
                    continue;
                }
            };
            let Some(id) = row.station_id.filter(|s| !s.is_empty()) else {
                continue;
            };
            let (Some(lon), Some(lat)) = (parse_coord(row.lon), parse_coord(row.lat)) else {
                continue;
            };
            self.insert(&id, [lon, lat]);
            added += 1;
        }

        Ok(added)
    }

    pub fn insert(&mut self, raw_id: &str, coord: Coord) {
        self.by_id.insert(raw_id.trim().to_uppercase(), coord);
        if let Some(id) = StationId::normalize(raw_id) {
            self.by_id.insert(id.as_str().to_string(), coord);
        }
    }

    /// Lookup by any spelling of the id.
    pub fn get(&self, raw_id: &str) -> Option<Coord> {
        self.by_id
            .get(&raw_id.trim().to_uppercase())
            .or_else(|| {
                StationId::normalize(raw_id).and_then(|id| self.by_id.get(id.as_str()))
            })
            .copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl StationLookup for StationCoords {
    fn coord(&self, id: &StationId) -> Option<Coord> {
        self.by_id.get(id.as_str()).copied()
    }
}

fn parse_coord(value: Option<String>) -> Option<f64> {
    value?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
