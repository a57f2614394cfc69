use std::fs::File;
use std::io::Read;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use tracing::info;

use crate::geo::coordinate::Coordinate;
use crate::utils::logging::{self, FileIOType, OperationCategory};

#[derive(Debug)]
pub enum TrackLoadError {
    IoError(std::io::Error),
    CsvError(csv::Error),
    MissingColumn(&'static str),
    InvalidNumber { row: usize, column: &'static str, value: String },
    InvalidTimestamp { row: usize, value: String },
}

impl From<std::io::Error> for TrackLoadError {
    fn from(err: std::io::Error) -> Self {
        TrackLoadError::IoError(err)
    }
}

impl From<csv::Error> for TrackLoadError {
    fn from(err: csv::Error) -> Self {
        TrackLoadError::CsvError(err)
    }
}

impl std::fmt::Display for TrackLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackLoadError::IoError(e) => write!(f, "IO error: {}", e),
            TrackLoadError::CsvError(e) => write!(f, "CSV error: {}", e),
            TrackLoadError::MissingColumn(c) => write!(f, "Track header has no '{}' column", c),
            TrackLoadError::InvalidNumber { row, column, value } => {
                write!(f, "Row {}: invalid {} '{}'", row, column, value)
            }
            TrackLoadError::InvalidTimestamp { row, value } => {
                write!(f, "Row {}: invalid RFC 3339 timestamp '{}'", row, value)
            }
        }
    }
}

impl std::error::Error for TrackLoadError {}

/// Column positions resolved from the header, so column order is free.
struct Columns {
    latitude: usize,
    longitude: usize,
    accuracy: Option<usize>,
    timestamp: Option<usize>,
    altitude: Option<usize>,
}

impl Columns {
    fn from_header(header: &StringRecord) -> Result<Self, TrackLoadError> {
        let find = |name: &str| header.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        Ok(Self {
            latitude: find("latitude").ok_or(TrackLoadError::MissingColumn("latitude"))?,
            longitude: find("longitude").ok_or(TrackLoadError::MissingColumn("longitude"))?,
            accuracy: find("accuracy"),
            timestamp: find("timestamp"),
            altitude: find("altitude"),
        })
    }
}

fn optional<'a>(record: &'a StringRecord, index: Option<usize>) -> Option<&'a str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn number(value: &str, row: usize, column: &'static str) -> Result<f64, TrackLoadError> {
    value.parse().map_err(|_| TrackLoadError::InvalidNumber {
        row,
        column,
        value: value.to_string(),
    })
}

/// Parses a recorded walk. Required columns: `latitude`, `longitude`.
/// Optional: `accuracy` (m), `timestamp` (RFC 3339), `altitude` (m).
///
/// Rows are returned as recorded; filtering is left to the path recorder.
pub fn parse_track(contents: &str) -> Result<Vec<Coordinate>, TrackLoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(contents.as_bytes());

    let columns = Columns::from_header(reader.headers()?)?;
    let mut samples = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let row = i + 2;

        let latitude = number(optional(&record, Some(columns.latitude)).unwrap_or(""), row, "latitude")?;
        let longitude = number(optional(&record, Some(columns.longitude)).unwrap_or(""), row, "longitude")?;
        let mut sample = Coordinate::new(latitude, longitude);

        if let Some(value) = optional(&record, columns.accuracy) {
            sample = sample.with_accuracy(number(value, row, "accuracy")?);
        }
        if let Some(value) = optional(&record, columns.altitude) {
            sample = sample.with_altitude(number(value, row, "altitude")?);
        }
        if let Some(value) = optional(&record, columns.timestamp) {
            let timestamp = DateTime::parse_from_rfc3339(value)
                .map_err(|_| TrackLoadError::InvalidTimestamp { row, value: value.to_string() })?;
            sample = sample.with_timestamp(timestamp.with_timezone(&Utc));
        }

        samples.push(sample);
    }

    Ok(samples)
}

pub fn load_track(csv_path: &str) -> Result<Vec<Coordinate>, TrackLoadError> {
    let _timing = logging::start_timing("load_track",
        OperationCategory::FileIO { subcategory: FileIOType::TrackLoad });

    let mut file = File::open(csv_path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let samples = parse_track(&contents)?;
    info!(path = csv_path, samples = samples.len(), "Loaded GPS track");
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_rows() {
        let csv = "timestamp,latitude,longitude,accuracy,altitude\n\
                   2024-05-01T08:00:00Z,31.2304,121.4737,8.5,12\n\
                   2024-05-01T08:00:05+08:00,31.2305,121.4738,,\n";
        let track = parse_track(csv).unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track[0].accuracy, Some(8.5));
        assert_eq!(track[0].altitude, Some(12.0));
        assert_eq!(track[1].accuracy, None);
        let second = track[1].timestamp.unwrap();
        assert_eq!(second.to_rfc3339(), "2024-05-01T00:00:05+00:00");
    }

    #[test]
    fn test_minimal_columns() {
        let track = parse_track("latitude,longitude\n1.0,2.0\n").unwrap();
        assert_eq!(track[0], Coordinate::new(1.0, 2.0));
    }

    #[test]
    fn test_missing_longitude_column() {
        assert!(matches!(
            parse_track("latitude,lng\n1.0,2.0\n"),
            Err(TrackLoadError::MissingColumn("longitude"))
        ));
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(
            parse_track("latitude,longitude\nabc,2.0\n"),
            Err(TrackLoadError::InvalidNumber { row: 2, column: "latitude", .. })
        ));
        assert!(matches!(
            parse_track("latitude,longitude,timestamp\n1.0,2.0,yesterday\n"),
            Err(TrackLoadError::InvalidTimestamp { row: 2, .. })
        ));
    }
}
