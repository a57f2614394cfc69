use std::fs::File;
use std::io::Read;
use csv::{ReaderBuilder, StringRecord};
use tracing::{info, warn};

use super::poi::{Poi, PoiCategory};
use crate::geo::coordinate::Coordinate;
use crate::poi::catalog::StaticPoiCatalog;
use crate::utils::logging::{self, FileIOType, OperationCategory};

#[derive(Debug)]
pub enum PoiLoadError {
    IoError(std::io::Error),
    CsvError(csv::Error),
    MissingField { row: usize, field: &'static str },
    InvalidCoordinate(String),
    InvalidCategory(String),
}

impl From<std::io::Error> for PoiLoadError {
    fn from(err: std::io::Error) -> Self {
        PoiLoadError::IoError(err)
    }
}

impl From<csv::Error> for PoiLoadError {
    fn from(err: csv::Error) -> Self {
        PoiLoadError::CsvError(err)
    }
}

impl std::fmt::Display for PoiLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoiLoadError::IoError(e) => write!(f, "IO error: {}", e),
            PoiLoadError::CsvError(e) => write!(f, "CSV error: {}", e),
            PoiLoadError::MissingField { row, field } => write!(f, "Row {}: missing {}", row, field),
            PoiLoadError::InvalidCoordinate(s) => write!(f, "Invalid coordinate: {}", s),
            PoiLoadError::InvalidCategory(s) => write!(f, "Invalid category: {}", s),
        }
    }
}

impl std::error::Error for PoiLoadError {}

fn field<'a>(record: &'a StringRecord, index: usize, row: usize, name: &'static str) -> Result<&'a str, PoiLoadError> {
    record
        .get(index)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(PoiLoadError::MissingField { row, field: name })
}

fn parse_degrees(value: &str, row: usize, name: &str) -> Result<f64, PoiLoadError> {
    value
        .parse()
        .map_err(|_| PoiLoadError::InvalidCoordinate(format!("row {}: {} '{}'", row, name, value)))
}

/// Parses `id,name,latitude,longitude,category` rows (header required).
pub fn parse_pois(contents: &str) -> Result<Vec<Poi>, PoiLoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(contents.as_bytes());

    let mut pois = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        // Header is line 1
        let row = i + 2;

        let id = field(&record, 0, row, "id")?;
        let name = field(&record, 1, row, "name")?;
        let latitude = parse_degrees(field(&record, 2, row, "latitude")?, row, "latitude")?;
        let longitude = parse_degrees(field(&record, 3, row, "longitude")?, row, "longitude")?;
        let category: PoiCategory = field(&record, 4, row, "category")?
            .parse()
            .map_err(|e| PoiLoadError::InvalidCategory(format!("row {}: {}", row, e)))?;

        let coordinate = Coordinate::new(latitude, longitude);
        if !coordinate.is_valid() {
            return Err(PoiLoadError::InvalidCoordinate(format!(
                "row {}: ({}, {}) out of range",
                row, latitude, longitude
            )));
        }

        pois.push(Poi::new(id, name, coordinate, category));
    }

    Ok(pois)
}

pub fn load_pois(csv_path: &str) -> Result<Vec<Poi>, PoiLoadError> {
    let _timing = logging::start_timing("load_pois",
        OperationCategory::FileIO { subcategory: FileIOType::PoiLoad });

    let mut file = File::open(csv_path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let pois = parse_pois(&contents)?;
    if pois.is_empty() {
        warn!(path = csv_path, "POI file contained no rows");
    }
    info!(path = csv_path, count = pois.len(), "Loaded POIs");
    Ok(pois)
}

pub fn load_catalog(csv_path: &str) -> Result<StaticPoiCatalog, PoiLoadError> {
    Ok(StaticPoiCatalog::new(load_pois(csv_path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::poi::Locatable;

    #[test]
    fn test_parse_rows() {
        let csv = "id,name,latitude,longitude,category\n\
                   p1,City Hospital,31.2310,121.4740,hospital\n\
                   p2, Quick Mart ,31.2320,121.4750,Convenience Store\n";
        let pois = parse_pois(csv).unwrap();
        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0].get_id(), "p1");
        assert_eq!(pois[1].get_name(), "Quick Mart");
        assert_eq!(pois[1].get_category(), PoiCategory::ConvenienceStore);
    }

    #[test]
    fn test_bad_category_reports_row() {
        let csv = "id,name,latitude,longitude,category\np1,Keep,31.0,121.0,castle\n";
        match parse_pois(csv) {
            Err(PoiLoadError::InvalidCategory(msg)) => assert!(msg.starts_with("row 2")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_latitude() {
        let csv = "id,name,latitude,longitude,category\np1,Pole,91.0,0.0,other\n";
        assert!(matches!(parse_pois(csv), Err(PoiLoadError::InvalidCoordinate(_))));
    }

    #[test]
    fn test_missing_field() {
        let csv = "id,name,latitude,longitude,category\np1,,31.0,121.0,cafe\n";
        assert!(matches!(
            parse_pois(csv),
            Err(PoiLoadError::MissingField { row: 2, field: "name" })
        ));
    }
}
