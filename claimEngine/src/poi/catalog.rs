use std::fmt;
use tracing::warn;

use crate::data::poi::{Locatable, Poi};
use crate::geo::coordinate::Coordinate;
use crate::utils::spatial_index::SpatialIndex;

#[derive(Debug)]
pub enum CatalogError {
    Unavailable(String),
    InvalidQuery(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Unavailable(s) => write!(f, "POI catalog unavailable: {}", s),
            CatalogError::InvalidQuery(s) => write!(f, "Invalid POI query: {}", s),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Source of nearby points of interest. Shared read-only across threads.
pub trait PoiCatalog: Send + Sync {
    fn list_nearby(&self, center: &Coordinate, radius_m: f64) -> Result<Vec<Poi>, CatalogError>;
}

/// Fixed set of POIs held in memory behind a quadtree.
#[derive(Debug, Clone, Default)]
pub struct StaticPoiCatalog {
    pois: Vec<Poi>,
    index: SpatialIndex,
}

impl StaticPoiCatalog {
    pub fn new(pois: impl IntoIterator<Item = Poi>) -> Self {
        let mut catalog = Self::default();
        for poi in pois {
            catalog.insert(poi);
        }
        catalog
    }

    /// Returns false and drops the POI when its coordinate is out of range.
    pub fn insert(&mut self, poi: Poi) -> bool {
        let slot = self.pois.len();
        if !self.index.insert(poi.coordinate(), slot) {
            warn!(poi = poi.get_id(), "Skipping POI with invalid coordinate");
            return false;
        }
        self.pois.push(poi);
        true
    }

    pub fn len(&self) -> usize {
        self.pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Poi> {
        self.pois.iter().find(|poi| poi.get_id() == id)
    }

    pub fn all(&self) -> &[Poi] {
        &self.pois
    }
}

impl PoiCatalog for StaticPoiCatalog {
    fn list_nearby(&self, center: &Coordinate, radius_m: f64) -> Result<Vec<Poi>, CatalogError> {
        if !center.is_valid() {
            return Err(CatalogError::InvalidQuery(format!(
                "center ({}, {}) is not a WGS84 position",
                center.latitude, center.longitude
            )));
        }
        if !radius_m.is_finite() || radius_m < 0.0 {
            return Err(CatalogError::InvalidQuery(format!("radius {} m", radius_m)));
        }

        Ok(self
            .index
            .within_radius(center, radius_m)
            .into_iter()
            .filter_map(|(slot, _)| self.pois.get(slot).cloned())
            .collect())
    }
}
