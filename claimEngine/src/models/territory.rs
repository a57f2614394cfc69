use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::constants::{DISTINCT_POINT_EPSILON_M, SQUARE_METERS_PER_KM2};
use crate::data::poi::Locatable;
use crate::geo::coordinate::Coordinate;
use crate::geo::geometry::{
    count_distinct_points, point_in_polygon, polygon_area, polygon_perimeter, vertex_centroid,
    BoundingBox, GeometryError,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerritoryId(String);

impl TerritoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `terr_<unix millis>_<8 hex digits>`
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: u32 = rand::thread_rng().gen();
        Self(format!("terr_{}_{:08x}", now.timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerritoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A claimed polygon. Immutable once built; the area is always derived from the boundary.
/// Deserializing goes through [`Territory::new`], so stored area and point count are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredTerritory")]
pub struct Territory {
    id: TerritoryId,
    owner_id: String,
    name: String,
    boundary: Vec<Coordinate>,
    area_m2: f64,
    point_count: usize,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    is_active: bool,
}

/// On-disk shape of a territory before its boundary is re-validated.
#[derive(Deserialize)]
struct StoredTerritory {
    id: TerritoryId,
    owner_id: String,
    name: String,
    boundary: Vec<Coordinate>,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    #[serde(default = "active_by_default")]
    is_active: bool,
}

fn active_by_default() -> bool {
    true
}

impl TryFrom<StoredTerritory> for Territory {
    type Error = GeometryError;

    fn try_from(stored: StoredTerritory) -> Result<Self, Self::Error> {
        let times = ClaimTimes {
            started_at: stored.started_at,
            completed_at: stored.completed_at,
            created_at: stored.created_at,
        };
        let mut territory = Territory::new(stored.id, stored.owner_id, stored.name, stored.boundary, times)?;
        territory.is_active = stored.is_active;
        Ok(territory)
    }
}

/// Timestamps of the claim attempt that produced a territory.
#[derive(Debug, Clone, Copy)]
pub struct ClaimTimes {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Territory {
    pub fn new(
        id: TerritoryId,
        owner_id: impl Into<String>,
        name: impl Into<String>,
        boundary: Vec<Coordinate>,
        times: ClaimTimes,
    ) -> Result<Self, GeometryError> {
        let boundary: Vec<Coordinate> = boundary.iter().map(Coordinate::position).collect();
        if count_distinct_points(&boundary, DISTINCT_POINT_EPSILON_M) < 3 {
            return Err(GeometryError::Degenerate { points: boundary.len() });
        }

        let area_m2 = polygon_area(&boundary);
        if area_m2 <= 0.0 {
            return Err(GeometryError::Degenerate { points: boundary.len() });
        }

        Ok(Self {
            id,
            owner_id: owner_id.into(),
            name: name.into(),
            point_count: boundary.len(),
            boundary,
            area_m2,
            started_at: times.started_at,
            completed_at: times.completed_at,
            created_at: times.created_at,
            is_active: true,
        })
    }

    pub fn get_id(&self) -> &TerritoryId {
        &self.id
    }

    pub fn get_owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_boundary(&self) -> &[Coordinate] {
        &self.boundary
    }

    pub fn get_area(&self) -> f64 {
        self.area_m2
    }

    pub fn get_point_count(&self) -> usize {
        self.point_count
    }

    pub fn get_started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn get_completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn get_created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns a copy flagged inactive. Territories are never edited in place.
    pub fn deactivated(&self) -> Self {
        Self {
            is_active: false,
            ..self.clone()
        }
    }

    pub fn to_coordinates(&self) -> Vec<(f64, f64)> {
        self.boundary.iter().map(|c| (c.latitude, c.longitude)).collect()
    }

    pub fn formatted_area(&self) -> String {
        format_area(self.area_m2)
    }

    pub fn perimeter(&self) -> f64 {
        polygon_perimeter(&self.boundary)
    }

    pub fn centroid(&self) -> Coordinate {
        // Boundary is never empty after construction
        vertex_centroid(&self.boundary).unwrap_or_else(|| Coordinate::new(0.0, 0.0))
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.boundary)
    }

    pub fn contains(&self, point: &Coordinate) -> bool {
        point_in_polygon(point, &self.boundary)
    }
}

impl Locatable for Territory {
    fn get_coordinate(&self) -> Coordinate {
        self.centroid()
    }

    fn get_id(&self) -> &str {
        self.id.as_str()
    }
}

/// `"850 m²"`, `"12,345 m²"`, or `"1.23 km²"` from one square kilometer up.
pub fn format_area(area_m2: f64) -> String {
    if area_m2 >= SQUARE_METERS_PER_KM2 {
        return format!("{:.2} km²", area_m2 / SQUARE_METERS_PER_KM2);
    }

    let digits = (area_m2.round() as u64).to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{} m²", grouped)
}
