use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geo::coordinate::Coordinate;

pub trait Locatable {
    fn get_coordinate(&self) -> Coordinate;
    fn get_id(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiCategory {
    Hospital,
    Pharmacy,
    Supermarket,
    ConvenienceStore,
    GasStation,
    Restaurant,
    Cafe,
    Other,
}

impl PoiCategory {
    pub fn danger_level(&self) -> DangerLevel {
        DangerLevel::from(*self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PoiCategory::Hospital => "hospital",
            PoiCategory::Pharmacy => "pharmacy",
            PoiCategory::Supermarket => "supermarket",
            PoiCategory::ConvenienceStore => "convenience_store",
            PoiCategory::GasStation => "gas_station",
            PoiCategory::Restaurant => "restaurant",
            PoiCategory::Cafe => "cafe",
            PoiCategory::Other => "other",
        }
    }
}

impl fmt::Display for PoiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoiCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "hospital" => Ok(PoiCategory::Hospital),
            "pharmacy" => Ok(PoiCategory::Pharmacy),
            "supermarket" => Ok(PoiCategory::Supermarket),
            "convenience_store" | "store" => Ok(PoiCategory::ConvenienceStore),
            "gas_station" => Ok(PoiCategory::GasStation),
            "restaurant" => Ok(PoiCategory::Restaurant),
            "cafe" => Ok(PoiCategory::Cafe),
            "other" => Ok(PoiCategory::Other),
            other => Err(format!("unknown POI category '{}'", other)),
        }
    }
}

/// How risky scavenging a location is, 1 (safe) to 5 (deadly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DangerLevel(u8);

impl DangerLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(level: u8) -> Self {
        Self(level.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl From<PoiCategory> for DangerLevel {
    fn from(category: PoiCategory) -> Self {
        let level = match category {
            PoiCategory::Restaurant | PoiCategory::Cafe => 1,
            PoiCategory::Hospital | PoiCategory::Pharmacy => 2,
            PoiCategory::Supermarket | PoiCategory::ConvenienceStore => 3,
            PoiCategory::Other => 3,
            PoiCategory::GasStation => 4,
        };
        DangerLevel::new(level)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    id: String,
    name: String,
    coordinate: Coordinate,
    category: PoiCategory,
}

impl Poi {
    pub fn new(id: impl Into<String>, name: impl Into<String>, coordinate: Coordinate, category: PoiCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            coordinate: coordinate.position(),
            category,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_category(&self) -> PoiCategory {
        self.category
    }

    pub fn get_danger_level(&self) -> DangerLevel {
        self.category.danger_level()
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }
}

impl Locatable for Poi {
    fn get_coordinate(&self) -> Coordinate {
        self.coordinate.clone()
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_danger_table() {
        assert_eq!(PoiCategory::Restaurant.danger_level().value(), 1);
        assert_eq!(PoiCategory::Cafe.danger_level().value(), 1);
        assert_eq!(PoiCategory::Hospital.danger_level().value(), 2);
        assert_eq!(PoiCategory::Pharmacy.danger_level().value(), 2);
        assert_eq!(PoiCategory::Supermarket.danger_level().value(), 3);
        assert_eq!(PoiCategory::ConvenienceStore.danger_level().value(), 3);
        assert_eq!(PoiCategory::Other.danger_level().value(), 3);
        assert_eq!(PoiCategory::GasStation.danger_level().value(), 4);
    }

    #[test]
    fn test_danger_level_clamped() {
        assert_eq!(DangerLevel::new(0).value(), 1);
        assert_eq!(DangerLevel::new(9).value(), 5);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Gas Station".parse::<PoiCategory>(), Ok(PoiCategory::GasStation));
        assert_eq!("convenience-store".parse::<PoiCategory>(), Ok(PoiCategory::ConvenienceStore));
        assert!("castle".parse::<PoiCategory>().is_err());
    }
}
