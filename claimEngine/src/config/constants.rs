// Earth model
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;            // IUGG mean radius

// Path Recorder Defaults
pub const MAX_HORIZONTAL_ACCURACY_M: f64 = 50.0;        // Fixes worse than this are GPS noise
pub const MIN_SAMPLE_INTERVAL_SECS: f64 = 3.0;
pub const MIN_SAMPLE_DISTANCE_M: f64 = 5.0;
pub const MAX_PATH_POINTS: usize = 5_000;

// Claim Validation Defaults
pub const CLOSURE_TOLERANCE_M: f64 = 15.0;
pub const MIN_TERRITORY_POINTS: usize = 4;
pub const MIN_TERRITORY_AREA_M2: f64 = 25.0;
pub const OVERLAP_TOLERANCE_RATIO: f64 = 0.05;          // Share of the new claim's area
pub const OVERLAP_QUERY_MARGIN_M: f64 = 100.0;          // Added to the claim radius for neighbour lookups
pub const OVERLAP_SAMPLE_GRID: usize = 64;              // Samples per axis when estimating overlap
pub const DISTINCT_POINT_EPSILON_M: f64 = 0.5;

// POI Proximity Defaults
pub const POI_PROXIMITY_THRESHOLD_M: f64 = 50.0;
pub const POI_PROMPT_COOLDOWN_SECS: i64 = 300;
pub const POI_CATALOG_QUERY_RADIUS_M: f64 = 1_000.0;

// Spatial Index
pub const SPATIAL_NODE_CAPACITY: usize = 16;
pub const SPATIAL_MAX_DEPTH: usize = 12;

// Display
pub const SQUARE_METERS_PER_KM2: f64 = 1_000_000.0;
