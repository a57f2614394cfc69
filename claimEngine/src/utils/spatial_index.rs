use crate::config::constants::{EARTH_RADIUS_M, SPATIAL_MAX_DEPTH, SPATIAL_NODE_CAPACITY};
use crate::geo::coordinate::{haversine_distance, Coordinate};
use std::fmt;

#[derive(Clone, Debug)]
struct Entry {
    coordinate: Coordinate,
    slot: usize,
}

#[derive(Clone, Debug)]
pub struct QuadTreeNode {
    boundary: Boundary,
    depth: usize,
    children: Option<Box<[QuadTreeNode; 4]>>,
    entries: Vec<Entry>,
}

/// Box in degrees: longitude on x, latitude on y.
#[derive(Clone, Debug)]
pub struct Boundary {
    center_lon: f64,
    center_lat: f64,
    half_width: f64,
    half_height: f64,
}

impl Boundary {
    fn contains(&self, point: &Coordinate) -> bool {
        point.longitude >= self.center_lon - self.half_width &&
        point.longitude <= self.center_lon + self.half_width &&
        point.latitude >= self.center_lat - self.half_height &&
        point.latitude <= self.center_lat + self.half_height
    }

    fn intersects(&self, min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> bool {
        self.center_lon - self.half_width <= max_lon &&
        self.center_lon + self.half_width >= min_lon &&
        self.center_lat - self.half_height <= max_lat &&
        self.center_lat + self.half_height >= min_lat
    }
}

impl QuadTreeNode {
    pub fn new(center_lon: f64, center_lat: f64, half_width: f64, half_height: f64, depth: usize) -> Self {
        Self {
            boundary: Boundary {
                center_lon,
                center_lat,
                half_width,
                half_height,
            },
            depth,
            children: None,
            entries: Vec::new(),
        }
    }

    pub fn subdivide(&mut self) {
        let x = self.boundary.center_lon;
        let y = self.boundary.center_lat;
        let hw = self.boundary.half_width / 2.0;
        let hh = self.boundary.half_height / 2.0;
        let depth = self.depth + 1;

        let mut children = Box::new([
            // Northwest
            QuadTreeNode::new(x - hw, y + hh, hw, hh, depth),
            // Northeast
            QuadTreeNode::new(x + hw, y + hh, hw, hh, depth),
            // Southwest
            QuadTreeNode::new(x - hw, y - hh, hw, hh, depth),
            // Southeast
            QuadTreeNode::new(x + hw, y - hh, hw, hh, depth),
        ]);

        for entry in self.entries.drain(..) {
            if let Some(child) = children.iter_mut().find(|c| c.boundary.contains(&entry.coordinate)) {
                child.entries.push(entry);
            }
        }

        self.children = Some(children);
    }

    fn insert(&mut self, entry: Entry) -> bool {
        if !self.boundary.contains(&entry.coordinate) {
            return false;
        }

        if let Some(children) = &mut self.children {
            return match children.iter_mut().position(|c| c.boundary.contains(&entry.coordinate)) {
                Some(i) => children[i].insert(entry),
                None => false,
            };
        }

        self.entries.push(entry);
        if self.entries.len() > SPATIAL_NODE_CAPACITY && self.depth < SPATIAL_MAX_DEPTH {
            self.subdivide();
        }
        true
    }

    fn collect_in_box(&self, min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64, out: &mut Vec<(usize, Coordinate)>) {
        if !self.boundary.intersects(min_lon, max_lon, min_lat, max_lat) {
            return;
        }

        for entry in &self.entries {
            out.push((entry.slot, entry.coordinate.clone()));
        }

        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect_in_box(min_lon, max_lon, min_lat, max_lat, out);
            }
        }
    }

    fn count(&self) -> usize {
        self.entries.len() + self.children.as_ref().map_or(0, |c| c.iter().map(|n| n.count()).sum())
    }
}

/// Quadtree over WGS84 positions. Stores slot numbers that index into the caller's own storage.
#[derive(Clone)]
pub struct SpatialIndex {
    root: QuadTreeNode,
}

// Manual Debug implementation for SpatialIndex
impl fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("entries", &self.root.count())
            .finish()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            root: QuadTreeNode::new(0.0, 0.0, 180.0, 90.0, 0),
        }
    }

    /// Returns false when the coordinate is not a valid WGS84 position.
    pub fn insert(&mut self, coordinate: &Coordinate, slot: usize) -> bool {
        coordinate.is_valid() && self.root.insert(Entry { coordinate: coordinate.position(), slot })
    }

    pub fn len(&self) -> usize {
        self.root.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots within `radius_m` of `center`, paired with their exact distance, nearest first.
    pub fn within_radius(&self, center: &Coordinate, radius_m: f64) -> Vec<(usize, f64)> {
        let dlat = (radius_m / EARTH_RADIUS_M).to_degrees();
        let cos_lat = center.latitude.to_radians().cos().max(1e-6);
        let dlon = (dlat / cos_lat).min(180.0);

        let (min_lat, max_lat) = (center.latitude - dlat, center.latitude + dlat);
        let (min_lon, max_lon) = (center.longitude - dlon, center.longitude + dlon);

        let mut candidates = Vec::new();
        self.root.collect_in_box(min_lon.max(-180.0), max_lon.min(180.0), min_lat, max_lat, &mut candidates);
        // Wrap the part of the box that crosses the antimeridian
        if min_lon < -180.0 {
            self.root.collect_in_box(min_lon + 360.0, 180.0, min_lat, max_lat, &mut candidates);
        }
        if max_lon > 180.0 {
            self.root.collect_in_box(-180.0, max_lon - 360.0, min_lat, max_lat, &mut candidates);
        }
        candidates.sort_by_key(|(slot, _)| *slot);
        candidates.dedup_by_key(|(slot, _)| *slot);

        let mut hits: Vec<(usize, f64)> = candidates
            .into_iter()
            .map(|(slot, coordinate)| (slot, haversine_distance(center, &coordinate)))
            .filter(|(_, distance)| *distance <= radius_m)
            .collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::coordinate::destination;

    #[test]
    fn test_radius_query_wraps_the_antimeridian() {
        let mut index = SpatialIndex::new();
        // ~111 m apart across ±180°
        index.insert(&Coordinate::new(0.0, -179.9995), 0);
        index.insert(&Coordinate::new(0.0, 179.0), 1);
        for i in 0..200 {
            index.insert(&Coordinate::new(-60.0 + i as f64 * 0.5, -120.0 + i as f64), 10 + i);
        }

        let east = index.within_radius(&Coordinate::new(0.0, 179.9995), 500.0);
        assert_eq!(east.len(), 1);
        assert_eq!(east[0].0, 0);
        assert!((east[0].1 - 111.0).abs() < 2.0);

        let west = index.within_radius(&Coordinate::new(0.0, -179.9999), 500.0);
        assert_eq!(west.iter().map(|h| h.0).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_radius_query_sorted_and_filtered() {
        let center = Coordinate::new(31.2304, 121.4737);
        let mut index = SpatialIndex::new();
        index.insert(&destination(&center, 0.0, 80.0), 0);
        index.insert(&destination(&center, 90.0, 20.0), 1);
        index.insert(&destination(&center, 180.0, 300.0), 2);

        let hits = index.within_radius(&center, 100.0);
        let slots: Vec<usize> = hits.iter().map(|(slot, _)| *slot).collect();
        assert_eq!(slots, vec![1, 0]);
    }

    #[test]
    fn test_subdivision_keeps_every_entry() {
        let center = Coordinate::new(48.8566, 2.3522);
        let mut index = SpatialIndex::new();
        for i in 0..500 {
            let p = destination(&center, (i * 37 % 360) as f64, (i % 50) as f64 * 10.0);
            assert!(index.insert(&p, i));
        }
        assert_eq!(index.len(), 500);
        assert_eq!(index.within_radius(&center, 10_000.0).len(), 500);
    }

    #[test]
    fn test_rejects_invalid_coordinate() {
        let mut index = SpatialIndex::new();
        assert!(!index.insert(&Coordinate::new(120.0, 0.0), 0));
        assert!(index.is_empty());
    }
}
