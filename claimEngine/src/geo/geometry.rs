//! Polygon geometry over WGS84 coordinates.
//!
//! Areas use the spherical ring-area formula so that city-scale claims are
//! measured without a map projection. Crossing tests and overlap estimates
//! work in a local equirectangular plane, which is accurate to well under a
//! meter at the sizes a walked territory reaches.

use crate::config::constants::{EARTH_RADIUS_M, OVERLAP_SAMPLE_GRID};
use crate::geo::coordinate::{haversine_distance, Coordinate};
use std::f64::consts::PI;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    Degenerate { points: usize },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::Degenerate { points } => {
                write!(f, "Degenerate geometry: a polygon needs at least 3 points, got {}", points)
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Signed contribution of the edge `a -> b` to the spherical ring-area sum.
///
/// Summing this over every edge of a closed ring and scaling by `R² / 2`
/// gives the enclosed area; the sign follows the winding order.
pub fn ring_area_term(a: &Coordinate, b: &Coordinate) -> f64 {
    let mut dlon = (b.longitude - a.longitude).to_radians();
    if dlon > PI {
        dlon -= 2.0 * PI;
    } else if dlon < -PI {
        dlon += 2.0 * PI;
    }
    dlon * (2.0 + a.latitude.to_radians().sin() + b.latitude.to_radians().sin())
}

/// Converts an accumulated ring-area sum into square meters.
pub fn ring_area_from_sum(sum: f64) -> f64 {
    (sum * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs()
}

/// Area enclosed by an implicitly closed ring, in square meters. Returns 0 for fewer than 3 points.
pub fn polygon_area(points: &[Coordinate]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let sum: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| ring_area_term(a, b))
        .sum();

    ring_area_from_sum(sum)
}

/// Same as [`polygon_area`], but reports a degenerate ring instead of returning the 0 sentinel.
pub fn try_polygon_area(points: &[Coordinate]) -> Result<f64, GeometryError> {
    if points.len() < 3 {
        return Err(GeometryError::Degenerate { points: points.len() });
    }
    Ok(polygon_area(points))
}

/// Length of the closed ring, including the edge from the last point back to the first.
pub fn polygon_perimeter(points: &[Coordinate]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| haversine_distance(a, b))
        .sum()
}

/// Ray-casting containment test in longitude/latitude space.
pub fn point_in_polygon(point: &Coordinate, polygon: &[Coordinate]) -> bool {
    let ring: Vec<(f64, f64)> = polygon.iter().map(|c| (c.longitude, c.latitude)).collect();
    point_in_ring((point.longitude, point.latitude), &ring)
}

fn point_in_ring(point: (f64, f64), ring: &[(f64, f64)]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let (px, py) = point;
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > py) != (yj > py) {
            let x_cross = (xj - xi) * (py - yi) / (yj - yi) + xi;
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Number of vertices that are not within `epsilon_m` of an earlier vertex.
pub fn count_distinct_points(points: &[Coordinate], epsilon_m: f64) -> usize {
    let mut distinct: Vec<&Coordinate> = Vec::with_capacity(points.len());
    for p in points {
        if !distinct.iter().any(|q| haversine_distance(p, q) <= epsilon_m) {
            distinct.push(p);
        }
    }
    distinct.len()
}

/// Arithmetic mean of the vertices. Good enough as a lookup center for small rings.
pub fn vertex_centroid(points: &[Coordinate]) -> Option<Coordinate> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.latitude).sum::<f64>() / n;
    let lon = points.iter().map(|p| p.longitude).sum::<f64>() / n;
    Some(Coordinate::new(lat, lon))
}

/// Equirectangular projection to meters east/north of a reference point.
#[derive(Debug, Clone, Copy)]
pub struct LocalProjection {
    origin_lat: f64,
    origin_lon: f64,
    cos_lat: f64,
}

impl LocalProjection {
    pub fn new(origin: &Coordinate) -> Self {
        Self {
            origin_lat: origin.latitude,
            origin_lon: origin.longitude,
            cos_lat: origin.latitude.to_radians().cos(),
        }
    }

    pub fn project(&self, point: &Coordinate) -> (f64, f64) {
        let x = (point.longitude - self.origin_lon).to_radians() * EARTH_RADIUS_M * self.cos_lat;
        let y = (point.latitude - self.origin_lat).to_radians() * EARTH_RADIUS_M;
        (x, y)
    }

    pub fn project_all(&self, points: &[Coordinate]) -> Vec<(f64, f64)> {
        points.iter().map(|p| self.project(p)).collect()
    }
}

/// Shortest distance in meters from `point` to any edge of the ring, closing edge included.
///
/// Returns `None` for an empty ring.
pub fn distance_to_ring(point: &Coordinate, ring: &[Coordinate]) -> Option<f64> {
    let first = ring.first()?;
    if ring.len() == 1 {
        return Some(haversine_distance(point, first));
    }

    // Projected around `point`, so the query sits at the origin
    let projection = LocalProjection::new(point);
    let projected = projection.project_all(ring);
    let n = projected.len();

    (0..n)
        .map(|i| {
            let (ax, ay) = projected[i];
            let (bx, by) = projected[(i + 1) % n];
            let (dx, dy) = (bx - ax, by - ay);
            let length_sq = dx * dx + dy * dy;
            let t = if length_sq > 0.0 {
                (-(ax * dx + ay * dy) / length_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            (ax + t * dx).hypot(ay + t * dy)
        })
        .reduce(f64::min)
}

/// Axis-aligned box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn from_points(points: &[Coordinate]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = BoundingBox {
            min_lat: first.latitude,
            max_lat: first.latitude,
            min_lon: first.longitude,
            max_lon: first.longitude,
        };
        for p in &points[1..] {
            bbox.min_lat = bbox.min_lat.min(p.latitude);
            bbox.max_lat = bbox.max_lat.max(p.latitude);
            bbox.min_lon = bbox.min_lon.min(p.longitude);
            bbox.max_lon = bbox.max_lon.max(p.longitude);
        }
        Some(bbox)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
            && self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
    }

    pub fn contains(&self, point: &Coordinate) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lon
            && point.longitude <= self.max_lon
    }
}

fn orientation(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

/// True when the closed segments `p1-p2` and `q1-q2` share at least one point.
pub fn segments_intersect(p1: (f64, f64), p2: (f64, f64), q1: (f64, f64), q2: (f64, f64)) -> bool {
    const EPS: f64 = 1e-9;

    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
    {
        return true;
    }

    (d1.abs() <= EPS && on_segment(q1, q2, p1))
        || (d2.abs() <= EPS && on_segment(q1, q2, p2))
        || (d3.abs() <= EPS && on_segment(p1, p2, q1))
        || (d4.abs() <= EPS && on_segment(p1, p2, q2))
}

/// Finds the first pair of non-adjacent ring edges that cross or touch.
///
/// Edge `i` runs from point `i` to point `i + 1` (wrapping). Returns the edge
/// indices, or `None` for a simple ring. O(n²) in the number of points.
pub fn find_self_intersection(points: &[Coordinate]) -> Option<(usize, usize)> {
    let n = points.len();
    if n < 4 {
        return None;
    }

    let projection = LocalProjection::new(&points[0]);
    let ring = projection.project_all(points);
    let edge = |i: usize| (ring[i], ring[(i + 1) % n]);

    for i in 0..n {
        let (a1, a2) = edge(i);
        for j in (i + 2)..n {
            // First and last edges share the closing vertex
            if i == 0 && j == n - 1 {
                continue;
            }
            let (b1, b2) = edge(j);
            if a1.0.max(a2.0) < b1.0.min(b2.0)
                || b1.0.max(b2.0) < a1.0.min(a2.0)
                || a1.1.max(a2.1) < b1.1.min(b2.1)
                || b1.1.max(b2.1) < a1.1.min(a2.1)
            {
                continue;
            }
            if segments_intersect(a1, a2, b1, b2) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Estimates the shared area of two rings in square meters by sampling a
/// regular grid over the intersection of their bounding boxes.
pub fn estimate_overlap_area(a: &[Coordinate], b: &[Coordinate]) -> f64 {
    estimate_overlap_area_with_grid(a, b, OVERLAP_SAMPLE_GRID)
}

pub fn estimate_overlap_area_with_grid(a: &[Coordinate], b: &[Coordinate], grid: usize) -> f64 {
    if a.len() < 3 || b.len() < 3 || grid == 0 {
        return 0.0;
    }

    let projection = LocalProjection::new(&a[0]);
    let ring_a = projection.project_all(a);
    let ring_b = projection.project_all(b);

    let bounds = |ring: &[(f64, f64)]| {
        ring.iter().fold(
            (f64::MAX, f64::MIN, f64::MAX, f64::MIN),
            |(min_x, max_x, min_y, max_y), &(x, y)| (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y)),
        )
    };
    let (a_min_x, a_max_x, a_min_y, a_max_y) = bounds(&ring_a);
    let (b_min_x, b_max_x, b_min_y, b_max_y) = bounds(&ring_b);

    let min_x = a_min_x.max(b_min_x);
    let max_x = a_max_x.min(b_max_x);
    let min_y = a_min_y.max(b_min_y);
    let max_y = a_max_y.min(b_max_y);
    if min_x >= max_x || min_y >= max_y {
        return 0.0;
    }

    let cell_w = (max_x - min_x) / grid as f64;
    let cell_h = (max_y - min_y) / grid as f64;

    let mut shared = 0usize;
    for ix in 0..grid {
        let x = min_x + (ix as f64 + 0.5) * cell_w;
        for iy in 0..grid {
            let y = min_y + (iy as f64 + 0.5) * cell_h;
            if point_in_ring((x, y), &ring_a) && point_in_ring((x, y), &ring_b) {
                shared += 1;
            }
        }
    }

    shared as f64 * cell_w * cell_h
}
