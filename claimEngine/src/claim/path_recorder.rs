//! Turns a raw location stream into a clean, debounced path.

use chrono::Duration;
use std::fmt;

use crate::config::claim_config::RecorderSettings;
use crate::geo::coordinate::{haversine_distance, Coordinate};
use crate::geo::geometry::{ring_area_from_sum, ring_area_term};

/// Why a sample was not added to the path. Filtering, not failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    InvalidPosition,
    InaccurateFix { accuracy: f64 },
    MissingTimestamp,
    OutOfOrder,
    TooSoon { elapsed: Duration },
    TooClose { distance: f64 },
    PathFull,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidPosition => write!(f, "position outside WGS84 range"),
            RejectReason::InaccurateFix { accuracy } => write!(f, "horizontal accuracy {:.1} m too coarse", accuracy),
            RejectReason::MissingTimestamp => write!(f, "sample has no timestamp"),
            RejectReason::OutOfOrder => write!(f, "timestamp not after the last accepted sample"),
            RejectReason::TooSoon { elapsed } => write!(f, "only {} ms since the last accepted sample", elapsed.num_milliseconds()),
            RejectReason::TooClose { distance } => write!(f, "only {:.1} m from the last accepted sample", distance),
            RejectReason::PathFull => write!(f, "path reached its point limit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SampleDecision {
    Accepted,
    Rejected(RejectReason),
}

impl SampleDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SampleDecision::Accepted)
    }
}

#[derive(Debug, Clone)]
pub struct PathRecorder {
    settings: RecorderSettings,
    path: Vec<Coordinate>,
    cumulative_distance: f64,
    // Ring-area sum over the open path's edges; the closing edge is added on read
    open_area_sum: f64,
}

impl PathRecorder {
    pub fn new(settings: RecorderSettings) -> Self {
        Self {
            settings,
            path: Vec::new(),
            cumulative_distance: 0.0,
            open_area_sum: 0.0,
        }
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    /// Checks a sample against the filters without touching the path.
    pub fn check(&self, sample: &Coordinate) -> Result<(), RejectReason> {
        if !sample.is_valid() {
            return Err(RejectReason::InvalidPosition);
        }
        if let Some(accuracy) = sample.accuracy {
            if !accuracy.is_finite() || accuracy > self.settings.max_horizontal_accuracy_m {
                return Err(RejectReason::InaccurateFix { accuracy });
            }
        }
        let timestamp = sample.timestamp.ok_or(RejectReason::MissingTimestamp)?;

        if let Some(last) = self.path.last() {
            // Accepted samples always carry a timestamp
            if let Some(last_ts) = last.timestamp {
                if timestamp <= last_ts {
                    return Err(RejectReason::OutOfOrder);
                }
                let elapsed = timestamp - last_ts;
                let min_interval = Duration::milliseconds((self.settings.min_sample_interval_secs * 1000.0).round() as i64);
                if elapsed < min_interval {
                    return Err(RejectReason::TooSoon { elapsed });
                }
            }
            let distance = haversine_distance(last, sample);
            if distance < self.settings.min_sample_distance_m {
                return Err(RejectReason::TooClose { distance });
            }
        }

        if self.path.len() >= self.settings.max_path_points {
            return Err(RejectReason::PathFull);
        }
        Ok(())
    }

    pub fn ingest(&mut self, sample: Coordinate) -> SampleDecision {
        if let Err(reason) = self.check(&sample) {
            return SampleDecision::Rejected(reason);
        }

        if let Some(last) = self.path.last() {
            self.cumulative_distance += haversine_distance(last, &sample);
            self.open_area_sum += ring_area_term(last, &sample);
        }
        self.path.push(sample);
        SampleDecision::Accepted
    }

    pub fn current_path(&self) -> Vec<Coordinate> {
        self.path.clone()
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.path
    }

    /// Hands the recorded path over and leaves the recorder empty.
    pub fn take_path(&mut self) -> Vec<Coordinate> {
        let path = std::mem::take(&mut self.path);
        self.reset();
        path
    }

    pub fn reset(&mut self) {
        self.path.clear();
        self.cumulative_distance = 0.0;
        self.open_area_sum = 0.0;
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn first(&self) -> Option<&Coordinate> {
        self.path.first()
    }

    pub fn last(&self) -> Option<&Coordinate> {
        self.path.last()
    }

    pub fn cumulative_distance(&self) -> f64 {
        self.cumulative_distance
    }

    /// Area of the path as if it were closed now, in O(1).
    pub fn running_area_estimate(&self) -> f64 {
        match (self.path.first(), self.path.last()) {
            (Some(first), Some(last)) if self.path.len() >= 3 => {
                ring_area_from_sum(self.open_area_sum + ring_area_term(last, first))
            }
            _ => 0.0,
        }
    }

    pub fn distance_to_start(&self, point: &Coordinate) -> Option<f64> {
        self.path.first().map(|start| haversine_distance(start, point))
    }
}
