use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::data::poi::{DangerLevel, Locatable, Poi, PoiCategory};
use crate::geo::coordinate::{haversine_distance, Coordinate};
use crate::utils::logging::{self, OperationCategory};

/// The player is standing close enough to a POI to be offered a scavenge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityEvent {
    pub poi_id: String,
    pub name: String,
    pub category: PoiCategory,
    pub danger_level: DangerLevel,
    pub distance_m: f64,
    pub timestamp: DateTime<Utc>,
}

/// Every POI within `threshold_m` of `position` (inclusive), nearest first.
pub fn evaluate(position: &Coordinate, pois: &[Poi], threshold_m: f64, now: DateTime<Utc>) -> Vec<ProximityEvent> {
    let _timing = logging::start_timing("evaluate_proximity", OperationCategory::Proximity);

    if !position.is_valid() {
        return Vec::new();
    }

    let mut events: Vec<ProximityEvent> = pois
        .iter()
        .filter_map(|poi| {
            let distance = haversine_distance(position, poi.coordinate());
            (distance <= threshold_m).then(|| ProximityEvent {
                poi_id: poi.get_id().to_string(),
                name: poi.get_name().to_string(),
                category: poi.get_category(),
                danger_level: poi.get_danger_level(),
                distance_m: distance,
                timestamp: now,
            })
        })
        .collect();

    events.sort_by(|a, b| a.distance_m.partial_cmp(&b.distance_m).unwrap_or(std::cmp::Ordering::Equal));
    if !events.is_empty() {
        debug!(count = events.len(), nearest_m = events[0].distance_m, "POIs in range");
    }
    events
}

/// Remembers dismissed prompts so the same POI is not offered again too soon.
#[derive(Debug, Clone)]
pub struct ProximityCooldown {
    window: Duration,
    dismissed: HashMap<String, DateTime<Utc>>,
}

impl ProximityCooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            dismissed: HashMap::new(),
        }
    }

    pub fn from_secs(secs: i64) -> Self {
        Self::new(Duration::seconds(secs))
    }

    pub fn dismiss(&mut self, poi_id: impl Into<String>, at: DateTime<Utc>) {
        self.dismissed.insert(poi_id.into(), at);
    }

    pub fn is_suppressed(&self, poi_id: &str, now: DateTime<Utc>) -> bool {
        self.dismissed
            .get(poi_id)
            .map_or(false, |dismissed_at| now - *dismissed_at < self.window)
    }

    /// Drops events for POIs still cooling down.
    pub fn filter(&self, events: Vec<ProximityEvent>) -> Vec<ProximityEvent> {
        events
            .into_iter()
            .filter(|event| !self.is_suppressed(&event.poi_id, event.timestamp))
            .collect()
    }

    /// Forgets dismissals whose window has run out.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        self.dismissed.retain(|_, dismissed_at| now - *dismissed_at < window);
    }

    pub fn len(&self) -> usize {
        self.dismissed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dismissed.is_empty()
    }
}
