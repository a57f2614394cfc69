//! Geometric checks run when a claim is committed.
//!
//! A [`ValidationJob`] owns everything it needs, so it can be moved to
//! whatever execution context the host picks and its [`ValidationVerdict`]
//! handed back to the engine afterwards.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::claim_config::ValidationSettings;
use crate::config::constants::DISTINCT_POINT_EPSILON_M;
use crate::geo::coordinate::{haversine_distance, Coordinate};
use crate::geo::geometry::{
    count_distinct_points, estimate_overlap_area, find_self_intersection, polygon_area,
    vertex_centroid, BoundingBox,
};
use crate::models::territory::{ClaimTimes, Territory, TerritoryId};
use crate::storage::repository::TerritoryRepository;
use crate::utils::clock::Clock;
use crate::utils::context::ExecutionContext;
use crate::utils::logging::{self, OperationCategory, ValidationType};

/// Why a committed path was refused. Terminal for the attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    TooFewPoints { found: usize, required: usize },
    SelfIntersecting { first_edge: usize, second_edge: usize },
    AreaTooSmall { area_m2: f64, minimum_m2: f64 },
    OverlapsExistingTerritory { territory_id: TerritoryId, overlap_m2: f64 },
    RepositoryUnavailable { cause: String },
}

impl ValidationFailure {
    /// Stable reason code for hosts to switch on.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationFailure::TooFewPoints { .. } => "too_few_points",
            ValidationFailure::SelfIntersecting { .. } => "self_intersecting",
            ValidationFailure::AreaTooSmall { .. } => "area_too_small",
            ValidationFailure::OverlapsExistingTerritory { .. } => "overlaps_existing_territory",
            ValidationFailure::RepositoryUnavailable { .. } => "repository_unavailable",
        }
    }

    /// Whether the same committed path may be validated again.
    ///
    /// Geometric failures are final; an unreachable repository is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ValidationFailure::RepositoryUnavailable { .. })
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::TooFewPoints { found, required } => {
                write!(f, "Path has {} distinct points, at least {} are needed", found, required)
            }
            ValidationFailure::SelfIntersecting { first_edge, second_edge } => {
                write!(f, "Path crosses itself (edges {} and {})", first_edge, second_edge)
            }
            ValidationFailure::AreaTooSmall { area_m2, minimum_m2 } => {
                write!(f, "Enclosed area {:.1} m² is below the {:.1} m² minimum", area_m2, minimum_m2)
            }
            ValidationFailure::OverlapsExistingTerritory { territory_id, overlap_m2 } => {
                write!(f, "Claim overlaps territory {} by about {:.0} m²", territory_id, overlap_m2)
            }
            ValidationFailure::RepositoryUnavailable { cause } => {
                write!(f, "Could not load nearby territories: {}", cause)
            }
        }
    }
}

impl std::error::Error for ValidationFailure {}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationVerdict {
    Passed(Territory),
    Failed(ValidationFailure),
}

/// Drops the final sample when it is the walk back onto the start.
///
/// Only a sample recorded after `min_points` others can close the loop, and
/// only that one sample is dropped. Corners that happen to lie near the
/// start stay in the boundary.
pub fn closed_boundary(mut path: Vec<Coordinate>, tolerance_m: f64, min_points: usize) -> Vec<Coordinate> {
    let closing = path.len() > min_points.max(1)
        && match (path.first(), path.last()) {
            (Some(first), Some(last)) => haversine_distance(first, last) <= tolerance_m,
            _ => false,
        };
    if closing {
        path.pop();
    }
    path
}

/// A self-contained validation run for one claim attempt.
pub struct ValidationJob {
    pub(crate) attempt_id: u64,
    owner_id: String,
    name: String,
    path: Vec<Coordinate>,
    started_at: DateTime<Utc>,
    settings: ValidationSettings,
    repository: Arc<dyn TerritoryRepository>,
    clock: Arc<dyn Clock>,
}

/// The verdict for a specific attempt; engines ignore verdicts from other attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptVerdict {
    pub attempt_id: u64,
    pub verdict: ValidationVerdict,
}

impl ValidationJob {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        attempt_id: u64,
        owner_id: String,
        name: String,
        path: Vec<Coordinate>,
        started_at: DateTime<Utc>,
        settings: ValidationSettings,
        repository: Arc<dyn TerritoryRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            attempt_id,
            owner_id,
            name,
            path,
            started_at,
            settings,
            repository,
            clock,
        }
    }

    pub fn point_count(&self) -> usize {
        self.path.len()
    }

    /// Runs every check in order and builds the territory when all pass.
    pub fn run(self) -> AttemptVerdict {
        let _timing = logging::start_timing("validate_claim",
            OperationCategory::Validation { subcategory: ValidationType::Full });

        let attempt_id = self.attempt_id;
        let verdict = match self.check() {
            Ok(territory) => {
                info!(
                    territory_id = %territory.get_id(),
                    area = %territory.formatted_area(),
                    points = territory.get_point_count(),
                    "Claim validated"
                );
                ValidationVerdict::Passed(territory)
            }
            Err(failure) => {
                info!(reason = failure.code(), "Claim rejected: {}", failure);
                ValidationVerdict::Failed(failure)
            }
        };
        AttemptVerdict { attempt_id, verdict }
    }

    /// Runs on `compute`, then hands the verdict to `callback` on `deliver_on`.
    pub fn dispatch<F>(self, compute: &dyn ExecutionContext, deliver_on: Arc<dyn ExecutionContext>, callback: F)
    where
        F: FnOnce(AttemptVerdict) + Send + 'static,
    {
        compute.execute(Box::new(move || {
            let verdict = self.run();
            deliver_on.execute(Box::new(move || callback(verdict)));
        }));
    }

    fn check(&self) -> Result<Territory, ValidationFailure> {
        let s = &self.settings;
        let boundary = closed_boundary(self.path.clone(), s.closure_tolerance_m, s.min_points);

        let distinct = count_distinct_points(&boundary, DISTINCT_POINT_EPSILON_M);
        if distinct < s.min_points {
            return Err(ValidationFailure::TooFewPoints { found: distinct, required: s.min_points });
        }

        {
            let _timing = logging::start_timing("check_self_intersection",
                OperationCategory::Validation { subcategory: ValidationType::SelfIntersection });
            if let Some((first_edge, second_edge)) = find_self_intersection(&boundary) {
                return Err(ValidationFailure::SelfIntersecting { first_edge, second_edge });
            }
        }

        let area_m2 = polygon_area(&boundary);
        if area_m2 < s.min_area_m2 || area_m2 <= 0.0 {
            return Err(ValidationFailure::AreaTooSmall { area_m2, minimum_m2: s.min_area_m2 });
        }

        self.check_overlap(&boundary, area_m2)?;

        let now = self.clock.now();
        let times = ClaimTimes {
            started_at: self.started_at,
            completed_at: now,
            created_at: now,
        };
        Territory::new(TerritoryId::generate(now), self.owner_id.clone(), self.name.clone(), boundary, times)
            .map_err(|_| ValidationFailure::AreaTooSmall { area_m2, minimum_m2: s.min_area_m2 })
    }

    fn check_overlap(&self, boundary: &[Coordinate], area_m2: f64) -> Result<(), ValidationFailure> {
        let _timing = logging::start_timing("check_overlap",
            OperationCategory::Validation { subcategory: ValidationType::Overlap });

        let Some(center) = vertex_centroid(boundary) else {
            return Ok(());
        };
        let reach = boundary
            .iter()
            .map(|p| haversine_distance(&center, p))
            .fold(0.0, f64::max);
        let radius = reach + self.settings.overlap_query_margin_m;

        let neighbours = self
            .repository
            .find_active_territories(&center, radius)
            .map_err(|e| {
                warn!("Overlap lookup failed: {}", e);
                ValidationFailure::RepositoryUnavailable { cause: e.to_string() }
            })?;

        let Some(bbox) = BoundingBox::from_points(boundary) else {
            return Ok(());
        };
        let allowed = area_m2 * self.settings.overlap_tolerance;

        let worst = neighbours
            .par_iter()
            .filter(|t| t.bounding_box().map_or(false, |other| other.intersects(&bbox)))
            .map(|t| (t.get_id().clone(), estimate_overlap_area(boundary, t.get_boundary())))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        debug!(candidates = neighbours.len(), "Checked claim against neighbouring territories");
        match worst {
            Some((territory_id, overlap_m2)) if overlap_m2 > allowed => {
                Err(ValidationFailure::OverlapsExistingTerritory { territory_id, overlap_m2 })
            }
            _ => Ok(()),
        }
    }
}
