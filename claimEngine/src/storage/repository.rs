use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use crate::geo::coordinate::Coordinate;
use crate::geo::geometry::distance_to_ring;
use crate::models::territory::{Territory, TerritoryId};
use crate::utils::logging::{self, OperationCategory, PersistenceType};

#[derive(Debug)]
pub enum RepositoryError {
    Unavailable(String),
    NotFound(TerritoryId),
    IoError(std::io::Error),
    SerializationError(serde_json::Error),
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::IoError(err)
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::SerializationError(err)
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryError::Unavailable(s) => write!(f, "Repository unavailable: {}", s),
            RepositoryError::NotFound(id) => write!(f, "Territory not found: {}", id),
            RepositoryError::IoError(e) => write!(f, "IO error: {}", e),
            RepositoryError::SerializationError(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// Backend boundary for territories. Implementations own cross-user consistency.
pub trait TerritoryRepository: Send + Sync {
    /// Active territories with any part within `radius_m` of `near`.
    fn find_active_territories(&self, near: &Coordinate, radius_m: f64) -> Result<Vec<Territory>, RepositoryError>;

    /// Stores a territory. Saving the same territory again must succeed, so failed saves can be retried.
    fn save(&self, territory: &Territory) -> Result<(), RepositoryError>;

    fn delete(&self, id: &TerritoryId) -> Result<(), RepositoryError>;

    fn list_owned(&self, owner_id: &str) -> Result<Vec<Territory>, RepositoryError>;
}

/// Whether any part of `territory` lies within `radius_m` of `near`.
///
/// Measured against the boundary edges, not just the vertices, so a large
/// territory whose side passes close by is still found.
pub fn territory_within(territory: &Territory, near: &Coordinate, radius_m: f64) -> bool {
    territory.contains(near)
        || distance_to_ring(near, territory.get_boundary()).map_or(false, |d| d <= radius_m)
}

/// Map-backed repository with switchable failures, for hosts without a backend and for tests.
#[derive(Debug, Default)]
pub struct InMemoryTerritoryRepository {
    territories: RwLock<HashMap<TerritoryId, Territory>>,
    failing_saves: AtomicUsize,
    queries_unavailable: AtomicBool,
    save_calls: AtomicUsize,
}

impl InMemoryTerritoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_territories(territories: impl IntoIterator<Item = Territory>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.territories.write();
            for territory in territories {
                map.insert(territory.get_id().clone(), territory);
            }
        }
        repo
    }

    /// The next `count` calls to `save` fail with `Unavailable`.
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    pub fn set_queries_unavailable(&self, unavailable: bool) {
        self.queries_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.territories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.territories.read().is_empty()
    }

    pub fn get(&self, id: &TerritoryId) -> Option<Territory> {
        self.territories.read().get(id).cloned()
    }
}

impl TerritoryRepository for InMemoryTerritoryRepository {
    fn find_active_territories(&self, near: &Coordinate, radius_m: f64) -> Result<Vec<Territory>, RepositoryError> {
        let _timing = logging::start_timing("find_active_territories",
            OperationCategory::Persistence { subcategory: PersistenceType::Query });

        if self.queries_unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("territory query failed".to_string()));
        }

        let found: Vec<Territory> = self
            .territories
            .read()
            .values()
            .filter(|t| t.is_active() && territory_within(t, near, radius_m))
            .cloned()
            .collect();
        debug!(count = found.len(), radius_m, "Loaded nearby territories");
        Ok(found)
    }

    fn save(&self, territory: &Territory) -> Result<(), RepositoryError> {
        let _timing = logging::start_timing("save_territory",
            OperationCategory::Persistence { subcategory: PersistenceType::Save });

        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(RepositoryError::Unavailable("save rejected by backend".to_string()));
        }

        self.territories
            .write()
            .insert(territory.get_id().clone(), territory.clone());
        Ok(())
    }

    fn delete(&self, id: &TerritoryId) -> Result<(), RepositoryError> {
        let _timing = logging::start_timing("delete_territory",
            OperationCategory::Persistence { subcategory: PersistenceType::Delete });

        match self.territories.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound(id.clone())),
        }
    }

    fn list_owned(&self, owner_id: &str) -> Result<Vec<Territory>, RepositoryError> {
        let mut owned: Vec<Territory> = self
            .territories
            .read()
            .values()
            .filter(|t| t.get_owner_id() == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|t| t.get_created_at());
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::coordinate::destination;
    use crate::models::territory::ClaimTimes;
    use chrono::Utc;

    fn territory_at(id: &str, owner: &str, origin: &Coordinate) -> Territory {
        let e = destination(origin, 90.0, 40.0);
        let ne = destination(&e, 0.0, 40.0);
        let n = destination(origin, 0.0, 40.0);
        let now = Utc::now();
        let times = ClaimTimes { started_at: now, completed_at: now, created_at: now };
        Territory::new(TerritoryId::new(id), owner, id, vec![origin.clone(), e, ne, n], times).unwrap()
    }

    #[test]
    fn test_find_active_within_radius() {
        let here = Coordinate::new(31.2304, 121.4737);
        let far = destination(&here, 0.0, 5_000.0);
        let repo = InMemoryTerritoryRepository::with_territories(vec![
            territory_at("near", "a", &here),
            territory_at("far", "b", &far),
        ]);

        let found = repo.find_active_territories(&here, 200.0).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_id().as_str(), "near");
    }

    #[test]
    fn test_large_territory_found_by_its_edge() {
        let corner = Coordinate::new(31.2304, 121.4737);
        let e = destination(&corner, 90.0, 1_000.0);
        let ne = destination(&e, 0.0, 1_000.0);
        let n = destination(&corner, 0.0, 1_000.0);
        let now = Utc::now();
        let times = ClaimTimes { started_at: now, completed_at: now, created_at: now };
        let big = Territory::new(TerritoryId::new("big"), "a", "Estate", vec![corner.clone(), e, ne, n], times).unwrap();
        let repo = InMemoryTerritoryRepository::with_territories(vec![big]);

        // 20 m west of the middle of the west edge; the nearest vertex is ~500 m away
        let query = destination(&destination(&corner, 0.0, 500.0), 270.0, 20.0);
        assert_eq!(repo.find_active_territories(&query, 100.0).unwrap().len(), 1);
        assert!(repo.find_active_territories(&query, 10.0).unwrap().is_empty());
    }

    #[test]
    fn test_inactive_territories_are_skipped() {
        let here = Coordinate::new(31.2304, 121.4737);
        let repo = InMemoryTerritoryRepository::with_territories(vec![territory_at("old", "a", &here).deactivated()]);
        assert!(repo.find_active_territories(&here, 200.0).unwrap().is_empty());
    }

    #[test]
    fn test_injected_save_failures_then_success() {
        let here = Coordinate::new(31.2304, 121.4737);
        let repo = InMemoryTerritoryRepository::new();
        let t = territory_at("t", "a", &here);
        repo.fail_next_saves(1);
        assert!(matches!(repo.save(&t), Err(RepositoryError::Unavailable(_))));
        assert!(repo.is_empty());
        repo.save(&t).unwrap();
        repo.save(&t).unwrap();
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.save_calls(), 3);
    }

    #[test]
    fn test_delete_and_list_owned() {
        let here = Coordinate::new(31.2304, 121.4737);
        let repo = InMemoryTerritoryRepository::with_territories(vec![
            territory_at("t1", "alice", &here),
            territory_at("t2", "bob", &destination(&here, 90.0, 500.0)),
        ]);
        assert_eq!(repo.list_owned("alice").unwrap().len(), 1);
        repo.delete(&TerritoryId::new("t1")).unwrap();
        assert!(repo.list_owned("alice").unwrap().is_empty());
        assert!(matches!(repo.delete(&TerritoryId::new("t1")), Err(RepositoryError::NotFound(_))));
    }
}
