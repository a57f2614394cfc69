use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::geo::coordinate::Coordinate;
use crate::models::territory::{Territory, TerritoryId};
use crate::storage::repository::{territory_within, RepositoryError, TerritoryRepository};
use crate::utils::logging::{self, FileIOType, OperationCategory};

/// Keeps every territory in one pretty-printed JSON array on disk.
///
/// The file is rewritten through a temporary sibling and renamed into place,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileTerritoryRepository {
    path: PathBuf,
    territories: RwLock<Vec<Territory>>,
}

impl JsonFileTerritoryRepository {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let _timing = logging::start_timing("open_json_repository",
            OperationCategory::FileIO { subcategory: FileIOType::RepositoryLoad });

        let path = path.as_ref().to_path_buf();
        let territories: Vec<Territory> = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            Vec::new()
        };

        info!(path = %path.display(), count = territories.len(), "Opened territory store");
        Ok(Self {
            path,
            territories: RwLock::new(territories),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn all(&self) -> Vec<Territory> {
        self.territories.read().clone()
    }

    fn write_all(&self, territories: &[Territory]) -> Result<(), RepositoryError> {
        let _timing = logging::start_timing("write_json_repository",
            OperationCategory::FileIO { subcategory: FileIOType::RepositorySave });

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(serde_json::to_string_pretty(territories)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), count = territories.len(), "Wrote territory store");
        Ok(())
    }
}

impl TerritoryRepository for JsonFileTerritoryRepository {
    fn find_active_territories(&self, near: &Coordinate, radius_m: f64) -> Result<Vec<Territory>, RepositoryError> {
        Ok(self
            .territories
            .read()
            .iter()
            .filter(|t| t.is_active() && territory_within(t, near, radius_m))
            .cloned()
            .collect())
    }

    fn save(&self, territory: &Territory) -> Result<(), RepositoryError> {
        let mut territories = self.territories.write();
        let mut updated = territories.clone();
        match updated.iter_mut().find(|t| t.get_id() == territory.get_id()) {
            Some(existing) => *existing = territory.clone(),
            None => updated.push(territory.clone()),
        }
        // Memory only changes once the file write went through
        self.write_all(&updated)?;
        *territories = updated;
        Ok(())
    }

    fn delete(&self, id: &TerritoryId) -> Result<(), RepositoryError> {
        let mut territories = self.territories.write();
        if !territories.iter().any(|t| t.get_id() == id) {
            return Err(RepositoryError::NotFound(id.clone()));
        }
        let remaining: Vec<Territory> = territories.iter().filter(|t| t.get_id() != id).cloned().collect();
        self.write_all(&remaining)?;
        *territories = remaining;
        Ok(())
    }

    fn list_owned(&self, owner_id: &str) -> Result<Vec<Territory>, RepositoryError> {
        Ok(self
            .territories
            .read()
            .iter()
            .filter(|t| t.get_owner_id() == owner_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::coordinate::destination;
    use crate::models::territory::ClaimTimes;
    use chrono::Utc;
    use rand::Rng;

    fn temp_store() -> PathBuf {
        let suffix: u64 = rand::thread_rng().gen();
        std::env::temp_dir().join(format!("earthlord_repo_{:016x}", suffix)).join("territories.json")
    }

    fn territory(id: &str) -> Territory {
        let o = Coordinate::new(31.2304, 121.4737);
        let e = destination(&o, 90.0, 40.0);
        let ne = destination(&e, 0.0, 40.0);
        let n = destination(&o, 0.0, 40.0);
        let now = Utc::now();
        let times = ClaimTimes { started_at: now, completed_at: now, created_at: now };
        Territory::new(TerritoryId::new(id), "owner", "Plot", vec![o, e, ne, n], times).unwrap()
    }

    #[test]
    fn test_save_survives_reopen() {
        let path = temp_store();
        {
            let repo = JsonFileTerritoryRepository::open(&path).unwrap();
            repo.save(&territory("a")).unwrap();
            repo.save(&territory("b")).unwrap();
            repo.save(&territory("a")).unwrap();
        }
        let reopened = JsonFileTerritoryRepository::open(&path).unwrap();
        assert_eq!(reopened.all().len(), 2);
        assert_eq!(reopened.all()[0].get_id().as_str(), "a");
        assert_eq!(reopened.all()[0].get_point_count(), 4);

        reopened.delete(&TerritoryId::new("a")).unwrap();
        let again = JsonFileTerritoryRepository::open(&path).unwrap();
        assert_eq!(again.list_owned("owner").unwrap().len(), 1);

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let path = temp_store();
        let repo = JsonFileTerritoryRepository::open(&path).unwrap();
        assert!(matches!(repo.delete(&TerritoryId::new("nope")), Err(RepositoryError::NotFound(_))));
        assert!(!path.exists());
    }
}
