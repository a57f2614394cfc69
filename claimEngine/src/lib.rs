// Main module declarations for the territory claim engine

// Geodesy and polygon geometry
pub mod geo {
    pub mod coordinate;
    pub mod geometry;
}

// Claim lifecycle
pub mod claim {
    pub mod path_recorder;
    pub mod validation;
    pub mod events;
    pub mod state_machine;
}

// Points of interest
pub mod poi {
    pub mod proximity;
    pub mod catalog;
}

// Configuration modules
pub mod config {
    pub mod constants;
    pub mod claim_config;
}

// Model definitions
pub mod models {
    pub mod territory;
}

// Data loaders
pub mod data {
    pub mod poi;
    pub mod poi_loader;
    pub mod track_loader;
}

// Territory persistence
pub mod storage {
    pub mod repository;
    pub mod json_repository;
}

// Utility functions
pub mod utils {
    pub mod clock;
    pub mod context;
    pub mod logging;
    pub mod spatial_index;
}

// CLI interface
pub mod cli {
    pub mod cli;
}

// Re-export commonly used modules
pub use crate::claim::state_machine::{ClaimEngine, ClaimOutcome, ClaimState};
pub use crate::config::claim_config::ClaimConfig;
pub use crate::geo::coordinate::Coordinate;
pub use crate::models::territory::{Territory, TerritoryId};
pub use crate::storage::repository::TerritoryRepository;
