//! Game data model and sled-backed persistence.
//!
//! Typed records for the world (locations, species, genders, NPCs), player
//! characters and their inventories, plus the derived combat status the web
//! views consult before letting a character be edited.

pub mod combat;
pub mod errors;
pub mod seed_loader;
pub mod state;
pub mod storage;
pub mod types;

pub use combat::in_combat;
pub use errors::GameError;
pub use seed_loader::{apply_seed, load_seed_file, SeedFile};
pub use state::{canonical_world_seed, DEFAULT_LOCATION_ID};
pub use storage::{GameStore, GameStoreBuilder, Record, StoreStatistics};
pub use types::*;
