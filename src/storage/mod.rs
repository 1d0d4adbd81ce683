pub mod json_backend;

use std::path::Path;

use crate::domain::building::Building;
use crate::errors::EngineError;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Abstraction over persistence backends capable of storing buildings and
/// snapshots.
pub trait StorageBackend: Send + Sync {
    fn save(&self, building: &Building, name: &str) -> Result<()>;
    fn load(&self, name: &str) -> Result<Building>;
    fn list_buildings(&self) -> Result<Vec<String>>;
    fn list_backups(&self, name: &str) -> Result<Vec<String>>;
    fn backup(&self, building: &Building, name: &str) -> Result<()>;
    fn restore(&self, name: &str, backup_name: &str) -> Result<Building>;

    /// Optional helpers for ad-hoc file operations. Default implementations
    /// forward to managed storage when not overridden.
    fn save_to_path(&self, building: &Building, path: &Path) -> Result<()> {
        json_backend::save_building_to_path(building, path)
    }

    fn load_from_path(&self, path: &Path) -> Result<Building> {
        json_backend::load_building_from_path(path)
    }
}

pub use json_backend::JsonStorage;
