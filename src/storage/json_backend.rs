use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;

use crate::domain::building::Building;
use crate::errors::EngineError;

use super::{Result, StorageBackend};

const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// File-per-building JSON storage with atomic writes and timestamped
/// backups.
#[derive(Clone)]
pub struct JsonStorage {
    buildings_dir: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl JsonStorage {
    pub fn new(root: Option<PathBuf>, retention: Option<usize>) -> Result<Self> {
        let app_root = resolve_base(root);
        let buildings_dir = app_root.join("buildings");
        let backups_dir = app_root.join("backups");
        fs::create_dir_all(&buildings_dir)?;
        fs::create_dir_all(&backups_dir)?;
        Ok(Self {
            buildings_dir,
            backups_dir,
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
        })
    }

    pub fn new_default() -> Result<Self> {
        Self::new(None, None)
    }

    pub fn building_path(&self, name: &str) -> PathBuf {
        self.buildings_dir
            .join(format!("{}.json", canonical_name(name)))
    }

    fn backup_dir(&self, name: &str) -> PathBuf {
        self.backups_dir.join(canonical_name(name))
    }

    fn prune_backups(&self, name: &str) -> Result<()> {
        let mut backups = self.list_backups(name)?;
        backups.sort();
        while backups.len() > self.retention {
            let oldest = backups.remove(0);
            let path = self.backup_dir(name).join(format!("{oldest}.json"));
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl StorageBackend for JsonStorage {
    fn save(&self, building: &Building, name: &str) -> Result<()> {
        save_building_to_path(building, &self.building_path(name))
    }

    fn load(&self, name: &str) -> Result<Building> {
        let path = self.building_path(name);
        if !path.exists() {
            return Err(EngineError::LedgerUnavailable(format!(
                "no stored building named `{name}`"
            )));
        }
        load_building_from_path(&path)
    }

    fn list_buildings(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.buildings_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn list_backups(&self, name: &str) -> Result<Vec<String>> {
        let dir = self.backup_dir(name);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut backups = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                backups.push(stem.to_string());
            }
        }
        backups.sort();
        Ok(backups)
    }

    fn backup(&self, building: &Building, name: &str) -> Result<()> {
        let dir = self.backup_dir(name);
        fs::create_dir_all(&dir)?;
        let stamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT);
        let path = dir.join(format!("{stamp}.json"));
        save_building_to_path(building, &path)?;
        self.prune_backups(name)
    }

    fn restore(&self, name: &str, backup_name: &str) -> Result<Building> {
        let path = self.backup_dir(name).join(format!("{backup_name}.json"));
        if !path.exists() {
            return Err(EngineError::LedgerUnavailable(format!(
                "no backup `{backup_name}` for building `{name}`"
            )));
        }
        load_building_from_path(&path)
    }
}

pub fn save_building_to_path(building: &Building, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(building)?;
    write_atomic(path, &json)
}

pub fn load_building_from_path(path: &Path) -> Result<Building> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Writes to a sibling temp file, then renames into place, so readers never
/// observe a half-written building.
fn write_atomic(path: &Path, data: &str) -> Result<()> {
    let tmp = path.with_extension(TMP_SUFFIX);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(data.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn resolve_base(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("strata_core")
    })
}

fn canonical_name(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|ch| if ch.is_whitespace() { '_' } else { ch })
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '-')
        .collect()
}
