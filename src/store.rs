use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{CatalogError, Result};

/// One cataloged item. Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(rename = "img")]
    pub asset_path: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "url")]
    pub id: String,
}

/// Ordered records; insertion order is display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
}

impl Catalog {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Catalog { records }
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(CatalogRecord),
    NotFound,
}

/// File-backed catalog. Every mutation is load, change in memory, then a
/// whole-file replace.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CatalogStore { path: path.into() }
    }

    /// Read the catalog. A missing or unreadable file is an empty catalog.
    pub fn load(&self) -> Catalog {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No catalog at {:?} yet", self.path);
                return Catalog::default();
            }
            Err(e) => {
                warn!("Could not read catalog {:?}, treating as empty: {}", self.path, e);
                return Catalog::default();
            }
        };

        match serde_json::from_str::<Vec<CatalogRecord>>(&text) {
            Ok(records) => Catalog::new(records),
            Err(e) => {
                warn!("Catalog {:?} is corrupt, treating as empty: {}", self.path, e);
                Catalog::default()
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.load().contains(id)
    }

    pub fn add(&self, record: CatalogRecord) -> Result<AddOutcome> {
        let mut catalog = self.load();
        if catalog.contains(&record.id) {
            warn!("Already in catalog, skipping: {}", record.id);
            return Ok(AddOutcome::AlreadyExists);
        }

        info!("Adding {} ({})", record.display_name, record.id);
        catalog.records.push(record);
        self.persist(&catalog)?;
        Ok(AddOutcome::Inserted)
    }

    /// Drop the record for `id` and delete its asset.
    ///
    /// The catalog is rewritten before the asset is deleted, so an
    /// interruption leaves at worst an orphan file for `clean` to collect,
    /// never a record pointing at a missing file.
    pub fn remove(&self, id: &str) -> Result<RemoveOutcome> {
        let mut catalog = self.load();
        let Some(pos) = catalog.records.iter().position(|r| r.id == id) else {
            info!("Not in catalog: {}", id);
            return Ok(RemoveOutcome::NotFound);
        };

        let record = catalog.records.remove(pos);
        self.persist(&catalog)?;
        info!("Removed {} ({})", record.display_name, record.id);

        let asset = Path::new(&record.asset_path);
        let target = normalize(asset);
        if let Some(other) = catalog
            .iter()
            .find(|r| normalize(Path::new(&r.asset_path)) == target)
        {
            warn!("Keeping asset {:?}, still used by {}", asset, other.id);
            return Ok(RemoveOutcome::Removed(record));
        }
        match std::fs::remove_file(asset) {
            Ok(()) => debug!("Deleted asset {:?}", asset),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Asset {:?} for {} was already missing", asset, record.id);
            }
            Err(e) => warn!("Could not delete asset {:?}: {}", asset, e),
        }
        Ok(RemoveOutcome::Removed(record))
    }

    fn persist(&self, catalog: &Catalog) -> Result<()> {
        let mut json = serde_json::to_string_pretty(&catalog.records)?;
        json.push('\n');
        write_atomic(&self.path, json.as_bytes())
    }
}

/// Drop `.` components so `./assets/a.jpg` and `assets/a.jpg` compare equal.
pub fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let persist_err = |source: std::io::Error| CatalogError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(persist_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(persist_err)?;
    tmp.write_all(contents).map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}
