use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{CatalogError, Result};
use crate::store::{normalize, CatalogStore};

/// Outcome of a sweep, or of a dry run when nothing was deleted.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Files still referenced by the catalog.
    pub kept: usize,
    /// Orphans removed, or that would be removed on a dry run.
    pub orphans: Vec<PathBuf>,
    /// Orphans that could not be deleted (path, error).
    pub failed: Vec<(PathBuf, String)>,
    /// Referenced asset paths with no file on disk.
    pub dangling: Vec<PathBuf>,
}

impl SweepReport {
    pub fn has_errors(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Deletes asset files that no catalog record references.
pub struct AssetJanitor<'a> {
    store: &'a CatalogStore,
    asset_dir: PathBuf,
}

impl<'a> AssetJanitor<'a> {
    pub fn new(store: &'a CatalogStore, asset_dir: impl Into<PathBuf>) -> Self {
        AssetJanitor {
            store,
            asset_dir: asset_dir.into(),
        }
    }

    pub fn sweep(&self) -> Result<SweepReport> {
        self.run(false)
    }

    /// Same as [`sweep`](Self::sweep) without deleting anything.
    pub fn preview(&self) -> Result<SweepReport> {
        self.run(true)
    }

    fn run(&self, dry_run: bool) -> Result<SweepReport> {
        let catalog = self.store.load();
        let referenced: HashSet<PathBuf> = catalog
            .iter()
            .map(|r| normalize(Path::new(&r.asset_path)))
            .collect();

        let mut report = SweepReport::default();
        for path in &referenced {
            if !path.is_file() {
                warn!("Catalog references missing asset {:?}", path);
                report.dangling.push(path.clone());
            }
        }
        report.dangling.sort();

        let entries = match std::fs::read_dir(&self.asset_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Asset directory {:?} does not exist, nothing to sweep", self.asset_dir);
                return Ok(report);
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: self.asset_dir.clone(),
                    source,
                })
            }
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {:?}: {}", self.asset_dir, e);
                    continue;
                }
            };
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => continue,
                Ok(_) => candidates.push(normalize(&entry.path())),
                Err(e) => warn!("Skipping {:?}: {}", entry.path(), e),
            }
        }
        candidates.sort();

        let orphans: Vec<PathBuf> = candidates
            .into_iter()
            .filter(|path| {
                let live = referenced.contains(path);
                if live {
                    report.kept += 1;
                }
                !live
            })
            .collect();

        if dry_run {
            for path in &orphans {
                info!("Would delete orphan {:?}", path);
            }
            report.orphans = orphans;
        } else {
            delete_orphans(orphans, &mut report);
        }

        Ok(report)
    }
}

/// Delete each orphan, recording failures instead of stopping at the first.
fn delete_orphans(orphans: Vec<PathBuf>, report: &mut SweepReport) {
    for path in orphans {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted orphan {:?}", path);
                report.orphans.push(path);
            }
            Err(e) => {
                warn!("Failed to delete {:?}: {}", path, e);
                report.failed.push((path, e.to_string()));
            }
        }
    }
}
