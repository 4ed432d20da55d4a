use std::path::Path;

use tracing::{info, warn};

use crate::canonical::{asset_file_name, canonicalize};
use crate::error::{CatalogError, Result};
use crate::fetch::ItemFetcher;
use crate::settings::Settings;
use crate::shorten::Shortener;
use crate::store::{AddOutcome, CatalogRecord, CatalogStore};
use crate::thumbnail::AssetWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddResult {
    Committed(CatalogRecord),
    /// The canonical id was already cataloged; nothing was written.
    Rejected(String),
}

/// Runs the add workflow: canonicalize, dedup, fetch, shorten, write the
/// asset, then commit the record.
pub struct Orchestrator<'a, F, S, W> {
    settings: &'a Settings,
    store: &'a CatalogStore,
    fetcher: F,
    shortener: S,
    writer: W,
}

impl<'a, F, S, W> Orchestrator<'a, F, S, W>
where
    F: ItemFetcher,
    S: Shortener,
    W: AssetWriter,
{
    pub fn new(
        settings: &'a Settings,
        store: &'a CatalogStore,
        fetcher: F,
        shortener: S,
        writer: W,
    ) -> Self {
        Orchestrator {
            settings,
            store,
            fetcher,
            shortener,
            writer,
        }
    }

    pub fn add(&self, raw_url: &str) -> Result<AddResult> {
        let id = canonicalize(raw_url)?;
        if self.store.contains(&id) {
            warn!("Already in catalog, skipping: {}", id);
            return Ok(AddResult::Rejected(id));
        }

        let details = self
            .fetcher
            .fetch(&id)
            .map_err(|source| CatalogError::Fetch {
                url: id.clone(),
                source,
            })?;
        let name = self.finalize_name(&details.name);

        // The file must exist before the record that points at it is committed.
        let dest = self.settings.asset_dir.join(asset_file_name(&name, &id));
        self.writer
            .write(&details.image_url, &dest, self.settings.thumbnail_size)
            .map_err(|source| CatalogError::AssetWrite {
                path: dest.clone(),
                source,
            })?;

        let record = CatalogRecord {
            asset_path: asset_path_string(&dest),
            display_name: name,
            id,
        };
        match self.store.add(record.clone())? {
            AddOutcome::Inserted => {
                info!("Committed {}", record.id);
                Ok(AddResult::Committed(record))
            }
            AddOutcome::AlreadyExists => Ok(AddResult::Rejected(record.id)),
        }
    }

    fn finalize_name(&self, original: &str) -> String {
        match self.shortener.shorten(original) {
            Ok(short) if !short.trim().is_empty() => short.trim().to_string(),
            Ok(_) => {
                warn!("Shortener returned an empty name, keeping {:?}", original);
                original.to_string()
            }
            Err(e) => {
                warn!("Name shortening failed, keeping {:?}: {:#}", original, e);
                original.to_string()
            }
        }
    }
}

/// Stored and rendered with `/` separators regardless of platform.
fn asset_path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
