use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "shelfgen.toml";
const ENV_PREFIX: &str = "SHELFGEN";

/// Paths and knobs shared by every component. Relative paths resolve
/// against the working directory, and asset paths are stored in the
/// catalog exactly as they are built from `asset_dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub catalog_path: PathBuf,
    pub asset_dir: PathBuf,
    pub thumbnail_size: u32,
    pub output_path: PathBuf,
    pub shorten_endpoint: String,
    pub shorten_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            catalog_path: PathBuf::from("items.json"),
            asset_dir: PathBuf::from("assets"),
            thumbnail_size: 128,
            output_path: PathBuf::from("README.md"),
            shorten_endpoint: "https://api.openai.com/v1".to_string(),
            shorten_model: "gpt-4o-mini".to_string(),
        }
    }
}

impl Settings {
    /// Layer defaults, the optional TOML file and `SHELFGEN_*` env vars.
    pub fn load(config_file: &Path) -> Result<Self> {
        let defaults = Settings::default();
        let settings = Config::builder()
            .set_default("catalog_path", path_str(&defaults.catalog_path))?
            .set_default("asset_dir", path_str(&defaults.asset_dir))?
            .set_default("thumbnail_size", i64::from(defaults.thumbnail_size))?
            .set_default("output_path", path_str(&defaults.output_path))?
            .set_default("shorten_endpoint", defaults.shorten_endpoint)?
            .set_default("shorten_model", defaults.shorten_model)?
            .add_source(File::from(config_file).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read configuration from {:?}", config_file))?;

        let settings: Settings = settings
            .try_deserialize()
            .context("Invalid shelfgen configuration")?;
        if settings.thumbnail_size == 0 {
            anyhow::bail!("thumbnail_size must be greater than zero");
        }
        debug!(?settings, "configuration loaded");
        Ok(settings)
    }
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("shelfgen.toml");
        std::fs::write(&file, "thumbnail_size = 64\nasset_dir = \"img\"\n")?;

        let settings = Settings::load(&file)?;
        assert_eq!(settings.thumbnail_size, 64);
        assert_eq!(settings.asset_dir, PathBuf::from("img"));
        assert_eq!(settings.catalog_path, PathBuf::from("items.json"));
        Ok(())
    }

    #[test]
    fn missing_file_falls_back_to_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let settings = Settings::load(&dir.path().join("absent.toml"))?;
        assert_eq!(settings.output_path, PathBuf::from("README.md"));
        Ok(())
    }

    #[test]
    fn zero_thumbnail_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("shelfgen.toml");
        std::fs::write(&file, "thumbnail_size = 0\n")?;
        assert!(Settings::load(&file).is_err());
        Ok(())
    }
}
