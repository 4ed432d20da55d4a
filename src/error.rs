use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The URL has neither a `/dp/<token>` nor a `/gp/product/<token>` path.
    #[error("unrecognized item URL {0:?}: expected a /dp/<id> or /gp/product/<id> path")]
    InvalidIdentifierFormat(String),

    #[error("failed to fetch item details for {url}")]
    Fetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write asset {}", path.display())]
    AssetWrite {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to persist {}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode catalog")]
    Encode(#[from] serde_json::Error),

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
