//! JSON manifest describing a batch of resources
//!
//! ```json
//! {
//!   "files": [
//!     { "kind": "image", "key": "hero", "extension": "png" },
//!     { "kind": "json", "key": "hero", "extension": "json", "response_kind": "json" }
//!   ],
//!   "links": [
//!     { "primary": { "kind": "image", "key": "hero" },
//!       "partner": { "kind": "json", "key": "hero" },
//!       "role": "atlas" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::handle::HandleConfig;
use crate::loader::{FileId, Loader, LoaderError};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Loader(#[from] LoaderError),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(default)]
    pub files: Vec<HandleConfig>,
    #[serde(default)]
    pub links: Vec<ManifestLink>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestLink {
    pub primary: FileId,
    pub partner: FileId,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "link".to_string()
}

impl Manifest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_slice(&bytes)
    }

    /// Queue every file on `loader`, then pair the links
    pub fn apply(self, loader: &mut Loader) -> Result<(), ManifestError> {
        for file in self.files {
            loader.add(file)?;
        }

        for link in &self.links {
            loader.link_files(&link.primary, &link.partner, link.role.clone())?;
        }

        Ok(())
    }
}
