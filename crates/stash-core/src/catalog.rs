use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::Serialize;

use crate::populate::CachePopulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Audio,
}

impl AssetKind {
    const IMAGE_EXTENSIONS: [&'static str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];
    const AUDIO_EXTENSIONS: [&'static str; 4] = ["wav", "mp3", "ogg", "flac"];

    /// Classify a file by extension, ignoring case.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if Self::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if Self::AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Audio)
        } else {
            None
        }
    }
}

/// Where a catalog was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    Cache,
    Bundled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub kind: AssetKind,
}

/// Asset name to local file mapping handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetCatalog {
    pub source: CatalogSource,
    pub root: PathBuf,
    pub assets: IndexMap<String, CatalogEntry>,
}

impl AssetCatalog {
    pub fn scan(root: &Path, source: CatalogSource) -> Result<Self> {
        if !root.is_dir() {
            bail!("asset directory {} does not exist", root.display());
        }
        let files = stash_store::LocalCache::new(root)
            .walk()
            .with_context(|| format!("failed to scan {}", root.display()))?;

        let mut assets = IndexMap::new();
        for file in files {
            let Some(kind) = AssetKind::from_path(&file.path) else {
                tracing::trace!(key = %file.key, "skipping non-asset file");
                continue;
            };
            assets.insert(
                file.key,
                CatalogEntry {
                    path: file.path,
                    kind,
                },
            );
        }
        Ok(Self {
            source,
            root: root.to_path_buf(),
            assets,
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.assets.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn of_kind(&self, kind: AssetKind) -> impl Iterator<Item = (&str, &Path)> {
        self.assets
            .iter()
            .filter(move |(_, entry)| entry.kind == kind)
            .map(|(name, entry)| (name.as_str(), entry.path.as_path()))
    }
}

/// Populate the cache and catalog it, or catalog the bundled fallback.
pub fn load_catalog(
    populator: &CachePopulator,
    cache_root: &Path,
    fallback: Option<&Path>,
) -> Result<AssetCatalog> {
    if populator.populate(cache_root) {
        return AssetCatalog::scan(cache_root, CatalogSource::Cache);
    }
    let Some(fallback) = fallback else {
        bail!(
            "remote assets could not be cached in {} and no bundled assets are configured",
            cache_root.display()
        );
    };
    tracing::warn!(
        fallback = %fallback.display(),
        "remote assets unavailable; using bundled assets"
    );
    AssetCatalog::scan(fallback, CatalogSource::Bundled)
}
