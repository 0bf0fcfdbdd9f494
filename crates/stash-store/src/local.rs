use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{AssetKey, PARTIAL_PREFIX, PARTIAL_SUFFIX};

/// On-disk cache rooted at a single directory. Each asset lives at
/// `root/<key>`; the directory tree is the only state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCache {
    root: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheUsage {
    pub exists: bool,
    pub total_entries: u64,
    pub total_size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedFile {
    /// Path relative to the cache root with `/` separators.
    pub key: String,
    pub path: PathBuf,
    pub size: u64,
}

impl LocalCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, key: &AssetKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    #[must_use]
    pub fn exists(&self, key: &AssetKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Create the cache root if it is missing.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the directory cannot be created.
    pub fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Create every directory between the cache root and the entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when a directory cannot be created.
    pub fn ensure_parent_dirs(&self, key: &AssetKey) -> io::Result<()> {
        match self.path_for(key).parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
    }

    /// Count the files under the cache root and their total size.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory tree cannot be traversed.
    pub fn usage(&self) -> io::Result<CacheUsage> {
        if !self.root.exists() {
            return Ok(CacheUsage::default());
        }
        let files = self.walk()?;
        Ok(CacheUsage {
            exists: true,
            total_entries: files.len() as u64,
            total_size_bytes: files.iter().map(|file| file.size).sum(),
        })
    }

    /// Every cached file below the root, sorted by key. In-flight downloads
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the directory tree fails at any point.
    pub fn walk(&self) -> io::Result<Vec<CachedFile>> {
        walk_files(&self.root)
    }
}

/// Collect regular files below `root`, keyed by their `/`-separated relative
/// path.
///
/// # Errors
///
/// Returns an error if reading the directory tree fails at any point.
pub(crate) fn walk_files(root: &Path) -> io::Result<Vec<CachedFile>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let entry_path = entry.path();
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                stack.push(entry_path);
            } else if metadata.is_file() {
                if is_partial_download(&entry_path) {
                    continue;
                }
                let Some(key) = relative_key(root, &entry_path) else {
                    continue;
                };
                files.push(CachedFile {
                    key,
                    path: entry_path,
                    size: metadata.len(),
                });
            }
        }
    }

    files.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(files)
}

fn is_partial_download(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX))
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}
