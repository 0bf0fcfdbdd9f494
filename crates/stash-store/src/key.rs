use std::borrow::Borrow;
use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// Identifier of a blob in the remote store, reused verbatim as the relative
/// path of its cached copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key maps to a path strictly inside the cache root.
    ///
    /// Keys with a root, a drive prefix, empty segments, `.` or `..`
    /// components would escape or alias other entries and are never written
    /// to disk. Directory markers fail the empty-segment check.
    #[must_use]
    pub fn is_contained(&self) -> bool {
        if self.0.is_empty() || self.0.contains('\\') {
            return false;
        }
        self.segments().all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && Path::new(segment)
                    .components()
                    .all(|component| matches!(component, Component::Normal(_)))
        })
    }

    /// Object stores use keys ending in `/` as directory placeholders.
    #[must_use]
    pub fn is_directory_marker(&self) -> bool {
        self.0.ends_with('/')
    }

    /// The `/`-separated parts of the key, empty ones included.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AssetKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for AssetKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AssetKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
