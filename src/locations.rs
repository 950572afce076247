//! Resource location resolution
//!
//! This module handles resolution of DTD system identifiers (URLs, file
//! paths) relative to the resource that referenced them.

use crate::error::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Resource location - can be a URL, file path, or in-memory text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, ftp, etc.)
    Url(Url),
    /// In-memory text, identified by a label
    String(String),
}

impl Location {
    /// Create a location from a system identifier (auto-detect type)
    pub fn parse(s: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(s) {
            if url.scheme() == "file" {
                if let Ok(path) = url.to_file_path() {
                    return Ok(Location::Path(path));
                }
            } else if url.scheme().len() > 1 {
                // single-letter schemes are Windows drive letters
                return Ok(Location::Url(url));
            }
        }

        Ok(Location::Path(PathBuf::from(s)))
    }

    /// Create a location for a file path
    pub fn path(path: impl AsRef<Path>) -> Self {
        Location::Path(path.as_ref().to_path_buf())
    }

    /// Resolve a system identifier relative to this location
    ///
    /// Absolute identifiers are returned unchanged. Relative identifiers
    /// found in in-memory text resolve against the current directory.
    pub fn resolve(&self, system_id: &str) -> Result<Location> {
        if let Ok(url) = Url::parse(system_id) {
            if url.scheme().len() > 1 {
                return Location::parse(system_id);
            }
        }

        match self {
            Location::Url(base) => Ok(Location::Url(base.join(system_id)?)),
            Location::Path(base) => {
                let relative = Path::new(system_id);
                if relative.is_absolute() {
                    return Ok(Location::Path(relative.to_path_buf()));
                }
                let dir = base.parent().unwrap_or_else(|| Path::new(""));
                Ok(Location::Path(dir.join(relative)))
            }
            Location::String(_) => Ok(Location::Path(PathBuf::from(system_id))),
        }
    }

    /// Get the location as a string
    pub fn as_str(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Url(u) => u.to_string(),
            Location::String(s) => s.clone(),
        }
    }

    /// Check if this is a remote location (URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(_))
    }

    /// Check if this is a local file
    pub fn is_file(&self) -> bool {
        matches!(self, Location::Path(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
