//! Resource loading utilities
//!
//! This module loads DTD subsets and external parameter entities. Public and
//! system identifiers go through an optional [`Catalog`] before loading.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use std::fs;
use tracing::debug;

/// Resource loader for DTDs and external entities
#[derive(Debug, Clone)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
    /// Whether to allow remote resources
    allow_remote: bool,
    /// Catalog consulted before loading
    catalog: Option<Catalog>,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
            allow_remote: false,
            catalog: None,
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set whether to allow remote resources
    pub fn with_allow_remote(mut self, allow: bool) -> Self {
        self.allow_remote = allow;
        self
    }

    /// Set the catalog
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// The limits this loader enforces
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Work out where an external identifier points
    ///
    /// The catalog is consulted first (public id, then system id); otherwise
    /// the system id resolves against `base`.
    pub fn locate(
        &self,
        public_id: Option<&str>,
        system_id: &str,
        base: Option<&Location>,
    ) -> Result<Location> {
        if let Some(catalog) = &self.catalog {
            if let Some(mapped) = catalog.resolve(public_id, system_id) {
                debug!(system_id, mapped, "catalog mapped external identifier");
                return Location::parse(mapped);
            }
        }

        match base {
            Some(base) => base.resolve(system_id),
            None => Location::parse(system_id),
        }
    }

    /// Load a resource as a string
    pub fn load(&self, location: &Location) -> Result<String> {
        match location {
            Location::Path(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
                })?;

                self.limits.check_resource_size(content.len())?;

                Ok(content)
            }
            Location::Url(url) => {
                if !self.allow_remote {
                    return Err(Error::Resource(format!(
                        "Remote resources are not allowed: {}",
                        url
                    )));
                }

                Err(Error::Resource(format!(
                    "URL loading is not supported: {}",
                    url
                )))
            }
            Location::String(s) => Ok(s.clone()),
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
