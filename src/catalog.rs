//! XML Catalog support for DTD external identifiers
//!
//! This module implements the subset of OASIS XML Catalogs needed to map the
//! `PUBLIC` and `SYSTEM` identifiers found in `DOCTYPE` and entity
//! declarations to local files.
//!
//! # Supported Elements
//!
//! - `<catalog>` - Root element
//! - `<group>` - Grouping element (inherits base from parent)
//! - `<public>` - Maps public identifiers to URIs
//! - `<system>` - Maps system identifiers to URIs
//! - `<nextCatalog>` - Includes another catalog file
//!
//! # Example
//!
//! ```xml
//! <catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
//!   <public publicId="-//Example//DTD Orders 1.0//EN" uri="dtd/orders.dtd"/>
//!   <nextCatalog catalog="vendor/catalog.xml"/>
//! </catalog>
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::documents::{Document, Element};
use crate::error::{Error, Result};

/// XML Catalog for resolving external identifiers
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Public ID to URI mappings
    public_mappings: HashMap<String, String>,
    /// System ID to URI mappings
    system_mappings: HashMap<String, String>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a file
    ///
    /// This will recursively load any catalogs referenced via `<nextCatalog>`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Resource(format!("Failed to read catalog '{}': {}", path.display(), e))
        })?;

        let mut catalog = Self::new();
        catalog.parse_catalog(&content, path.parent())?;
        Ok(catalog)
    }

    /// Parse catalog text; relative URIs resolve against `base_dir`
    pub fn from_str(xml: &str, base_dir: Option<&Path>) -> Result<Self> {
        let mut catalog = Self::new();
        catalog.parse_catalog(xml, base_dir)?;
        Ok(catalog)
    }

    fn parse_catalog(&mut self, xml: &str, base_dir: Option<&Path>) -> Result<()> {
        let doc = Document::from_string(xml)?;
        let root = doc
            .root()
            .ok_or_else(|| Error::Resource("Empty catalog document".to_string()))?;

        if root.local_name() != "catalog" {
            return Err(Error::Resource(format!(
                "Expected catalog root element, got {}",
                root.local_name()
            )));
        }

        self.process_catalog_children(&root.children, base_dir)
    }

    fn process_catalog_children(
        &mut self,
        children: &[Element],
        base_dir: Option<&Path>,
    ) -> Result<()> {
        for child in children {
            match child.local_name() {
                "public" => {
                    if let (Some(public_id), Some(uri)) =
                        (child.get_attribute("publicId"), child.get_attribute("uri"))
                    {
                        self.public_mappings
                            .insert(normalize_public_id(public_id), resolve_uri(uri, base_dir));
                    }
                }
                "system" => {
                    if let (Some(system_id), Some(uri)) =
                        (child.get_attribute("systemId"), child.get_attribute("uri"))
                    {
                        self.system_mappings
                            .insert(system_id.to_string(), resolve_uri(uri, base_dir));
                    }
                }
                "nextCatalog" => {
                    if let Some(catalog_path) = child.get_attribute("catalog") {
                        let resolved_path = match base_dir {
                            Some(base) => base.join(catalog_path),
                            None => PathBuf::from(catalog_path),
                        };

                        match fs::read_to_string(&resolved_path) {
                            Ok(content) => {
                                let next_base = resolved_path.parent().map(Path::to_path_buf);
                                self.parse_catalog(&content, next_base.as_deref())?;
                            }
                            Err(e) => {
                                warn!(catalog = %resolved_path.display(), error = %e, "skipping unreadable nextCatalog");
                            }
                        }
                    }
                }
                "group" => {
                    self.process_catalog_children(&child.children, base_dir)?;
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Resolve an external identifier
    ///
    /// The public identifier is tried first, then the system identifier.
    pub fn resolve(&self, public_id: Option<&str>, system_id: &str) -> Option<&str> {
        if let Some(public_id) = public_id {
            if let Some(uri) = self.public_mappings.get(&normalize_public_id(public_id)) {
                return Some(uri);
            }
        }

        self.system_mappings.get(system_id).map(String::as_str)
    }

    /// Check if this catalog is empty (has no mappings)
    pub fn is_empty(&self) -> bool {
        self.public_mappings.is_empty() && self.system_mappings.is_empty()
    }

    /// Get the number of mappings
    pub fn len(&self) -> usize {
        self.public_mappings.len() + self.system_mappings.len()
    }
}

fn resolve_uri(uri: &str, base_dir: Option<&Path>) -> String {
    match base_dir {
        Some(base) if !uri.contains("://") => base.join(uri).to_string_lossy().to_string(),
        _ => uri.to_string(),
    }
}

/// Public identifiers compare with whitespace collapsed
fn normalize_public_id(id: &str) -> String {
    id.split_whitespace().collect::<Vec<_>>().join(" ")
}
