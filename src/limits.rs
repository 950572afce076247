//! Limits and constraints for DTD processing
//!
//! This module defines limits that keep entity expansion and external
//! resource loading bounded (billion laughs, recursive external subsets).

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum size of a single loaded resource in bytes
    pub max_resource_size: usize,

    /// Maximum number of parameter-entity expansions per parse
    pub max_entity_expansions: usize,

    /// Maximum total size of expanded entity text in bytes
    pub max_entity_expansion_size: usize,

    /// Maximum nesting of entities and external resources
    pub max_entity_depth: usize,

    /// Maximum nesting of content-model groups
    pub max_content_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_resource_size: 100 * 1024 * 1024, // 100 MB
            max_entity_expansions: 10000,
            max_entity_expansion_size: 10 * 1024 * 1024, // 10 MB
            max_entity_depth: 64,
            max_content_depth: 256,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_resource_size: 10 * 1024 * 1024, // 10 MB
            max_entity_expansions: 1000,
            max_entity_expansion_size: 1024 * 1024, // 1 MB
            max_entity_depth: 16,
            max_content_depth: 64,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_resource_size: 1024 * 1024 * 1024, // 1 GB
            max_entity_expansions: 1_000_000,
            max_entity_expansion_size: 100 * 1024 * 1024, // 100 MB
            max_entity_depth: 1024,
            max_content_depth: 4096,
        }
    }

    /// Check if a resource size is within limits
    pub fn check_resource_size(&self, size: usize) -> Result<()> {
        if size > self.max_resource_size {
            Err(Error::LimitExceeded(format!(
                "resource size {} bytes exceeds maximum {} bytes",
                size, self.max_resource_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if entity expansions are within limits
    pub fn check_entity_expansions(&self, count: usize) -> Result<()> {
        if count > self.max_entity_expansions {
            Err(Error::LimitExceeded(format!(
                "entity expansions {} exceeds maximum {}",
                count, self.max_entity_expansions
            )))
        } else {
            Ok(())
        }
    }

    /// Check if total expanded entity text is within limits
    pub fn check_entity_expansion_size(&self, size: usize) -> Result<()> {
        if size > self.max_entity_expansion_size {
            Err(Error::LimitExceeded(format!(
                "entity expansion size {} bytes exceeds maximum {} bytes",
                size, self.max_entity_expansion_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if entity nesting depth is within limits
    pub fn check_entity_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_entity_depth {
            Err(Error::LimitExceeded(format!(
                "entity nesting depth {} exceeds maximum {}",
                depth, self.max_entity_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if content-model group nesting is within limits
    pub fn check_content_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_content_depth {
            Err(Error::LimitExceeded(format!(
                "content model depth {} exceeds maximum {}",
                depth, self.max_content_depth
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_entity_depth, 64);
        assert!(limits.check_entity_depth(10).is_ok());
        assert!(limits.check_entity_depth(65).is_err());
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert!(limits.max_entity_expansions < Limits::default().max_entity_expansions);
        assert!(limits.check_entity_expansions(1001).is_err());
    }

    #[test]
    fn test_permissive_limits() {
        let limits = Limits::permissive();
        assert!(limits.max_content_depth > Limits::default().max_content_depth);
        assert!(limits.check_content_depth(1000).is_ok());
    }

    #[test]
    fn test_check_resource_size() {
        let limits = Limits::default();
        assert!(limits.check_resource_size(1024).is_ok());
        assert!(limits.check_resource_size(200 * 1024 * 1024).is_err());
    }
}
