//! XML namespace handling
//!
//! DTDs know nothing about namespaces, so prefixed element type names such as
//! `ord:Order` are resolved against prefix/URI pairs supplied by the caller.
//! This module provides [`XmlName`] and the [`NamespaceContext`] that does
//! the resolving.

use crate::error::{Error, Result};
use crate::names::split_qname;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Element type or attribute name, as written plus its resolved namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct XmlName {
    /// Prefix as written in the schema (None for unprefixed names)
    pub prefix: Option<Prefix>,
    /// Local name
    pub local_name: String,
    /// Namespace URI the prefix resolved to (None if unresolved or unprefixed)
    pub namespace: Option<NamespaceUri>,
}

impl XmlName {
    /// Create a name without prefix or namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local_name: local_name.into(),
            namespace: None,
        }
    }

    /// Create a fully specified name
    pub fn new(
        prefix: Option<impl Into<String>>,
        local_name: impl Into<String>,
        namespace: Option<impl Into<String>>,
    ) -> Self {
        Self {
            prefix: prefix.map(Into::into),
            local_name: local_name.into(),
            namespace: namespace.map(Into::into),
        }
    }

    /// The name as written: `prefix:local` or `local`
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local_name),
            None => self.local_name.clone(),
        }
    }

    /// Universal name: `{uri}local` when a namespace is known, else the qualified name
    pub fn universal(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{}}}{}", ns, self.local_name),
            None => self.qualified(),
        }
    }
}

impl fmt::Display for XmlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified())
    }
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI, in declaration order
    prefixes: IndexMap<Prefix, NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    ///
    /// Rebinding a prefix to a different URI is an error.
    pub fn add_prefix(&mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Result<()> {
        let prefix = prefix.into();
        let uri = uri.into();
        if let Some(existing) = self.prefixes.get(&prefix) {
            if *existing != uri {
                return Err(Error::Namespace(format!(
                    "prefix '{}' is already bound to '{}'",
                    prefix, existing
                )));
            }
            return Ok(());
        }
        self.prefixes.insert(prefix, uri);
        Ok(())
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the first prefix bound to a namespace URI
    pub fn get_prefix(&self, uri: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(_, u)| u.as_str() == uri)
            .map(|(p, _)| p.as_str())
    }

    /// Iterate over (prefix, uri) pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Check if no prefixes are declared
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Resolve a name as written in a DTD
    ///
    /// Unknown prefixes are kept without a namespace.
    pub fn resolve(&self, name: &str) -> XmlName {
        let (prefix, local) = split_qname(name);
        match prefix {
            Some(p) => XmlName {
                prefix: Some(p.to_string()),
                local_name: local.to_string(),
                namespace: self.get_namespace(p).map(str::to_string),
            },
            None => XmlName::local(local),
        }
    }

    /// Resolve a name, failing if its prefix is not declared
    pub fn resolve_strict(&self, name: &str) -> Result<XmlName> {
        let resolved = self.resolve(name);
        if let (Some(prefix), None) = (&resolved.prefix, &resolved.namespace) {
            return Err(Error::Namespace(format!("Unknown prefix: {}", prefix)));
        }
        Ok(resolved)
    }
}
