//! Properties-based configuration
//!
//! Tools are configured with `key=value` properties, given on the command
//! line or read from `.properties` files. A `File1`, `File2`, ... property
//! names a file whose properties are merged in; properties given directly
//! take precedence over those read from files.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::NamespaceContext;
use crate::sql::Dialect;

/// Keys of database connection properties, which map generation ignores
pub const CONNECTION_KEYS: &[&str] = &[
    "Driver",
    "URL",
    "User",
    "Password",
    "DataSource",
    "JNDIContext",
];

/// Ordered `key=value` store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: IndexMap<String, String>,
}

impl Properties {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `key=value` arguments, then merge in any `File<n>` files
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut props = Self::new();
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                Error::Config(format!("Expected key=value, found '{}'", arg))
            })?;
            props.set(key.trim(), value.trim());
        }
        props.include_files()?;
        Ok(props)
    }

    /// Read a properties file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read properties file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::parse(&text))
    }

    /// Parse properties text
    ///
    /// Lines starting with `#` or `!` are comments. A key ends at the first
    /// `=` or `:`; a line ending in a backslash continues on the next line.
    pub fn parse(text: &str) -> Self {
        let mut props = Self::new();
        let mut pending = String::new();
        for line in text.lines() {
            let line = line.trim_start();
            if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
                continue;
            }
            match line.strip_suffix('\\') {
                Some(head) => {
                    pending.push_str(head);
                    continue;
                }
                None => pending.push_str(line),
            }
            let entry = std::mem::take(&mut pending);
            match entry.find(['=', ':']) {
                Some(i) => props.set(entry[..i].trim(), entry[i + 1..].trim()),
                None => props.set(entry.trim(), ""),
            }
        }
        props
    }

    /// Set a property, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a property
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Look up a property that must be present
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config(format!("Missing required property '{}'", key)))
    }

    /// Whether a property is present
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterate over properties in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no properties
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Add properties from `other` that are not already set
    pub fn merge_missing(&mut self, other: Properties) {
        for (key, value) in other.values {
            self.values.entry(key).or_insert(value);
        }
    }

    /// Merge in the files named by `File1`, `File2`, ...
    ///
    /// Numbering stops at the first gap. Paths are relative to the current
    /// directory.
    pub fn include_files(&mut self) -> Result<()> {
        let mut n = 1;
        while let Some(file) = self.get(&format!("File{}", n)).map(str::to_string) {
            debug!(file = %file, "including properties file");
            let included = Self::from_file(&file)?;
            self.merge_missing(included);
            n += 1;
        }
        Ok(())
    }

    /// Yes/No flag; also accepts true/false
    pub fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(v) if v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("true") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("no") || v.eq_ignore_ascii_case("false") => Ok(false),
            Some(v) => Err(Error::Config(format!(
                "Property '{}' must be Yes or No, found '{}'",
                key, v
            ))),
        }
    }

    /// Prefix/URI pairs from `Prefix<n>` and `NamespaceURI<n>`
    pub fn namespaces(&self) -> Result<NamespaceContext> {
        let mut numbers: Vec<u32> = self
            .values
            .keys()
            .filter_map(|key| {
                key.strip_prefix("Prefix")
                    .or_else(|| key.strip_prefix("NamespaceURI"))
                    .and_then(|n| n.parse().ok())
            })
            .collect();
        numbers.sort_unstable();
        numbers.dedup();

        let mut namespaces = NamespaceContext::new();
        for n in numbers {
            let prefix = self.get(&format!("Prefix{}", n));
            let uri = self.get(&format!("NamespaceURI{}", n));
            match (prefix, uri) {
                (Some(prefix), Some(uri)) => namespaces.add_prefix(prefix, uri)?,
                (Some(_), None) => {
                    return Err(Error::Config(format!(
                        "Prefix{} has no matching NamespaceURI{}",
                        n, n
                    )))
                }
                (None, _) => {
                    return Err(Error::Config(format!(
                        "NamespaceURI{} has no matching Prefix{}",
                        n, n
                    )))
                }
            }
        }
        Ok(namespaces)
    }
}

/// Kind of schema document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    /// External DTD subset
    Dtd,
    /// XML document whose DOCTYPE holds or references the DTD
    Xml,
    /// DDML schema document
    Ddml,
}

impl SchemaType {
    /// Parse a `SchemaType` property value
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "DTD" => Ok(Self::Dtd),
            "XML" => Ok(Self::Xml),
            "DDML" => Ok(Self::Ddml),
            _ => Err(Error::Config(format!(
                "Unknown SchemaType '{}' (expected DTD, XML or DDML)",
                name
            ))),
        }
    }

    /// Infer the type from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("dtd") => Ok(Self::Dtd),
            Some("xml") => Ok(Self::Xml),
            Some("ddml") => Ok(Self::Ddml),
            _ => Err(Error::Config(format!(
                "Cannot infer SchemaType from '{}'; set SchemaType to DTD, XML or DDML",
                path.display()
            ))),
        }
    }
}

/// Settings for generating a map from a schema
#[derive(Debug, Clone)]
pub struct GenerateMapConfig {
    /// Schema to map
    pub schema_file: PathBuf,
    /// How to read the schema
    pub schema_type: SchemaType,
    /// Map document file name
    pub map_file: PathBuf,
    /// DDL file name
    pub sql_file: PathBuf,
    /// Directory the map and DDL are written to
    pub output_dir: PathBuf,
    /// Whether to add order columns
    pub order_columns: bool,
    /// SQL dialect of the DDL
    pub dialect: Dialect,
    /// VARCHAR length; 0 for unbounded text
    pub string_length: u32,
    /// XML catalog for resolving external identifiers
    pub catalog_file: Option<PathBuf>,
    /// Prefixes for element type names
    pub namespaces: NamespaceContext,
    /// Processing limits
    pub limits: Limits,
}

impl GenerateMapConfig {
    /// Read the settings from properties
    pub fn from_properties(props: &Properties) -> Result<Self> {
        for key in CONNECTION_KEYS {
            if props.contains(key) {
                warn!(property = key, "database connection properties are ignored when generating maps");
            }
        }

        let schema_file = PathBuf::from(props.require("SchemaFile")?);
        let schema_type = match props.get("SchemaType") {
            Some(name) => SchemaType::from_name(name)?,
            None => SchemaType::from_path(&schema_file)?,
        };

        let stem = schema_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("schema")
            .to_string();
        let map_file = props
            .get("MapFile")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{}.map", stem)));
        let sql_file = props
            .get("SQLFile")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{}.sql", stem)));

        let string_length = match props.get("StringLength") {
            Some(len) => len.parse().map_err(|_| {
                Error::Config(format!("StringLength must be a number, found '{}'", len))
            })?,
            None => 255,
        };

        Ok(Self {
            schema_file,
            schema_type,
            map_file,
            sql_file,
            output_dir: props.get("OutputDir").map_or_else(|| PathBuf::from("."), PathBuf::from),
            order_columns: props.flag("OrderColumns", false)?,
            dialect: props.get("Dialect").map_or(Ok(Dialect::Standard), str::parse)?,
            string_length,
            catalog_file: props.get("CatalogFile").map(PathBuf::from),
            namespaces: props.namespaces()?,
            limits: Limits::default(),
        })
    }

    /// Path the map document is written to
    pub fn map_path(&self) -> PathBuf {
        self.output_dir.join(&self.map_file)
    }

    /// Path the DDL is written to
    pub fn sql_path(&self) -> PathBuf {
        self.output_dir.join(&self.sql_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_properties_text() {
        let props = Properties::parse(
            "# comment\n! also a comment\n\nSchemaFile = orders.dtd\nDialect: mysql\nLong=a\\\n  b\n",
        );
        assert_eq!(props.get("SchemaFile"), Some("orders.dtd"));
        assert_eq!(props.get("Dialect"), Some("mysql"));
        assert_eq!(props.get("Long"), Some("ab"));
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn test_from_args_requires_equals() {
        assert!(Properties::from_args(["SchemaFile"]).is_err());
        let props = Properties::from_args(["SchemaFile=a.dtd", "OrderColumns=Yes"]).unwrap();
        assert!(props.flag("OrderColumns", false).unwrap());
    }

    #[test]
    fn test_included_file_does_not_override_args() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SchemaFile=from_file.dtd\nDialect=postgresql").unwrap();
        let include = format!("File1={}", file.path().display());

        let props = Properties::from_args(["SchemaFile=from_args.dtd", include.as_str()]).unwrap();
        assert_eq!(props.get("SchemaFile"), Some("from_args.dtd"));
        assert_eq!(props.get("Dialect"), Some("postgresql"));
    }

    #[test]
    fn test_missing_include_is_an_error() {
        let err = Properties::from_args(["File1=/nonexistent/xmldbms.props"]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_namespace_pairs() {
        let props = Properties::from_args([
            "Prefix1=o",
            "NamespaceURI1=http://example.com/orders",
            "Prefix2=c",
            "NamespaceURI2=http://example.com/customers",
        ])
        .unwrap();
        let ns = props.namespaces().unwrap();
        assert_eq!(ns.get_namespace("o"), Some("http://example.com/orders"));
        assert_eq!(ns.get_namespace("c"), Some("http://example.com/customers"));

        let unpaired = Properties::from_args(["Prefix1=o"]).unwrap();
        assert!(unpaired.namespaces().is_err());
    }

    #[test]
    fn test_generate_map_defaults() {
        let props = Properties::from_args(["SchemaFile=dtds/orders.dtd"]).unwrap();
        let config = GenerateMapConfig::from_properties(&props).unwrap();
        assert_eq!(config.schema_type, SchemaType::Dtd);
        assert_eq!(config.map_path(), PathBuf::from("./orders.map"));
        assert_eq!(config.sql_path(), PathBuf::from("./orders.sql"));
        assert!(!config.order_columns);
        assert_eq!(config.dialect, Dialect::Standard);
        assert_eq!(config.string_length, 255);
    }

    #[test]
    fn test_generate_map_settings() {
        let props = Properties::from_args([
            "SchemaFile=orders.schema",
            "SchemaType=ddml",
            "MapFile=o.map",
            "OutputDir=out",
            "OrderColumns=no",
            "Dialect=duckdb",
            "StringLength=0",
            "Driver=org.example.Driver",
        ])
        .unwrap();
        let config = GenerateMapConfig::from_properties(&props).unwrap();
        assert_eq!(config.schema_type, SchemaType::Ddml);
        assert_eq!(config.map_path(), PathBuf::from("out/o.map"));
        assert_eq!(config.sql_path(), PathBuf::from("out/orders.sql"));
        assert_eq!(config.dialect, Dialect::DuckDb);
        assert_eq!(config.string_length, 0);
    }

    #[test]
    fn test_generate_map_errors() {
        let missing = Properties::from_args(["MapFile=x.map"]).unwrap();
        assert!(GenerateMapConfig::from_properties(&missing).is_err());

        let unknown = Properties::from_args(["SchemaFile=orders.txt"]).unwrap();
        assert!(GenerateMapConfig::from_properties(&unknown).is_err());

        let bad_flag = Properties::from_args(["SchemaFile=a.dtd", "OrderColumns=maybe"]).unwrap();
        assert!(GenerateMapConfig::from_properties(&bad_flag).is_err());
    }
}
