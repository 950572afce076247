//! Map generation output
//!
//! Reads a schema as configured, builds its map and writes the map
//! document and the `CREATE TABLE` script to a target directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::catalog::Catalog;
use crate::config::{GenerateMapConfig, SchemaType};
use crate::dtd::{DdmlReader, Dtd, DtdParser};
use crate::error::{Error, Result};
use crate::loaders::Loader;
use crate::locations::Location;
use crate::mapping::{Map, MapFactory, MapOptions, MapWriter};
use crate::sql::{DdlWriter, Dialect};

/// Where and how a map is exported
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Target directory; created when missing
    pub target_dir: PathBuf,
    /// Map document file name
    pub map_file: PathBuf,
    /// DDL file name
    pub sql_file: PathBuf,
    /// Dialect of the DDL
    pub dialect: Dialect,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("."),
            map_file: PathBuf::from("schema.map"),
            sql_file: PathBuf::from("schema.sql"),
            dialect: Dialect::Standard,
        }
    }
}

impl ExportConfig {
    /// Create an export configuration for a target directory
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            ..Default::default()
        }
    }

    /// Set the map file name
    pub fn with_map_file(mut self, map_file: impl Into<PathBuf>) -> Self {
        self.map_file = map_file.into();
        self
    }

    /// Set the DDL file name
    pub fn with_sql_file(mut self, sql_file: impl Into<PathBuf>) -> Self {
        self.sql_file = sql_file.into();
        self
    }

    /// Set the DDL dialect
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

impl From<&GenerateMapConfig> for ExportConfig {
    fn from(config: &GenerateMapConfig) -> Self {
        Self {
            target_dir: config.output_dir.clone(),
            map_file: config.map_file.clone(),
            sql_file: config.sql_file.clone(),
            dialect: config.dialect,
        }
    }
}

/// Files written by an export
#[derive(Debug)]
pub struct ExportResult {
    /// Path of the map document
    pub map_path: PathBuf,
    /// Path of the DDL script
    pub sql_path: PathBuf,
}

impl ExportResult {
    /// All written files
    pub fn exported_files(&self) -> Vec<&Path> {
        vec![self.map_path.as_path(), self.sql_path.as_path()]
    }
}

/// Write a map document and its DDL
pub fn export_map(map: &Map, config: &ExportConfig) -> Result<ExportResult> {
    let target_dir = &config.target_dir;
    if !target_dir.exists() {
        fs::create_dir_all(target_dir).map_err(|e| {
            Error::Resource(format!(
                "Failed to create export directory '{}': {}",
                target_dir.display(),
                e
            ))
        })?;
    }

    let map_path = target_dir.join(&config.map_file);
    let sql_path = target_dir.join(&config.sql_file);

    let map_text = MapWriter::new().write_to_string(map)?;
    write_file(&map_path, &map_text)?;
    info!(path = %map_path.display(), "wrote map document");

    let sql_text = DdlWriter::new(config.dialect).to_string(map)?;
    write_file(&sql_path, &sql_text)?;
    info!(path = %sql_path.display(), dialect = %config.dialect, "wrote SQL script");

    Ok(ExportResult { map_path, sql_path })
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|e| {
        Error::Resource(format!("Failed to write '{}': {}", path.display(), e))
    })
}

/// Read the configured schema into a DTD
pub fn load_schema(config: &GenerateMapConfig) -> Result<Dtd> {
    let mut loader = Loader::new().with_limits(config.limits.clone());
    if let Some(catalog) = &config.catalog_file {
        loader = loader.with_catalog(Catalog::from_file(catalog)?);
    }
    let path = &config.schema_file;

    match config.schema_type {
        SchemaType::Dtd => DtdParser::new()
            .with_loader(loader)
            .with_namespaces(config.namespaces.clone())
            .parse_file(path),
        SchemaType::Xml => {
            let location = Location::path(path);
            let xml = loader.load(&location)?;
            DtdParser::new()
                .with_loader(loader)
                .with_namespaces(config.namespaces.clone())
                .parse_document(&xml, Some(&location))
        }
        SchemaType::Ddml => {
            let text = loader.load(&Location::path(path))?;
            DdmlReader::new()
                .with_namespaces(config.namespaces.clone())
                .with_limits(config.limits.clone())
                .read_str(&text)
        }
    }
}

/// Read the schema, build its map and export it
pub fn generate_map(config: &GenerateMapConfig) -> Result<(Map, ExportResult)> {
    let dtd = load_schema(config)?;
    let options = MapOptions::default()
        .with_order_columns(config.order_columns)
        .with_string_length(config.string_length)
        .with_namespaces(config.namespaces.clone());
    let map = MapFactory::new(options).create_map(&dtd)?;
    let result = export_map(&map, &ExportConfig::from(config))?;
    Ok((map, result))
}
