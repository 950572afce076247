//! XML-DBMS map model
//!
//! A [`Map`] describes the relational schema (tables, columns, keys) and
//! how element types, attributes and PCDATA are stored in it. Maps are
//! produced by the [`MapFactory`], written with [`MapWriter`] and read
//! back with [`MapReader`].

pub mod factory;
pub mod naming;
pub mod reader;
pub mod writer;

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};
use crate::namespaces::XmlName;

pub use factory::{MapFactory, MapOptions};
pub use reader::MapReader;
pub use writer::MapWriter;

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SqlType {
    /// Integer keys and order columns
    Integer,
    /// Bounded character data
    Varchar(u32),
    /// Unbounded character data
    Text,
}

impl SqlType {
    /// Type name as used in map documents
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Varchar(_) => "VARCHAR",
            Self::Text => "TEXT",
        }
    }

    /// Declared length, if any
    pub fn length(&self) -> Option<u32> {
        match self {
            Self::Varchar(len) => Some(*len),
            _ => None,
        }
    }

    /// Parse a map-document type name and optional length
    pub fn from_name(name: &str, length: Option<u32>) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" => Ok(Self::Integer),
            "VARCHAR" => length
                .map(Self::Varchar)
                .ok_or_else(|| Error::InvalidMap("VARCHAR column without Length".to_string())),
            "TEXT" | "CLOB" => Ok(Self::Text),
            other => Err(Error::InvalidMap(format!("Unknown data type '{}'", other))),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Varchar(len) => write!(f, "VARCHAR({})", len),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: SqlType,
    /// Whether NULL is allowed
    pub nullable: bool,
}

impl Column {
    /// Create a column
    pub fn new(name: impl Into<String>, data_type: SqlType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// Who supplies key values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyGenerator {
    /// The database generates the value on insert
    Database,
    /// Values come from the document
    None,
}

/// Primary or unique key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Key {
    /// Key name
    pub name: String,
    /// Key columns
    pub columns: Vec<String>,
    /// Key generator
    pub generator: KeyGenerator,
}

/// Foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    /// Foreign key name
    pub name: String,
    /// Columns in the owning table
    pub columns: Vec<String>,
    /// Referenced table
    pub remote_table: String,
    /// Referenced key in the remote table
    pub remote_key: String,
}

/// Database table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Columns in creation order
    pub columns: IndexMap<String, Column>,
    /// Primary key
    pub primary_key: Option<Key>,
    /// Foreign keys
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Create a table with no columns
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
        }
    }

    /// Add a column
    pub fn add_column(&mut self, column: Column) {
        self.columns.insert(column.name.clone(), column);
    }

    /// Look up a column
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Look up a foreign key by name
    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name == name)
    }

    /// Whether the database generates this table's key
    pub fn has_generated_key(&self) -> bool {
        self.primary_key
            .as_ref()
            .is_some_and(|key| key.generator == KeyGenerator::Database)
    }
}

/// Column recording a child's position within its parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderColumn {
    /// Column name
    pub name: String,
    /// Whether order values are generated when storing documents
    pub generate: bool,
}

/// What a property map reads from the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PropertySource {
    /// An attribute of the class element
    Attribute(XmlName),
    /// Character data of the class element
    PCData,
    /// Character data of a child element type
    ElementType(XmlName),
}

impl fmt::Display for PropertySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(name) => write!(f, "attribute {}", name),
            Self::PCData => write!(f, "PCDATA"),
            Self::ElementType(name) => write!(f, "element type {}", name),
        }
    }
}

/// Where a property map stores values
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PropertyTarget {
    /// A column of the class table
    Column(String),
    /// A separate table keyed by the class table's key
    PropertyTable {
        /// Property table name
        table: String,
        /// Value column in the property table
        column: String,
        /// Key of the class table the property rows point at
        unique_key: String,
        /// Foreign key in the property table
        foreign_key: String,
    },
}

/// Mapping of one property of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyMap {
    /// Source of the values
    pub source: PropertySource,
    /// Destination of the values
    pub target: PropertyTarget,
    /// Whether the value is a token list stored one token per row
    pub multi_valued: bool,
    /// Optional order column
    pub order_column: Option<OrderColumn>,
}

/// Child class reached through key propagation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedClassMap {
    /// Child element type
    pub element_type: XmlName,
    /// Key of the parent table
    pub parent_key: String,
    /// Foreign key in the child table
    pub foreign_key: String,
    /// Optional order column in the child table
    pub order_column: Option<OrderColumn>,
}

/// Mapping of an element type to a class table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassMap {
    /// Element type
    pub element_type: XmlName,
    /// Class table
    pub table: String,
    /// Whether the element type can be a document root
    pub root: bool,
    /// Attribute, PCDATA and child-property mappings
    pub property_maps: Vec<PropertyMap>,
    /// Child classes
    pub related_classes: Vec<RelatedClassMap>,
}

impl ClassMap {
    /// Create a class map with no properties
    pub fn new(element_type: XmlName, table: impl Into<String>, root: bool) -> Self {
        Self {
            element_type,
            table: table.into(),
            root,
            property_maps: Vec::new(),
            related_classes: Vec::new(),
        }
    }

    /// Find the property map for an attribute
    pub fn attribute_property(&self, name: &str) -> Option<&PropertyMap> {
        self.property_maps.iter().find(
            |p| matches!(&p.source, PropertySource::Attribute(a) if a.qualified() == name),
        )
    }

    /// Find the property map for a child element type
    pub fn element_property(&self, name: &str) -> Option<&PropertyMap> {
        self.property_maps.iter().find(
            |p| matches!(&p.source, PropertySource::ElementType(e) if e.qualified() == name),
        )
    }

    /// Find the property map for the element's own PCDATA
    pub fn pcdata_property(&self) -> Option<&PropertyMap> {
        self.property_maps
            .iter()
            .find(|p| p.source == PropertySource::PCData)
    }

    /// Find a related class by element type
    pub fn related_class(&self, name: &str) -> Option<&RelatedClassMap> {
        self.related_classes
            .iter()
            .find(|r| r.element_type.qualified() == name)
    }
}

/// A complete XML-DBMS map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Map {
    /// Prefix to namespace URI pairs used by element type names
    pub namespaces: IndexMap<String, String>,
    /// Tables in creation order
    pub tables: IndexMap<String, Table>,
    /// Class maps keyed by qualified element type name
    pub class_maps: IndexMap<String, ClassMap>,
}

impl Map {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a table
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Look up a class map by qualified element type name
    pub fn class_map(&self, element_type: &str) -> Option<&ClassMap> {
        self.class_maps.get(element_type)
    }

    /// Class maps of element types that can be document roots
    pub fn root_class_maps(&self) -> impl Iterator<Item = &ClassMap> {
        self.class_maps.values().filter(|c| c.root)
    }

    /// Check that every table, column and key the map refers to exists
    pub fn validate(&self) -> Result<()> {
        for table in self.tables.values() {
            if let Some(key) = &table.primary_key {
                self.check_columns(table, &key.columns, &key.name)?;
            }
            for fk in &table.foreign_keys {
                self.check_columns(table, &fk.columns, &fk.name)?;
                let remote = self.require_table(&fk.remote_table)?;
                match &remote.primary_key {
                    Some(key) if key.name == fk.remote_key => {
                        if key.columns.len() != fk.columns.len() {
                            return Err(Error::InvalidMap(format!(
                                "Foreign key '{}' has {} columns but key '{}' has {}",
                                fk.name,
                                fk.columns.len(),
                                key.name,
                                key.columns.len()
                            )));
                        }
                    }
                    _ => {
                        return Err(Error::InvalidMap(format!(
                            "Foreign key '{}' references unknown key '{}' of table '{}'",
                            fk.name, fk.remote_key, fk.remote_table
                        )))
                    }
                }
            }
        }

        for class_map in self.class_maps.values() {
            let table = self.require_table(&class_map.table)?;
            for property in &class_map.property_maps {
                let (owner, column) = match &property.target {
                    PropertyTarget::Column(column) => (table, column),
                    PropertyTarget::PropertyTable {
                        table: property_table,
                        column,
                        foreign_key,
                        ..
                    } => {
                        let owner = self.require_table(property_table)?;
                        self.require_foreign_key(owner, foreign_key)?;
                        (owner, column)
                    }
                };
                self.check_columns(owner, std::slice::from_ref(column), &class_map.table)?;
                if let Some(order) = &property.order_column {
                    self.check_columns(owner, std::slice::from_ref(&order.name), &class_map.table)?;
                }
            }

            for related in &class_map.related_classes {
                let child = self
                    .class_maps
                    .get(&related.element_type.qualified())
                    .ok_or_else(|| {
                        Error::InvalidMap(format!(
                            "Related class '{}' of '{}' is not mapped",
                            related.element_type, class_map.element_type
                        ))
                    })?;
                let child_table = self.require_table(&child.table)?;
                self.require_foreign_key(child_table, &related.foreign_key)?;
                if let Some(order) = &related.order_column {
                    self.check_columns(child_table, std::slice::from_ref(&order.name), &child.table)?;
                }
            }
        }
        Ok(())
    }

    fn require_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::InvalidMap(format!("Unknown table '{}'", name)))
    }

    fn require_foreign_key<'t>(&self, table: &'t Table, name: &str) -> Result<&'t ForeignKey> {
        table.foreign_key(name).ok_or_else(|| {
            Error::InvalidMap(format!(
                "Unknown foreign key '{}' in table '{}'",
                name, table.name
            ))
        })
    }

    fn check_columns(&self, table: &Table, columns: &[String], context: &str) -> Result<()> {
        match columns.iter().find(|c| table.column(c).is_none()) {
            Some(missing) => Err(Error::InvalidMap(format!(
                "Unknown column '{}' in table '{}' (referenced from '{}')",
                missing, table.name, context
            ))),
            None => Ok(()),
        }
    }
}
