//! Map factory
//!
//! Walks a [`Dtd`] and decides, element type by element type, how documents
//! of that type are stored:
//!
//! - element types with element, mixed or empty content, with attributes,
//!   or that can be document roots become *classes* with their own table
//! - PCDATA-only element types become *properties* of each parent class,
//!   stored in a column when they occur at most once and in a property
//!   table otherwise
//! - class children are linked to their parent by propagating the parent's
//!   primary key into the child table as a foreign key
//!
//! Every pass walks the element types in declaration order, so the same DTD
//! always produces the same map. Foreign key columns are added to child
//! tables before any attribute or property column.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use super::naming::{sanitize, UniqueNames};
use super::{
    ClassMap, Column, ForeignKey, Key, KeyGenerator, Map, OrderColumn, PropertyMap,
    PropertySource, PropertyTarget, RelatedClassMap, SqlType, Table,
};
use crate::dtd::{ContentType, Dtd, ElementType, Occurs};
use crate::error::{Error, Result};
use crate::namespaces::NamespaceContext;

/// Options controlling map generation
#[derive(Debug, Clone)]
pub struct MapOptions {
    /// Add order columns for children and multi-valued properties
    pub order_columns: bool,
    /// Length of generated VARCHAR columns; 0 maps text to unbounded columns
    pub string_length: u32,
    /// Prefixes recorded in the map's namespace declarations
    pub namespaces: NamespaceContext,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            order_columns: false,
            string_length: 255,
            namespaces: NamespaceContext::new(),
        }
    }
}

impl MapOptions {
    /// Enable or disable order columns
    pub fn with_order_columns(mut self, order_columns: bool) -> Self {
        self.order_columns = order_columns;
        self
    }

    /// Set the VARCHAR length
    pub fn with_string_length(mut self, string_length: u32) -> Self {
        self.string_length = string_length;
        self
    }

    /// Set the namespace prefixes
    pub fn with_namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }
}

/// Builds maps from DTDs
#[derive(Debug, Clone, Default)]
pub struct MapFactory {
    options: MapOptions,
}

impl MapFactory {
    /// Create a factory
    pub fn new(options: MapOptions) -> Self {
        Self { options }
    }

    /// The options in use
    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    /// Whether an element type is stored as a class (its own table)
    pub fn is_class(element_type: &ElementType) -> bool {
        matches!(
            element_type.content_type,
            ContentType::Element | ContentType::Mixed | ContentType::Empty
        ) || !element_type.attributes.is_empty()
            || element_type.is_root()
    }

    /// Create a map for every element type in the DTD
    pub fn create_map(&self, dtd: &Dtd) -> Result<Map> {
        if let Some(any) = dtd
            .element_types
            .values()
            .find(|et| et.content_type == ContentType::Any)
        {
            return Err(Error::InvalidMap(format!(
                "Element type '{}' has ANY content, which cannot be mapped",
                any.name
            )));
        }

        let map = MapBuilder::new(&self.options, dtd).build()?;
        debug!(
            tables = map.tables.len(),
            class_maps = map.class_maps.len(),
            "map created"
        );
        Ok(map)
    }
}

struct MapBuilder<'a> {
    options: &'a MapOptions,
    dtd: &'a Dtd,
    map: Map,
    table_names: UniqueNames,
    column_names: HashMap<String, UniqueNames>,
    /// Element type -> class table
    class_tables: IndexMap<String, String>,
    /// Class table -> its shared order column
    class_order_columns: HashMap<String, String>,
}

impl<'a> MapBuilder<'a> {
    fn new(options: &'a MapOptions, dtd: &'a Dtd) -> Self {
        Self {
            options,
            dtd,
            map: Map::new(),
            table_names: UniqueNames::new("tables"),
            column_names: HashMap::new(),
            class_tables: IndexMap::new(),
            class_order_columns: HashMap::new(),
        }
    }

    fn build(mut self) -> Result<Map> {
        self.map.namespaces = self
            .options
            .namespaces
            .iter()
            .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
            .collect();

        let dtd = self.dtd;
        for (name, element_type) in &dtd.element_types {
            if MapFactory::is_class(element_type) {
                debug!(element_type = %name, root = element_type.is_root(), "mapped as class");
                let table = self.class_table(element_type)?;
                self.class_tables.insert(name.clone(), table.clone());
                self.map.class_maps.insert(
                    name.clone(),
                    ClassMap::new(element_type.name.clone(), table, element_type.is_root()),
                );
            } else {
                debug!(element_type = %name, "mapped as property");
            }
        }

        // Parent keys go into child tables ahead of the child's own columns
        let mut related = HashMap::new();
        for (name, element_type) in &dtd.element_types {
            if let Some(table) = self.class_tables.get(name).cloned() {
                let mut related_classes = Vec::new();
                for (child_name, child, _) in self.children(element_type)? {
                    if let Some(child_table) = self.class_tables.get(&child_name).cloned() {
                        related_classes.push(self.related_class(element_type, &table, child, &child_table)?);
                    }
                }
                related.insert(name.clone(), related_classes);
            }
        }

        for (name, element_type) in &dtd.element_types {
            if let Some(table) = self.class_tables.get(name).cloned() {
                let property_maps = self.class_contents(element_type, &table)?;
                if let Some(class_map) = self.map.class_maps.get_mut(name) {
                    class_map.property_maps = property_maps;
                    class_map.related_classes = related.remove(name).unwrap_or_default();
                }
            }
        }

        Ok(self.map)
    }

    fn text_type(&self) -> SqlType {
        match self.options.string_length {
            0 => SqlType::Text,
            len => SqlType::Varchar(len),
        }
    }

    fn create_table(&mut self, base: &str) -> String {
        let name = self.table_names.claim(base);
        debug!(table = %name, "table created");
        self.column_names
            .insert(name.clone(), UniqueNames::new(name.clone()));
        self.map.tables.insert(name.clone(), Table::new(name.clone()));
        name
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.map
            .tables
            .get_mut(name)
            .ok_or_else(|| Error::InvalidMap(format!("Unknown table '{}'", name)))
    }

    fn add_column(&mut self, table: &str, base: &str, data_type: SqlType, nullable: bool) -> Result<String> {
        let name = self
            .column_names
            .entry(table.to_string())
            .or_insert_with(|| UniqueNames::new(table))
            .claim(base);
        self.table_mut(table)?
            .add_column(Column::new(name.clone(), data_type, nullable));
        Ok(name)
    }

    fn primary_key_name(&self, table: &str) -> Result<String> {
        self.map
            .tables
            .get(table)
            .and_then(|t| t.primary_key.as_ref())
            .map(|key| key.name.clone())
            .ok_or_else(|| Error::InvalidMap(format!("Table '{}' has no primary key", table)))
    }

    fn add_foreign_key(&mut self, table: &str, column: String, remote_table: &str) -> Result<String> {
        let remote_key = self.primary_key_name(remote_table)?;
        let name = format!("{}_{}_FK", table, remote_table);
        self.table_mut(table)?.foreign_keys.push(ForeignKey {
            name: name.clone(),
            columns: vec![column],
            remote_table: remote_table.to_string(),
            remote_key,
        });
        Ok(name)
    }

    fn order_column(&mut self, table: &str, base: &str, nullable: bool) -> Result<Option<OrderColumn>> {
        if !self.options.order_columns {
            return Ok(None);
        }
        let name = self.add_column(table, &format!("{}Order", base), SqlType::Integer, nullable)?;
        Ok(Some(OrderColumn {
            name,
            generate: true,
        }))
    }

    /// Table with a database-generated primary key for a class
    fn class_table(&mut self, element_type: &ElementType) -> Result<String> {
        let base = sanitize(&element_type.name.local_name);
        let table = self.create_table(&base);
        let pk = self.add_column(&table, &format!("{}PK", base), SqlType::Integer, false)?;
        let key_name = format!("{}_PK", table);
        self.table_mut(&table)?.primary_key = Some(Key {
            name: key_name,
            columns: vec![pk],
            generator: KeyGenerator::Database,
        });
        Ok(table)
    }

    /// Child element types in content model order, with their occurrence
    fn children(&self, element_type: &ElementType) -> Result<Vec<(String, &'a ElementType, Occurs)>> {
        let dtd = self.dtd;
        let occurrences = element_type
            .content
            .as_ref()
            .map(|content| content.child_occurrences())
            .unwrap_or_default();
        occurrences
            .into_iter()
            .map(|(child_name, occurs)| {
                let child = dtd.element_type(&child_name).ok_or_else(|| {
                    Error::InvalidMap(format!(
                        "Element type '{}' referenced by '{}' is not declared",
                        child_name, element_type.name
                    ))
                })?;
                Ok((child_name, child, occurs))
            })
            .collect()
    }

    /// Property maps of one class; related classes are built beforehand
    fn class_contents(&mut self, element_type: &ElementType, table: &str) -> Result<Vec<PropertyMap>> {
        let mut property_maps = Vec::new();
        let text_type = self.text_type();

        for attribute in element_type.attributes.values() {
            let base = sanitize(&attribute.name.local_name);
            let source = PropertySource::Attribute(attribute.name.clone());
            if attribute.attribute_type.is_multi_valued() {
                property_maps.push(self.property_table(table, &base, source, true)?);
            } else {
                let nullable = !attribute.default.always_present();
                let column = self.add_column(table, &base, text_type, nullable)?;
                property_maps.push(PropertyMap {
                    source,
                    target: PropertyTarget::Column(column),
                    multi_valued: false,
                    order_column: None,
                });
            }
        }

        match element_type.content_type {
            ContentType::PCData => {
                let base = format!("{}PCDATA", sanitize(&element_type.name.local_name));
                let column = self.add_column(table, &base, text_type, true)?;
                property_maps.push(PropertyMap {
                    source: PropertySource::PCData,
                    target: PropertyTarget::Column(column),
                    multi_valued: false,
                    order_column: None,
                });
            }
            ContentType::Mixed => {
                property_maps.push(self.property_table(table, "PCDATA", PropertySource::PCData, false)?);
            }
            _ => {}
        }

        for (child_name, child, occurs) in self.children(element_type)? {
            if self.class_tables.contains_key(&child_name) {
                continue;
            }
            let base = sanitize(&child.name.local_name);
            let source = PropertySource::ElementType(child.name.clone());
            if occurs.is_repeatable() {
                property_maps.push(self.property_table(table, &base, source, false)?);
            } else {
                let nullable = !occurs.is_required();
                let column = self.add_column(table, &base, text_type, nullable)?;
                let order_column = self.order_column(table, &base, nullable)?;
                property_maps.push(PropertyMap {
                    source,
                    target: PropertyTarget::Column(column),
                    multi_valued: false,
                    order_column,
                });
            }
        }

        Ok(property_maps)
    }

    /// Separate table holding one row per value, keyed to the class table
    fn property_table(
        &mut self,
        parent_table: &str,
        value_base: &str,
        source: PropertySource,
        multi_valued: bool,
    ) -> Result<PropertyMap> {
        let table = self.create_table(&format!("{}{}", parent_table, value_base));
        let fk_column = self.add_column(&table, &format!("{}FK", parent_table), SqlType::Integer, false)?;
        let text_type = self.text_type();
        let column = self.add_column(&table, value_base, text_type, false)?;
        let order_column = self.order_column(&table, value_base, false)?;
        let unique_key = self.primary_key_name(parent_table)?;
        let foreign_key = self.add_foreign_key(&table, fk_column, parent_table)?;

        Ok(PropertyMap {
            source,
            target: PropertyTarget::PropertyTable {
                table,
                column,
                unique_key,
                foreign_key,
            },
            multi_valued,
            order_column,
        })
    }

    /// Propagate the parent's key into the child class table
    fn related_class(
        &mut self,
        parent: &ElementType,
        parent_table: &str,
        child: &ElementType,
        child_table: &str,
    ) -> Result<RelatedClassMap> {
        let nullable = child.parents.len() > 1 || child.is_root() || child.name == parent.name;
        let fk_column = self.add_column(
            child_table,
            &format!("{}FK", parent_table),
            SqlType::Integer,
            nullable,
        )?;
        let parent_key = self.primary_key_name(parent_table)?;
        let foreign_key = self.add_foreign_key(child_table, fk_column, parent_table)?;

        let order_column = match self.class_order_columns.get(child_table).cloned() {
            Some(name) => Some(OrderColumn {
                name,
                generate: true,
            }),
            None => {
                let base = sanitize(&child.name.local_name);
                let created = self.order_column(child_table, &base, nullable)?;
                if let Some(order) = &created {
                    self.class_order_columns
                        .insert(child_table.to_string(), order.name.clone());
                }
                created
            }
        };

        Ok(RelatedClassMap {
            element_type: child.name.clone(),
            parent_key,
            foreign_key,
            order_column,
        })
    }
}
