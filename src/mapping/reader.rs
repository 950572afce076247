//! Map document input
//!
//! Reads an XML-DBMS version 2.0 mapping document, as written by
//! [`MapWriter`](super::MapWriter), back into a [`Map`]. Every table,
//! column and key the class maps refer to must be declared in the
//! `Databases` section.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::{
    ClassMap, Column, ForeignKey, Key, KeyGenerator, Map, OrderColumn, PropertyMap,
    PropertySource, PropertyTarget, RelatedClassMap, SqlType, Table,
};
use crate::documents::{Document, Element};
use crate::error::{Error, Result};
use crate::namespaces::NamespaceContext;
use crate::MAP_NAMESPACE;

/// Reads map documents
#[derive(Debug, Clone, Default)]
pub struct MapReader;

impl MapReader {
    /// Create a reader
    pub fn new() -> Self {
        Self
    }

    /// Read a map document from a file
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<Map> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Resource(format!("Failed to read map '{}': {}", path.display(), e))
        })?;
        self.read_str(&text)
    }

    /// Read a map document
    pub fn read_str(&self, xml: &str) -> Result<Map> {
        let doc = Document::from_string(xml)?;
        let root = doc
            .root()
            .ok_or_else(|| invalid("Empty map document"))?;
        if root.local_name() != "XMLToDBMS" || root.namespace() != Some(MAP_NAMESPACE) {
            return Err(invalid(format!(
                "Expected XMLToDBMS in namespace {}, found '{}'",
                MAP_NAMESPACE,
                root.name.universal()
            )));
        }
        match root.get_attribute("Version") {
            Some("2.0") => {}
            other => {
                return Err(invalid(format!(
                    "Unsupported map version {:?}; expected \"2.0\"",
                    other.unwrap_or("")
                )))
            }
        }

        let mut map = Map::new();
        let mut namespaces = NamespaceContext::new();
        for options in root.find_children("Options") {
            for ns in options.find_children("Namespace") {
                let prefix = ns.required_attribute("Prefix")?;
                let uri = ns.required_attribute("URI")?;
                namespaces.add_prefix(prefix, uri)?;
                map.namespaces.insert(prefix.to_string(), uri.to_string());
            }
        }

        for databases in root.find_children("Databases") {
            for database in databases.find_children("Database") {
                for catalog in database.find_children("Catalog") {
                    for schema in catalog.find_children("Schema") {
                        for table in schema.find_children("Table") {
                            let table = read_table(table)?;
                            if map.tables.contains_key(&table.name) {
                                return Err(invalid(format!(
                                    "Table '{}' is declared more than once",
                                    table.name
                                )));
                            }
                            map.tables.insert(table.name.clone(), table);
                        }
                    }
                }
            }
        }

        for maps in root.find_children("Maps") {
            for class_map in maps.find_children("ClassMap") {
                let (key, class_map) = read_class_map(class_map, &namespaces)?;
                if map.class_maps.contains_key(&key) {
                    return Err(invalid(format!(
                        "Element type '{}' is mapped more than once",
                        key
                    )));
                }
                map.class_maps.insert(key, class_map);
            }
        }

        map.validate()?;
        debug!(
            tables = map.tables.len(),
            class_maps = map.class_maps.len(),
            "map document read"
        );
        Ok(map)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidMap(message.into())
}

fn is_yes(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v.eq_ignore_ascii_case("yes"))
}

fn child<'e>(element: &'e Element, name: &str) -> Result<&'e Element> {
    element.find_child(name).ok_or_else(|| {
        invalid(format!(
            "'{}' is missing its '{}' element",
            element.local_name(),
            name
        ))
    })
}

fn child_name<'e>(element: &'e Element, name: &str) -> Result<&'e str> {
    child(element, name)?.required_attribute("Name")
}

fn use_columns(element: &Element) -> Result<Vec<String>> {
    element
        .find_children("UseColumn")
        .map(|c| c.required_attribute("Name").map(str::to_string))
        .collect()
}

fn read_table(element: &Element) -> Result<Table> {
    let mut table = Table::new(element.required_attribute("Name")?);

    for column in element.find_children("Column") {
        let name = column.required_attribute("Name")?;
        let length = column
            .get_attribute("Length")
            .map(|len| {
                len.parse::<u32>().map_err(|_| {
                    invalid(format!("Column '{}' has invalid Length '{}'", name, len))
                })
            })
            .transpose()?;
        let data_type = SqlType::from_name(column.required_attribute("DataType")?, length)?;
        let nullable = column.get_attribute("Nullable").map_or(true, |v| is_yes(Some(v)));
        table.add_column(Column::new(name, data_type, nullable));
    }

    if let Some(pk) = element.find_child("PrimaryKey") {
        let generator = match pk.get_attribute("KeyGenerator") {
            Some("Database") => KeyGenerator::Database,
            None | Some("None") => KeyGenerator::None,
            Some(other) => return Err(invalid(format!("Unknown KeyGenerator '{}'", other))),
        };
        table.primary_key = Some(Key {
            name: pk.required_attribute("Name")?.to_string(),
            columns: use_columns(pk)?,
            generator,
        });
    }

    for fk in element.find_children("ForeignKey") {
        table.foreign_keys.push(ForeignKey {
            name: fk.required_attribute("Name")?.to_string(),
            columns: use_columns(fk)?,
            remote_table: child_name(fk, "UseTable")?.to_string(),
            remote_key: child_name(fk, "UseUniqueKey")?.to_string(),
        });
    }

    Ok(table)
}

fn order_column(element: &Element) -> Result<Option<OrderColumn>> {
    element
        .find_child("UseOrderColumn")
        .map(|order| {
            Ok(OrderColumn {
                name: order.required_attribute("Name")?.to_string(),
                generate: is_yes(order.get_attribute("Generate")),
            })
        })
        .transpose()
}

fn read_property_map(element: &Element, namespaces: &NamespaceContext) -> Result<PropertyMap> {
    let source = if let Some(attribute) = element.find_child("Attribute") {
        PropertySource::Attribute(namespaces.resolve(attribute.required_attribute("Name")?))
    } else if element.find_child("PCDATA").is_some() {
        PropertySource::PCData
    } else if let Some(element_type) = element.find_child("ElementType") {
        PropertySource::ElementType(namespaces.resolve(element_type.required_attribute("Name")?))
    } else {
        return Err(invalid("PropertyMap has no Attribute, PCDATA or ElementType"));
    };

    let column = child_name(element, "ToColumn")?.to_string();
    let target = match element.find_child("ToPropertyTable") {
        Some(property_table) => PropertyTarget::PropertyTable {
            table: property_table.required_attribute("Table")?.to_string(),
            column,
            unique_key: child_name(element, "UseUniqueKey")?.to_string(),
            foreign_key: child_name(element, "UseForeignKey")?.to_string(),
        },
        None => PropertyTarget::Column(column),
    };

    Ok(PropertyMap {
        source,
        target,
        multi_valued: is_yes(element.get_attribute("MultiValued")),
        order_column: order_column(element)?,
    })
}

fn read_class_map(element: &Element, namespaces: &NamespaceContext) -> Result<(String, ClassMap)> {
    let name = child_name(element, "ElementType")?;
    let table = child_name(element, "ToClassTable")?;
    let mut class_map = ClassMap::new(
        namespaces.resolve(name),
        table,
        is_yes(element.get_attribute("Root")),
    );

    for property in element.find_children("PropertyMap") {
        class_map
            .property_maps
            .push(read_property_map(property, namespaces)?);
    }

    for related in element.find_children("RelatedClass") {
        class_map.related_classes.push(RelatedClassMap {
            element_type: namespaces.resolve(child_name(related, "ElementType")?),
            parent_key: child_name(related, "UseUniqueKey")?.to_string(),
            foreign_key: child_name(related, "UseForeignKey")?.to_string(),
            order_column: order_column(related)?,
        });
    }

    Ok((name.to_string(), class_map))
}
