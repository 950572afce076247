//! Map document output
//!
//! Serializes a [`Map`] as an XML-DBMS version 2.0 mapping document.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use super::{
    ClassMap, KeyGenerator, Map, OrderColumn, PropertyMap, PropertySource, PropertyTarget, Table,
};
use crate::error::{Error, Result};
use crate::MAP_NAMESPACE;

/// Writes map documents
#[derive(Debug, Clone)]
pub struct MapWriter {
    indent: usize,
}

impl Default for MapWriter {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl MapWriter {
    /// Create a writer indenting by two spaces
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the indentation width
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Write the map document to a string
    pub fn write_to_string(&self, map: &Map) -> Result<String> {
        let mut buf = Vec::new();
        self.write(map, &mut buf)?;
        String::from_utf8(buf).map_err(Error::xml)
    }

    /// Write the map document
    pub fn write<W: Write>(&self, map: &Map, out: W) -> Result<()> {
        let mut xml = XmlOut {
            writer: Writer::new_with_indent(out, b' ', self.indent),
        };

        xml.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        xml.start("XMLToDBMS", &[("Version", "2.0"), ("xmlns", MAP_NAMESPACE)])?;

        if !map.namespaces.is_empty() {
            xml.start("Options", &[])?;
            for (prefix, uri) in &map.namespaces {
                xml.empty("Namespace", &[("Prefix", prefix.as_str()), ("URI", uri.as_str())])?;
            }
            xml.end("Options")?;
        }

        xml.start("Databases", &[])?;
        xml.start("Database", &[("Name", "Default")])?;
        xml.start("Catalog", &[])?;
        xml.start("Schema", &[])?;
        for table in map.tables.values() {
            write_table(&mut xml, table)?;
        }
        xml.end("Schema")?;
        xml.end("Catalog")?;
        xml.end("Database")?;
        xml.end("Databases")?;

        xml.start("Maps", &[])?;
        for class_map in map.class_maps.values() {
            write_class_map(&mut xml, class_map)?;
        }
        xml.end("Maps")?;

        xml.end("XMLToDBMS")?;
        xml.writer
            .get_mut()
            .write_all(b"\n")
            .map_err(Error::from)
    }
}

struct XmlOut<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XmlOut<W> {
    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer.write_event(event).map_err(Error::xml)
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut element = BytesStart::new(name);
        element.extend_attributes(attributes.iter().copied());
        self.event(Event::Start(element))
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut element = BytesStart::new(name);
        element.extend_attributes(attributes.iter().copied());
        self.event(Event::Empty(element))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn write_table<W: Write>(xml: &mut XmlOut<W>, table: &Table) -> Result<()> {
    xml.start("Table", &[("Name", table.name.as_str())])?;

    for column in table.columns.values() {
        let length = column.data_type.length().map(|len| len.to_string());
        let mut attributes = vec![("Name", column.name.as_str()), ("DataType", column.data_type.name())];
        if let Some(length) = &length {
            attributes.push(("Length", length.as_str()));
        }
        attributes.push(("Nullable", yes_no(column.nullable)));
        xml.empty("Column", &attributes)?;
    }

    if let Some(key) = &table.primary_key {
        let generator = match key.generator {
            KeyGenerator::Database => "Database",
            KeyGenerator::None => "None",
        };
        xml.start("PrimaryKey", &[("Name", key.name.as_str()), ("KeyGenerator", generator)])?;
        for column in &key.columns {
            xml.empty("UseColumn", &[("Name", column.as_str())])?;
        }
        xml.end("PrimaryKey")?;
    }

    for fk in &table.foreign_keys {
        xml.start("ForeignKey", &[("Name", fk.name.as_str())])?;
        xml.empty("UseTable", &[("Name", fk.remote_table.as_str())])?;
        xml.empty("UseUniqueKey", &[("Name", fk.remote_key.as_str())])?;
        for column in &fk.columns {
            xml.empty("UseColumn", &[("Name", column.as_str())])?;
        }
        xml.end("ForeignKey")?;
    }

    xml.end("Table")
}

fn write_order_column<W: Write>(xml: &mut XmlOut<W>, order: Option<&OrderColumn>) -> Result<()> {
    match order {
        Some(order) => xml.empty(
            "UseOrderColumn",
            &[("Name", order.name.as_str()), ("Generate", yes_no(order.generate))],
        ),
        None => Ok(()),
    }
}

fn write_property_map<W: Write>(xml: &mut XmlOut<W>, property: &PropertyMap) -> Result<()> {
    if property.multi_valued {
        xml.start("PropertyMap", &[("MultiValued", "Yes")])?;
    } else {
        xml.start("PropertyMap", &[])?;
    }

    match &property.source {
        PropertySource::Attribute(name) => xml.empty("Attribute", &[("Name", name.qualified().as_str())])?,
        PropertySource::PCData => xml.empty("PCDATA", &[])?,
        PropertySource::ElementType(name) => {
            xml.empty("ElementType", &[("Name", name.qualified().as_str())])?
        }
    }

    match &property.target {
        PropertyTarget::Column(column) => xml.empty("ToColumn", &[("Name", column.as_str())])?,
        PropertyTarget::PropertyTable {
            table,
            column,
            unique_key,
            foreign_key,
        } => {
            xml.empty(
                "ToPropertyTable",
                &[("Table", table.as_str()), ("KeyInParentTable", "Unique")],
            )?;
            xml.empty("UseUniqueKey", &[("Name", unique_key.as_str())])?;
            xml.empty("UseForeignKey", &[("Name", foreign_key.as_str())])?;
            xml.empty("ToColumn", &[("Name", column.as_str())])?;
        }
    }

    write_order_column(xml, property.order_column.as_ref())?;
    xml.end("PropertyMap")
}

fn write_class_map<W: Write>(xml: &mut XmlOut<W>, class_map: &ClassMap) -> Result<()> {
    if class_map.root {
        xml.start("ClassMap", &[("Root", "Yes")])?;
    } else {
        xml.start("ClassMap", &[])?;
    }
    xml.empty("ElementType", &[("Name", class_map.element_type.qualified().as_str())])?;
    xml.empty("ToClassTable", &[("Name", class_map.table.as_str())])?;

    for property in &class_map.property_maps {
        write_property_map(xml, property)?;
    }

    for related in &class_map.related_classes {
        xml.start("RelatedClass", &[("KeyInParentTable", "Unique")])?;
        xml.empty("ElementType", &[("Name", related.element_type.qualified().as_str())])?;
        xml.empty("UseUniqueKey", &[("Name", related.parent_key.as_str())])?;
        xml.empty("UseForeignKey", &[("Name", related.foreign_key.as_str())])?;
        write_order_column(xml, related.order_column.as_ref())?;
        xml.end("RelatedClass")?;
    }

    xml.end("ClassMap")
}
