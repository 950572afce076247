//! DDML reader
//!
//! DDML (Document Definition Markup Language) writes a DTD as an XML
//! document. [`DdmlReader`] reads a `DocumentDef` into the same [`Dtd`]
//! graph the DTD parser builds:
//!
//! ```xml
//! <DocumentDef>
//!   <ElementDecl Name="Order">
//!     <Model><Seq><Ref Element="Customer"/><Ref Element="Line" Frequency="OneOrMore"/></Seq></Model>
//!     <AttGroup><AttDef Name="number" Type="CDATA" Required="Yes"/></AttGroup>
//!   </ElementDecl>
//! </DocumentDef>
//! ```
//!
//! Elements are matched by local name, so any DDML namespace is accepted.

use roxmltree::Node;
use tracing::debug;

use super::{
    Attribute, AttributeDefault, AttributeType, ContentType, Dtd, ElementType, Group, GroupKind,
    Occurs,
};
use crate::error::{DtdError, Error, Result};
use crate::limits::Limits;
use crate::namespaces::NamespaceContext;

/// Reads DDML documents
#[derive(Debug, Clone, Default)]
pub struct DdmlReader {
    namespaces: NamespaceContext,
    limits: Limits,
}

impl DdmlReader {
    /// Create a reader with no namespace prefixes
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix/URI pairs used to resolve prefixed names
    pub fn with_namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Set processing limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Read a DDML document
    pub fn read_str(&self, text: &str) -> Result<Dtd> {
        self.limits.check_resource_size(text.len())?;
        let doc = roxmltree::Document::parse(text).map_err(Error::xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != "DocumentDef" {
            return Err(ddml_error(format!(
                "Expected DocumentDef root element, found '{}'",
                root.tag_name().name()
            )));
        }

        let mut dtd = Dtd::new();
        for decl in root.children().filter(Node::is_element) {
            match decl.tag_name().name() {
                "ElementDecl" => self.element_decl(decl, &mut dtd)?,
                other => debug!(element = other, "skipping DDML declaration"),
            }
        }
        dtd.resolve()?;
        Ok(dtd)
    }

    fn element_decl(&self, decl: Node<'_, '_>, dtd: &mut Dtd) -> Result<()> {
        let name = required(decl, "Name")?;
        let (content_type, content) = match child(decl, "Model") {
            Some(model) => self
                .model(model)
                .map_err(|e| with_declaration(e, name))?,
            None => (ContentType::Empty, None),
        };

        let xml_name = self.namespaces.resolve(name);
        debug!(element_type = %xml_name, content = %content_type, "DDML element type declared");
        let element_type = match content {
            Some(group) => ElementType::with_content(xml_name, content_type, group),
            None => ElementType::new(xml_name, content_type),
        };
        dtd.add_element_type(element_type)?;

        for node in decl.children().filter(Node::is_element) {
            match node.tag_name().name() {
                "AttGroup" => {
                    for att_def in elements_named(node, "AttDef") {
                        let attribute = self
                            .att_def(att_def)
                            .map_err(|e| with_declaration(e, name))?;
                        dtd.add_attribute(name, attribute);
                    }
                }
                "AttDef" => {
                    let attribute = self
                        .att_def(node)
                        .map_err(|e| with_declaration(e, name))?;
                    dtd.add_attribute(name, attribute);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn model(&self, model: Node<'_, '_>) -> Result<(ContentType, Option<Group>)> {
        let inner = model
            .children()
            .find(Node::is_element)
            .ok_or_else(|| ddml_error("Model element is empty"))?;

        match inner.tag_name().name() {
            "Empty" => Ok((ContentType::Empty, None)),
            "Any" => Ok((ContentType::Any, None)),
            "PCData" => Ok((ContentType::PCData, None)),
            "Mixed" => {
                let mut group = Group::new(GroupKind::Choice);
                for reference in elements_named(inner, "Ref") {
                    group.add_reference(required(reference, "Element")?, Occurs::once());
                }
                if group.is_empty() {
                    Ok((ContentType::PCData, None))
                } else {
                    Ok((
                        ContentType::Mixed,
                        Some(group.with_occurs(Occurs::zero_or_more())),
                    ))
                }
            }
            "Seq" | "Choice" => Ok((ContentType::Element, Some(self.group(inner, 1)?))),
            other => Err(ddml_error(format!("Unknown content model '{}'", other))),
        }
    }

    fn group(&self, node: Node<'_, '_>, depth: usize) -> Result<Group> {
        self.limits.check_content_depth(depth)?;
        let kind = match node.tag_name().name() {
            "Choice" => GroupKind::Choice,
            _ => GroupKind::Sequence,
        };
        let mut group = Group::new(kind).with_occurs(frequency(node)?);

        for member in node.children().filter(Node::is_element) {
            match member.tag_name().name() {
                "Ref" => group.add_reference(required(member, "Element")?, frequency(member)?),
                "Seq" | "Choice" => group.add_group(self.group(member, depth + 1)?),
                other => {
                    return Err(ddml_error(format!(
                        "Unexpected '{}' in content model group",
                        other
                    )))
                }
            }
        }
        Ok(group)
    }

    fn att_def(&self, node: Node<'_, '_>) -> Result<Attribute> {
        let name = required(node, "Name")?;
        let enumeration: Vec<String> = elements_named(node, "Enum")
            .map(|e| required(e, "Value").map(str::to_string))
            .collect::<Result<_>>()?;

        let attribute_type = match node.attribute("Type") {
            Some("Enumerated") | Some("ENUMERATED") => AttributeType::Enumerated,
            Some(keyword) => AttributeType::from_keyword(keyword).ok_or_else(|| {
                ddml_error(format!("Unknown attribute type '{}' on '{}'", keyword, name))
            })?,
            None if !enumeration.is_empty() => AttributeType::Enumerated,
            None => AttributeType::CData,
        };

        let default_value = node.attribute("Default").map(str::to_string);
        let default = if is_yes(node.attribute("Fixed")) {
            let value = default_value.ok_or_else(|| {
                ddml_error(format!("Fixed attribute '{}' has no Default value", name))
            })?;
            AttributeDefault::Fixed(value)
        } else if let Some(value) = default_value {
            AttributeDefault::Default(value)
        } else if is_yes(node.attribute("Required")) {
            AttributeDefault::Required
        } else {
            AttributeDefault::Implied
        };

        let mut attribute = Attribute::new(self.namespaces.resolve(name), attribute_type, default);
        attribute.enumeration = enumeration;
        Ok(attribute)
    }
}

fn ddml_error(message: impl Into<String>) -> Error {
    Error::Dtd(DtdError::new(message).with_location("DDML document"))
}

fn with_declaration(err: Error, element_type: &str) -> Error {
    match err {
        Error::Dtd(e) if e.declaration.is_none() => {
            Error::Dtd(e.with_declaration(format!("ElementDecl Name=\"{}\"", element_type)))
        }
        other => other,
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, local_name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == local_name)
}

fn elements_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    local_name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == local_name)
}

fn required<'a>(node: Node<'a, '_>, attribute: &str) -> Result<&'a str> {
    node.attribute(attribute).ok_or_else(|| {
        ddml_error(format!(
            "'{}' is missing required attribute '{}'",
            node.tag_name().name(),
            attribute
        ))
    })
}

fn frequency(node: Node<'_, '_>) -> Result<Occurs> {
    match node.attribute("Frequency") {
        None | Some("Required") => Ok(Occurs::once()),
        Some("Optional") => Ok(Occurs::optional()),
        Some("ZeroOrMore") => Ok(Occurs::zero_or_more()),
        Some("OneOrMore") => Ok(Occurs::one_or_more()),
        Some(other) => Err(ddml_error(format!("Unknown Frequency '{}'", other))),
    }
}

fn is_yes(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: &str = r#"<?xml version="1.0"?>
<DocumentDef xmlns="http://www.w3.org/2000/04/ddml">
  <ElementDecl Name="Order">
    <Model>
      <Seq>
        <Ref Element="Customer"/>
        <Choice Frequency="OneOrMore">
          <Ref Element="Item"/>
          <Ref Element="Service"/>
        </Choice>
      </Seq>
    </Model>
    <AttGroup>
      <AttDef Name="number" Type="CDATA" Required="Yes"/>
      <AttDef Name="status">
        <Enum Value="open"/>
        <Enum Value="closed"/>
      </AttDef>
    </AttGroup>
    <AttDef Name="version" Type="CDATA" Default="1" Fixed="Yes"/>
  </ElementDecl>
  <ElementDecl Name="Customer"><Model><PCData/></Model></ElementDecl>
  <ElementDecl Name="Item"><Model><Mixed><Ref Element="Customer"/></Mixed></Model></ElementDecl>
  <ElementDecl Name="Service"><Model><Empty/></Model></ElementDecl>
</DocumentDef>"#;

    #[test]
    fn test_read_document_def() {
        let dtd = DdmlReader::new().read_str(ORDERS).unwrap();
        assert_eq!(dtd.element_types.len(), 4);

        let order = dtd.element_type("Order").unwrap();
        assert_eq!(order.content_type, ContentType::Element);
        assert_eq!(
            order.content.as_ref().unwrap().to_string(),
            "(Customer, (Item | Service)+)"
        );
        assert_eq!(order.attributes["number"].default, AttributeDefault::Required);
        assert_eq!(order.attributes["status"].attribute_type, AttributeType::Enumerated);
        assert_eq!(order.attributes["status"].default, AttributeDefault::Implied);
        assert_eq!(
            order.attributes["version"].default,
            AttributeDefault::Fixed("1".to_string())
        );

        assert_eq!(dtd.element_type("Item").unwrap().content_type, ContentType::Mixed);
        assert_eq!(dtd.element_type("Customer").unwrap().parents.len(), 2);
    }

    #[test]
    fn test_unknown_frequency_rejected() {
        let text = r#"<DocumentDef>
  <ElementDecl Name="a"><Model><Seq><Ref Element="b" Frequency="Twice"/></Seq></Model></ElementDecl>
  <ElementDecl Name="b"><Model><Empty/></Model></ElementDecl>
</DocumentDef>"#;
        let err = DdmlReader::new().read_str(text).unwrap_err().to_string();
        assert!(err.contains("Twice"));
        assert!(err.contains("ElementDecl Name=\"a\""));
    }

    #[test]
    fn test_unknown_attribute_type_rejected() {
        let text = r#"<DocumentDef>
  <ElementDecl Name="a"><Model><Empty/></Model><AttDef Name="x" Type="STRING"/></ElementDecl>
</DocumentDef>"#;
        assert!(DdmlReader::new().read_str(text).is_err());
    }

    #[test]
    fn test_wrong_root_rejected() {
        assert!(DdmlReader::new().read_str("<Schema/>").is_err());
    }
}
