//! XML document handling
//!
//! A small namespace-aware DOM built on quick-xml. It is used to read map
//! documents and catalogs, and to pull the `DOCTYPE` declaration out of an
//! XML document without touching the document body.

use crate::error::{Error, Result};
use crate::namespaces::XmlName;
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// XML Element in the document tree
#[derive(Debug, Clone)]
pub struct Element {
    /// Element name with its namespace resolved from in-scope declarations
    pub name: XmlName,
    /// Element attributes keyed by the name as written (namespace declarations excluded)
    pub attributes: IndexMap<String, String>,
    /// Text content (if any)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
}

impl Element {
    /// Create a new element
    pub fn new(name: XmlName) -> Self {
        Self {
            name,
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace.as_deref()
    }

    /// Get an attribute value by name as written
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Get a required attribute, failing with a message naming the element
    pub fn required_attribute(&self, name: &str) -> Result<&str> {
        self.get_attribute(name).ok_or_else(|| {
            Error::Xml(format!(
                "element '{}' is missing required attribute '{}'",
                self.local_name(),
                name
            ))
        })
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Append text content
    pub fn push_text(&mut self, text: &str) {
        match &mut self.text {
            Some(existing) => existing.push_str(text),
            None => self.text = Some(text.to_string()),
        }
    }

    /// Find child elements by local name
    pub fn find_children<'a>(&'a self, local_name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children
            .iter()
            .filter(move |e| e.local_name() == local_name)
    }

    /// Find the first child element with a local name
    pub fn find_child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|e| e.local_name() == local_name)
    }
}

/// XML Document representation
#[derive(Debug, Default)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
    /// Raw `DOCTYPE` declaration content, if the document has one
    pub doctype: Option<String>,
}

/// In-scope namespace declarations, one frame per open element
#[derive(Debug, Default)]
struct ScopeStack {
    frames: Vec<Vec<(String, String)>>,
}

impl ScopeStack {
    fn lookup(&self, prefix: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Parse an XML document from bytes
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut doc = Document::new();
        let mut element_stack: Vec<Element> = Vec::new();
        let mut scopes = ScopeStack::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let element = Self::parse_element(&e, &mut scopes)?;
                    element_stack.push(element);
                }
                Ok(Event::End(_)) => {
                    scopes.frames.pop();
                    if let Some(current) = element_stack.pop() {
                        if let Some(parent) = element_stack.last_mut() {
                            parent.add_child(current);
                        } else {
                            doc.root = Some(current);
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    let element = Self::parse_element(&e, &mut scopes)?;
                    scopes.frames.pop();
                    if let Some(parent) = element_stack.last_mut() {
                        parent.add_child(element);
                    } else {
                        doc.root = Some(element);
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?;
                        if !text.trim().is_empty() {
                            current.push_text(&text);
                        }
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        current.push_text(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::DocType(e)) => {
                    doc.doctype = Some(doctype_text(&e));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(doc)
    }

    /// Parse element from BytesStart event, pushing its namespace frame
    fn parse_element(start: &BytesStart, scopes: &mut ScopeStack) -> Result<Element> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
            .to_string();

        let mut frame = Vec::new();
        let mut attributes = IndexMap::new();

        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;

            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?;

            let attr_value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
                .to_string();

            if attr_name == "xmlns" {
                frame.push((String::new(), attr_value));
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                frame.push((prefix.to_string(), attr_value));
            } else {
                attributes.insert(attr_name.to_string(), attr_value);
            }
        }

        scopes.frames.push(frame);

        let (prefix, local) = crate::names::split_qname(&name);
        let namespace = scopes.lookup(prefix.unwrap_or("")).map(str::to_string);
        let mut element = Element::new(XmlName::new(prefix, local, namespace));
        element.attributes = attributes;
        Ok(element)
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }
}

/// Read only the `DOCTYPE` declaration of a document
///
/// Stops at the first element so entity references in the body, which
/// may only be declared in the DTD, are never decoded.
pub fn read_doctype(xml: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::DocType(e)) => return Ok(Some(doctype_text(&e))),
            Ok(Event::Start(_)) | Ok(Event::Empty(_)) | Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(Error::Xml(format!(
                    "Error reading DOCTYPE at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }
}

fn doctype_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    text.strip_suffix('>').unwrap_or(text).trim().to_string()
}
