//! DTD object model
//!
//! The in-memory graph that both the DTD parser and the DDML reader produce
//! and that the map factory walks: element types with their content models
//! and attribute lists, plus the entity and notation declarations seen
//! along the way.

pub mod ddml;
pub mod groups;
pub mod parser;
pub mod particles;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::error::{DtdError, Result};
use crate::namespaces::XmlName;

pub use ddml::DdmlReader;
pub use groups::{Group, GroupKind, Particle, Reference};
pub use parser::DtdParser;
pub use particles::{Occurs, OccursCalculator};

/// Kind of content an element type allows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContentType {
    /// `EMPTY`
    Empty,
    /// `ANY`
    Any,
    /// `(#PCDATA)`
    PCData,
    /// `(#PCDATA | a | b)*`
    Mixed,
    /// Element-only content model
    Element,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "EMPTY",
            Self::Any => "ANY",
            Self::PCData => "PCDATA",
            Self::Mixed => "MIXED",
            Self::Element => "ELEMENT",
        };
        write!(f, "{}", s)
    }
}

/// Declared type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeType {
    /// CDATA
    CData,
    /// ID
    Id,
    /// IDREF
    IdRef,
    /// IDREFS
    IdRefs,
    /// ENTITY
    Entity,
    /// ENTITIES
    Entities,
    /// NMTOKEN
    NmToken,
    /// NMTOKENS
    NmTokens,
    /// NOTATION (a, b)
    Notation,
    /// (a | b | c)
    Enumerated,
}

impl AttributeType {
    /// Parse a DTD attribute type keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "CDATA" => Some(Self::CData),
            "ID" => Some(Self::Id),
            "IDREF" => Some(Self::IdRef),
            "IDREFS" => Some(Self::IdRefs),
            "ENTITY" => Some(Self::Entity),
            "ENTITIES" => Some(Self::Entities),
            "NMTOKEN" => Some(Self::NmToken),
            "NMTOKENS" => Some(Self::NmTokens),
            "NOTATION" => Some(Self::Notation),
            _ => None,
        }
    }

    /// Types whose value is a whitespace-separated list of tokens
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, Self::IdRefs | Self::Entities | Self::NmTokens)
    }
}

/// Default declaration of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AttributeDefault {
    /// `#REQUIRED`
    Required,
    /// `#IMPLIED`
    Implied,
    /// `#FIXED "value"`
    Fixed(String),
    /// `"value"`
    Default(String),
}

impl AttributeDefault {
    /// Whether a parsed document always carries a value for the attribute
    pub fn always_present(&self) -> bool {
        !matches!(self, Self::Implied)
    }
}

/// Attribute definition from an ATTLIST declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    /// Attribute name
    pub name: XmlName,
    /// Declared type
    pub attribute_type: AttributeType,
    /// Default declaration
    pub default: AttributeDefault,
    /// Allowed values for enumerated and notation types
    pub enumeration: Vec<String>,
}

impl Attribute {
    /// Create a CDATA attribute
    pub fn new(name: XmlName, attribute_type: AttributeType, default: AttributeDefault) -> Self {
        Self {
            name,
            attribute_type,
            default,
            enumeration: Vec::new(),
        }
    }
}

/// Element type declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementType {
    /// Element type name
    pub name: XmlName,
    /// Kind of content
    pub content_type: ContentType,
    /// Content model for Element content, or the name list for Mixed content
    pub content: Option<Group>,
    /// Attributes keyed by qualified name, in declaration order
    pub attributes: IndexMap<String, Attribute>,
    /// Element types referenced by this content model
    pub children: IndexSet<String>,
    /// Element types whose content models reference this one
    pub parents: IndexSet<String>,
}

impl ElementType {
    /// Create an element type with no content model
    pub fn new(name: XmlName, content_type: ContentType) -> Self {
        Self {
            name,
            content_type,
            content: None,
            attributes: IndexMap::new(),
            children: IndexSet::new(),
            parents: IndexSet::new(),
        }
    }

    /// Create an element type with a content model
    pub fn with_content(name: XmlName, content_type: ContentType, content: Group) -> Self {
        let mut element_type = Self::new(name, content_type);
        element_type.content = Some(content);
        element_type
    }

    /// Qualified name as written
    pub fn qualified_name(&self) -> String {
        self.name.qualified()
    }

    /// Root element types are not referenced by any content model
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Entity declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDecl {
    /// Replacement text for internal entities
    pub value: Option<String>,
    /// Public identifier of an external entity
    pub public_id: Option<String>,
    /// System identifier of an external entity
    pub system_id: Option<String>,
    /// Notation of an unparsed entity
    pub ndata: Option<String>,
}

impl EntityDecl {
    /// Internal entity with literal replacement text
    pub fn internal(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            public_id: None,
            system_id: None,
            ndata: None,
        }
    }

    /// Whether this entity lives in another resource
    pub fn is_external(&self) -> bool {
        self.system_id.is_some()
    }
}

/// Notation declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotationDecl {
    /// Public identifier
    pub public_id: Option<String>,
    /// System identifier
    pub system_id: Option<String>,
}

/// A parsed DTD
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dtd {
    /// Element types keyed by qualified name, in declaration order
    pub element_types: IndexMap<String, ElementType>,
    /// General entities
    pub entities: IndexMap<String, EntityDecl>,
    /// Parameter entities
    pub parameter_entities: IndexMap<String, EntityDecl>,
    /// Notations
    pub notations: IndexMap<String, NotationDecl>,
    /// Attribute lists seen before (or without) their element declaration
    #[serde(skip)]
    pending_attributes: IndexMap<String, IndexMap<String, Attribute>>,
}

impl Dtd {
    /// Create an empty DTD
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element type; declaring one twice is an error
    pub fn add_element_type(&mut self, mut element_type: ElementType) -> Result<()> {
        let key = element_type.qualified_name();
        if self.element_types.contains_key(&key) {
            return Err(DtdError::new(format!(
                "Element type '{}' is declared more than once",
                key
            ))
            .into());
        }
        if let Some(pending) = self.pending_attributes.shift_remove(&key) {
            for (name, attr) in pending {
                element_type.attributes.entry(name).or_insert(attr);
            }
        }
        self.element_types.insert(key, element_type);
        Ok(())
    }

    /// Add an attribute definition; the first definition of a name wins
    pub fn add_attribute(&mut self, element_type: &str, attribute: Attribute) {
        let attrs = match self.element_types.get_mut(element_type) {
            Some(et) => &mut et.attributes,
            None => self
                .pending_attributes
                .entry(element_type.to_string())
                .or_default(),
        };
        attrs.entry(attribute.name.qualified()).or_insert(attribute);
    }

    /// Add an entity; the first declaration wins
    pub fn add_entity(&mut self, name: &str, decl: EntityDecl, parameter: bool) {
        let map = if parameter {
            &mut self.parameter_entities
        } else {
            &mut self.entities
        };
        map.entry(name.to_string()).or_insert(decl);
    }

    /// Add a notation; declaring one twice is an error
    pub fn add_notation(&mut self, name: &str, decl: NotationDecl) -> Result<()> {
        if self.notations.contains_key(name) {
            return Err(
                DtdError::new(format!("Notation '{}' is declared more than once", name)).into(),
            );
        }
        self.notations.insert(name.to_string(), decl);
        Ok(())
    }

    /// Look up an element type by qualified name
    pub fn element_type(&self, name: &str) -> Option<&ElementType> {
        self.element_types.get(name)
    }

    /// Element types no content model references
    pub fn roots(&self) -> impl Iterator<Item = &ElementType> {
        self.element_types.values().filter(|et| et.is_root())
    }

    /// Link parents and children and check that every reference is declared
    ///
    /// Called once after all declarations have been read.
    pub fn resolve(&mut self) -> Result<()> {
        for (element, attrs) in std::mem::take(&mut self.pending_attributes) {
            warn!(
                element_type = %element,
                attributes = attrs.len(),
                "ignoring attribute list for undeclared element type"
            );
        }

        let mut links: Vec<(String, String)> = Vec::new();
        for (parent, et) in &self.element_types {
            if let Some(content) = &et.content {
                for reference in content.references() {
                    if !self.element_types.contains_key(&reference.element_type) {
                        return Err(DtdError::new(format!(
                            "Element type '{}' is referenced in the content model of '{}' but is not declared",
                            reference.element_type, parent
                        ))
                        .into());
                    }
                    links.push((parent.clone(), reference.element_type.clone()));
                }
            }
        }

        for et in self.element_types.values_mut() {
            et.children.clear();
            et.parents.clear();
        }
        for (parent, child) in links {
            if let Some(et) = self.element_types.get_mut(&parent) {
                et.children.insert(child.clone());
            }
            if let Some(et) = self.element_types.get_mut(&child) {
                et.parents.insert(parent);
            }
        }

        Ok(())
    }
}
