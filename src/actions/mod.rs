//! Actions documents
//!
//! An actions document tells the DataHandler what to do with the rows of
//! each element type when a document is stored: insert them, update
//! existing rows, delete them, and so on. Element types without their own
//! action use the document's default action.

pub mod compiler;

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

use crate::namespaces::XmlName;

pub use compiler::ActionCompiler;

/// A property named in an `Update` action
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum UpdateProperty {
    /// An attribute of the element
    Attribute(XmlName),
    /// A PCDATA-only child element type
    ElementType(XmlName),
    /// The element's own character data
    PCData,
}

impl fmt::Display for UpdateProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(name) => write!(f, "attribute {}", name),
            Self::ElementType(name) => write!(f, "element type {}", name),
            Self::PCData => write!(f, "PCDATA"),
        }
    }
}

/// What to do with an element's row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ActionKind {
    /// Leave the database alone
    None,
    /// Insert; fails if the row exists
    Insert,
    /// Insert unless the row exists
    SoftInsert,
    /// Update the row if it exists, otherwise insert it
    UpdateOrInsert,
    /// Delete; fails if the row does not exist
    Delete,
    /// Delete if the row exists
    SoftDelete,
    /// Update the listed properties, or every mapped property when empty
    Update(Vec<UpdateProperty>),
}

impl ActionKind {
    /// Parse the element name of a simple action
    pub fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "None" => Some(Self::None),
            "Insert" => Some(Self::Insert),
            "SoftInsert" => Some(Self::SoftInsert),
            "UpdateOrInsert" => Some(Self::UpdateOrInsert),
            "Delete" => Some(Self::Delete),
            "SoftDelete" => Some(Self::SoftDelete),
            _ => None,
        }
    }

    /// Element name used in actions documents
    pub fn element_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Insert => "Insert",
            Self::SoftInsert => "SoftInsert",
            Self::UpdateOrInsert => "UpdateOrInsert",
            Self::Delete => "Delete",
            Self::SoftDelete => "SoftDelete",
            Self::Update(_) => "Update",
        }
    }

    /// Properties an `Update` names (empty for every other action)
    pub fn update_properties(&self) -> &[UpdateProperty] {
        match self {
            Self::Update(properties) => properties,
            _ => &[],
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.element_name())
    }
}

/// Action for one element type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    /// Element type the action applies to
    pub element_type: XmlName,
    /// What to do
    pub kind: ActionKind,
}

/// Compiled actions document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Actions {
    /// Action for element types without their own
    pub default_action: Option<ActionKind>,
    /// Element-specific actions keyed by universal name
    pub actions: IndexMap<String, Action>,
}

impl Actions {
    /// Create an empty action table
    pub fn new() -> Self {
        Self::default()
    }

    /// Action for an element type, falling back to the default
    pub fn action_for(&self, element_type: &XmlName) -> Option<&ActionKind> {
        self.actions
            .get(&element_type.universal())
            .map(|action| &action.kind)
            .or(self.default_action.as_ref())
    }

    /// Element-specific action, ignoring the default
    pub fn element_action(&self, element_type: &XmlName) -> Option<&Action> {
        self.actions.get(&element_type.universal())
    }

    /// Number of element-specific actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no element-specific action is declared
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_for_falls_back_to_default() {
        let mut actions = Actions::new();
        actions.default_action = Some(ActionKind::SoftInsert);
        let order = XmlName::local("Order");
        actions.actions.insert(
            order.universal(),
            Action {
                element_type: order.clone(),
                kind: ActionKind::Delete,
            },
        );

        assert_eq!(actions.action_for(&order), Some(&ActionKind::Delete));
        assert_eq!(
            actions.action_for(&XmlName::local("Line")),
            Some(&ActionKind::SoftInsert)
        );
        assert!(actions.element_action(&XmlName::local("Line")).is_none());
    }

    #[test]
    fn test_no_default() {
        let actions = Actions::new();
        assert!(actions.action_for(&XmlName::local("Order")).is_none());
        assert!(actions.is_empty());
    }

    #[test]
    fn test_namespaced_lookup() {
        let mut actions = Actions::new();
        let order = XmlName::new(Some("o"), "Order", Some("http://example.com/orders"));
        actions.actions.insert(
            order.universal(),
            Action {
                element_type: order,
                kind: ActionKind::Insert,
            },
        );
        // same namespace, different prefix
        let other = XmlName::new(Some("x"), "Order", Some("http://example.com/orders"));
        assert_eq!(actions.action_for(&other), Some(&ActionKind::Insert));
    }

    #[test]
    fn test_element_names() {
        for name in ["None", "Insert", "SoftInsert", "UpdateOrInsert", "Delete", "SoftDelete"] {
            assert_eq!(ActionKind::from_element_name(name).unwrap().element_name(), name);
        }
        assert!(ActionKind::from_element_name("Update").is_none());
        assert_eq!(ActionKind::Update(vec![]).to_string(), "Update");
    }
}
