//! Content-model groups
//!
//! This module implements DTD content models:
//! - `(a, b, c)` - sequence
//! - `(a | b | c)` - choice
//!
//! Each member is either a reference to an element type or a nested group,
//! and carries its own occurrence indicator.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

use super::particles::{Occurs, OccursCalculator};

/// Group compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum GroupKind {
    /// Ordered sequence of particles
    #[default]
    Sequence,
    /// One of multiple alternatives
    Choice,
}

impl GroupKind {
    /// Parse from a DTD separator character
    pub fn from_separator(sep: char) -> Option<Self> {
        match sep {
            ',' => Some(Self::Sequence),
            '|' => Some(Self::Choice),
            _ => None,
        }
    }

    /// The DTD separator for this compositor
    pub fn separator(&self) -> &'static str {
        match self {
            Self::Sequence => ", ",
            Self::Choice => " | ",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
        }
    }
}

/// Reference to an element type inside a content model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Name of the referenced element type, as written
    pub element_type: String,
    /// Occurrence indicator
    pub occurs: Occurs,
}

impl Reference {
    /// Create a new reference
    pub fn new(element_type: impl Into<String>, occurs: Occurs) -> Self {
        Self {
            element_type: element_type.into(),
            occurs,
        }
    }
}

/// A member of a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Particle {
    /// Element type reference
    Reference(Reference),
    /// Nested group
    Group(Group),
}

impl Particle {
    /// Get the occurrence constraints
    pub fn occurs(&self) -> Occurs {
        match self {
            Self::Reference(r) => r.occurs,
            Self::Group(g) => g.occurs,
        }
    }

    /// Check if this particle can match nothing
    pub fn is_emptiable(&self) -> bool {
        match self {
            Self::Reference(r) => !r.occurs.is_required(),
            Self::Group(g) => g.is_emptiable(),
        }
    }
}

/// Content-model group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    /// Sequence or choice
    pub kind: GroupKind,
    /// Members in document order
    pub members: Vec<Particle>,
    /// Occurrence constraints of the whole group
    pub occurs: Occurs,
}

impl Group {
    /// Create a new empty group
    pub fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            members: Vec::new(),
            occurs: Occurs::once(),
        }
    }

    /// Set occurrence constraints
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Add an element type reference
    pub fn add_reference(&mut self, element_type: impl Into<String>, occurs: Occurs) {
        self.members
            .push(Particle::Reference(Reference::new(element_type, occurs)));
    }

    /// Add a nested group
    pub fn add_group(&mut self, group: Group) {
        self.members.push(Particle::Group(group));
    }

    /// Check if group has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if group can produce empty content
    pub fn is_emptiable(&self) -> bool {
        if !self.occurs.is_required() || self.members.is_empty() {
            return true;
        }

        match self.kind {
            GroupKind::Choice => self.members.iter().any(Particle::is_emptiable),
            GroupKind::Sequence => self.members.iter().all(Particle::is_emptiable),
        }
    }

    /// All element type references, depth first, in document order
    pub fn references(&self) -> Vec<&Reference> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a Reference>) {
        for member in &self.members {
            match member {
                Particle::Reference(r) => refs.push(r),
                Particle::Group(g) => g.collect_references(refs),
            }
        }
    }

    /// Depth of nested groups (a flat group has depth 1)
    pub fn depth(&self) -> usize {
        1 + self
            .members
            .iter()
            .filter_map(|m| match m {
                Particle::Group(g) => Some(g.depth()),
                Particle::Reference(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Effective occurrence of every child element type within one parent
    ///
    /// Occurrence multiplies through nested groups; a member of a choice
    /// with more than one alternative may be absent; a child referenced
    /// several times adds up its appearances.
    pub fn child_occurrences(&self) -> IndexMap<String, Occurs> {
        let mut result: IndexMap<String, OccursCalculator> = IndexMap::new();
        self.accumulate(Occurs::once(), &mut result);
        result
            .into_iter()
            .map(|(name, calc)| (name, calc.occurs()))
            .collect()
    }

    fn accumulate(&self, outer: Occurs, result: &mut IndexMap<String, OccursCalculator>) {
        let mut context = OccursCalculator::from_occurs(outer);
        context.multiply(self.occurs);
        if self.kind == GroupKind::Choice && self.members.len() > 1 {
            context.make_optional();
        }
        let context = context.occurs();

        for member in &self.members {
            match member {
                Particle::Reference(r) => {
                    let mut effective = OccursCalculator::from_occurs(context);
                    effective.multiply(r.occurs);
                    match result.get_mut(&r.element_type) {
                        Some(existing) => existing.add(effective.occurs()),
                        None => {
                            result.insert(r.element_type.clone(), effective);
                        }
                    }
                }
                Particle::Group(g) => g.accumulate(context, result),
            }
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", self.kind.separator())?;
            }
            match member {
                Particle::Reference(r) => write!(f, "{}{}", r.element_type, r.occurs.indicator())?,
                Particle::Group(g) => write!(f, "{}", g)?,
            }
        }
        write!(f, "){}", self.occurs.indicator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_model() -> Group {
        // (Customer, (Item | Service)+, Note?, Item*)
        let mut alternatives = Group::new(GroupKind::Choice).with_occurs(Occurs::one_or_more());
        alternatives.add_reference("Item", Occurs::once());
        alternatives.add_reference("Service", Occurs::once());

        let mut seq = Group::new(GroupKind::Sequence);
        seq.add_reference("Customer", Occurs::once());
        seq.add_group(alternatives);
        seq.add_reference("Note", Occurs::optional());
        seq.add_reference("Item", Occurs::zero_or_more());
        seq
    }

    #[test]
    fn test_display_round_trips_dtd_syntax() {
        assert_eq!(
            order_model().to_string(),
            "(Customer, (Item | Service)+, Note?, Item*)"
        );
    }

    #[test]
    fn test_child_occurrences() {
        let occ = order_model().child_occurrences();
        assert_eq!(occ["Customer"], Occurs::once());
        assert_eq!(occ["Service"], Occurs::zero_or_more());
        assert_eq!(occ["Note"], Occurs::optional());
        // (0, unbounded) from the choice plus (0, unbounded) from Item*
        assert_eq!(occ["Item"], Occurs::zero_or_more());
        assert_eq!(
            occ.keys().collect::<Vec<_>>(),
            vec!["Customer", "Item", "Service", "Note"]
        );
    }

    #[test]
    fn test_repeated_single_child_becomes_repeatable() {
        let mut seq = Group::new(GroupKind::Sequence);
        seq.add_reference("Line", Occurs::once());
        seq.add_reference("Line", Occurs::once());
        let occ = seq.child_occurrences();
        assert_eq!(occ["Line"], Occurs::new(2, Some(2)));
        assert!(occ["Line"].is_repeatable());
    }

    #[test]
    fn test_single_member_choice_keeps_requirement() {
        let mut choice = Group::new(GroupKind::Choice);
        choice.add_reference("Only", Occurs::once());
        assert_eq!(choice.child_occurrences()["Only"], Occurs::once());
    }

    #[test]
    fn test_emptiable_and_depth() {
        let model = order_model();
        assert!(!model.is_emptiable());
        assert_eq!(model.depth(), 2);
        assert_eq!(model.references().len(), 5);

        let mut optional = Group::new(GroupKind::Sequence);
        optional.add_reference("A", Occurs::optional());
        assert!(optional.is_emptiable());
    }
}
