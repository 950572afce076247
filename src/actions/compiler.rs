//! Actions document compiler
//!
//! A streaming state machine over [`quick_xml::NsReader`] events. Every
//! element must be in the actions namespace; names of element types,
//! attributes and update properties are resolved against the prefixes in
//! the document's `Options`.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use tracing::debug;

use super::{Action, ActionKind, Actions, UpdateProperty};
use crate::error::{Error, Result};
use crate::mapping::{ClassMap, Map, PropertySource};
use crate::namespaces::{NamespaceContext, XmlName};
use crate::ACTIONS_NAMESPACE;

/// Compiles actions documents
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionCompiler<'m> {
    map: Option<&'m Map>,
}

impl<'m> ActionCompiler<'m> {
    /// Create a compiler that does not check names against a map
    pub fn new() -> Self {
        Self { map: None }
    }

    /// Check element types and update properties against a map
    pub fn with_map(mut self, map: &'m Map) -> Self {
        self.map = Some(map);
        self
    }

    /// Compile an actions document from a file
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<Actions> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path).map_err(|e| {
            Error::Resource(format!(
                "Failed to read actions document '{}': {}",
                path.display(),
                e
            ))
        })?;
        self.compile_str(&xml)
    }

    /// Compile an actions document
    pub fn compile_str(&self, xml: &str) -> Result<Actions> {
        let mut reader = NsReader::from_str(xml);
        reader.trim_text(true);
        let mut machine = Machine::new(self.map);

        loop {
            let (resolved, event) = reader
                .read_resolved_event()
                .map_err(|e| Error::Xml(format!("Error reading actions document: {}", e)))?;
            let in_namespace =
                matches!(resolved, ResolveResult::Bound(Namespace(ns)) if ns == ACTIONS_NAMESPACE.as_bytes());

            match event {
                Event::Start(e) => {
                    let name = local_name(&e, in_namespace)?;
                    machine.start(&name, &e)?;
                }
                Event::Empty(e) => {
                    let name = local_name(&e, in_namespace)?;
                    machine.start(&name, &e)?;
                    machine.end()?;
                }
                Event::End(_) => machine.end()?,
                Event::Text(text) => {
                    let text = text.unescape().map_err(Error::xml)?;
                    if !text.trim().is_empty() {
                        return Err(actions_error(format!(
                            "Unexpected text '{}' in actions document",
                            text.trim()
                        )));
                    }
                }
                Event::CData(_) => {
                    return Err(actions_error("Unexpected CDATA section in actions document"))
                }
                Event::Eof => break,
                _ => {}
            }
        }

        machine.finish()
    }
}

fn actions_error(message: impl Into<String>) -> Error {
    Error::Actions(message.into())
}

fn local_name(e: &BytesStart<'_>, in_namespace: bool) -> Result<String> {
    let name = std::str::from_utf8(e.local_name().as_ref())
        .map_err(Error::xml)?
        .to_string();
    if !in_namespace {
        return Err(actions_error(format!(
            "Element '{}' is not in the actions namespace {}",
            String::from_utf8_lossy(e.name().as_ref()),
            ACTIONS_NAMESPACE
        )));
    }
    Ok(name)
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name).map_err(Error::xml)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(Error::xml)?.into_owned())),
        None => Ok(None),
    }
}

fn required_attribute(e: &BytesStart<'_>, element: &str, name: &str) -> Result<String> {
    attribute(e, name)?.ok_or_else(|| {
        actions_error(format!("'{}' is missing required attribute '{}'", element, name))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Document,
    Actions,
    Options,
    DefaultAction,
    Action,
    Update,
    Done,
}

/// Children of `Actions`, in the order they must appear
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    None,
    Options,
    DefaultAction,
    Action,
}

struct Machine<'m> {
    map: Option<&'m Map>,
    state: State,
    section: Section,
    namespaces: NamespaceContext,
    actions: Actions,
    element_types: Vec<XmlName>,
    action: Option<ActionKind>,
    update: Vec<UpdateProperty>,
    update_parent: State,
    /// Open element that may not have children
    leaf: Option<String>,
}

impl<'m> Machine<'m> {
    fn new(map: Option<&'m Map>) -> Self {
        Self {
            map,
            state: State::Document,
            section: Section::None,
            namespaces: NamespaceContext::new(),
            actions: Actions::new(),
            element_types: Vec::new(),
            action: None,
            update: Vec::new(),
            update_parent: State::Action,
            leaf: None,
        }
    }

    fn start(&mut self, name: &str, e: &BytesStart<'_>) -> Result<()> {
        if let Some(leaf) = &self.leaf {
            return Err(actions_error(format!(
                "'{}' must be empty but contains '{}'",
                leaf, name
            )));
        }

        match (self.state, name) {
            (State::Document, "Actions") => {
                let version = attribute(e, "Version")?;
                if version.as_deref() != Some("2.0") {
                    return Err(actions_error(format!(
                        "Unsupported actions version {:?}; expected \"2.0\"",
                        version.unwrap_or_default()
                    )));
                }
                self.state = State::Actions;
            }
            (State::Actions, "Options") => {
                self.enter_section(Section::Options, name)?;
                self.state = State::Options;
            }
            (State::Actions, "DefaultAction") => {
                self.enter_section(Section::DefaultAction, name)?;
                self.action = None;
                self.state = State::DefaultAction;
            }
            (State::Actions, "Action") => {
                self.enter_section(Section::Action, name)?;
                self.element_types.clear();
                self.action = None;
                self.state = State::Action;
            }
            (State::Options, "Namespace") => {
                let prefix = required_attribute(e, name, "Prefix")?;
                let uri = required_attribute(e, name, "URI")?;
                self.namespaces.add_prefix(prefix, uri)?;
                self.leaf = Some(name.to_string());
            }
            (State::Action, "ElementType") => {
                if self.action.is_some() {
                    return Err(actions_error(
                        "ElementType must come before the action in an Action",
                    ));
                }
                let element_type = self
                    .namespaces
                    .resolve_strict(&required_attribute(e, name, "Name")?)?;
                self.class_map(&element_type)?;
                self.element_types.push(element_type);
                self.leaf = Some(name.to_string());
            }
            (State::Action | State::DefaultAction, "Update") => {
                self.check_no_action()?;
                self.update.clear();
                self.update_parent = self.state;
                self.state = State::Update;
            }
            (State::Action | State::DefaultAction, keyword) => {
                let kind = ActionKind::from_element_name(keyword)
                    .ok_or_else(|| self.out_of_place(keyword))?;
                self.check_no_action()?;
                self.action = Some(kind);
                self.leaf = Some(name.to_string());
            }
            (State::Update, "Attribute") => {
                let attribute = self
                    .namespaces
                    .resolve_strict(&required_attribute(e, name, "Name")?)?;
                self.update.push(UpdateProperty::Attribute(attribute));
                self.leaf = Some(name.to_string());
            }
            (State::Update, "ElementType") => {
                let element_type = self
                    .namespaces
                    .resolve_strict(&required_attribute(e, name, "Name")?)?;
                self.update.push(UpdateProperty::ElementType(element_type));
                self.leaf = Some(name.to_string());
            }
            (State::Update, "PCDATA") => {
                self.update.push(UpdateProperty::PCData);
                self.leaf = Some(name.to_string());
            }
            (_, other) => return Err(self.out_of_place(other)),
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.leaf.take().is_some() {
            return Ok(());
        }

        match self.state {
            State::Update => {
                let properties = std::mem::take(&mut self.update);
                self.state = self.update_parent;
                if self.state == State::Action {
                    for element_type in &self.element_types {
                        if let Some(class_map) = self.class_map(element_type)? {
                            check_update_properties(class_map, &properties)?;
                        }
                    }
                }
                self.action = Some(ActionKind::Update(properties));
            }
            State::Action => {
                let kind = self
                    .action
                    .take()
                    .ok_or_else(|| actions_error("Action does not specify an action"))?;
                if self.element_types.is_empty() {
                    return Err(actions_error("Action does not name an ElementType"));
                }
                for element_type in self.element_types.drain(..) {
                    let key = element_type.universal();
                    if self.actions.actions.contains_key(&key) {
                        return Err(actions_error(format!(
                            "More than one action for element type '{}'",
                            element_type
                        )));
                    }
                    debug!(element_type = %element_type, action = %kind, "action compiled");
                    self.actions.actions.insert(
                        key,
                        Action {
                            element_type,
                            kind: kind.clone(),
                        },
                    );
                }
                self.state = State::Actions;
            }
            State::DefaultAction => {
                let kind = self
                    .action
                    .take()
                    .ok_or_else(|| actions_error("DefaultAction does not specify an action"))?;
                debug!(action = %kind, "default action compiled");
                self.actions.default_action = Some(kind);
                self.state = State::Actions;
            }
            State::Options => self.state = State::Actions,
            State::Actions => self.state = State::Done,
            State::Document | State::Done => {
                return Err(actions_error("Unexpected end tag in actions document"))
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Actions> {
        if self.state != State::Done {
            return Err(actions_error("Actions document ended before </Actions>"));
        }
        Ok(self.actions)
    }

    /// Options and DefaultAction appear at most once, and only Action repeats
    fn enter_section(&mut self, section: Section, name: &str) -> Result<()> {
        if section < self.section || (section == self.section && section != Section::Action) {
            return Err(actions_error(format!(
                "Element '{}' is out of place in Actions; expected Options?, DefaultAction?, Action*",
                name
            )));
        }
        self.section = section;
        Ok(())
    }

    fn check_no_action(&self) -> Result<()> {
        match &self.action {
            Some(existing) => Err(actions_error(format!(
                "More than one action given; '{}' is already specified",
                existing
            ))),
            None => Ok(()),
        }
    }

    fn out_of_place(&self, name: &str) -> Error {
        let context = match self.state {
            State::Document => "the document root",
            State::Actions => "Actions",
            State::Options => "Options",
            State::DefaultAction => "DefaultAction",
            State::Action => "Action",
            State::Update => "Update",
            State::Done => "the end of the document",
        };
        actions_error(format!("Element '{}' is not allowed in {}", name, context))
    }

    /// Class map of an element type, when compiling against a map
    fn class_map(&self, element_type: &XmlName) -> Result<Option<&'m ClassMap>> {
        let Some(map) = self.map else {
            return Ok(None);
        };
        let universal = element_type.universal();
        map.class_maps
            .values()
            .find(|c| c.element_type.universal() == universal)
            .map(Some)
            .ok_or_else(|| {
                actions_error(format!(
                    "Element type '{}' is not mapped as a class",
                    element_type
                ))
            })
    }
}

fn check_update_properties(class_map: &ClassMap, properties: &[UpdateProperty]) -> Result<()> {
    for property in properties {
        let mapped = class_map.property_maps.iter().any(|p| match (property, &p.source) {
            (UpdateProperty::Attribute(a), PropertySource::Attribute(b))
            | (UpdateProperty::ElementType(a), PropertySource::ElementType(b)) => {
                a.universal() == b.universal()
            }
            (UpdateProperty::PCData, PropertySource::PCData) => true,
            _ => false,
        });
        if !mapped {
            return Err(actions_error(format!(
                "Update property {} is not mapped for element type '{}'",
                property, class_map.element_type
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtd::DtdParser;
    use crate::mapping::{MapFactory, MapOptions};

    fn doc(body: &str) -> String {
        format!(
            r#"<Actions Version="2.0" xmlns="{}">{}</Actions>"#,
            ACTIONS_NAMESPACE, body
        )
    }

    fn orders_map() -> Map {
        let dtd = DtdParser::new()
            .parse_str(
                "<!ELEMENT Orders (Order*)>\n<!ELEMENT Order (Customer, Line*)>\n<!ATTLIST Order number CDATA #REQUIRED>\n<!ELEMENT Customer (#PCDATA)>\n<!ELEMENT Line (#PCDATA)>\n<!ATTLIST Line sku CDATA #REQUIRED>",
                None,
            )
            .unwrap();
        MapFactory::new(MapOptions::default()).create_map(&dtd).unwrap()
    }

    #[test]
    fn test_compile_actions() {
        let xml = doc(
            r#"
  <DefaultAction><SoftInsert/></DefaultAction>
  <Action>
    <ElementType Name="Order"/>
    <ElementType Name="Orders"/>
    <UpdateOrInsert/>
  </Action>
  <Action>
    <ElementType Name="Line"/>
    <Update>
      <Attribute Name="sku"/>
      <PCDATA/>
    </Update>
  </Action>"#,
        );
        let actions = ActionCompiler::new().compile_str(&xml).unwrap();

        assert_eq!(actions.default_action, Some(ActionKind::SoftInsert));
        assert_eq!(actions.len(), 3);
        assert_eq!(
            actions.action_for(&XmlName::local("Orders")),
            Some(&ActionKind::UpdateOrInsert)
        );
        assert_eq!(
            actions.action_for(&XmlName::local("Line")),
            Some(&ActionKind::Update(vec![
                UpdateProperty::Attribute(XmlName::local("sku")),
                UpdateProperty::PCData,
            ]))
        );
        assert_eq!(
            actions.action_for(&XmlName::local("Customer")),
            Some(&ActionKind::SoftInsert)
        );
    }

    #[test]
    fn test_non_empty_leaf_elements() {
        let xml = doc("<Action><ElementType Name=\"Order\"></ElementType><Delete></Delete></Action>");
        let actions = ActionCompiler::new().compile_str(&xml).unwrap();
        assert_eq!(actions.action_for(&XmlName::local("Order")), Some(&ActionKind::Delete));
    }

    #[test]
    fn test_namespace_options() {
        let xml = doc(
            r#"<Options><Namespace Prefix="o" URI="http://example.com/orders"/></Options>
<Action><ElementType Name="o:Order"/><Insert/></Action>"#,
        );
        let actions = ActionCompiler::new().compile_str(&xml).unwrap();
        let order = XmlName::new(Some("ord"), "Order", Some("http://example.com/orders"));
        assert_eq!(actions.action_for(&order), Some(&ActionKind::Insert));
    }

    #[test]
    fn test_empty_update_means_all_properties() {
        let xml = doc("<DefaultAction><Update/></DefaultAction>");
        let actions = ActionCompiler::new().compile_str(&xml).unwrap();
        assert_eq!(actions.default_action, Some(ActionKind::Update(vec![])));
    }

    #[test]
    fn test_wrong_version() {
        let xml = format!(r#"<Actions Version="1.0" xmlns="{}"/>"#, ACTIONS_NAMESPACE);
        let err = ActionCompiler::new().compile_str(&xml).unwrap_err();
        assert!(err.to_string().contains("Unsupported actions version"));
    }

    #[test]
    fn test_wrong_namespace() {
        let err = ActionCompiler::new()
            .compile_str(r#"<Actions Version="2.0"><DefaultAction><Insert/></DefaultAction></Actions>"#)
            .unwrap_err();
        assert!(matches!(err, Error::Actions(_)));
        assert!(err.to_string().contains("not in the actions namespace"));
    }

    #[test]
    fn test_duplicate_element_action() {
        let xml = doc(
            "<Action><ElementType Name=\"Order\"/><Insert/></Action><Action><ElementType Name=\"Order\"/><Delete/></Action>",
        );
        let err = ActionCompiler::new().compile_str(&xml).unwrap_err();
        assert!(err.to_string().contains("More than one action for element type 'Order'"));
    }

    #[test]
    fn test_two_actions_in_one_block() {
        let xml = doc("<DefaultAction><Insert/><Delete/></DefaultAction>");
        let err = ActionCompiler::new().compile_str(&xml).unwrap_err();
        assert!(err.to_string().contains("More than one action given"));
    }

    #[test]
    fn test_default_action_after_action_rejected() {
        let xml = doc(
            "<Action><ElementType Name=\"Order\"/><Insert/></Action><DefaultAction><Delete/></DefaultAction>",
        );
        let err = ActionCompiler::new().compile_str(&xml).unwrap_err();
        assert!(matches!(err, Error::Actions(_)));
        assert!(err.to_string().contains("'DefaultAction' is out of place"));
    }

    #[test]
    fn test_options_repeated_or_late_rejected() {
        let repeated = doc("<Options/><Options/>");
        let err = ActionCompiler::new().compile_str(&repeated).unwrap_err();
        assert!(err.to_string().contains("'Options' is out of place"));

        let late = doc("<DefaultAction><Insert/></DefaultAction><Options/>");
        let err = ActionCompiler::new().compile_str(&late).unwrap_err();
        assert!(err.to_string().contains("'Options' is out of place"));

        let twice = doc("<DefaultAction><Insert/></DefaultAction><DefaultAction><Delete/></DefaultAction>");
        let err = ActionCompiler::new().compile_str(&twice).unwrap_err();
        assert!(err.to_string().contains("'DefaultAction' is out of place"));
    }

    #[test]
    fn test_sections_in_order_accepted() {
        let xml = doc(
            "<Options/><DefaultAction><None/></DefaultAction><Action><ElementType Name=\"Order\"/><Insert/></Action><Action><ElementType Name=\"Line\"/><Delete/></Action>",
        );
        let actions = ActionCompiler::new().compile_str(&xml).unwrap();
        assert_eq!(actions.default_action, Some(ActionKind::None));
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_missing_action() {
        let xml = doc("<Action><ElementType Name=\"Order\"/></Action>");
        let err = ActionCompiler::new().compile_str(&xml).unwrap_err();
        assert!(err.to_string().contains("does not specify an action"));
    }

    #[test]
    fn test_out_of_place_element() {
        let xml = doc("<Insert/>");
        let err = ActionCompiler::new().compile_str(&xml).unwrap_err();
        assert!(err.to_string().contains("'Insert' is not allowed in Actions"));
    }

    #[test]
    fn test_truncated_document() {
        assert!(ActionCompiler::new().compile_str("").is_err());
    }

    #[test]
    fn test_unmapped_element_type() {
        let map = orders_map();
        let xml = doc("<Action><ElementType Name=\"Customer\"/><Insert/></Action>");
        let err = ActionCompiler::new().with_map(&map).compile_str(&xml).unwrap_err();
        assert!(err.to_string().contains("'Customer' is not mapped as a class"));
    }

    #[test]
    fn test_unmapped_update_property() {
        let map = orders_map();
        let ok = doc(
            "<Action><ElementType Name=\"Order\"/><Update><Attribute Name=\"number\"/><ElementType Name=\"Customer\"/></Update></Action>",
        );
        ActionCompiler::new().with_map(&map).compile_str(&ok).unwrap();

        let bad = doc(
            "<Action><ElementType Name=\"Order\"/><Update><Attribute Name=\"sku\"/></Update></Action>",
        );
        let err = ActionCompiler::new().with_map(&map).compile_str(&bad).unwrap_err();
        assert!(err.to_string().contains("attribute sku is not mapped for element type 'Order'"));
    }
}
