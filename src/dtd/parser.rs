//! DTD parser
//!
//! Reads an external subset, or the internal and external subsets named by
//! a document's `DOCTYPE` declaration, into a [`Dtd`].
//!
//! Parameter entities are expanded between declarations, inside
//! declarations (outside quoted literals) and inside entity-value literals.
//! External subsets and external parameter entities are loaded through the
//! [`Loader`], so catalog lookup and resource limits apply to them.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, trace};

use super::{
    Attribute, AttributeDefault, AttributeType, ContentType, Dtd, ElementType, EntityDecl, Group,
    GroupKind, NotationDecl, Occurs, Particle, Reference,
};
use crate::documents::read_doctype;
use crate::error::{DtdError, Error, Result};
use crate::loaders::Loader;
use crate::locations::Location;
use crate::names::{is_name_char, is_name_start_char};
use crate::namespaces::NamespaceContext;

/// Parser configuration
#[derive(Debug, Clone, Default)]
pub struct DtdParser {
    loader: Loader,
    namespaces: NamespaceContext,
}

impl DtdParser {
    /// Create a parser with a default loader and no namespace prefixes
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific loader (limits, catalog, remote policy)
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// Prefix/URI pairs used to resolve prefixed names
    pub fn with_namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Parse DTD text (an external subset)
    ///
    /// Relative system identifiers resolve against `base`.
    pub fn parse_str(&self, text: &str, base: Option<&Location>) -> Result<Dtd> {
        let mut state = ParseState::new(self);
        state.parse_subset(strip_text_decl(text), base, 0)?;
        state.finish()
    }

    /// Parse a DTD file
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Dtd> {
        let location = Location::path(path);
        let text = self.loader.load(&location)?;
        self.parse_str(&text, Some(&location))
    }

    /// Parse the DTD of an XML document
    ///
    /// The internal subset is read before the external one, so its entity
    /// and attribute declarations take precedence.
    pub fn parse_document(&self, xml: &str, base: Option<&Location>) -> Result<Dtd> {
        let doctype = read_doctype(xml)?
            .ok_or_else(|| DtdError::new("Document has no DOCTYPE declaration"))?;
        let decl = DoctypeDecl::parse(&doctype)?;
        debug!(root = %decl.name, system_id = ?decl.system_id, "parsing document type declaration");

        let mut state = ParseState::new(self);
        if let Some(subset) = &decl.internal_subset {
            state.parse_subset(subset, base, 0)?;
        }
        if let Some(system_id) = &decl.system_id {
            let location = self
                .loader
                .locate(decl.public_id.as_deref(), system_id, base)?;
            let text = self.loader.load(&location)?;
            state.parse_subset(strip_text_decl(&text), Some(&location), 1)?;
        }
        state.finish()
    }
}

/// Pieces of `<!DOCTYPE name ExternalID? [subset]?>`
#[derive(Debug, Clone, PartialEq, Eq)]
struct DoctypeDecl {
    name: String,
    public_id: Option<String>,
    system_id: Option<String>,
    internal_subset: Option<String>,
}

impl DoctypeDecl {
    fn parse(text: &str) -> Result<Self> {
        let mut cur = Cursor::new(text);
        cur.skip_ws();
        let name = cur
            .name()
            .ok_or_else(|| syntax("Expected root element type name in DOCTYPE"))?
            .to_string();
        cur.skip_ws();

        let (public_id, system_id) = if cur.starts_with("SYSTEM") || cur.starts_with("PUBLIC") {
            let (public_id, system_id) = external_id(&mut cur)?;
            (public_id, Some(system_id))
        } else {
            (None, None)
        };

        cur.skip_ws();
        let internal_subset = if cur.eat("[") {
            let rest = cur.rest();
            let end = rest
                .rfind(']')
                .ok_or_else(|| syntax("Unterminated internal subset in DOCTYPE"))?;
            Some(rest[..end].to_string())
        } else {
            None
        };

        Ok(Self {
            name,
            public_id,
            system_id,
            internal_subset,
        })
    }
}

/// Mutable state of one parse
struct ParseState<'p> {
    parser: &'p DtdParser,
    dtd: Dtd,
    /// Resource each parameter entity was declared in
    entity_bases: HashMap<String, Option<Location>>,
    /// Parameter entities currently being expanded
    open_entities: Vec<String>,
    expansions: usize,
    expanded_bytes: usize,
}

impl<'p> ParseState<'p> {
    fn new(parser: &'p DtdParser) -> Self {
        Self {
            parser,
            dtd: Dtd::new(),
            entity_bases: HashMap::new(),
            open_entities: Vec::new(),
            expansions: 0,
            expanded_bytes: 0,
        }
    }

    fn finish(mut self) -> Result<Dtd> {
        self.dtd.resolve()?;
        debug!(
            element_types = self.dtd.element_types.len(),
            entities = self.dtd.entities.len(),
            parameter_entities = self.dtd.parameter_entities.len(),
            "DTD parsed"
        );
        Ok(self.dtd)
    }

    /// Parse a sequence of markup declarations, PE references and conditional sections
    fn parse_subset(&mut self, text: &str, base: Option<&Location>, depth: usize) -> Result<()> {
        let mut cur = Cursor::new(text);
        loop {
            cur.skip_ws();
            if cur.at_end() {
                return Ok(());
            }

            if cur.starts_with("<!--") {
                if !cur.skip_past("-->") {
                    return Err(located(syntax("Unterminated comment"), base, cur.rest()));
                }
            } else if cur.starts_with("<?") {
                if !cur.skip_past("?>") {
                    return Err(located(
                        syntax("Unterminated processing instruction"),
                        base,
                        cur.rest(),
                    ));
                }
            } else if cur.eat("<![") {
                self.conditional_section(&mut cur, base, depth)?;
            } else if cur.starts_with("<!") {
                let start = cur.pos;
                let end = declaration_end(text, start).ok_or_else(|| {
                    located(
                        syntax("Unterminated markup declaration"),
                        base,
                        &text[start..],
                    )
                })?;
                cur.pos = end;
                self.markup_declaration(&text[start..end], base, depth)?;
            } else if cur.eat("%") {
                let name = cur
                    .name()
                    .filter(|_| cur.eat(";"))
                    .ok_or_else(|| {
                        located(
                            syntax("Malformed parameter entity reference"),
                            base,
                            cur.rest(),
                        )
                    })?
                    .to_string();
                let (replacement, entity_base) = self
                    .parameter_entity(&name, depth + 1)
                    .map_err(|e| located(e, base, &format!("%{};", name)))?;
                trace!(entity = %name, "expanding parameter entity between declarations");

                self.open_entities.push(name);
                let result = self.parse_subset(
                    &replacement,
                    entity_base.as_ref().or(base),
                    depth + 1,
                );
                self.open_entities.pop();
                result?;
            } else {
                return Err(located(syntax("Unexpected text in DTD"), base, cur.rest()));
            }
        }
    }

    /// `<![ keyword [ body ]]>`, with the cursor just past `<![`
    fn conditional_section(
        &mut self,
        cur: &mut Cursor<'_>,
        base: Option<&Location>,
        depth: usize,
    ) -> Result<()> {
        let rest = cur.rest();
        let open = rest.find('[').ok_or_else(|| {
            located(syntax("Malformed conditional section"), base, rest)
        })?;
        let keyword = self.expand_outside_literals(&rest[..open], base, depth)?;
        let keyword = keyword.trim().to_string();
        cur.pos += open + 1;

        let body_start = cur.pos;
        let mut nesting = 1usize;
        let body_end = loop {
            let rest = cur.rest();
            match (rest.find("<!["), rest.find("]]>")) {
                (_, None) => {
                    return Err(located(
                        syntax("Unterminated conditional section"),
                        base,
                        &cur.text[body_start..],
                    ))
                }
                (Some(o), Some(c)) if o < c => {
                    nesting += 1;
                    cur.pos += o + 3;
                }
                (_, Some(c)) => {
                    nesting -= 1;
                    let end = cur.pos + c;
                    cur.pos += c + 3;
                    if nesting == 0 {
                        break end;
                    }
                }
            }
        };

        let body = &cur.text[body_start..body_end];
        match keyword.as_str() {
            "INCLUDE" => self.parse_subset(body, base, depth),
            "IGNORE" => {
                trace!(bytes = body.len(), "skipping IGNORE section");
                Ok(())
            }
            other => Err(located(
                syntax(format!(
                    "Conditional section keyword must be INCLUDE or IGNORE, found '{}'",
                    other
                )),
                base,
                body,
            )),
        }
    }

    fn markup_declaration(&mut self, raw: &str, base: Option<&Location>, depth: usize) -> Result<()> {
        let expanded = self
            .expand_outside_literals(raw, base, depth)
            .map_err(|e| located(e, base, raw))?;
        self.declaration(&expanded, base, depth)
            .map_err(|e| located(e, base, raw))
    }

    fn declaration(&mut self, decl: &str, base: Option<&Location>, depth: usize) -> Result<()> {
        let mut cur = Cursor::new(decl);
        if cur.eat("<!ELEMENT") {
            self.element_decl(&mut cur)
        } else if cur.eat("<!ATTLIST") {
            self.attlist_decl(&mut cur)
        } else if cur.eat("<!ENTITY") {
            self.entity_decl(&mut cur, base, depth)
        } else if cur.eat("<!NOTATION") {
            self.notation_decl(&mut cur)
        } else {
            Err(syntax("Unknown markup declaration"))
        }
    }

    fn element_decl(&mut self, cur: &mut Cursor<'_>) -> Result<()> {
        require_ws(cur)?;
        let name = expect_name(cur, "element type name")?;
        require_ws(cur)?;
        let (content_type, content) = self.content_spec(cur)?;
        cur.skip_ws();
        expect_close(cur)?;

        let name = self.parser.namespaces.resolve(name);
        debug!(element_type = %name, content = %content_type, "element type declared");
        let element_type = match content {
            Some(group) => ElementType::with_content(name, content_type, group),
            None => ElementType::new(name, content_type),
        };
        self.dtd.add_element_type(element_type)
    }

    fn content_spec(&self, cur: &mut Cursor<'_>) -> Result<(ContentType, Option<Group>)> {
        if cur.eat("EMPTY") {
            return Ok((ContentType::Empty, None));
        }
        if cur.eat("ANY") {
            return Ok((ContentType::Any, None));
        }
        if !cur.eat("(") {
            return Err(syntax(
                "Expected EMPTY, ANY or '(' in content specification",
            ));
        }
        cur.skip_ws();
        if cur.eat("#PCDATA") {
            return mixed_content(cur);
        }
        let group = self.children_group(cur, 1)?;
        Ok((ContentType::Element, Some(group)))
    }

    /// Children content model, with the cursor just past the opening parenthesis
    fn children_group(&self, cur: &mut Cursor<'_>, depth: usize) -> Result<Group> {
        self.parser.loader.limits().check_content_depth(depth)?;

        let mut kind: Option<GroupKind> = None;
        let mut members = Vec::new();
        loop {
            cur.skip_ws();
            let particle = if cur.eat("(") {
                Particle::Group(self.children_group(cur, depth + 1)?)
            } else {
                let name = expect_name(cur, "element type name in content model")?;
                Particle::Reference(Reference::new(name, occurrence(cur)))
            };
            members.push(particle);

            cur.skip_ws();
            match cur.bump() {
                Some(')') => break,
                Some(sep @ (',' | '|')) => {
                    let found = GroupKind::from_separator(sep);
                    match kind {
                        None => kind = found,
                        Some(existing) if Some(existing) != found => {
                            return Err(syntax("Cannot mix ',' and '|' in one content-model group"))
                        }
                        Some(_) => {}
                    }
                }
                _ => return Err(syntax("Expected ',', '|' or ')' in content model")),
            }
        }

        Ok(Group {
            kind: kind.unwrap_or_default(),
            members,
            occurs: occurrence(cur),
        })
    }

    fn attlist_decl(&mut self, cur: &mut Cursor<'_>) -> Result<()> {
        require_ws(cur)?;
        let element = expect_name(cur, "element type name")?;
        loop {
            let had_ws = cur.skip_ws();
            if cur.eat(">") {
                break;
            }
            if cur.at_end() {
                return Err(syntax("Expected '>' to close declaration"));
            }
            if !had_ws {
                return Err(syntax("Expected whitespace before attribute definition"));
            }

            let attr_name = expect_name(cur, "attribute name")?;
            require_ws(cur)?;
            let (attribute_type, enumeration) = attribute_type(cur)?;
            require_ws(cur)?;
            let default = default_decl(cur)?;

            let mut attribute = Attribute::new(
                self.parser.namespaces.resolve(attr_name),
                attribute_type,
                default,
            );
            attribute.enumeration = enumeration;
            trace!(element_type = element, attribute = attr_name, "attribute defined");
            self.dtd.add_attribute(element, attribute);
        }
        Ok(())
    }

    fn entity_decl(&mut self, cur: &mut Cursor<'_>, base: Option<&Location>, depth: usize) -> Result<()> {
        require_ws(cur)?;
        let parameter = if cur.eat("%") {
            require_ws(cur)?;
            true
        } else {
            false
        };
        let name = expect_name(cur, "entity name")?;
        require_ws(cur)?;

        let decl = if let Some(value) = cur.literal() {
            let value = self.expand_entity_value(value, base, depth)?;
            EntityDecl::internal(value)
        } else {
            let (public_id, system_id) = external_id(cur)?;
            let had_ws = cur.skip_ws();
            let ndata = if had_ws && cur.eat("NDATA") {
                if parameter {
                    return Err(syntax("Parameter entities cannot be unparsed"));
                }
                require_ws(cur)?;
                Some(expect_name(cur, "notation name")?.to_string())
            } else {
                None
            };
            EntityDecl {
                value: None,
                public_id,
                system_id: Some(system_id),
                ndata,
            }
        };
        cur.skip_ws();
        expect_close(cur)?;

        trace!(entity = name, parameter, external = decl.is_external(), "entity declared");
        if parameter && !self.dtd.parameter_entities.contains_key(name) {
            self.entity_bases.insert(name.to_string(), base.cloned());
        }
        self.dtd.add_entity(name, decl, parameter);
        Ok(())
    }

    fn notation_decl(&mut self, cur: &mut Cursor<'_>) -> Result<()> {
        require_ws(cur)?;
        let name = expect_name(cur, "notation name")?;
        require_ws(cur)?;

        let decl = if cur.eat("SYSTEM") {
            require_ws(cur)?;
            NotationDecl {
                public_id: None,
                system_id: Some(expect_literal(cur)?.to_string()),
            }
        } else if cur.eat("PUBLIC") {
            require_ws(cur)?;
            let public_id = expect_literal(cur)?.to_string();
            cur.skip_ws();
            let system_id = cur.literal().map(str::to_string);
            NotationDecl {
                public_id: Some(public_id),
                system_id,
            }
        } else {
            return Err(syntax("Expected SYSTEM or PUBLIC in notation declaration"));
        };
        cur.skip_ws();
        expect_close(cur)?;
        self.dtd.add_notation(name, decl)
    }

    /// Replacement text of a parameter entity and the location its own
    /// references resolve against
    fn parameter_entity(&mut self, name: &str, depth: usize) -> Result<(String, Option<Location>)> {
        let parser = self.parser;
        let limits = parser.loader.limits();
        limits.check_entity_depth(depth)?;
        self.expansions += 1;
        limits.check_entity_expansions(self.expansions)?;

        if self.open_entities.iter().any(|open| open == name) {
            return Err(syntax(format!(
                "Parameter entity '{}' references itself",
                name
            )));
        }

        let decl = self
            .dtd
            .parameter_entities
            .get(name)
            .cloned()
            .ok_or_else(|| syntax(format!("Parameter entity '{}' is not declared", name)))?;
        let declared_in = self.entity_bases.get(name).cloned().flatten();

        let (text, base) = match (decl.value, decl.system_id) {
            (Some(value), _) => (value, declared_in),
            (None, Some(system_id)) => {
                let location = parser.loader.locate(
                    decl.public_id.as_deref(),
                    &system_id,
                    declared_in.as_ref(),
                )?;
                debug!(entity = name, location = %location, "loading external parameter entity");
                let text = parser.loader.load(&location)?;
                (strip_text_decl(&text).to_string(), Some(location))
            }
            (None, None) => {
                return Err(syntax(format!(
                    "Parameter entity '{}' has no replacement text",
                    name
                )))
            }
        };

        self.expanded_bytes += text.len();
        limits.check_entity_expansion_size(self.expanded_bytes)?;
        Ok((text, base))
    }

    /// Expand PE references that sit outside quoted literals
    fn expand_outside_literals(&mut self, text: &str, base: Option<&Location>, depth: usize) -> Result<String> {
        if !text.contains('%') {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut quote: Option<char> = None;
        let mut cur = Cursor::new(text);
        while let Some(c) = cur.bump() {
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                    out.push(c);
                }
                None if c == '"' || c == '\'' => {
                    quote = Some(c);
                    out.push(c);
                }
                None if c == '%' && cur.peek().is_some_and(is_name_start_char) => {
                    let name = pe_reference_name(&mut cur)?;
                    let (replacement, entity_base) = self.parameter_entity(&name, depth + 1)?;
                    self.open_entities.push(name);
                    let inner = self.expand_outside_literals(
                        &replacement,
                        entity_base.as_ref().or(base),
                        depth + 1,
                    );
                    self.open_entities.pop();
                    out.push(' ');
                    out.push_str(&inner?);
                    out.push(' ');
                }
                None => out.push(c),
            }
        }
        Ok(out)
    }

    /// Expand PE references and character references in an entity value
    fn expand_entity_value(&mut self, value: &str, base: Option<&Location>, depth: usize) -> Result<String> {
        let mut out = String::with_capacity(value.len());
        let mut cur = Cursor::new(value);
        while let Some(c) = cur.bump() {
            if c == '%' && cur.peek().is_some_and(is_name_start_char) {
                let name = pe_reference_name(&mut cur)?;
                let (replacement, entity_base) = self.parameter_entity(&name, depth + 1)?;
                self.open_entities.push(name);
                let inner = self.expand_entity_value(
                    &replacement,
                    entity_base.as_ref().or(base),
                    depth + 1,
                );
                self.open_entities.pop();
                out.push_str(&inner?);
            } else if c == '&' && cur.eat("#") {
                out.push(char_reference(&mut cur)?);
            } else {
                out.push(c);
            }
        }
        Ok(out)
    }
}

/// Character cursor over declaration text
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Skip whitespace, reporting whether there was any
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|c| matches!(c, ' ' | '\t' | '\r' | '\n')) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn skip_past(&mut self, s: &str) -> bool {
        match self.rest().find(s) {
            Some(idx) => {
                self.pos += idx + s.len();
                true
            }
            None => false,
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.text[start..self.pos]
    }

    fn name(&mut self) -> Option<&'a str> {
        if !self.peek().is_some_and(is_name_start_char) {
            return None;
        }
        Some(self.take_while(is_name_char))
    }

    fn nmtoken(&mut self) -> Option<&'a str> {
        let token = self.take_while(is_name_char);
        (!token.is_empty()).then_some(token)
    }

    /// Quoted literal without its quotes
    fn literal(&mut self) -> Option<&'a str> {
        let quote = self.peek().filter(|c| *c == '"' || *c == '\'')?;
        let body = &self.rest()[1..];
        let end = body.find(quote)?;
        self.pos += end + 2;
        Some(&body[..end])
    }
}

fn syntax(message: impl Into<String>) -> Error {
    Error::Dtd(DtdError::new(message))
}

/// Attach the resource and the offending text to a DTD error
fn located(err: Error, base: Option<&Location>, declaration: &str) -> Error {
    match err {
        Error::Dtd(mut e) => {
            if e.location.is_none() {
                if let Some(base) = base {
                    e = e.with_location(base.to_string());
                }
            }
            if e.declaration.is_none() {
                e = e.with_declaration(snippet(declaration));
            }
            Error::Dtd(e)
        }
        other => other,
    }
}

fn snippet(text: &str) -> String {
    const MAX: usize = 200;
    let text = text.trim();
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let mut s: String = text.chars().take(MAX).collect();
        s.push_str("...");
        s
    }
}

/// Byte offset just past the `>` closing the declaration at `start`
fn declaration_end(text: &str, start: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text[start..].char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(start + i + 1),
            None => {}
        }
    }
    None
}

/// Drop a leading byte-order mark and text declaration
fn strip_text_decl(text: &str) -> &str {
    let text = text.trim_start_matches('\u{feff}');
    if let Some(after) = text.strip_prefix("<?xml") {
        if after.starts_with(char::is_whitespace) {
            if let Some(end) = after.find("?>") {
                return &after[end + 2..];
            }
        }
    }
    text
}

fn require_ws(cur: &mut Cursor<'_>) -> Result<()> {
    if cur.skip_ws() {
        Ok(())
    } else {
        Err(syntax("Expected whitespace"))
    }
}

fn expect_name<'a>(cur: &mut Cursor<'a>, what: &str) -> Result<&'a str> {
    cur.name()
        .ok_or_else(|| syntax(format!("Expected {}", what)))
}

fn expect_literal<'a>(cur: &mut Cursor<'a>) -> Result<&'a str> {
    cur.literal()
        .ok_or_else(|| syntax("Expected quoted literal"))
}

fn expect_close(cur: &mut Cursor<'_>) -> Result<()> {
    if cur.eat(">") {
        Ok(())
    } else {
        Err(syntax("Expected '>' to close declaration"))
    }
}

/// Name and terminating `;` of a PE reference, with the cursor past `%`
fn pe_reference_name(cur: &mut Cursor<'_>) -> Result<String> {
    let name = expect_name(cur, "parameter entity name")?;
    if !cur.eat(";") {
        return Err(syntax(format!(
            "Parameter entity reference '%{}' is missing ';'",
            name
        )));
    }
    Ok(name.to_string())
}

/// Decode `&#...;` with the cursor past `&#`
fn char_reference(cur: &mut Cursor<'_>) -> Result<char> {
    let hex = cur.eat("x");
    let digits = cur.take_while(|c| c.is_ascii_hexdigit());
    if !cur.eat(";") {
        return Err(syntax("Malformed character reference"));
    }
    let code = if hex {
        u32::from_str_radix(digits, 16)
    } else {
        digits.parse::<u32>()
    };
    code.ok()
        .and_then(char::from_u32)
        .ok_or_else(|| syntax(format!("Invalid character reference '&#{}{};'", if hex { "x" } else { "" }, digits)))
}

/// Optional `?`, `*` or `+` after a particle
fn occurrence(cur: &mut Cursor<'_>) -> Occurs {
    match cur.peek() {
        Some(c @ ('?' | '*' | '+')) => {
            cur.bump();
            Occurs::from_indicator(Some(c)).unwrap_or_default()
        }
        _ => Occurs::once(),
    }
}

/// `(#PCDATA)`, `(#PCDATA)*` or `(#PCDATA | a | b)*`, with the cursor past `#PCDATA`
fn mixed_content(cur: &mut Cursor<'_>) -> Result<(ContentType, Option<Group>)> {
    let mut group = Group::new(GroupKind::Choice);
    loop {
        cur.skip_ws();
        if cur.eat(")") {
            break;
        }
        if !cur.eat("|") {
            return Err(syntax("Expected '|' or ')' in mixed content"));
        }
        cur.skip_ws();
        let name = expect_name(cur, "element type name in mixed content")?;
        if group.references().iter().any(|r| r.element_type == name) {
            return Err(syntax(format!(
                "Element type '{}' appears more than once in mixed content",
                name
            )));
        }
        group.add_reference(name, Occurs::once());
    }

    let starred = cur.eat("*");
    if group.is_empty() {
        return Ok((ContentType::PCData, None));
    }
    if !starred {
        return Err(syntax("Mixed content naming element types must end with ')*'"));
    }
    Ok((
        ContentType::Mixed,
        Some(group.with_occurs(Occurs::zero_or_more())),
    ))
}

fn attribute_type(cur: &mut Cursor<'_>) -> Result<(AttributeType, Vec<String>)> {
    if cur.eat("(") {
        let values = token_list(cur, Cursor::nmtoken)?;
        return Ok((AttributeType::Enumerated, values));
    }

    let keyword = expect_name(cur, "attribute type")?;
    let attribute_type = AttributeType::from_keyword(keyword)
        .ok_or_else(|| syntax(format!("Unknown attribute type '{}'", keyword)))?;
    if attribute_type == AttributeType::Notation {
        require_ws(cur)?;
        if !cur.eat("(") {
            return Err(syntax("Expected '(' after NOTATION"));
        }
        let names = token_list(cur, Cursor::name)?;
        return Ok((attribute_type, names));
    }
    Ok((attribute_type, Vec::new()))
}

/// `a | b | c)` with the cursor past the opening parenthesis
fn token_list<'a>(
    cur: &mut Cursor<'a>,
    token: fn(&mut Cursor<'a>) -> Option<&'a str>,
) -> Result<Vec<String>> {
    let mut values = Vec::new();
    loop {
        cur.skip_ws();
        let value = token(cur).ok_or_else(|| syntax("Expected token in enumeration"))?;
        values.push(value.to_string());
        cur.skip_ws();
        match cur.bump() {
            Some(')') => return Ok(values),
            Some('|') => {}
            _ => return Err(syntax("Expected '|' or ')' in enumeration")),
        }
    }
}

fn default_decl(cur: &mut Cursor<'_>) -> Result<AttributeDefault> {
    if cur.eat("#REQUIRED") {
        Ok(AttributeDefault::Required)
    } else if cur.eat("#IMPLIED") {
        Ok(AttributeDefault::Implied)
    } else if cur.eat("#FIXED") {
        require_ws(cur)?;
        Ok(AttributeDefault::Fixed(expect_literal(cur)?.to_string()))
    } else {
        Ok(AttributeDefault::Default(expect_literal(cur)?.to_string()))
    }
}

/// `SYSTEM "sys"` or `PUBLIC "pub" "sys"`
fn external_id(cur: &mut Cursor<'_>) -> Result<(Option<String>, String)> {
    if cur.eat("SYSTEM") {
        require_ws(cur)?;
        Ok((None, expect_literal(cur)?.to_string()))
    } else if cur.eat("PUBLIC") {
        require_ws(cur)?;
        let public_id = expect_literal(cur)?.to_string();
        require_ws(cur)?;
        let system_id = expect_literal(cur)?.to_string();
        Ok((Some(public_id), system_id))
    } else {
        Err(syntax("Expected a quoted value, SYSTEM or PUBLIC"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use std::fs;
    use tempfile::TempDir;

    const ORDERS: &str = r#"
<!-- purchase orders -->
<!ELEMENT Orders (Order*)>
<!ELEMENT Order (Customer, Line+, Note?)>
<!ATTLIST Order
    number CDATA #REQUIRED
    status (open | closed) "open"
    refs IDREFS #IMPLIED>
<!ELEMENT Customer (#PCDATA)>
<!ELEMENT Line (Part, Quantity)>
<!ELEMENT Part (#PCDATA)>
<!ELEMENT Quantity (#PCDATA)>
<!ELEMENT Note (#PCDATA | Part)*>
<?processing instruction?>
"#;

    #[test]
    fn test_parse_declarations() {
        let dtd = DtdParser::new().parse_str(ORDERS, None).unwrap();
        assert_eq!(dtd.element_types.len(), 7);

        let order = dtd.element_type("Order").unwrap();
        assert_eq!(order.content_type, ContentType::Element);
        assert_eq!(
            order.content.as_ref().unwrap().to_string(),
            "(Customer, Line+, Note?)"
        );
        assert_eq!(order.attributes.len(), 3);
        assert_eq!(order.attributes["status"].attribute_type, AttributeType::Enumerated);
        assert_eq!(order.attributes["status"].enumeration, vec!["open", "closed"]);
        assert_eq!(
            order.attributes["status"].default,
            AttributeDefault::Default("open".to_string())
        );
        assert!(order.attributes["refs"].attribute_type.is_multi_valued());
        assert_eq!(order.parents.iter().collect::<Vec<_>>(), vec!["Orders"]);

        let note = dtd.element_type("Note").unwrap();
        assert_eq!(note.content_type, ContentType::Mixed);
        assert_eq!(
            note.content.as_ref().unwrap().child_occurrences()["Part"],
            Occurs::zero_or_more()
        );

        let part = dtd.element_type("Part").unwrap();
        assert_eq!(part.content_type, ContentType::PCData);
        assert_eq!(part.parents.len(), 2);

        assert_eq!(dtd.roots().map(|r| r.qualified_name()).collect::<Vec<_>>(), vec!["Orders"]);
    }

    #[test]
    fn test_parameter_entities() {
        let text = r#"
<!ENTITY % name "(#PCDATA)">
<!ENTITY % person.content "First, Last">
<!ENTITY % decls "<!ELEMENT First %name;> <!ELEMENT Last %name;>">
<!ELEMENT Person (%person.content;)>
%decls;
"#;
        let dtd = DtdParser::new().parse_str(text, None).unwrap();
        assert_eq!(
            dtd.element_type("Person").unwrap().content.as_ref().unwrap().to_string(),
            "(First, Last)"
        );
        assert_eq!(dtd.element_type("First").unwrap().content_type, ContentType::PCData);
    }

    #[test]
    fn test_conditional_sections() {
        let text = r#"
<!ENTITY % draft "IGNORE">
<!ENTITY % final "INCLUDE">
<![%draft;[
  <!ELEMENT Doc (Comment*)>
  <![INCLUDE[ <!ELEMENT Comment (#PCDATA)> ]]>
]]>
<![%final;[
  <!ELEMENT Doc EMPTY>
]]>
"#;
        let dtd = DtdParser::new().parse_str(text, None).unwrap();
        assert_eq!(dtd.element_types.len(), 1);
        assert_eq!(dtd.element_type("Doc").unwrap().content_type, ContentType::Empty);
    }

    #[test]
    fn test_entity_value_char_refs() {
        let text = r#"
<!ENTITY % pct "&#37;">
<!ENTITY co "Acme &#x26; Sons">
<!ELEMENT a EMPTY>
"#;
        let dtd = DtdParser::new().parse_str(text, None).unwrap();
        assert_eq!(dtd.parameter_entities["pct"].value.as_deref(), Some("%"));
        assert_eq!(dtd.entities["co"].value.as_deref(), Some("Acme & Sons"));
    }

    #[test]
    fn test_first_entity_declaration_wins() {
        let text = r#"
<!ENTITY % t "EMPTY">
<!ENTITY % t "ANY">
<!ELEMENT a %t;>
"#;
        let dtd = DtdParser::new().parse_str(text, None).unwrap();
        assert_eq!(dtd.element_type("a").unwrap().content_type, ContentType::Empty);
    }

    #[test]
    fn test_mixed_separators_rejected() {
        let err = DtdParser::new()
            .parse_str("<!ELEMENT a (b, c | d)>", None)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Cannot mix"));
        assert!(msg.contains("<!ELEMENT a (b, c | d)>"));
    }

    #[test]
    fn test_undeclared_child_rejected() {
        let err = DtdParser::new()
            .parse_str("<!ELEMENT a (b)>", None)
            .unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_duplicate_element_rejected() {
        let text = "<!ELEMENT a EMPTY>\n<!ELEMENT a ANY>";
        assert!(DtdParser::new().parse_str(text, None).is_err());
    }

    #[test]
    fn test_undeclared_parameter_entity() {
        let err = DtdParser::new().parse_str("%missing;", None).unwrap_err();
        assert!(err.to_string().contains("'missing' is not declared"));
    }

    #[test]
    fn test_recursive_parameter_entity() {
        let text = r#"<!ENTITY % a "%b;"> "#;
        // %b; is undeclared at the time %a; is declared
        assert!(DtdParser::new().parse_str(text, None).is_err());

        let text = r#"
<!ENTITY % loop "<!ELEMENT a EMPTY> &#37;loop;">
%loop;
"#;
        let err = DtdParser::new().parse_str(text, None).unwrap_err();
        assert!(err.to_string().contains("references itself"));
    }

    #[test]
    fn test_content_depth_limit() {
        let limits = Limits {
            max_content_depth: 2,
            ..Limits::default()
        };
        let parser = DtdParser::new().with_loader(Loader::new().with_limits(limits));
        let text = "<!ELEMENT a (((b)))>\n<!ELEMENT b EMPTY>";
        assert!(matches!(
            parser.parse_str(text, None),
            Err(Error::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_namespace_prefixes_resolved() {
        let mut ns = NamespaceContext::new();
        ns.add_prefix("ord", "http://example.com/orders").unwrap();
        let text = "<!ELEMENT ord:Order (ord:Item*)>\n<!ELEMENT ord:Item (#PCDATA)>";
        let dtd = DtdParser::new().with_namespaces(ns).parse_str(text, None).unwrap();
        let order = dtd.element_type("ord:Order").unwrap();
        assert_eq!(order.name.namespace.as_deref(), Some("http://example.com/orders"));
        assert_eq!(order.name.local_name, "Order");
    }

    #[test]
    fn test_external_subset_and_entities() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("common")).unwrap();
        fs::write(
            dir.path().join("common/types.ent"),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!ELEMENT Name (#PCDATA)>",
        )
        .unwrap();
        fs::write(
            dir.path().join("people.dtd"),
            "<!ENTITY % types SYSTEM \"common/types.ent\">\n%types;\n<!ELEMENT People (Name*)>",
        )
        .unwrap();

        let dtd = DtdParser::new()
            .parse_file(dir.path().join("people.dtd"))
            .unwrap();
        assert!(dtd.element_type("Name").is_some());
        assert!(dtd.element_type("People").is_some());
    }

    #[test]
    fn test_parse_document_internal_subset_first() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("doc.dtd"),
            "<!ENTITY % body \"ANY\">\n<!ELEMENT doc %body;>",
        )
        .unwrap();
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE doc SYSTEM "doc.dtd" [
  <!ENTITY % body "(#PCDATA)">
]>
<doc>text</doc>"#;

        let base = Location::path(dir.path().join("doc.xml"));
        let dtd = DtdParser::new().parse_document(xml, Some(&base)).unwrap();
        assert_eq!(dtd.element_type("doc").unwrap().content_type, ContentType::PCData);
    }

    #[test]
    fn test_parse_document_without_doctype() {
        assert!(DtdParser::new().parse_document("<doc/>", None).is_err());
    }

    #[test]
    fn test_doctype_pieces() {
        let decl = DoctypeDecl::parse(
            r#"doc PUBLIC "-//Example//DTD Doc//EN" "doc.dtd" [ <!ELEMENT doc EMPTY> ]"#,
        )
        .unwrap();
        assert_eq!(decl.name, "doc");
        assert_eq!(decl.public_id.as_deref(), Some("-//Example//DTD Doc//EN"));
        assert_eq!(decl.system_id.as_deref(), Some("doc.dtd"));
        assert_eq!(decl.internal_subset.as_deref().map(str::trim), Some("<!ELEMENT doc EMPTY>"));
    }
}
