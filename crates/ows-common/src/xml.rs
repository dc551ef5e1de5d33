//! Owned XML element tree with namespace-qualified lookup.
//!
//! Parsing goes through `quick_xml::NsReader`, so every element and attribute
//! carries its resolved namespace URI rather than the prefix used on the wire.
//! Serialization assigns prefixes from a [`Namespaces`] table and declares
//! every namespace in use once, on the outermost element written.

use std::collections::BTreeSet;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use quick_xml::Writer;

use crate::error::{OwsError, OwsResult};
use crate::namespaces::{Namespaces, XML};

/// Namespace-qualified name. Unqualified names have no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: &str, local: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            local: local.to_string(),
        }
    }

    pub fn unqualified(local: &str) -> Self {
        Self {
            namespace: None,
            local: local.to_string(),
        }
    }

    /// Match on local name and namespace (`None` matches only unqualified names).
    pub fn is(&self, local: &str, namespace: Option<&str>) -> bool {
        self.local == local && self.namespace.as_deref() == namespace
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Character data, escaped on output.
    Text(String),
    /// Pre-serialized markup, written verbatim.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(namespace: &str, local: &str) -> Self {
        Self::from_name(QName::new(namespace, local))
    }

    pub fn unqualified(local: &str) -> Self {
        Self::from_name(QName::unqualified(local))
    }

    pub fn from_name(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    // === Builders ===

    pub fn with_attr(mut self, local: &str, value: impl Into<String>) -> Self {
        self.set_attr(QName::unqualified(local), value);
        self
    }

    pub fn with_ns_attr(mut self, namespace: &str, local: &str, value: impl Into<String>) -> Self {
        self.set_attr(QName::new(namespace, local), value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn with_raw(mut self, markup: impl Into<String>) -> Self {
        self.children.push(Node::Raw(markup.into()));
        self
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Set an attribute, replacing any existing value under the same name.
    pub fn set_attr(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    // === Lookup ===

    pub fn local_name(&self) -> &str {
        &self.name.local
    }

    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace.as_deref()
    }

    pub fn is(&self, local: &str, namespace: Option<&str>) -> bool {
        self.name.is(local, namespace)
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn first_element(&self) -> Option<&Element> {
        self.elements().next()
    }

    pub fn has_elements(&self) -> bool {
        self.first_element().is_some()
    }

    /// First child with the given local name and namespace.
    pub fn child(&self, local: &str, namespace: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(local, Some(namespace)))
    }

    pub fn children_named<'a>(
        &'a self,
        local: &'a str,
        namespace: &'a str,
    ) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.is(local, Some(namespace)))
    }

    /// First child with the given local name in any namespace.
    ///
    /// WPS 1.0.0 leaves several nested elements unqualified and servers differ
    /// on OWS versions, so most protocol lookups go through this.
    pub fn child_local(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.name.local == local)
    }

    pub fn children_local<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name.local == local)
    }

    /// Unqualified attribute value.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attr_in(local, None)
    }

    pub fn attr_ns(&self, local: &str, namespace: &str) -> Option<&str> {
        self.attr_in(local, Some(namespace))
    }

    /// Attribute by local name, qualified or not.
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.local == local)
            .map(|a| a.value.as_str())
    }

    fn attr_in(&self, local: &str, namespace: Option<&str>) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(local, namespace))
            .map(|a| a.value.as_str())
    }

    /// Concatenated character data of the direct children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) | Node::Raw(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Trimmed text of the first child with `local` name, if non-empty.
    pub fn child_text(&self, local: &str) -> Option<String> {
        self.child_local(local)
            .map(|e| e.text().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    // === Serialization ===

    /// Serialize as a complete document with an XML declaration.
    pub fn to_bytes(&self, namespaces: &Namespaces) -> OwsResult<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| OwsError::Serialize(e.to_string()))?;
        self.write_fragment(&mut writer, namespaces)?;
        Ok(writer.into_inner())
    }

    /// Serialize this element alone, declaring the namespaces it uses.
    pub fn to_xml_string(&self, namespaces: &Namespaces) -> OwsResult<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_fragment(&mut writer, namespaces)?;
        String::from_utf8(writer.into_inner()).map_err(|e| OwsError::Serialize(e.to_string()))
    }

    /// Serialized content of this element, each child element self-contained.
    pub fn inner_xml(&self, namespaces: &Namespaces) -> OwsResult<String> {
        let mut out = String::new();
        for node in &self.children {
            match node {
                Node::Element(element) => out.push_str(&element.to_xml_string(namespaces)?),
                Node::Text(text) => out.push_str(&quick_xml::escape::escape(text.as_str())),
                Node::Raw(markup) => out.push_str(markup),
            }
        }
        Ok(out)
    }

    fn write_fragment(&self, writer: &mut Writer<Vec<u8>>, namespaces: &Namespaces) -> OwsResult<()> {
        let mut used = BTreeSet::new();
        self.collect_namespaces(&mut used);
        let prefixes = PrefixMap::assign(&used, namespaces);
        self.write_with(writer, &prefixes, true)
    }

    fn collect_namespaces(&self, used: &mut BTreeSet<String>) {
        if let Some(ns) = &self.name.namespace {
            used.insert(ns.clone());
        }
        for attr in &self.attributes {
            if let Some(ns) = &attr.name.namespace {
                used.insert(ns.clone());
            }
        }
        for child in self.elements() {
            child.collect_namespaces(used);
        }
    }

    fn write_with(
        &self,
        writer: &mut Writer<Vec<u8>>,
        prefixes: &PrefixMap,
        declare: bool,
    ) -> OwsResult<()> {
        let name = prefixes.qualify(&self.name);
        let mut start = BytesStart::new(name.clone());
        if declare {
            for (uri, prefix) in prefixes.declarations() {
                let key = format!("xmlns:{}", prefix);
                start.push_attribute((key.as_str(), uri));
            }
        }
        for attr in &self.attributes {
            let key = prefixes.qualify(&attr.name);
            start.push_attribute((key.as_str(), attr.value.as_str()));
        }

        if self.children.is_empty() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| OwsError::Serialize(e.to_string()));
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| OwsError::Serialize(e.to_string()))?;
        for node in &self.children {
            match node {
                Node::Element(child) => child.write_with(writer, prefixes, false)?,
                Node::Text(text) => writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(|e| OwsError::Serialize(e.to_string()))?,
                Node::Raw(markup) => writer
                    .write_event(Event::Text(BytesText::from_escaped(markup.as_str())))
                    .map_err(|e| OwsError::Serialize(e.to_string()))?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(|e| OwsError::Serialize(e.to_string()))
    }
}

/// Namespace URI → prefix assignments for one serialization pass.
struct PrefixMap {
    entries: Vec<(String, String)>,
}

impl PrefixMap {
    fn assign(used: &BTreeSet<String>, namespaces: &Namespaces) -> Self {
        let mut generated = 0;
        let entries = used
            .iter()
            .map(|uri| {
                let prefix = if uri == XML {
                    "xml".to_string()
                } else if let Some(prefix) = namespaces.prefix_for(uri) {
                    prefix.to_string()
                } else {
                    generated += 1;
                    format!("ns{}", generated)
                };
                (uri.clone(), prefix)
            })
            .collect();
        Self { entries }
    }

    fn prefix(&self, uri: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(bound, _)| bound == uri)
            .map(|(_, prefix)| prefix.as_str())
    }

    fn qualify(&self, name: &QName) -> String {
        match name.namespace.as_deref().and_then(|uri| self.prefix(uri)) {
            Some(prefix) => format!("{}:{}", prefix, name.local),
            None => name.local.clone(),
        }
    }

    /// `xml` is bound implicitly and never declared.
    fn declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(uri, _)| uri != XML)
            .map(|(uri, prefix)| (uri.as_str(), prefix.as_str()))
    }
}

/// Resolved namespace detached from the reader's borrow.
enum Resolved {
    Unbound,
    Bound(String),
    Unknown(String),
}

impl Resolved {
    fn from_result(result: ResolveResult) -> Self {
        match result {
            ResolveResult::Bound(ns) => Resolved::Bound(String::from_utf8_lossy(ns.as_ref()).into_owned()),
            ResolveResult::Unbound => Resolved::Unbound,
            ResolveResult::Unknown(prefix) => {
                Resolved::Unknown(String::from_utf8_lossy(&prefix).into_owned())
            }
        }
    }

    /// A prefix with no namespace declaration in scope is an error.
    fn qualify(self, local: String, reader: &NsReader<&[u8]>) -> OwsResult<QName> {
        match self {
            Resolved::Bound(namespace) => Ok(QName {
                namespace: Some(namespace),
                local,
            }),
            Resolved::Unbound => Ok(QName {
                namespace: None,
                local,
            }),
            Resolved::Unknown(prefix) => Err(malformed(
                reader,
                format!("namespace prefix '{}' is not declared", prefix),
            )),
        }
    }
}

/// Parse a document into its root element.
pub fn parse(bytes: &[u8]) -> OwsResult<Element> {
    let mut reader = NsReader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let resolved = reader
            .read_resolved_event_into(&mut buf)
            .map(|(ns, event)| (Resolved::from_result(ns), event));

        match resolved {
            Ok((ns, Event::Start(e))) => {
                let element = start_element(&reader, ns, &e)?;
                stack.push(element);
            }
            Ok((ns, Event::Empty(e))) => {
                let element = start_element(&reader, ns, &e)?;
                attach(&mut stack, &mut root, element);
            }
            Ok((_, Event::End(_))) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Ok((_, Event::Text(t))) => {
                let text = t.unescape().map_err(|e| malformed(&reader, e))?;
                if let Some(parent) = stack.last_mut() {
                    if !text.is_empty() {
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
            }
            Ok((_, Event::CData(c))) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    parent.children.push(Node::Text(text));
                }
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => return Err(malformed(&reader, e)),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(OwsError::MalformedXml {
            position: reader.buffer_position(),
            message: "unexpected end of document".to_string(),
        });
    }
    root.ok_or_else(|| OwsError::MissingElement("document root".to_string()))
}

/// Parse element content that may hold several top-level nodes, such as an
/// embedded payload. Every prefix used must be declared inside `markup`.
pub fn parse_fragment(markup: &str) -> OwsResult<Vec<Node>> {
    let wrapped = format!("<fragment>{}</fragment>", markup);
    Ok(parse(wrapped.as_bytes())?.children)
}

fn start_element(reader: &NsReader<&[u8]>, ns: Resolved, e: &BytesStart) -> OwsResult<Element> {
    let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut element = Element::from_name(ns.qualify(local, reader)?);

    for attr in e.attributes() {
        let attr = attr.map_err(|err| malformed(reader, err))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let (attr_ns, attr_local) = reader.resolve_attribute(attr.key);
        let attr_ns = Resolved::from_result(attr_ns);
        let attr_local = String::from_utf8_lossy(attr_local.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|err| malformed(reader, err))?;
        element.attributes.push(Attribute {
            name: attr_ns.qualify(attr_local, reader)?,
            value: value.into_owned(),
        });
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.push_child(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn malformed(reader: &NsReader<&[u8]>, err: impl std::fmt::Display) -> OwsError {
    OwsError::MalformedXml {
        position: reader.buffer_position(),
        message: err.to_string(),
    }
}
