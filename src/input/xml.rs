//! XML documents
//!
//! `<form><user>bob</user><age>3</age></form>` → `{user: "bob", age: "3"}`.
//! The root element name is ignored. Leaf elements become their trimmed,
//! unescaped text; elements with children become nested maps. Attributes
//! are ignored and repeated element names keep their first occurrence.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ParseError;
use crate::value::{FlatMap, Value};

#[derive(Default)]
struct Element {
    name: String,
    text: String,
    children: BTreeMap<String, Value>,
}

impl Element {
    fn named(raw: &[u8]) -> Result<Self, ParseError> {
        let name = std::str::from_utf8(raw).map_err(xml_err)?.to_string();
        Ok(Self {
            name,
            ..Default::default()
        })
    }

    fn adopt(&mut self, child: Element) {
        let name = child.name.clone();
        self.children.entry(name).or_insert_with(|| child.into_value());
    }

    fn into_value(self) -> Value {
        if self.children.is_empty() {
            Value::Str(self.text)
        } else {
            Value::Map(self.children)
        }
    }
}

fn xml_err(err: impl std::fmt::Display) -> ParseError {
    ParseError::Xml(err.to_string())
}

/// Parse a document into the flat map of its root's children.
pub fn parse_xml(body: &[u8]) -> Result<FlatMap, ParseError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(ParseError::Xml("multiple root elements".into()));
                }
                stack.push(Element::named(start.local_name().as_ref())?);
            }
            Event::Empty(start) => {
                let element = Element::named(start.local_name().as_ref())?;
                match stack.last_mut() {
                    Some(parent) => parent.adopt(element),
                    None if root.is_none() => root = Some(element),
                    None => return Err(ParseError::Xml("multiple root elements".into())),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ParseError::Xml("unexpected closing tag".into()))?;
                match stack.last_mut() {
                    Some(parent) => parent.adopt(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_err)?;
                match stack.last_mut() {
                    Some(element) => element.text.push_str(&text),
                    None => return Err(ParseError::Xml("text outside of root element".into())),
                }
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                let text = std::str::from_utf8(&bytes).map_err(xml_err)?;
                match stack.last_mut() {
                    Some(element) => element.text.push_str(text),
                    None => return Err(ParseError::Xml("CDATA outside of root element".into())),
                }
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctype
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Xml(format!("unclosed element <{}>", open.name)));
    }
    let root = root.ok_or_else(|| ParseError::Xml("document has no root element".into()))?;
    Ok(root.children.into_iter().collect())
}
