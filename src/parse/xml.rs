//! A small queryable element tree built from `quick-xml` events.
//! Namespace prefixes are dropped; attributes are not kept.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{ImportError, Result};
use crate::model::value::clean_text;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn named(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Default::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child called `name`; `None` if absent or blank.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).and_then(|c| clean_text(&c.text))
    }
}

fn xml_error(e: impl std::fmt::Display) -> ImportError {
    ImportError::Parse(format!("XML: {}", e))
}

/// Parse a whole document into its root element.
pub fn parse_document(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if root.is_some() && stack.is_empty() {
                    return Err(xml_error("more than one root element"));
                }
                stack.push(Element::named(e.local_name().as_ref()));
            }
            Ok(Event::Empty(ref e)) => {
                let element = Element::named(e.local_name().as_ref());
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => return Err(xml_error("more than one root element")),
                }
            }
            Ok(Event::End(_)) => {
                let Some(done) = stack.pop() else {
                    return Err(xml_error("unexpected closing tag"));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => root = Some(done),
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(xml_error)?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(xml_error("text outside the root element")),
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(xml_error(format!(
                    "{} at position {}",
                    e,
                    reader.error_position()
                )))
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(xml_error(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| xml_error("document has no root element"))
}
