// ── Element tree ──────────────────────────────────────────────────────
//
// Minimal DOM over quick-xml events. Payloads from the controller are
// small, so the codecs decode a whole document into this tree and walk it
// by path instead of driving the pull parser directly.

use encoding_rs::{Encoding, UTF_8};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::Error;

/// One XML element: local name, concatenated text content and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Self::default()
        }
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follow a chain of child names, collecting every match at the last step.
    pub fn find_all<'a>(&'a self, path: &[&str]) -> Vec<&'a Element> {
        let mut current = vec![self];
        for step in path {
            current = current
                .into_iter()
                .flat_map(|e| e.children_named(step))
                .collect();
        }
        current
    }
}

/// Parse a document, honouring the charset named in its XML declaration.
pub(crate) fn parse(bytes: &[u8]) -> Result<Element, Error> {
    let encoding = declared_encoding(bytes).unwrap_or(UTF_8);
    parse_with_encoding(bytes, encoding)
}

/// Parse a document whose charset is known up front (no declaration present).
pub(crate) fn parse_with_encoding(
    bytes: &[u8],
    encoding: &'static Encoding,
) -> Result<Element, Error> {
    let text = decode_text(bytes, encoding)?;
    parse_str(&text)
}

fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> Result<String, Error> {
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(Error::Encoding(format!(
            "malformed {} byte sequence",
            used.name()
        )));
    }
    Ok(text.into_owned())
}

fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }
    let end = bytes.windows(2).position(|w| w == b"?>")?;
    let decl = String::from_utf8_lossy(bytes.get(..end)?);
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let label = rest[1..].split(quote).next()?;
    Encoding::for_label(label.as_bytes())
}

fn xml_err(err: impl std::fmt::Display) -> Error {
    Error::Xml(err.to_string())
}

fn parse_str(text: &str) -> Result<Element, Error> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => stack.push(Element::from_start(&start)),
            Event::Empty(start) => attach(&mut stack, &mut root, Element::from_start(&start)),
            Event::End(_) => {
                let done = stack
                    .pop()
                    .ok_or_else(|| Error::Xml("unbalanced end tag".into()))?;
                attach(&mut stack, &mut root, done);
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::Xml("unexpected end of document".into()));
    }
    root.ok_or_else(|| Error::Xml("document has no root element".into()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}
