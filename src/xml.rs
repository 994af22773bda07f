//! Minimal read-only element tree over quick-xml.
//!
//! The GI-Cat admin API answers with small, loosely structured documents
//! whose shape varies between endpoints. The driver only ever needs to
//! select elements by tag (optionally narrowed by an attribute value) and
//! read their text or attributes, so this module builds a flat arena of
//! elements in document order and answers those queries over it.
//!
//! Tags and attribute keys are compared by local name; namespace prefixes
//! such as `atom:` or `opensearch:` are dropped while parsing.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::GiCatError;

#[derive(Debug, Clone)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    /// One past the index of the last descendant.
    end: usize,
}

#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    doc: &'a XmlDocument,
    index: usize,
}

impl XmlDocument {
    pub fn parse(text: &str) -> Result<Self, GiCatError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut nodes = vec![Node {
            name: String::new(),
            attributes: Vec::new(),
            text: String::new(),
            end: 1,
        }];
        let mut stack = vec![0usize];

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    nodes.push(element_node(&start)?);
                    stack.push(nodes.len() - 1);
                }
                Ok(Event::Empty(start)) => {
                    let mut node = element_node(&start)?;
                    node.end = nodes.len() + 1;
                    nodes.push(node);
                }
                Ok(Event::End(_)) => {
                    let index = stack
                        .pop()
                        .filter(|index| *index != 0)
                        .ok_or_else(|| GiCatError::Xml("unbalanced closing tag".to_string()))?;
                    nodes[index].end = nodes.len();
                }
                Ok(Event::Text(text)) => {
                    let value = text
                        .unescape()
                        .map_err(|err| GiCatError::Xml(err.to_string()))?;
                    append_text(&mut nodes, &stack, &value);
                }
                Ok(Event::CData(data)) => {
                    let bytes = data.into_inner();
                    append_text(&mut nodes, &stack, &String::from_utf8_lossy(&bytes));
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(GiCatError::Xml(format!(
                        "at position {}: {err}",
                        reader.buffer_position()
                    )));
                }
            }
        }

        if stack.len() > 1 {
            return Err(GiCatError::Xml("unexpected end of document".to_string()));
        }
        nodes[0].end = nodes.len();
        Ok(Self { nodes })
    }

    pub fn root(&self) -> Element<'_> {
        Element {
            doc: self,
            index: 0,
        }
    }

    pub fn descendants(&self, tag: &str) -> Vec<Element<'_>> {
        self.root().descendants(tag)
    }

    pub fn first(&self, tag: &str) -> Option<Element<'_>> {
        self.root().first(tag)
    }

    pub fn find_by_attr(&self, tag: &str, attr: &str, value: &str) -> Option<Element<'_>> {
        self.root().find_by_attr(tag, attr, value)
    }

    /// Follows a chain of descendant selectors, like `feed entry score`.
    pub fn select(&self, path: &[&str]) -> Vec<Element<'_>> {
        let mut current = vec![self.root()];
        for tag in path {
            let mut next: Vec<Element<'_>> = Vec::new();
            for element in &current {
                for found in element.descendants(tag) {
                    if !next.iter().any(|seen| seen.index == found.index) {
                        next.push(found);
                    }
                }
            }
            next.sort_by_key(|element| element.index);
            current = next;
        }
        current
    }
}

impl<'a> Element<'a> {
    fn node(&self) -> &'a Node {
        &self.doc.nodes[self.index]
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.node()
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Concatenated text of this element and all of its descendants.
    pub fn text(&self) -> String {
        let node = self.node();
        self.doc.nodes[self.index..node.end]
            .iter()
            .map(|node| node.text.as_str())
            .collect()
    }

    pub fn descendants(&self, tag: &str) -> Vec<Element<'a>> {
        let end = self.node().end;
        (self.index + 1..end)
            .filter(|index| self.doc.nodes[*index].name == tag)
            .map(|index| Element {
                doc: self.doc,
                index,
            })
            .collect()
    }

    pub fn first(&self, tag: &str) -> Option<Element<'a>> {
        let end = self.node().end;
        (self.index + 1..end)
            .find(|index| self.doc.nodes[*index].name == tag)
            .map(|index| Element {
                doc: self.doc,
                index,
            })
    }

    pub fn find_by_attr(&self, tag: &str, attr: &str, value: &str) -> Option<Element<'a>> {
        self.descendants(tag)
            .into_iter()
            .find(|element| element.attr(attr) == Some(value))
    }

    pub fn first_text(&self, tag: &str) -> Option<String> {
        self.first(tag).map(|element| element.text())
    }
}

fn element_node(start: &BytesStart<'_>) -> Result<Node, GiCatError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| GiCatError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| GiCatError::Xml(err.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Node {
        name,
        attributes,
        text: String::new(),
        end: 0,
    })
}

fn append_text(nodes: &mut [Node], stack: &[usize], value: &str) {
    if let Some(index) = stack.last() {
        nodes[*index].text.push_str(value);
    }
}
