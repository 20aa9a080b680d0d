//! Arena-allocated element tree for loosely formed HTML.
//!
//! Built with quick-xml in a forgiving configuration: end-tag names are not
//! checked, unmatched end tags are ignored, void elements never take
//! children and a parse error ends the tree early instead of failing.
//! Entity references are kept verbatim in text nodes (`&amp;` stays
//! `&amp;`) so callers choose how to unescape.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Index of a node in its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element {
        /// Lowercased qualified name.
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

impl Tree {
    fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    fn alloc(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    fn push_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        // merge with a preceding text sibling so entity splits stay one node
        if let Some(&last) = self.nodes[parent.0 as usize].children.last()
            && let NodeData::Text(existing) = &mut self.nodes[last.0 as usize].data
        {
            existing.push_str(text);
            return;
        }
        self.alloc(parent, NodeData::Text(text.to_string()));
    }

    /// Parse markup into a tree.
    pub fn parse(markup: &str) -> Self {
        let mut reader = Reader::from_str(markup);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;

        let mut tree = Tree::new();
        let mut open: Vec<NodeId> = vec![tree.root()];

        loop {
            let parent = open.last().copied().unwrap_or(tree.root());
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let data = element_data(&e);
                    let is_void = matches!(&data, NodeData::Element { name, .. } if VOID_ELEMENTS.contains(&name.as_str()));
                    let id = tree.alloc(parent, data);
                    if !is_void {
                        open.push(id);
                    }
                }
                Ok(Event::Empty(e)) => {
                    tree.alloc(parent, element_data(&e));
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                    // close the nearest matching element, implicitly closing anything inside it
                    if let Some(depth) = open
                        .iter()
                        .rposition(|&id| tree.name(id) == Some(name.as_str()))
                    {
                        open.truncate(depth.max(1));
                    }
                }
                Ok(Event::Text(e)) => {
                    tree.push_text(parent, &String::from_utf8_lossy(e.as_ref()));
                }
                Ok(Event::GeneralRef(e)) => {
                    let entity = format!("&{};", String::from_utf8_lossy(e.as_ref()));
                    tree.push_text(parent, &entity);
                }
                Ok(Event::CData(e)) => {
                    tree.push_text(parent, &String::from_utf8_lossy(e.as_ref()));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    log::warn!(
                        "markup parse stopped at byte {}: {e}",
                        reader.error_position()
                    );
                    break;
                }
                _ => {}
            }
        }
        tree
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    /// Element name, `None` for text and document nodes.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id).children.iter().copied()
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(|&c| self.name(c).is_some())
    }

    /// Concatenated text of all descendants.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current);
            if let NodeData::Text(text) = &node.data {
                out.push_str(text);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// First descendant element named `name` (pre-order), not descending
    /// into elements for which `skip` returns true.
    pub fn find_descendant(
        &self,
        id: NodeId,
        name: &str,
        skip: impl Fn(&str) -> bool,
    ) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.node(id).children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let Some(current_name) = self.name(current) else {
                continue;
            };
            if current_name == name {
                return Some(current);
            }
            if !skip(current_name) {
                stack.extend(self.node(current).children.iter().rev().copied());
            }
        }
        None
    }
}

fn element_data(e: &BytesStart<'_>) -> NodeData {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    let attrs = e
        .html_attributes()
        .flatten()
        .map(|attr| {
            (
                String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase(),
                String::from_utf8_lossy(&attr.value).into_owned(),
            )
        })
        .collect();
    NodeData::Element { name, attrs }
}
