//! Remote-backed nodes: source roots and the XML element tree.

use std::collections::{HashMap, HashSet};
use std::rc::Weak;

use datastore_path::{
    attribute_key, parse_position, position_name, ATTRIBUTE_WILDCARD, CHILD_WILDCARD,
};
use indexmap::IndexMap;
use serde_json::Value;

use super::{DataNode, NodeInner, NodeKind};
use crate::error::{LoadError, StoreError};
use crate::remote::SourceState;
use crate::store::StoreShared;

pub(crate) enum RemoteNode {
    /// Root of a remote source; delegates to its backing data once loaded.
    Source(Box<SourceState>),
    Element(ElementNode),
    /// Leaf naming one attribute of the parent element.
    Attribute(String),
}

/// An XML element: its text, its attributes and its child elements.
///
/// The first child with a given tag is named by the tag; later siblings
/// with the same tag are named by position.
pub(crate) struct ElementNode {
    text: String,
    attributes: IndexMap<String, String>,
    elements: Vec<(String, DataNode)>,
    attribute_nodes: HashMap<String, DataNode>,
}

impl ElementNode {
    fn empty() -> Self {
        ElementNode {
            text: String::new(),
            attributes: IndexMap::new(),
            elements: Vec::new(),
            attribute_nodes: HashMap::new(),
        }
    }

    fn from_xml(xml: roxmltree::Node<'_, '_>) -> Self {
        let text: String = xml
            .children()
            .filter(|child| child.is_text())
            .filter_map(|child| child.text())
            .collect();
        ElementNode {
            text: text.trim().to_string(),
            attributes: xml
                .attributes()
                .map(|attr| (attr.name().to_string(), attr.value().to_string()))
                .collect(),
            elements: Vec::new(),
            attribute_nodes: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }

    pub(crate) fn get(&self) -> Value {
        Value::String(self.text.clone())
    }

    pub(crate) fn set_text(&mut self, path: &str, value: &Value) -> Result<(), StoreError> {
        self.text = scalar_text(value)
            .ok_or_else(|| StoreError::invalid_mutation(path, "XML elements hold text only"))?;
        Ok(())
    }

    pub(crate) fn child_node(
        &mut self,
        node: &DataNode,
        name: &str,
        create: bool,
    ) -> Option<DataNode> {
        if let Some(attr) = attribute_key(name) {
            if let Some(leaf) = self.attribute_nodes.get(attr) {
                return Some(leaf.clone());
            }
            if !self.attributes.contains_key(attr) {
                if !create {
                    return None;
                }
                self.attributes.insert(attr.to_string(), String::new());
            }
            return Some(self.attribute_node(node, attr));
        }
        if let Some(pos) = parse_position(name) {
            return self.elements.get(pos).map(|(_, child)| child.clone());
        }
        if let Some((_, child)) = self.elements.iter().find(|(tag, _)| tag == name) {
            return Some(child.clone());
        }
        if !create {
            return None;
        }
        let child = node.child(
            name.to_string(),
            NodeKind::Remote(RemoteNode::Element(ElementNode::empty())),
        );
        self.elements.push((name.to_string(), child.clone()));
        Some(child)
    }

    fn attribute_node(&mut self, node: &DataNode, attr: &str) -> DataNode {
        if let Some(leaf) = self.attribute_nodes.get(attr) {
            return leaf.clone();
        }
        let leaf = node.child(
            format!("@{attr}"),
            NodeKind::Remote(RemoteNode::Attribute(attr.to_string())),
        );
        self.attribute_nodes.insert(attr.to_string(), leaf.clone());
        leaf
    }

    pub(crate) fn child_nodes(&mut self, node: &DataNode, selector: Option<&str>) -> Vec<DataNode> {
        match selector {
            None | Some(CHILD_WILDCARD) => {
                self.elements.iter().map(|(_, child)| child.clone()).collect()
            }
            Some(ATTRIBUTE_WILDCARD) => {
                let names: Vec<String> = self.attributes.keys().cloned().collect();
                names
                    .iter()
                    .map(|attr| self.attribute_node(node, attr))
                    .collect()
            }
            Some(name) if attribute_key(name).is_some() || parse_position(name).is_some() => {
                self.child_node(node, name, false).into_iter().collect()
            }
            Some(name) => self
                .elements
                .iter()
                .filter(|(tag, _)| tag == name)
                .map(|(_, child)| child.clone())
                .collect(),
        }
    }

    pub(crate) fn remove(&mut self, name: &str) -> bool {
        if let Some(attr) = attribute_key(name) {
            self.attribute_nodes.remove(attr);
            return self.attributes.shift_remove(attr).is_some();
        }
        let pos = match parse_position(name) {
            Some(pos) => (pos < self.elements.len()).then_some(pos),
            None => self.elements.iter().position(|(tag, _)| tag == name),
        };
        match pos {
            Some(pos) => {
                self.elements.remove(pos);
                true
            }
            None => false,
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

impl DataNode {
    pub(super) fn read_attribute(&self, attr: &str) -> Value {
        let Some(parent) = self.parent() else {
            return Value::Null;
        };
        let kind = parent.kind_ref();
        match &*kind {
            NodeKind::Remote(RemoteNode::Element(element)) => element
                .attributes
                .get(attr)
                .map_or(Value::Null, |text| Value::String(text.clone())),
            _ => Value::Null,
        }
    }

    pub(super) fn write_attribute(&self, attr: &str, value: &Value) -> Result<(), StoreError> {
        let text = scalar_text(value).ok_or_else(|| {
            StoreError::invalid_mutation(self.data_path(), "XML attributes hold text only")
        })?;
        if let Some(parent) = self.parent() {
            if let NodeKind::Remote(RemoteNode::Element(element)) = &mut *parent.kind_mut() {
                element.attributes.insert(attr.to_string(), text);
            }
        }
        Ok(())
    }
}

/// Parse `text` and build the element tree rooted at its document element.
pub(crate) fn build_document(
    name: String,
    path: String,
    parent: Weak<NodeInner>,
    store: Weak<StoreShared>,
    text: &str,
) -> Result<DataNode, LoadError> {
    let doc = roxmltree::Document::parse(text).map_err(|err| LoadError::Xml(err.to_string()))?;
    let xml = doc.root_element();
    let root = DataNode::new(
        name,
        path,
        parent,
        store,
        NodeKind::Remote(RemoteNode::Element(ElementNode::from_xml(xml))),
    );
    attach_elements(&root, xml);
    Ok(root)
}

fn attach_elements(node: &DataNode, xml: roxmltree::Node<'_, '_>) {
    let mut seen = HashSet::new();
    for (pos, child_xml) in xml.children().filter(|child| child.is_element()).enumerate() {
        let tag = child_xml.tag_name().name().to_string();
        let name = if seen.insert(tag.clone()) {
            tag.clone()
        } else {
            position_name(pos)
        };
        let child = node.child(
            name,
            NodeKind::Remote(RemoteNode::Element(ElementNode::from_xml(child_xml))),
        );
        attach_elements(&child, child_xml);
        if let NodeKind::Remote(RemoteNode::Element(element)) = &mut *node.kind_mut() {
            element.elements.push((tag, child));
        }
    }
}
