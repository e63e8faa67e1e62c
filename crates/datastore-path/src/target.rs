//! The navigation seam between compiled paths and node graphs.

use serde_json::Value;

use crate::types::{ATTRIBUTE_WILDCARD, CHILD_WILDCARD};
use crate::util::{
    attribute_key, element_id, element_name, is_composite, parse_index, parse_position,
};

/// Something a [`crate::DataPath`] can navigate.
///
/// Handles are cheap to clone; navigation never fails, it returns `None` or
/// an empty list instead.
pub trait PathTarget: Clone {
    /// Child called `name` (`title`, `@width`, `[2]`, an element id).
    /// With `create`, missing containers may be materialized.
    fn child_node(&self, name: &str, create: bool) -> Option<Self>;

    /// Ordered children matching `selector`: `None` or `"*"` for all,
    /// `"@*"` for attribute-like leaves, or a name.
    fn child_nodes(&self, selector: Option<&str>) -> Vec<Self>;

    /// Registered top-level source called `name` (without the `$`).
    fn source(&self, name: &str) -> Option<Self>;

    /// Current value of this node.
    fn value(&self) -> Value;

    /// Data name of this node.
    fn name(&self) -> String;

    /// Zero-based position among the parent's children.
    fn position(&self) -> Option<usize>;

    /// Whether a list query on this node should enumerate its children.
    fn is_list(&self) -> bool;
}

/// Read-only [`PathTarget`] over a borrowed JSON document.
///
/// Top-level keys of the document act as `$sources`.
///
/// # Example
///
/// ```
/// use datastore_path::{DataPath, ValueCursor};
/// use serde_json::json;
///
/// let doc = json!({"people": [{"id": 42, "name": "Ada"}]});
/// let path = DataPath::compile("$people/42/name").unwrap();
/// assert_eq!(path.get(&ValueCursor::new(&doc)), Some(json!("Ada")));
/// ```
#[derive(Debug, Clone)]
pub struct ValueCursor<'a> {
    doc: &'a Value,
    value: &'a Value,
    name: String,
    position: Option<usize>,
}

impl<'a> ValueCursor<'a> {
    /// Cursor at the document root.
    pub fn new(doc: &'a Value) -> Self {
        Self {
            doc,
            value: doc,
            name: String::new(),
            position: None,
        }
    }

    /// The JSON value under the cursor.
    pub fn get(&self) -> &'a Value {
        self.value
    }

    fn step(&self, value: &'a Value, name: String, position: usize) -> Self {
        Self {
            doc: self.doc,
            value,
            name,
            position: Some(position),
        }
    }

    fn all_children(&self) -> Vec<Self> {
        match self.value {
            Value::Object(map) => map
                .iter()
                .enumerate()
                .map(|(i, (key, value))| self.step(value, key.clone(), i))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, value)| self.step(value, element_name(value, i), i))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl PathTarget for ValueCursor<'_> {
    fn child_node(&self, name: &str, _create: bool) -> Option<Self> {
        if let Some(index) = parse_position(name) {
            return self.all_children().into_iter().nth(index);
        }
        let key = attribute_key(name).unwrap_or(name);
        match self.value {
            Value::Object(map) => {
                let (index, (key, value)) = map.iter().enumerate().find(|(_, (k, _))| *k == key)?;
                Some(self.step(value, key.clone(), index))
            }
            Value::Array(items) => {
                let by_id = items
                    .iter()
                    .position(|item| element_id(item).as_deref() == Some(key));
                let index = by_id.or_else(|| parse_index(key).filter(|i| *i < items.len()))?;
                let value = &items[index];
                Some(self.step(value, element_name(value, index), index))
            }
            _ => None,
        }
    }

    fn child_nodes(&self, selector: Option<&str>) -> Vec<Self> {
        match selector {
            None | Some(CHILD_WILDCARD) => self.all_children(),
            Some(ATTRIBUTE_WILDCARD) if self.value.is_object() => self
                .all_children()
                .into_iter()
                .filter(|child| !is_composite(child.value))
                .collect(),
            Some(ATTRIBUTE_WILDCARD) => Vec::new(),
            Some(name) => self.child_node(name, false).into_iter().collect(),
        }
    }

    fn source(&self, name: &str) -> Option<Self> {
        let map = self.doc.as_object()?;
        let (index, (_, value)) = map.iter().enumerate().find(|(_, (k, _))| *k == name)?;
        Some(Self {
            doc: self.doc,
            value,
            name: format!("${}", name),
            position: Some(index),
        })
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn position(&self) -> Option<usize> {
        self.position
    }

    fn is_list(&self) -> bool {
        self.value.is_array()
    }
}
