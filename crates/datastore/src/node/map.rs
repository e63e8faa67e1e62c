use std::collections::HashMap;

use datastore_path::{
    attribute_key, is_composite, parse_position, ATTRIBUTE_WILDCARD, CHILD_WILDCARD,
};
use indexmap::IndexMap;
use serde_json::Value;

use super::{DataNode, NodeKind, NodeType, PrimitiveNode, SlotKey};

/// Keyed children in insertion order.
///
/// `values` keeps every key. Once a composite child has been materialized
/// it owns its value and the slot holds `null`; [`get`](MapNode::get)
/// stitches the two back together.
pub(crate) struct MapNode {
    values: IndexMap<String, Value>,
    children: HashMap<String, DataNode>,
}

impl MapNode {
    pub(crate) fn new(map: serde_json::Map<String, Value>) -> Self {
        MapNode {
            values: map.into_iter().collect(),
            children: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn get(&self) -> Value {
        let map = self
            .values
            .iter()
            .map(|(key, value)| {
                let value = match self.children.get(key) {
                    Some(child) if child.owns_value() => child.get(),
                    _ => value.clone(),
                };
                (key.clone(), value)
            })
            .collect();
        Value::Object(map)
    }

    pub(crate) fn read(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    /// Whether `node` is the cached child at `key`.
    pub(crate) fn holds(&self, key: &str, node: &DataNode) -> bool {
        self.children.get(key).is_some_and(|child| child.ptr_eq(node))
    }

    pub(crate) fn write(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    /// Key addressed by `name`: `[i]` picks by insertion order and `@key`
    /// is the same entry as `key`.
    fn resolve_key(&self, name: &str) -> Option<String> {
        if let Some(index) = parse_position(name) {
            return self.values.get_index(index).map(|(key, _)| key.clone());
        }
        Some(attribute_key(name).unwrap_or(name).to_string())
    }

    pub(crate) fn child_node(
        &mut self,
        node: &DataNode,
        name: &str,
        create: bool,
    ) -> Option<DataNode> {
        let key = self.resolve_key(name)?;
        if let Some(child) = self.children.get(&key) {
            return Some(child.clone());
        }
        if !self.values.contains_key(&key) {
            if !create || parse_position(name).is_some() {
                return None;
            }
            self.values
                .insert(key.clone(), Value::Object(serde_json::Map::new()));
        }
        Some(self.materialize(node, key))
    }

    fn materialize(&mut self, node: &DataNode, key: String) -> DataNode {
        if let Some(child) = self.children.get(&key) {
            return child.clone();
        }
        let kind = match self.values.get_mut(&key) {
            Some(value) if is_composite(value) => NodeKind::from_value(value.take()),
            _ => NodeKind::Primitive(PrimitiveNode::Slot(SlotKey::Key(key.clone()))),
        };
        let child = node.child(key.clone(), kind);
        self.children.insert(key, child.clone());
        child
    }

    pub(crate) fn child_nodes(&mut self, node: &DataNode, selector: Option<&str>) -> Vec<DataNode> {
        match selector {
            None | Some(CHILD_WILDCARD) => {
                let keys: Vec<String> = self.values.keys().cloned().collect();
                keys.into_iter()
                    .map(|key| self.materialize(node, key))
                    .collect()
            }
            Some(ATTRIBUTE_WILDCARD) => {
                let keys: Vec<String> = self
                    .values
                    .keys()
                    .filter(|key| self.is_scalar(key))
                    .cloned()
                    .collect();
                keys.into_iter()
                    .map(|key| self.materialize(node, key))
                    .collect()
            }
            Some(name) => self.child_node(node, name, false).into_iter().collect(),
        }
    }

    fn is_scalar(&self, key: &str) -> bool {
        match self.children.get(key) {
            Some(child) => child.kind() == NodeType::Primitive,
            None => self.values.get(key).is_some_and(|value| !is_composite(value)),
        }
    }

    pub(crate) fn remove(&mut self, name: &str) -> bool {
        let Some(key) = self.resolve_key(name) else {
            return false;
        };
        self.children.remove(&key);
        self.values.shift_remove(&key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::node::{DataNode, NodeType};
    use serde_json::json;

    fn person() -> DataNode {
        DataNode::from_json(
            "$people",
            json!({"name": "Ada", "age": 36, "langs": ["en", "fr"], "home": {"city": "London"}}),
        )
    }

    #[test]
    fn children_are_cached() {
        let root = person();
        let a = root.child_node("home", false).unwrap();
        let b = root.child_node("home", false).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.data_path(), "$people/home");
        assert_eq!(a.kind(), NodeType::Map);
        assert!(a.parent().unwrap().ptr_eq(&root));
    }

    #[test]
    fn value_survives_materialization() {
        let root = person();
        let before = root.get();
        for child in root.child_nodes(None) {
            child.child_nodes(None);
        }
        assert_eq!(root.get(), before);
    }

    #[test]
    fn insertion_order_is_kept() {
        let root = person();
        let names: Vec<String> = root
            .child_nodes(None)
            .iter()
            .map(|c| c.data_name().to_string())
            .collect();
        assert_eq!(names, vec!["name", "age", "langs", "home"]);
        let second = root.child_node("[1]", false).unwrap();
        assert_eq!(second.data_name(), "age");
        assert_eq!(second.position(), Some(1));
    }

    #[test]
    fn attributes_are_scalar_members() {
        let root = person();
        let attrs: Vec<String> = root
            .child_nodes(Some("@*"))
            .iter()
            .map(|c| c.data_name().to_string())
            .collect();
        assert_eq!(attrs, vec!["name", "age"]);
        assert_eq!(root.child_value("@age"), Some(json!(36)));
        assert!(root.child_node("@age", false).unwrap().ptr_eq(&root.child_node("age", false).unwrap()));
    }

    #[test]
    fn create_adds_empty_map() {
        let root = person();
        assert!(root.child_node("pets", false).is_none());
        let pets = root.child_node("pets", true).unwrap();
        assert_eq!(pets.kind(), NodeType::Map);
        assert_eq!(root.child_value("pets"), Some(json!({})));
        assert!(root.child_node("[9]", true).is_none());
    }

    #[test]
    fn set_child_and_remove() {
        let root = person();
        root.set_child("age", json!(37)).unwrap();
        root.set_child("email", json!("ada@example.org")).unwrap();
        assert_eq!(root.child_value("age"), Some(json!(37)));
        assert_eq!(root.child_count(), 5);

        assert!(root.remove_child("langs").unwrap());
        assert!(!root.remove_child("langs").unwrap());
        assert_eq!(
            root.get(),
            json!({"name": "Ada", "age": 37, "home": {"city": "London"}, "email": "ada@example.org"})
        );
    }

    #[test]
    fn replacing_the_map_drops_cached_children() {
        let root = person();
        let old = root.child_node("home", false).unwrap();
        root.set(json!({"home": {"city": "Paris"}})).unwrap();
        let new = root.child_node("home", false).unwrap();
        assert!(!old.ptr_eq(&new));
        assert_eq!(new.child_value("city"), Some(json!("Paris")));
    }

    #[test]
    fn wrappers_from_a_replaced_map_cannot_write_back() {
        let root = DataNode::from_json("$m", json!({"a": 1}));
        let a = root.child_node("a", false).unwrap();
        root.set(json!({"b": 2})).unwrap();
        assert!(matches!(a.set(json!(5)), Err(StoreError::InvalidMutation { .. })));
        assert_eq!(root.get(), json!({"b": 2}));
    }

    #[test]
    fn wrappers_of_removed_keys_cannot_write_back() {
        let root = DataNode::from_json("$m", json!({"a": 1, "b": 2}));
        let a = root.child_node("a", false).unwrap();
        assert!(root.remove_child("a").unwrap());
        assert!(a.set(json!(9)).is_err());
        assert_eq!(root.get(), json!({"b": 2}));
        assert!(root.child_node("a", false).is_none());
    }
}
