use std::collections::HashMap;

use datastore_path::{
    element_id, is_composite, parse_index, parse_position, position_name, ATTRIBUTE_WILDCARD,
    CHILD_WILDCARD,
};
use serde_json::Value;

use super::{DataNode, NodeKind, PrimitiveNode, SlotKey};

/// Ordered children, addressable by id, by `[i]` and by bare index.
///
/// The id index is a cache: it is verified on every hit and rebuilt when
/// an element's id has been edited in place.
pub(crate) struct ListNode {
    entries: Vec<ListEntry>,
    ids: HashMap<String, usize>,
    next_token: u64,
}

struct ListEntry {
    token: u64,
    value: Value,
    node: Option<DataNode>,
}

impl ListEntry {
    fn current(&self) -> Value {
        match &self.node {
            Some(node) if node.owns_value() => node.get(),
            _ => self.value.clone(),
        }
    }

    fn id(&self) -> Option<String> {
        match &self.node {
            Some(node) if node.owns_value() => node.id_field(),
            _ => element_id(&self.value),
        }
    }
}

impl ListNode {
    pub(crate) fn new(items: Vec<Value>) -> Self {
        let mut list = ListNode {
            entries: Vec::with_capacity(items.len()),
            ids: HashMap::new(),
            next_token: 0,
        };
        for item in items {
            list.push_entry(item);
        }
        list
    }

    fn push_entry(&mut self, value: Value) -> usize {
        let token = self.next_token;
        self.next_token += 1;
        let pos = self.entries.len();
        if let Some(id) = element_id(&value) {
            self.ids.entry(id).or_insert(pos);
        }
        self.entries.push(ListEntry {
            token,
            value,
            node: None,
        });
        pos
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self) -> Value {
        Value::Array(self.entries.iter().map(ListEntry::current).collect())
    }

    pub(crate) fn read(&self, token: u64) -> Option<Value> {
        self.entries
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| entry.value.clone())
    }

    /// Whether `node` is the cached node of the entry `token`.
    pub(crate) fn holds(&self, token: u64, node: &DataNode) -> bool {
        self.entries.iter().any(|entry| {
            entry.token == token && entry.node.as_ref().is_some_and(|held| held.ptr_eq(node))
        })
    }

    pub(crate) fn write(&mut self, token: u64, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.token == token) {
            entry.value = value;
        }
    }

    fn rebuild_ids(&mut self) {
        self.ids.clear();
        for (pos, entry) in self.entries.iter().enumerate() {
            if let Some(id) = entry.id() {
                self.ids.entry(id).or_insert(pos);
            }
        }
    }

    fn position_of_id(&mut self, id: &str) -> Option<usize> {
        if let Some(&pos) = self.ids.get(id) {
            if self.entries.get(pos).and_then(ListEntry::id).as_deref() == Some(id) {
                return Some(pos);
            }
        }
        self.rebuild_ids();
        self.ids.get(id).copied()
    }

    /// `[i]` first, then ids, then a bare index.
    fn resolve(&mut self, name: &str) -> Option<usize> {
        if let Some(pos) = parse_position(name) {
            return (pos < self.entries.len()).then_some(pos);
        }
        self.position_of_id(name)
            .or_else(|| parse_index(name).filter(|pos| *pos < self.entries.len()))
    }

    pub(crate) fn child_node(
        &mut self,
        node: &DataNode,
        name: &str,
        create: bool,
    ) -> Option<DataNode> {
        match self.resolve(name) {
            Some(pos) => Some(self.materialize(node, pos)),
            None if create && parse_position(name).is_none() => {
                let mut element = serde_json::Map::new();
                element.insert("id".to_string(), Value::String(name.to_string()));
                let pos = self.push_entry(Value::Object(element));
                Some(self.materialize(node, pos))
            }
            None => None,
        }
    }

    fn materialize(&mut self, node: &DataNode, pos: usize) -> DataNode {
        let entry = &mut self.entries[pos];
        if let Some(existing) = &entry.node {
            return existing.clone();
        }
        let name = entry.id().unwrap_or_else(|| position_name(pos));
        let kind = if is_composite(&entry.value) {
            NodeKind::from_value(entry.value.take())
        } else {
            NodeKind::Primitive(PrimitiveNode::Slot(SlotKey::Entry(entry.token)))
        };
        let child = node.child(name, kind);
        entry.node = Some(child.clone());
        child
    }

    pub(crate) fn child_nodes(&mut self, node: &DataNode, selector: Option<&str>) -> Vec<DataNode> {
        match selector {
            None | Some(CHILD_WILDCARD) => (0..self.entries.len())
                .map(|pos| self.materialize(node, pos))
                .collect(),
            Some(ATTRIBUTE_WILDCARD) => Vec::new(),
            Some(name) => self.child_node(node, name, false).into_iter().collect(),
        }
    }

    pub(crate) fn append(&mut self, node: &DataNode, value: Value) -> DataNode {
        let pos = self.push_entry(value);
        self.materialize(node, pos)
    }

    /// Remove the element `name`.
    ///
    /// Elements without an id are named by position, so every such element
    /// after the removed one loses its cached node and is renamed on next
    /// access.
    pub(crate) fn remove(&mut self, name: &str) -> bool {
        let Some(pos) = self.resolve(name) else {
            return false;
        };
        self.entries.remove(pos);
        for entry in &mut self.entries[pos..] {
            if entry.id().is_some() {
                continue;
            }
            if let Some(stale) = entry.node.take() {
                if stale.owns_value() {
                    entry.value = stale.get();
                }
            }
        }
        self.rebuild_ids();
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::node::{DataNode, NodeType};
    use serde_json::json;

    fn albums() -> DataNode {
        DataNode::from_json(
            "$albums",
            json!([
                {"id": "a1", "title": "Lisbon"},
                {"id": "a2", "title": "Porto"},
                {"id": 7, "title": "Faro"}
            ]),
        )
    }

    #[test]
    fn lookup_by_id_position_and_index() {
        let list = albums();
        assert!(list.is_list());
        let by_id = list.child_node("a2", false).unwrap();
        assert_eq!(by_id.data_name(), "a2");
        assert_eq!(by_id.data_path(), "$albums/a2");
        assert!(list.child_node("[1]", false).unwrap().ptr_eq(&by_id));
        assert!(list.child_node("1", false).unwrap().ptr_eq(&by_id));
        assert_eq!(list.child_node("7", false).unwrap().child_value("title"), Some(json!("Faro")));
        assert!(list.child_node("[3]", false).is_none());
        assert!(list.child_node("a9", false).is_none());
    }

    #[test]
    fn id_wins_over_index() {
        let list = DataNode::from_json("l", json!([{"id": 1, "v": "first"}, {"id": 0, "v": "second"}]));
        assert_eq!(list.child_node("0", false).unwrap().child_value("v"), Some(json!("second")));
        assert_eq!(list.child_node("[0]", false).unwrap().child_value("v"), Some(json!("first")));
    }

    #[test]
    fn scalars_without_ids_are_positional() {
        let list = DataNode::from_json("tags", json!(["x", "y", "z"]));
        let names: Vec<String> = list
            .child_nodes(None)
            .iter()
            .map(|c| c.data_name().to_string())
            .collect();
        assert_eq!(names, vec!["[0]", "[1]", "[2]"]);
        let y = list.child_node("[1]", false).unwrap();
        assert_eq!(y.kind(), NodeType::Primitive);
        y.set(json!("Y")).unwrap();
        assert_eq!(list.get(), json!(["x", "Y", "z"]));
    }

    #[test]
    fn append_and_remove_keep_the_index() {
        let list = albums();
        let a4 = list.append(json!({"id": "a4", "title": "Braga"})).unwrap();
        assert_eq!(a4.data_path(), "$albums/a4");
        assert_eq!(a4.position(), Some(3));
        assert!(list.child_node("a4", false).unwrap().ptr_eq(&a4));

        assert!(list.remove_child("a1").unwrap());
        assert_eq!(list.child_count(), 3);
        assert_eq!(list.child_node("a4", false).unwrap().position(), Some(2));
        assert_eq!(list.child_node("[0]", false).unwrap().data_name(), "a2");
        assert!(list.child_node("a1", false).is_none());
    }

    #[test]
    fn edited_ids_are_found() {
        let list = albums();
        let a1 = list.child_node("a1", false).unwrap();
        a1.set_child("id", json!("renamed")).unwrap();
        assert!(list.child_node("a1", false).is_none());
        assert_eq!(
            list.child_node("renamed", false).unwrap().child_value("title"),
            Some(json!("Lisbon"))
        );
    }

    #[test]
    fn removal_renames_positional_elements() {
        let list = DataNode::from_json("l", json!([{"v": 0}, {"v": 1}, {"v": 2}]));
        let last = list.child_node("[2]", false).unwrap();
        assert_eq!(last.data_name(), "[2]");
        assert!(list.remove_child("[0]").unwrap());
        let moved = list.child_node("[1]", false).unwrap();
        assert_eq!(moved.data_name(), "[1]");
        assert_eq!(moved.child_value("v"), Some(json!(2)));
        assert_eq!(list.get(), json!([{"v": 1}, {"v": 2}]));
    }

    #[test]
    fn create_appends_an_element_with_the_id() {
        let list = albums();
        let created = list.child_node("a9", true).unwrap();
        assert_eq!(created.child_value("id"), Some(json!("a9")));
        assert_eq!(list.child_count(), 4);
        assert!(list.child_node("[7]", true).is_none());
    }

    #[test]
    fn append_on_a_map_is_rejected() {
        let map = DataNode::from_json("m", json!({}));
        assert!(map.append(json!(1)).is_err());
    }

    #[test]
    fn removed_and_renamed_scalars_reject_writes() {
        let list = DataNode::from_json("tags", json!(["x", "y", "z"]));
        let y = list.child_node("[1]", false).unwrap();
        let z = list.child_node("[2]", false).unwrap();
        assert!(list.remove_child("[1]").unwrap());
        assert!(y.set(json!("Y")).is_err());
        // `z` is now `[1]`; its old handle is stale.
        assert!(z.set(json!("Z")).is_err());
        assert_eq!(list.get(), json!(["x", "z"]));

        let fresh = list.child_node("[1]", false).unwrap();
        fresh.set(json!("Z")).unwrap();
        assert_eq!(list.get(), json!(["x", "Z"]));
    }
}
