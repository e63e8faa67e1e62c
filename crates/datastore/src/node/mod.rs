//! The node graph.
//!
//! Every addressable value in the store is a [`DataNode`]: a shared handle
//! with a data name, a canonical path and a parent link. What the node holds
//! is decided by its kind:
//!
//! - primitive: a scalar, either owned or living in the parent's storage,
//! - map: keyed children in insertion order,
//! - list: ordered children, addressable by id or position,
//! - remote: a lazily loaded source, an XML element or an XML attribute.
//!
//! Children are materialized on first access and cached, so navigating to
//! the same child twice yields the same node.

mod list;
mod map;
mod primitive;
mod remote;

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use datastore_path::{child_path, id_string, is_composite, PathTarget, ATTRIBUTE_WILDCARD};
use serde_json::Value;

use crate::error::{LoadError, StoreError};
use crate::remote::{LoadState, SourceState};
use crate::store::StoreShared;

pub(crate) use list::ListNode;
pub(crate) use map::MapNode;
pub(crate) use primitive::{PrimitiveNode, SlotKey};
pub(crate) use remote::{build_document, RemoteNode};

/// What a node holds, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Primitive,
    Map,
    List,
    /// Root of a lazily loaded remote source.
    Source,
    /// An XML element.
    Element,
    /// An XML attribute.
    Attribute,
}

pub(crate) enum NodeKind {
    Primitive(PrimitiveNode),
    Map(MapNode),
    List(ListNode),
    Remote(RemoteNode),
}

impl NodeKind {
    pub(crate) fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => NodeKind::Map(MapNode::new(map)),
            Value::Array(items) => NodeKind::List(ListNode::new(items)),
            scalar => NodeKind::Primitive(PrimitiveNode::Owned(scalar)),
        }
    }

    pub(crate) fn source(state: SourceState) -> Self {
        NodeKind::Remote(RemoteNode::Source(Box::new(state)))
    }

    fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Primitive(_) => NodeType::Primitive,
            NodeKind::Map(_) => NodeType::Map,
            NodeKind::List(_) => NodeType::List,
            NodeKind::Remote(RemoteNode::Source(_)) => NodeType::Source,
            NodeKind::Remote(RemoteNode::Element(_)) => NodeType::Element,
            NodeKind::Remote(RemoteNode::Attribute(_)) => NodeType::Attribute,
        }
    }
}

pub(crate) struct NodeInner {
    name: String,
    path: String,
    parent: Weak<NodeInner>,
    store: Weak<StoreShared>,
    kind: RefCell<NodeKind>,
}

/// A shared handle to one node of the graph.
///
/// Cloning the handle is cheap and keeps identity: two clones compare equal
/// with [`ptr_eq`](DataNode::ptr_eq).
#[derive(Clone)]
pub struct DataNode(Rc<NodeInner>);

#[derive(Clone)]
pub(crate) struct WeakNode(Weak<NodeInner>);

impl WeakNode {
    pub(crate) fn upgrade(&self) -> Option<DataNode> {
        self.0.upgrade().map(DataNode)
    }
}

enum Read {
    Value(Value),
    Slot(SlotKey),
    Attribute(String),
    Source,
}

enum Write {
    Done,
    Slot(SlotKey, Value),
    Vacate(SlotKey),
    Source(Value),
    Attribute(String, Value),
}

enum Step {
    Found(Option<DataNode>),
    Source,
    Promote,
}

impl DataNode {
    pub(crate) fn new(
        name: String,
        path: String,
        parent: Weak<NodeInner>,
        store: Weak<StoreShared>,
        kind: NodeKind,
    ) -> Self {
        DataNode(Rc::new(NodeInner {
            name,
            path,
            parent,
            store,
            kind: RefCell::new(kind),
        }))
    }

    /// A node over `value` that belongs to no store.
    ///
    /// Detached nodes navigate and mutate like any other, but never notify
    /// and cannot resolve `$source` paths.
    pub fn from_json(name: &str, value: Value) -> Self {
        Self::new(
            name.to_string(),
            name.to_string(),
            Weak::new(),
            Weak::new(),
            NodeKind::from_value(value),
        )
    }

    pub(crate) fn child(&self, name: String, kind: NodeKind) -> DataNode {
        let path = child_path(&self.0.path, &name);
        Self::new(
            name,
            path,
            Rc::downgrade(&self.0),
            self.0.store.clone(),
            kind,
        )
    }

    /// A node in the same position as `self` (same name, path and parent)
    /// holding `kind`.
    pub(crate) fn twin(&self, kind: NodeKind) -> DataNode {
        Self::new(
            self.0.name.clone(),
            self.0.path.clone(),
            self.0.parent.clone(),
            self.0.store.clone(),
            kind,
        )
    }

    pub(crate) fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.0))
    }

    pub(crate) fn parent_link(&self) -> Weak<NodeInner> {
        self.0.parent.clone()
    }

    pub(crate) fn store_link(&self) -> Weak<StoreShared> {
        self.0.store.clone()
    }

    pub(crate) fn store(&self) -> Option<Rc<StoreShared>> {
        self.0.store.upgrade()
    }

    pub(crate) fn kind_ref(&self) -> Ref<'_, NodeKind> {
        self.0.kind.borrow()
    }

    pub(crate) fn kind_mut(&self) -> RefMut<'_, NodeKind> {
        self.0.kind.borrow_mut()
    }

    /// Whether the node keeps its own value rather than reading a slot of
    /// its parent.
    pub(crate) fn owns_value(&self) -> bool {
        !matches!(
            &*self.kind_ref(),
            NodeKind::Primitive(PrimitiveNode::Slot(_))
        )
    }

    /// Id carried by a map node, read without building its value.
    pub(crate) fn id_field(&self) -> Option<String> {
        match &*self.kind_ref() {
            NodeKind::Map(map) => map.read("id").as_ref().and_then(id_string),
            _ => None,
        }
    }

    pub(crate) fn notify(&self) {
        if let Some(store) = self.store() {
            store.notify(&self.0.path);
        }
    }

    // ── Identity ──────────────────────────────────────────────────────────

    /// Name of this node within its parent.
    pub fn data_name(&self) -> &str {
        &self.0.name
    }

    /// Canonical path from the source root, e.g. `$people/42/name`.
    pub fn data_path(&self) -> &str {
        &self.0.path
    }

    pub fn parent(&self) -> Option<DataNode> {
        self.0.parent.upgrade().map(DataNode)
    }

    pub fn kind(&self) -> NodeType {
        self.kind_ref().node_type()
    }

    pub fn ptr_eq(&self, other: &DataNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ── Values ────────────────────────────────────────────────────────────

    /// Current value of the node. Containers assemble their children's
    /// current values.
    pub fn get(&self) -> Value {
        let read = match &*self.kind_ref() {
            NodeKind::Primitive(PrimitiveNode::Owned(value)) => Read::Value(value.clone()),
            NodeKind::Primitive(PrimitiveNode::Slot(slot)) => Read::Slot(slot.clone()),
            NodeKind::Map(map) => Read::Value(map.get()),
            NodeKind::List(list) => Read::Value(list.get()),
            NodeKind::Remote(RemoteNode::Element(element)) => Read::Value(element.get()),
            NodeKind::Remote(RemoteNode::Attribute(name)) => Read::Attribute(name.clone()),
            NodeKind::Remote(RemoteNode::Source(_)) => Read::Source,
        };
        match read {
            Read::Value(value) => value,
            Read::Slot(slot) => self.read_slot(&slot),
            Read::Attribute(name) => self.read_attribute(&name),
            Read::Source => self
                .source_backing(true)
                .map(|backing| backing.get())
                .unwrap_or(Value::Null),
        }
    }

    /// Replace the node's value and notify listeners of its path.
    ///
    /// Setting a composite value on a primitive turns it into a container
    /// in place; the handle stays the same.
    pub fn set(&self, value: Value) -> Result<(), StoreError> {
        self.assign(value)?;
        self.notify();
        Ok(())
    }

    pub(crate) fn assign(&self, value: Value) -> Result<(), StoreError> {
        let slot = match &*self.kind_ref() {
            NodeKind::Primitive(PrimitiveNode::Slot(slot)) => Some(slot.clone()),
            _ => None,
        };
        if slot.is_some_and(|slot| !self.slot_attached(&slot)) {
            return Err(StoreError::invalid_mutation(
                &self.0.path,
                "node is no longer part of its container",
            ));
        }
        let write = {
            let mut kind = self.kind_mut();
            match &mut *kind {
                NodeKind::Remote(RemoteNode::Source(_)) => Write::Source(value),
                NodeKind::Remote(RemoteNode::Element(element)) => {
                    element.set_text(&self.0.path, &value)?;
                    Write::Done
                }
                NodeKind::Remote(RemoteNode::Attribute(name)) => {
                    Write::Attribute(name.clone(), value)
                }
                NodeKind::Primitive(PrimitiveNode::Slot(slot)) if !is_composite(&value) => {
                    Write::Slot(slot.clone(), value)
                }
                NodeKind::Primitive(PrimitiveNode::Slot(slot)) => {
                    let slot = slot.clone();
                    *kind = NodeKind::from_value(value);
                    Write::Vacate(slot)
                }
                _ => {
                    *kind = NodeKind::from_value(value);
                    Write::Done
                }
            }
        };
        match write {
            Write::Done => Ok(()),
            Write::Slot(slot, value) => {
                self.write_slot(&slot, value);
                Ok(())
            }
            Write::Vacate(slot) => {
                self.write_slot(&slot, Value::Null);
                Ok(())
            }
            Write::Attribute(name, value) => self.write_attribute(&name, &value),
            Write::Source(value) => self.loaded_backing()?.assign(value),
        }
    }

    // ── Children ──────────────────────────────────────────────────────────

    /// Child named `name`: a key, an id, a position like `[2]` or an
    /// attribute like `@width`.
    ///
    /// With `create`, a missing child is added as an empty map (or an
    /// element carrying `id = name` in a list) and a null primitive is
    /// promoted to a map first.
    pub fn child_node(&self, name: &str, create: bool) -> Option<DataNode> {
        let step = match &mut *self.kind_mut() {
            NodeKind::Map(map) => Step::Found(map.child_node(self, name, create)),
            NodeKind::List(list) => Step::Found(list.child_node(self, name, create)),
            NodeKind::Remote(RemoteNode::Element(element)) => {
                Step::Found(element.child_node(self, name, create))
            }
            NodeKind::Remote(RemoteNode::Attribute(_)) => Step::Found(None),
            NodeKind::Remote(RemoteNode::Source(_)) => Step::Source,
            NodeKind::Primitive(_) if create => Step::Promote,
            NodeKind::Primitive(_) => Step::Found(None),
        };
        match step {
            Step::Found(found) => found,
            Step::Source => self.source_backing(true)?.child_node(name, create),
            Step::Promote => {
                if !self.get().is_null() {
                    return None;
                }
                self.assign(Value::Object(serde_json::Map::new())).ok()?;
                self.child_node(name, create)
            }
        }
    }

    /// Children in order. `None` or `*` selects every child, `@*` every
    /// attribute, and any other name the children carrying that name.
    pub fn child_nodes(&self, selector: Option<&str>) -> Vec<DataNode> {
        match &mut *self.kind_mut() {
            NodeKind::Map(map) => return map.child_nodes(self, selector),
            NodeKind::List(list) => return list.child_nodes(self, selector),
            NodeKind::Remote(RemoteNode::Element(element)) => {
                return element.child_nodes(self, selector)
            }
            NodeKind::Remote(RemoteNode::Source(_)) => {}
            _ => return Vec::new(),
        }
        self.source_backing(true)
            .map(|backing| backing.child_nodes(selector))
            .unwrap_or_default()
    }

    pub fn child_value(&self, name: &str) -> Option<Value> {
        self.child_node(name, false).map(|child| child.get())
    }

    pub fn child_count(&self) -> usize {
        let backing = match &*self.kind_ref() {
            NodeKind::Map(map) => return map.len(),
            NodeKind::List(list) => return list.len(),
            NodeKind::Remote(RemoteNode::Element(element)) => return element.len(),
            NodeKind::Remote(RemoteNode::Source(source)) => source.backing.clone(),
            _ => return 0,
        };
        backing.map_or(0, |backing| backing.child_count())
    }

    /// Set the child `name` to `value`, creating it when missing, and
    /// notify listeners of the child's path.
    pub fn set_child(&self, name: &str, value: Value) -> Result<DataNode, StoreError> {
        let child = self
            .child_node(name, true)
            .ok_or_else(|| StoreError::invalid_mutation(&self.0.path, "cannot create child"))?;
        child.set(value)?;
        Ok(child)
    }

    /// Remove the child `name`. Returns whether anything was removed;
    /// listeners of this node's path are notified when it was.
    pub fn remove_child(&self, name: &str) -> Result<bool, StoreError> {
        let removed = match &mut *self.kind_mut() {
            NodeKind::Map(map) => Some(map.remove(name)),
            NodeKind::List(list) => Some(list.remove(name)),
            NodeKind::Remote(RemoteNode::Element(element)) => Some(element.remove(name)),
            NodeKind::Remote(RemoteNode::Source(_)) => None,
            _ => Some(false),
        };
        match removed {
            Some(removed) => {
                if removed {
                    self.notify();
                }
                Ok(removed)
            }
            None => self.loaded_backing()?.remove_child(name),
        }
    }

    /// Append `value` to a list node and notify listeners of the list.
    pub fn append(&self, value: Value) -> Result<DataNode, StoreError> {
        let target = self.kind();
        match target {
            NodeType::List => {
                let child = match &mut *self.kind_mut() {
                    NodeKind::List(list) => list.append(self, value),
                    _ => return Err(StoreError::invalid_mutation(&self.0.path, "not a list")),
                };
                self.notify();
                Ok(child)
            }
            NodeType::Source => self.loaded_backing()?.append(value),
            _ => Err(StoreError::invalid_mutation(&self.0.path, "not a list")),
        }
    }

    /// Zero-based index among the parent's children (or among the store's
    /// sources for a root).
    pub fn position(&self) -> Option<usize> {
        match self.parent() {
            Some(parent) => {
                let selector = match self.kind() {
                    NodeType::Attribute => Some(ATTRIBUTE_WILDCARD),
                    _ => None,
                };
                parent
                    .child_nodes(selector)
                    .iter()
                    .position(|child| child.ptr_eq(self))
            }
            None => self.store()?.root_position(&self.0.name),
        }
    }

    /// Whether the node's children form a list. An unloaded remote source
    /// counts as one.
    pub fn is_list(&self) -> bool {
        let backing = match &*self.kind_ref() {
            NodeKind::List(_) => return true,
            NodeKind::Remote(RemoteNode::Source(source)) => source.backing.clone(),
            _ => return false,
        };
        backing.map_or(true, |backing| backing.is_list())
    }

    // ── Remote sources ────────────────────────────────────────────────────

    /// Whether the node's data is available. Always true except for remote
    /// sources that have not finished loading.
    pub fn is_loaded(&self) -> bool {
        self.load_state().map_or(true, |state| state == LoadState::Loaded)
    }

    /// Start loading a remote source unless it is loading or loaded.
    pub fn load(&self) {
        crate::remote::begin_load(self, false);
    }

    /// Start a fresh load of a remote source; responses to earlier loads
    /// are dropped.
    pub fn reload(&self) {
        crate::remote::begin_load(self, true);
    }

    pub fn load_state(&self) -> Option<LoadState> {
        match &*self.kind_ref() {
            NodeKind::Remote(RemoteNode::Source(source)) => Some(source.state),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<LoadError> {
        match &*self.kind_ref() {
            NodeKind::Remote(RemoteNode::Source(source)) => source.last_error.clone(),
            _ => None,
        }
    }

    /// Backing data of a remote source that mutations can go to.
    fn loaded_backing(&self) -> Result<DataNode, StoreError> {
        self.source_backing(false)
            .ok_or_else(|| StoreError::invalid_mutation(&self.0.path, "remote source is not loaded"))
    }

    /// Backing data of a remote source, starting the first load when
    /// `trigger` is set.
    fn source_backing(&self, trigger: bool) -> Option<DataNode> {
        let state = match &*self.kind_ref() {
            NodeKind::Remote(RemoteNode::Source(source)) => source.state,
            _ => return None,
        };
        if trigger && state == LoadState::NotLoaded {
            crate::remote::begin_load(self, false);
        }
        match &*self.kind_ref() {
            NodeKind::Remote(RemoteNode::Source(source)) => source.backing.clone(),
            _ => None,
        }
    }
}

impl PartialEq for DataNode {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for DataNode {}

impl fmt::Debug for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataNode")
            .field("path", &self.0.path)
            .field("kind", &self.kind())
            .finish()
    }
}

impl PathTarget for DataNode {
    fn child_node(&self, name: &str, create: bool) -> Option<Self> {
        DataNode::child_node(self, name, create)
    }

    fn child_nodes(&self, selector: Option<&str>) -> Vec<Self> {
        DataNode::child_nodes(self, selector)
    }

    fn source(&self, name: &str) -> Option<Self> {
        self.store()?.root(name)
    }

    fn value(&self) -> Value {
        self.get()
    }

    fn name(&self) -> String {
        self.0.name.clone()
    }

    fn position(&self) -> Option<usize> {
        DataNode::position(self)
    }

    fn is_list(&self) -> bool {
        DataNode::is_list(self)
    }
}
