use serde_json::Value;

use super::{DataNode, NodeKind};

/// A scalar node.
///
/// Scalars reached through a map or list live in the container's storage
/// and the node only remembers where; scalars that were assigned directly
/// (or promoted out of a container slot) own their value.
pub(crate) enum PrimitiveNode {
    Owned(Value),
    Slot(SlotKey),
}

/// Address of a scalar inside its parent container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SlotKey {
    /// Key of a map entry.
    Key(String),
    /// Stable token of a list entry; survives reordering and removal of
    /// other entries.
    Entry(u64),
}

impl DataNode {
    pub(super) fn read_slot(&self, slot: &SlotKey) -> Value {
        let Some(parent) = self.parent() else {
            return Value::Null;
        };
        let value = match (&*parent.kind_ref(), slot) {
            (NodeKind::Map(map), SlotKey::Key(key)) => map.read(key),
            (NodeKind::List(list), SlotKey::Entry(token)) => list.read(*token),
            _ => None,
        };
        value.unwrap_or(Value::Null)
    }

    /// Whether the parent still holds `self` at `slot`. Replacing or
    /// removing the parent's entry leaves the old node detached.
    pub(super) fn slot_attached(&self, slot: &SlotKey) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };
        let attached = match (&*parent.kind_ref(), slot) {
            (NodeKind::Map(map), SlotKey::Key(key)) => map.holds(key, self),
            (NodeKind::List(list), SlotKey::Entry(token)) => list.holds(*token, self),
            _ => false,
        };
        attached
    }

    pub(super) fn write_slot(&self, slot: &SlotKey, value: Value) {
        let Some(parent) = self.parent() else {
            return;
        };
        match (&mut *parent.kind_mut(), slot) {
            (NodeKind::Map(map), SlotKey::Key(key)) => map.write(key, value),
            (NodeKind::List(list), SlotKey::Entry(token)) => list.write(*token, value),
            _ => {}
        };
    }
}
