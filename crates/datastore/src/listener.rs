//! Listener registrations, stored in a trie keyed by path segment.

use std::collections::HashMap;
use std::rc::Rc;

use datastore_path::split_path;

/// Callback invoked with `(changed_path, subscriber_id)`.
pub type Listener = Rc<dyn Fn(&str, &str)>;

/// How far below the registered path a change may happen and still fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Only changes to the path itself.
    Exact,
    /// The path and its direct children.
    Children,
    /// The path and everything below it.
    Descendants,
}

impl Scope {
    pub fn max_depth(self) -> usize {
        match self {
            Scope::Exact => 0,
            Scope::Children => 1,
            Scope::Descendants => usize::MAX,
        }
    }

    /// Split a registration pattern: `a/b/*` watches children, `a/b/...`
    /// watches descendants and anything else is exact.
    ///
    /// # Example
    ///
    /// ```
    /// use datastore::Scope;
    ///
    /// assert_eq!(Scope::split_pattern("$a/b/..."), ("$a/b", Scope::Descendants));
    /// assert_eq!(Scope::split_pattern("$a/b/*"), ("$a/b", Scope::Children));
    /// assert_eq!(Scope::split_pattern("$a/b"), ("$a/b", Scope::Exact));
    /// ```
    pub fn split_pattern(pattern: &str) -> (&str, Scope) {
        if let Some(path) = pattern.strip_suffix("/...") {
            (path, Scope::Descendants)
        } else if let Some(path) = pattern.strip_suffix("/*") {
            (path, Scope::Children)
        } else {
            (pattern, Scope::Exact)
        }
    }
}

/// Handle returned by [`Store::register`](crate::Store::register); pass it
/// back to [`Store::unregister`](crate::Store::unregister) to cancel exactly
/// this registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    path: String,
    subscriber: String,
    scope: Scope,
}

impl Subscription {
    pub(crate) fn new(id: u64, path: String, subscriber: String, scope: Scope) -> Self {
        Subscription {
            id,
            path,
            subscriber,
            scope,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn subscriber(&self) -> &str {
        &self.subscriber
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

struct Record {
    id: u64,
    subscriber: String,
    max_depth: usize,
    listener: Listener,
}

/// A listener selected for one notification.
pub(crate) struct Dispatch {
    pub(crate) subscriber: String,
    pub(crate) listener: Listener,
}

#[derive(Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    bucket: Vec<Record>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.bucket.is_empty() && self.children.is_empty()
    }

    fn len(&self) -> usize {
        self.bucket.len() + self.children.values().map(TrieNode::len).sum::<usize>()
    }

    fn remove(&mut self, segments: &[&str], id: u64) -> bool {
        match segments.split_first() {
            None => {
                let before = self.bucket.len();
                self.bucket.retain(|record| record.id != id);
                self.bucket.len() != before
            }
            Some((head, tail)) => {
                let Some(child) = self.children.get_mut(*head) else {
                    return false;
                };
                let removed = child.remove(tail, id);
                if child.is_empty() {
                    self.children.remove(*head);
                }
                removed
            }
        }
    }

    fn remove_subscriber(&mut self, subscriber: &str) -> usize {
        let before = self.bucket.len();
        self.bucket.retain(|record| record.subscriber != subscriber);
        let mut removed = before - self.bucket.len();
        self.children.retain(|_, child| {
            removed += child.remove_subscriber(subscriber);
            !child.is_empty()
        });
        removed
    }
}

#[derive(Default)]
pub(crate) struct ListenerTrie {
    root: TrieNode,
}

impl ListenerTrie {
    pub(crate) fn insert(
        &mut self,
        path: &str,
        id: u64,
        subscriber: &str,
        scope: Scope,
        listener: Listener,
    ) {
        let mut node = &mut self.root;
        for segment in split_path(path) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.bucket.push(Record {
            id,
            subscriber: subscriber.to_string(),
            max_depth: scope.max_depth(),
            listener,
        });
    }

    pub(crate) fn remove(&mut self, path: &str, id: u64) -> bool {
        let segments: Vec<&str> = split_path(path).collect();
        self.root.remove(&segments, id)
    }

    pub(crate) fn remove_subscriber(&mut self, subscriber: &str) -> usize {
        self.root.remove_subscriber(subscriber)
    }

    /// Listeners that fire for a change at `path`, deepest bucket first and
    /// in registration order within a bucket.
    pub(crate) fn collect(&self, path: &str) -> Vec<Dispatch> {
        let segments: Vec<&str> = split_path(path).collect();
        let mut visited = Vec::with_capacity(segments.len());
        let mut node = &self.root;
        for (depth, segment) in segments.iter().enumerate() {
            match node.children.get(*segment) {
                Some(child) => {
                    node = child;
                    visited.push((depth + 1, node));
                }
                None => break,
            }
        }

        let mut out = Vec::new();
        for (depth, node) in visited.into_iter().rev() {
            let hop = segments.len() - depth;
            for record in node.bucket.iter().filter(|record| hop <= record.max_depth) {
                out.push(Dispatch {
                    subscriber: record.subscriber.clone(),
                    listener: record.listener.clone(),
                });
            }
        }
        out
    }

    pub(crate) fn len(&self) -> usize {
        self.root.len()
    }

    /// Number of trie nodes below the root; pruning keeps this at the size
    /// of the live registrations.
    #[cfg(test)]
    fn node_count(&self) -> usize {
        fn count(node: &TrieNode) -> usize {
            node.children.values().map(|child| 1 + count(child)).sum()
        }
        count(&self.root)
    }
}
