//! Compiled, interned path expressions and the navigation algorithm.

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;

use crate::parser::{PathParser, PathSyntaxError};
use crate::target::PathTarget;
use crate::types::{format_path, PathFunction, Segment, ATTRIBUTE_WILDCARD};

thread_local! {
    /// Every expression compiled on this thread, keyed by its exact text.
    /// Entries are never evicted.
    static PATH_CACHE: RefCell<HashMap<String, Rc<DataPath>>> = RefCell::new(HashMap::new());
}

/// Returned by [`DataPath::require_node`] when a non-optional path misses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("No node at '{path}'")]
pub struct MissingNode {
    pub path: String,
}

/// A compiled path expression.
///
/// Instances are interned: compiling the same text twice yields the same
/// `Rc`, and the derived [`parent`](DataPath::parent) and
/// [`rest`](DataPath::rest) expressions are computed once and shared.
pub struct DataPath {
    text: String,
    segments: Vec<Segment>,
    function: Option<PathFunction>,
    optional: bool,
    parent: OnceCell<Option<Rc<DataPath>>>,
    rest: OnceCell<Option<Rc<DataPath>>>,
}

impl DataPath {
    /// Compile `text`, returning the interned instance.
    ///
    /// # Example
    ///
    /// ```
    /// use datastore_path::DataPath;
    /// use std::rc::Rc;
    ///
    /// let a = DataPath::compile("$albums/count()").unwrap();
    /// let b = DataPath::compile("$albums/count()").unwrap();
    /// assert!(Rc::ptr_eq(&a, &b));
    /// ```
    pub fn compile(text: &str) -> Result<Rc<DataPath>, PathSyntaxError> {
        if let Some(hit) = PATH_CACHE.with(|cache| cache.borrow().get(text).cloned()) {
            return Ok(hit);
        }
        let parsed = PathParser::parse(text)?;
        Ok(Self::intern(
            text.to_string(),
            parsed.segments,
            parsed.function,
            parsed.optional,
        ))
    }

    /// Number of expressions interned on this thread.
    pub fn cached_count() -> usize {
        PATH_CACHE.with(|cache| cache.borrow().len())
    }

    fn intern(
        text: String,
        segments: Vec<Segment>,
        function: Option<PathFunction>,
        optional: bool,
    ) -> Rc<DataPath> {
        PATH_CACHE.with(|cache| {
            cache
                .borrow_mut()
                .entry(text.clone())
                .or_insert_with(|| {
                    Rc::new(DataPath {
                        text,
                        segments,
                        function,
                        optional,
                        parent: OnceCell::new(),
                        rest: OnceCell::new(),
                    })
                })
                .clone()
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// The text this expression was compiled from.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of navigation segments (the function does not count).
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn function(&self) -> Option<PathFunction> {
        self.function
    }

    /// Whether the expression ends in `?`.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Whether the head segment names a registered source.
    pub fn is_absolute(&self) -> bool {
        matches!(self.segments.first(), Some(Segment::Source(_)))
    }

    /// Source name of an absolute expression, without the `$`.
    pub fn source_name(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Source(name)) => Some(name),
            _ => None,
        }
    }

    pub fn head(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Canonical node path: the segments only, without function or `?`.
    pub fn node_path(&self) -> String {
        format_path(&self.segments, None, false)
    }

    // ── Derived expressions ───────────────────────────────────────────────

    /// Expression for every segment but the last; `None` for a single
    /// segment. Drops the function and the optional marker.
    pub fn parent(&self) -> Option<Rc<DataPath>> {
        self.parent
            .get_or_init(|| {
                if self.segments.len() <= 1 {
                    return None;
                }
                let segments = self.segments[..self.segments.len() - 1].to_vec();
                let text = format_path(&segments, None, false);
                Some(Self::intern(text, segments, None, false))
            })
            .clone()
    }

    /// Expression for every segment but the first; `None` for a single
    /// segment. Keeps the optional marker.
    pub fn rest(&self) -> Option<Rc<DataPath>> {
        self.rest
            .get_or_init(|| {
                if self.segments.len() <= 1 {
                    return None;
                }
                let segments = self.segments[1..].to_vec();
                let text = format_path(&segments, None, self.optional);
                Some(Self::intern(text, segments, None, self.optional))
            })
            .clone()
    }

    // ── Navigation ────────────────────────────────────────────────────────

    /// Evaluate to a scalar.
    ///
    /// A trailing function is computed here; otherwise this is the value of
    /// the node the path selects.
    pub fn get<T: PathTarget>(&self, root: &T) -> Option<Value> {
        match self.function {
            Some(PathFunction::Count) => Some(Value::from(self.get_node_list(root, false).len())),
            Some(PathFunction::Name) => self.get_node(root, false).map(|node| Value::String(node.name())),
            Some(PathFunction::Position) => self
                .get_node(root, false)
                .and_then(|node| node.position())
                .map(Value::from),
            None => self.get_node(root, false).map(|node| node.value()),
        }
    }

    /// Select a single node. Misses return `None`; with `create`, missing
    /// containers along the way are materialized by the target.
    pub fn get_node<T: PathTarget>(&self, root: &T, create: bool) -> Option<T> {
        let Some(head) = self.segments.first() else {
            return Some(root.clone());
        };
        let node = resolve_head(head, root, create)?;
        match self.rest() {
            None => Some(node),
            Some(rest) => rest.get_node(&node, create),
        }
    }

    /// Select an ordered node list.
    ///
    /// A path ending on a list node yields the list's children. A `*` or
    /// `@*` in head position fans out over every matching child.
    pub fn get_node_list<T: PathTarget>(&self, root: &T, create: bool) -> Vec<T> {
        let Some(head) = self.segments.first() else {
            return expand(root.clone());
        };

        if let Some(rest) = self.rest() {
            if head.is_wildcard() {
                return select_all(head, root)
                    .iter()
                    .flat_map(|child| rest.get_node_list(child, create))
                    .collect();
            }
            return match resolve_head(head, root, create) {
                Some(node) => rest.get_node_list(&node, create),
                None => Vec::new(),
            };
        }

        match head {
            Segment::AllChildren | Segment::AllAttributes => select_all(head, root),
            Segment::Current => expand(root.clone()),
            Segment::Source(name) => root.source(name).map(expand).unwrap_or_default(),
            named => {
                let name = named.to_string();
                match root.child_node(&name, create) {
                    Some(child) if child.is_list() => child.child_nodes(None),
                    Some(_) => root.child_nodes(Some(&name)),
                    None => Vec::new(),
                }
            }
        }
    }

    /// Like [`get_node`](Self::get_node), but a miss on a non-optional path
    /// is an error.
    pub fn require_node<T: PathTarget>(&self, root: &T) -> Result<Option<T>, MissingNode> {
        match self.get_node(root, false) {
            Some(node) => Ok(Some(node)),
            None if self.optional => Ok(None),
            None => Err(MissingNode {
                path: self.text.clone(),
            }),
        }
    }
}

fn resolve_head<T: PathTarget>(head: &Segment, root: &T, create: bool) -> Option<T> {
    match head {
        Segment::Source(name) => root.source(name),
        Segment::Current => Some(root.clone()),
        Segment::AllChildren | Segment::AllAttributes => select_all(head, root).into_iter().next(),
        named => root.child_node(&named.to_string(), create),
    }
}

fn select_all<T: PathTarget>(head: &Segment, root: &T) -> Vec<T> {
    match head {
        Segment::AllAttributes => root.child_nodes(Some(ATTRIBUTE_WILDCARD)),
        _ => root.child_nodes(None),
    }
}

fn expand<T: PathTarget>(node: T) -> Vec<T> {
    if node.is_list() {
        node.child_nodes(None)
    } else {
        vec![node]
    }
}

impl fmt::Debug for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPath")
            .field("text", &self.text)
            .field("segments", &self.segments)
            .field("function", &self.function)
            .field("optional", &self.optional)
            .finish()
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq for DataPath {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for DataPath {}
