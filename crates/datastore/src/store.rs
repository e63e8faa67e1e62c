//! The store: registered sources, path operations and change dispatch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use datastore_path::{DataPath, MissingNode, PathFunction};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::listener::{Listener, ListenerTrie, Scope, Subscription};
use crate::node::{build_document, DataNode, NodeKind};
use crate::remote::{LoadState, NullTransport, RemoteConfig, SourceState, Transport};

/// Tunables of a [`Store`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreOptions {
    /// How many notifications may be nested (listeners writing during
    /// dispatch) before further ones are dropped.
    pub max_notify_depth: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            max_notify_depth: 16,
        }
    }
}

pub(crate) struct StoreShared {
    roots: RefCell<IndexMap<String, DataNode>>,
    listeners: RefCell<ListenerTrie>,
    dispatching: RefCell<Vec<String>>,
    transport: Rc<dyn Transport>,
    options: StoreOptions,
    events: Cell<u64>,
    next_subscription: Cell<u64>,
}

/// Pops the dispatch stack even if a listener panics.
struct DispatchGuard<'a> {
    stack: &'a RefCell<Vec<String>>,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

impl StoreShared {
    pub(crate) fn root(&self, name: &str) -> Option<DataNode> {
        let name = name.strip_prefix('$').unwrap_or(name);
        self.roots.borrow().get(name).cloned()
    }

    pub(crate) fn root_position(&self, name: &str) -> Option<usize> {
        let name = name.strip_prefix('$').unwrap_or(name);
        self.roots.borrow().get_index_of(name)
    }

    pub(crate) fn transport(&self) -> Rc<dyn Transport> {
        self.transport.clone()
    }

    /// Invoke every listener whose registration covers `path`.
    pub(crate) fn notify(&self, path: &str) {
        {
            let mut stack = self.dispatching.borrow_mut();
            if stack.iter().any(|active| active == path) {
                warn!(path, "suppressed re-entrant notification");
                return;
            }
            if stack.len() >= self.options.max_notify_depth {
                warn!(path, depth = stack.len(), "notification nesting too deep");
                return;
            }
            stack.push(path.to_string());
        }
        let _guard = DispatchGuard {
            stack: &self.dispatching,
        };

        self.events.set(self.events.get() + 1);
        let targets = self.listeners.borrow().collect(path);
        debug!(path, listeners = targets.len(), "dispatching change");
        for target in targets {
            (target.listener)(path, &target.subscriber);
        }
    }
}

/// A path-addressed data store.
///
/// Cloning a `Store` yields another handle to the same store. Everything
/// lives on one thread; no borrow is held while listeners or transports
/// run, so both may call back into the store.
///
/// # Example
///
/// ```
/// use datastore::{Scope, Store};
/// use serde_json::json;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let store = Store::new();
/// store.add_json("people", json!({"42": {"name": "Grace"}})).unwrap();
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let log = seen.clone();
/// store
///     .register(
///         move |path: &str, _: &str| log.borrow_mut().push(path.to_string()),
///         "$people/42/name",
///         "t1",
///         Scope::Exact,
///     )
///     .unwrap();
///
/// store.set("$people/42/name", json!("Ada")).unwrap();
/// assert_eq!(*seen.borrow(), vec!["$people/42/name"]);
/// assert_eq!(store.value("$people/42/name").unwrap(), Some(json!("Ada")));
/// ```
#[derive(Clone)]
pub struct Store {
    shared: Rc<StoreShared>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("sources", &self.source_names())
            .field("subscriptions", &self.subscription_count())
            .field("options", &self.shared.options)
            .finish()
    }
}

impl Store {
    /// A store whose remote sources cannot fetch.
    pub fn new() -> Self {
        Self::with_transport(Rc::new(NullTransport))
    }

    pub fn with_transport(transport: Rc<dyn Transport>) -> Self {
        Self::with_options(transport, StoreOptions::default())
    }

    pub fn with_options(transport: Rc<dyn Transport>, options: StoreOptions) -> Self {
        Store {
            shared: Rc::new(StoreShared {
                roots: RefCell::new(IndexMap::new()),
                listeners: RefCell::new(ListenerTrie::default()),
                dispatching: RefCell::new(Vec::new()),
                transport,
                options,
                events: Cell::new(0),
                next_subscription: Cell::new(1),
            }),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.shared.options
    }

    fn link(&self) -> Weak<StoreShared> {
        Rc::downgrade(&self.shared)
    }

    // ── Sources ───────────────────────────────────────────────────────────

    /// Register an in-memory source `$name` holding `value`.
    pub fn add_json(&self, name: &str, value: Value) -> Result<DataNode, StoreError> {
        let name = self.check_name(name)?;
        let root = DataNode::new(
            name.clone(),
            format!("${name}"),
            Weak::new(),
            self.link(),
            NodeKind::from_value(value),
        );
        Ok(self.install(name, root))
    }

    /// Register an in-memory source `$name` parsed from an XML document.
    pub fn add_xml(&self, name: &str, xml: &str) -> Result<DataNode, StoreError> {
        let name = self.check_name(name)?;
        let root = build_document(name.clone(), format!("${name}"), Weak::new(), self.link(), xml)?;
        Ok(self.install(name, root))
    }

    /// Register a remote source `$name`. Nothing is fetched until the source
    /// is navigated or loaded, unless `config.autoload` is set.
    pub fn add_remote(&self, name: &str, config: RemoteConfig) -> Result<DataNode, StoreError> {
        let name = self.check_name(name)?;
        let autoload = config.autoload;
        let root = DataNode::new(
            name.clone(),
            format!("${name}"),
            Weak::new(),
            self.link(),
            NodeKind::source(SourceState::new(config)),
        );
        let root = self.install(name, root);
        if autoload {
            root.load();
        }
        Ok(root)
    }

    fn check_name(&self, name: &str) -> Result<String, StoreError> {
        let name = name.strip_prefix('$').unwrap_or(name);
        let valid = DataPath::compile(&format!("${name}")).is_ok_and(|path| {
            path.len() == 1 && path.function().is_none() && !path.is_optional()
        });
        if !valid {
            return Err(StoreError::InvalidSourceName(name.to_string()));
        }
        if self.shared.roots.borrow().contains_key(name) {
            return Err(StoreError::DuplicateSource(name.to_string()));
        }
        Ok(name.to_string())
    }

    fn install(&self, name: String, root: DataNode) -> DataNode {
        debug!(source = %name, kind = ?root.kind(), "source registered");
        self.shared.roots.borrow_mut().insert(name, root.clone());
        root.notify();
        root
    }

    /// Root node of source `name` (with or without the `$`).
    pub fn source(&self, name: &str) -> Option<DataNode> {
        self.shared.root(name)
    }

    pub fn source_names(&self) -> Vec<String> {
        self.shared.roots.borrow().keys().cloned().collect()
    }

    /// Unregister a source and notify listeners of its path.
    pub fn remove_source(&self, name: &str) -> Option<DataNode> {
        let name = name.strip_prefix('$').unwrap_or(name);
        let removed = self.shared.roots.borrow_mut().shift_remove(name)?;
        self.shared.notify(removed.data_path());
        Some(removed)
    }

    // ── Path operations ───────────────────────────────────────────────────

    fn resolve(&self, path: &str) -> Result<(Rc<DataPath>, Option<DataNode>), StoreError> {
        let expr = DataPath::compile(path)?;
        let head = match expr.source_name() {
            Some(name) => self.source(name),
            None => return Err(StoreError::RelativePath(path.to_string())),
        };
        Ok((expr, head))
    }

    /// Node at an absolute path. With `create`, missing containers are
    /// materialized on the way.
    pub fn node(&self, path: &str, create: bool) -> Result<Option<DataNode>, StoreError> {
        let (expr, head) = self.resolve(path)?;
        Ok(head.and_then(|head| expr.get_node(&head, create)))
    }

    /// Node list at an absolute path; a list node yields its children.
    pub fn nodes(&self, path: &str) -> Result<Vec<DataNode>, StoreError> {
        let (expr, head) = self.resolve(path)?;
        Ok(head
            .map(|head| expr.get_node_list(&head, false))
            .unwrap_or_default())
    }

    /// Value at an absolute path, evaluating a trailing function.
    pub fn value(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let (expr, head) = self.resolve(path)?;
        Ok(match head {
            Some(head) => expr.get(&head),
            None if expr.function() == Some(PathFunction::Count) => Some(Value::from(0)),
            None => None,
        })
    }

    /// Like [`node`](Self::node), but a miss is an error unless the path
    /// ends in `?`.
    pub fn require(&self, path: &str) -> Result<Option<DataNode>, StoreError> {
        let (expr, head) = self.resolve(path)?;
        match head {
            Some(head) => Ok(expr.require_node(&head)?),
            None if expr.is_optional() => Ok(None),
            None => Err(MissingNode {
                path: path.to_string(),
            }
            .into()),
        }
    }

    /// Write `value` at an absolute path, creating missing containers, and
    /// notify listeners of that path.
    pub fn set(&self, path: &str, value: Value) -> Result<DataNode, StoreError> {
        let (expr, head) = self.resolve(path)?;
        if expr.function().is_some() {
            return Err(StoreError::invalid_mutation(path, "path ends in a function"));
        }
        let node = head
            .and_then(|head| expr.get_node(&head, true))
            .ok_or_else(|| StoreError::invalid_mutation(path, "no node at path"))?;
        node.set(value)?;
        Ok(node)
    }

    /// Start loading source `name`. Returns `false` for unknown names.
    pub fn load(&self, name: &str) -> bool {
        self.source(name).map(|root| root.load()).is_some()
    }

    pub fn reload(&self, name: &str) -> bool {
        self.source(name).map(|root| root.reload()).is_some()
    }

    /// Load state of a remote source; `None` for unknown names and
    /// in-memory sources.
    pub fn load_state(&self, name: &str) -> Option<LoadState> {
        self.source(name)?.load_state()
    }

    // ── Listeners ─────────────────────────────────────────────────────────

    /// Call `listener` with `(changed_path, subscriber)` whenever a change
    /// within `scope` of `path` is notified.
    pub fn register<F>(
        &self,
        listener: F,
        path: &str,
        subscriber: &str,
        scope: Scope,
    ) -> Result<Subscription, StoreError>
    where
        F: Fn(&str, &str) + 'static,
    {
        let expr = DataPath::compile(path)?;
        if !expr.is_absolute() {
            return Err(StoreError::RelativePath(path.to_string()));
        }
        let node_path = expr.node_path();
        let id = self.shared.next_subscription.get();
        self.shared.next_subscription.set(id + 1);
        let listener: Listener = Rc::new(listener);
        self.shared
            .listeners
            .borrow_mut()
            .insert(&node_path, id, subscriber, scope, listener);
        debug!(path = %node_path, subscriber, ?scope, "listener registered");
        Ok(Subscription::new(id, node_path, subscriber.to_string(), scope))
    }

    /// Register with the scope taken from the pattern's suffix: `/*` for
    /// children, `/...` for descendants.
    pub fn register_pattern<F>(
        &self,
        listener: F,
        pattern: &str,
        subscriber: &str,
    ) -> Result<Subscription, StoreError>
    where
        F: Fn(&str, &str) + 'static,
    {
        let (path, scope) = Scope::split_pattern(pattern);
        self.register(listener, path, subscriber, scope)
    }

    /// Cancel one registration. Returns whether it was still active.
    pub fn unregister(&self, subscription: &Subscription) -> bool {
        self.shared
            .listeners
            .borrow_mut()
            .remove(subscription.path(), subscription.id())
    }

    /// Cancel every registration of `subscriber`.
    pub fn unregister_subscriber(&self, subscriber: &str) -> usize {
        self.shared
            .listeners
            .borrow_mut()
            .remove_subscriber(subscriber)
    }

    pub fn subscription_count(&self) -> usize {
        self.shared.listeners.borrow().len()
    }

    /// Announce a change at `path` to the listeners covering it.
    pub fn notify(&self, path: &str) {
        self.shared.notify(path);
    }

    /// Number of notifications dispatched so far (suppressed ones excluded).
    pub fn event_count(&self) -> u64 {
        self.shared.events.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type Seen = Rc<RefCell<Vec<(String, String)>>>;

    fn recorder() -> (Seen, impl Fn(&str, &str) + Clone + 'static) {
        let seen: Seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let listener = move |path: &str, who: &str| {
            log.borrow_mut().push((path.to_string(), who.to_string()))
        };
        (seen, listener)
    }

    #[test]
    fn source_names_are_validated() {
        let store = Store::new();
        store.add_json("ok", json!({})).unwrap();
        assert_eq!(
            store.add_json("$ok", json!({})).unwrap_err(),
            StoreError::DuplicateSource("ok".into())
        );
        for bad in ["", "a/b", "x?", "count()", "a*"] {
            assert!(
                matches!(store.add_json(bad, json!(1)), Err(StoreError::InvalidSourceName(_))),
                "{bad:?} accepted"
            );
        }
        assert_eq!(store.source_names(), vec!["ok"]);
    }

    #[test]
    fn paths_must_be_absolute() {
        let store = Store::new();
        assert_eq!(
            store.node("people/42", false).unwrap_err(),
            StoreError::RelativePath("people/42".into())
        );
        assert!(matches!(store.value("a//b"), Err(StoreError::Path(_))));
    }

    #[test]
    fn set_creates_and_notifies_once() {
        let store = Store::new();
        store.add_json("people", json!({})).unwrap();
        let (seen, listener) = recorder();
        store
            .register(listener, "$people/42/name", "t1", Scope::Exact)
            .unwrap();

        let node = store.set("$people/42/name", json!("Ada")).unwrap();
        assert_eq!(node.data_path(), "$people/42/name");
        assert_eq!(
            *seen.borrow(),
            vec![("$people/42/name".to_string(), "t1".to_string())]
        );
        assert_eq!(store.value("$people").unwrap(), Some(json!({"42": {"name": "Ada"}})));
    }

    #[test]
    fn functions_and_misses() {
        let store = Store::new();
        store
            .add_json("albums", json!([{"id": "a1"}, {"id": "a2"}]))
            .unwrap();
        assert_eq!(store.value("$albums/count()").unwrap(), Some(json!(2)));
        assert_eq!(store.value("$albums/a2/position()").unwrap(), Some(json!(1)));
        assert_eq!(store.value("$albums/a2/name()").unwrap(), Some(json!("a2")));
        assert_eq!(store.value("$nothing/count()").unwrap(), Some(json!(0)));
        assert_eq!(store.value("$nothing/x").unwrap(), None);
        assert_eq!(store.value("$albums/a9/title").unwrap(), None);
        assert!(store.require("$albums/a9?").unwrap().is_none());
        assert!(matches!(store.require("$albums/a9"), Err(StoreError::Missing(_))));
        assert!(matches!(store.require("$nothing"), Err(StoreError::Missing(_))));
        assert!(store.set("$albums/count()", json!(3)).is_err());
    }

    #[test]
    fn root_positions_follow_registration_order() {
        let store = Store::new();
        store.add_json("a", json!(1)).unwrap();
        store.add_json("b", json!(2)).unwrap();
        assert_eq!(store.value("$b/position()").unwrap(), Some(json!(1)));
        store.remove_source("a").unwrap();
        assert_eq!(store.value("$b/position()").unwrap(), Some(json!(0)));
        assert!(store.source("$a").is_none());
    }

    #[test]
    fn reentrant_writes_terminate() {
        let store = Store::new();
        store.add_json("counter", json!({"n": 0})).unwrap();
        let inner = store.clone();
        let calls = Rc::new(Cell::new(0));
        let count = calls.clone();
        store
            .register(
                move |path: &str, _: &str| {
                    count.set(count.get() + 1);
                    let next = inner.value(path).ok().flatten().and_then(|v| v.as_i64()).unwrap_or(0) + 1;
                    inner.set(path, json!(next)).unwrap();
                },
                "$counter/n",
                "loop",
                Scope::Exact,
            )
            .unwrap();

        store.set("$counter/n", json!(1)).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(store.value("$counter/n").unwrap(), Some(json!(2)));
        assert_eq!(store.event_count(), 2);
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let store = Store::with_options(
            Rc::new(NullTransport),
            StoreOptions { max_notify_depth: 3 },
        );
        store.add_json("chain", json!({})).unwrap();
        let inner = store.clone();
        let calls = Rc::new(Cell::new(0usize));
        let count = calls.clone();
        store
            .register(
                move |path: &str, _: &str| {
                    count.set(count.get() + 1);
                    inner.notify(&format!("{path}/x"));
                },
                "$chain",
                "deep",
                Scope::Descendants,
            )
            .unwrap();

        store.notify("$chain");
        assert_eq!(calls.get(), 3);
    }
}
