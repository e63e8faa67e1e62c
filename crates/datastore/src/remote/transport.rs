use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::endpoint::TransportKind;
use crate::error::LoadError;

/// One fetch issued by a remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Name of the issuing source, without the `$`.
    pub source: String,
    pub url: String,
    pub transport: TransportKind,
    /// Sequence number of this fetch within its source.
    pub seq: u64,
}

/// Receives the raw body (or the failure) of a fetch. Called at most once,
/// on the thread that owns the store.
pub type FetchCallback = Box<dyn FnOnce(Result<String, LoadError>)>;

/// Moves bytes for remote sources.
///
/// Implementations may call `done` synchronously or later from the same
/// thread's event loop. The store holds no borrow while `fetch` runs.
pub trait Transport {
    fn fetch(&self, request: FetchRequest, done: FetchCallback);
}

/// Fails every fetch with [`LoadError::NoTransport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn fetch(&self, _request: FetchRequest, done: FetchCallback) {
        done(Err(LoadError::NoTransport));
    }
}

/// Holds fetches until they are completed by hand.
///
/// Clones share the same queue, so a test (or an embedding event loop) can
/// keep one clone and hand another to the store.
///
/// # Example
///
/// ```
/// use datastore::{QueuedTransport, RemoteConfig, Store};
/// use serde_json::json;
/// use std::rc::Rc;
///
/// let queue = QueuedTransport::new();
/// let store = Store::with_transport(Rc::new(queue.clone()));
/// store.add_remote("albums", RemoteConfig::json("/albums")).unwrap();
///
/// assert!(store.nodes("$albums").unwrap().is_empty());
/// assert_eq!(queue.pending_count(), 1);
///
/// queue.complete_next(Ok(r#"[{"id": "a1", "title": "Lisbon"}]"#.into()));
/// assert_eq!(store.value("$albums/a1/title").unwrap(), Some(json!("Lisbon")));
/// ```
#[derive(Clone, Default)]
pub struct QueuedTransport {
    inner: Rc<RefCell<QueueInner>>,
}

#[derive(Default)]
struct QueueInner {
    pending: VecDeque<(FetchRequest, FetchCallback)>,
    issued: usize,
}

impl QueuedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests waiting for completion, oldest first.
    pub fn pending(&self) -> Vec<FetchRequest> {
        self.inner
            .borrow()
            .pending
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Number of fetches ever issued through this queue.
    pub fn issued_count(&self) -> usize {
        self.inner.borrow().issued
    }

    /// Complete the oldest pending fetch.
    pub fn complete_next(&self, result: Result<String, LoadError>) -> Option<FetchRequest> {
        let entry = self.inner.borrow_mut().pending.pop_front();
        Self::finish(entry, result)
    }

    /// Complete the newest pending fetch.
    pub fn complete_latest(&self, result: Result<String, LoadError>) -> Option<FetchRequest> {
        let entry = self.inner.borrow_mut().pending.pop_back();
        Self::finish(entry, result)
    }

    /// Complete the pending fetch `seq` of `source`.
    pub fn complete(&self, source: &str, seq: u64, result: Result<String, LoadError>) -> bool {
        let entry = {
            let mut inner = self.inner.borrow_mut();
            let pos = inner
                .pending
                .iter()
                .position(|(request, _)| request.source == source && request.seq == seq);
            pos.and_then(|pos| inner.pending.remove(pos))
        };
        Self::finish(entry, result).is_some()
    }

    /// Complete every pending fetch, oldest first, with the result `respond`
    /// gives for it. Fetches issued while draining are completed too.
    pub fn complete_all<F>(&self, respond: F) -> usize
    where
        F: Fn(&FetchRequest) -> Result<String, LoadError>,
    {
        let mut completed = 0;
        loop {
            let entry = self.inner.borrow_mut().pending.pop_front();
            let Some((request, done)) = entry else {
                return completed;
            };
            let result = respond(&request);
            done(result);
            completed += 1;
        }
    }

    fn finish(
        entry: Option<(FetchRequest, FetchCallback)>,
        result: Result<String, LoadError>,
    ) -> Option<FetchRequest> {
        let (request, done) = entry?;
        done(result);
        Some(request)
    }
}

impl Transport for QueuedTransport {
    fn fetch(&self, request: FetchRequest, done: FetchCallback) {
        let mut inner = self.inner.borrow_mut();
        inner.issued += 1;
        inner.pending.push_back((request, done));
    }
}
